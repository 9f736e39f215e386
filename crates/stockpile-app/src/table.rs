// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::cmp::Ordering;
use tracing::{debug, warn};

use crate::price::format_price;
use crate::search::{Highlight, SearchPattern};
use crate::{Product, ProductId, SearchState, SortState, TableColumn};

pub const SKELETON_ROWS: usize = 5;
pub const EMPTY_TABLE_MESSAGE: &str = "No products found";
pub const NO_RESULTS_MESSAGE: &str = "No products found matching your search.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowActionKind {
    Edit,
    Delete,
}

impl RowActionKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowAction {
    pub kind: RowActionKind,
    pub product_id: ProductId,
}

/// Attributes captured from the snapshot that produced the row; the action
/// dispatcher reads these instead of going back to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowMetadata {
    pub id: ProductId,
    pub name: String,
    pub price_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedRow {
    pub meta: RowMetadata,
    pub name_cell: Highlight,
    pub price_cell: String,
    pub actions: [RowAction; 2],
    pub visible: bool,
    store_index: usize,
    display_name: String,
}

impl RenderedRow {
    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

pub fn render_row(product: &Product, currency_symbol: &str) -> RenderedRow {
    let display_name = escape_display_name(&product.name);
    RenderedRow {
        meta: RowMetadata {
            id: product.id,
            name: product.name.clone(),
            price_cents: product.price_cents,
        },
        name_cell: Highlight::plain(&display_name),
        price_cell: format_price(product.price_cents, currency_symbol),
        actions: [
            RowAction {
                kind: RowActionKind::Edit,
                product_id: product.id,
            },
            RowAction {
                kind: RowActionKind::Delete,
                product_id: product.id,
            },
        ],
        visible: true,
        store_index: 0,
        display_name,
    }
}

/// Control characters would corrupt the terminal grid, so they are shown
/// in their escaped form.
pub fn escape_display_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_control() {
            out.extend(ch.escape_default());
        } else {
            out.push(ch);
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableView {
    Loading,
    Empty,
    Rows,
}

#[derive(Debug, Clone)]
pub struct ProductTable {
    view: TableView,
    rows: Vec<RenderedRow>,
    search: SearchState,
    pattern: SearchPattern,
    sort: SortState,
    currency_symbol: String,
    last_error: Option<String>,
}

impl ProductTable {
    pub fn new(currency_symbol: impl Into<String>, sort: SortState) -> Self {
        Self {
            view: TableView::Loading,
            rows: Vec::new(),
            search: SearchState::default(),
            pattern: SearchPattern::new(""),
            sort,
            currency_symbol: currency_symbol.into(),
            last_error: None,
        }
    }

    pub fn view(&self) -> TableView {
        self.view
    }

    pub fn sort(&self) -> SortState {
        self.sort
    }

    pub fn search(&self) -> &SearchState {
        &self.search
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Rows in display order, hidden ones included.
    pub fn rows(&self) -> &[RenderedRow] {
        &self.rows
    }

    pub fn visible_rows(&self) -> impl Iterator<Item = &RenderedRow> {
        self.rows.iter().filter(|row| row.visible)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn visible_count(&self) -> usize {
        self.visible_rows().count()
    }

    pub fn find(&self, id: ProductId) -> Option<&RowMetadata> {
        self.rows
            .iter()
            .find(|row| row.meta.id == id)
            .map(|row| &row.meta)
    }

    pub fn shows_no_results(&self) -> bool {
        self.view == TableView::Rows && self.search.active && self.visible_count() == 0
    }

    /// Replaces every row with the given snapshot, then re-applies the
    /// current search and sort.
    pub fn apply_snapshot(&mut self, products: &[Product]) {
        self.rows.clear();
        self.last_error = None;

        if products.is_empty() {
            self.view = TableView::Empty;
            debug!("snapshot empty");
            return;
        }

        self.view = TableView::Rows;
        self.rows = products
            .iter()
            .enumerate()
            .map(|(index, product)| {
                let mut row = render_row(product, &self.currency_symbol);
                row.store_index = index;
                row
            })
            .collect();

        self.refilter();
        self.resort();
        debug!(
            rows = self.rows.len(),
            visible = self.visible_count(),
            "snapshot rendered"
        );
    }

    /// Keeps the last rendered rows; only records the failure.
    pub fn apply_feed_error(&mut self, reason: &str) {
        warn!(reason, "product feed failed; keeping last render");
        self.last_error = Some(reason.to_owned());
    }

    pub fn apply_query(&mut self, query: &str) {
        self.pattern = SearchPattern::new(query);
        self.search = SearchState {
            query: self.pattern.query().to_owned(),
            active: !self.pattern.is_empty(),
        };
        self.refilter();
    }

    /// Sorting the same column again flips its direction; a new column
    /// starts ascending. Returns `None` for columns that cannot be sorted.
    pub fn toggle_sort(&mut self, column: TableColumn) -> Option<SortState> {
        if !column.sortable() {
            return None;
        }
        self.sort = if self.sort.column == column {
            SortState {
                column,
                direction: self.sort.direction.toggled(),
            }
        } else {
            SortState {
                column,
                direction: crate::SortDirection::Asc,
            }
        };
        self.resort();
        Some(self.sort)
    }

    fn refilter(&mut self) {
        for row in &mut self.rows {
            row.visible = self.pattern.matches(&row.display_name);
            row.name_cell = if row.visible {
                row.name_cell.rehighlight(&self.pattern)
            } else {
                Highlight::plain(&row.display_name)
            };
        }
    }

    fn resort(&mut self) {
        let sort = self.sort;
        self.rows.sort_by(|left, right| {
            let order = match sort.column {
                TableColumn::Name => left
                    .display_name
                    .to_lowercase()
                    .cmp(&right.display_name.to_lowercase()),
                TableColumn::Price => left.meta.price_cents.cmp(&right.meta.price_cents),
                TableColumn::Actions => Ordering::Equal,
            };
            let order = match sort.direction {
                crate::SortDirection::Asc => order,
                crate::SortDirection::Desc => order.reverse(),
            };
            order.then(left.store_index.cmp(&right.store_index))
        });
    }
}
