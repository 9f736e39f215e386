// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use time::OffsetDateTime;

use crate::ids::ProductId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price_cents: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

/// One delivery from the product change feed. A snapshot is always the
/// complete current collection, never a delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Snapshot(Vec<Product>),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableColumn {
    Name,
    Price,
    Actions,
}

impl TableColumn {
    pub const ALL: [Self; 3] = [Self::Name, Self::Price, Self::Actions];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Name => "Product",
            Self::Price => "Price",
            Self::Actions => "Actions",
        }
    }

    pub const fn sortable(self) -> bool {
        !matches!(self, Self::Actions)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    pub column: TableColumn,
    pub direction: SortDirection,
}

impl Default for SortState {
    fn default() -> Self {
        Self {
            column: TableColumn::Name,
            direction: SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchState {
    pub query: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Connectivity {
    #[default]
    Connecting,
    Connected,
    Unavailable(String),
}

impl Connectivity {
    pub fn label(&self) -> &str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Unavailable(_) => "unavailable",
        }
    }
}
