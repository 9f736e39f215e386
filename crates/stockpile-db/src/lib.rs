// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use rusqlite::{Connection, params};
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use stockpile_app::{FeedEvent, Product, ProductDraft, ProductId, ProductWrite};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};
use tracing::{debug, info, warn};

pub const APP_NAME: &str = "stockpile";
pub const DEFAULT_DB_STEM: &str = "stockpile";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS products (
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL,
  price_cents INTEGER NOT NULL CHECK (price_cents >= 0),
  created_at TEXT NOT NULL,
  updated_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_products_created_at ON products (created_at DESC, id DESC);
";

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[(
    "products",
    &["id", "name", "price_cents", "created_at", "updated_at"],
)];

type Listener = Box<dyn Fn(&FeedEvent)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// The product collection. Every successful write re-publishes the full
/// collection to subscribed listeners, in write order.
pub struct Store {
    conn: Connection,
    listeners: RefCell<Vec<(ListenerId, Listener)>>,
    next_listener: Cell<u64>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self::with_connection(conn))
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self::with_connection(conn))
    }

    fn with_connection(conn: Connection) -> Self {
        Self {
            conn,
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(0),
        }
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        }
        self.conn.execute_batch(SCHEMA).context("create schema")?;
        Ok(())
    }

    pub fn create_product(&self, draft: &ProductDraft) -> Result<ProductId> {
        validate_draft(draft)?;
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO products (name, price_cents, created_at, updated_at)
                VALUES (?, ?, ?, NULL)
                ",
                params![draft.name, draft.price_cents, now],
            )
            .context("insert product")?;
        let id = ProductId::new(self.conn.last_insert_rowid());
        info!(%id, "product created");
        self.publish();
        Ok(id)
    }

    pub fn update_product(&self, id: ProductId, draft: &ProductDraft) -> Result<()> {
        validate_draft(draft)?;
        let now = now_rfc3339()?;
        let rows_affected = self
            .conn
            .execute(
                "
                UPDATE products
                SET name = ?, price_cents = ?, updated_at = ?
                WHERE id = ?
                ",
                params![draft.name, draft.price_cents, now, id.get()],
            )
            .context("update product")?;
        if rows_affected == 0 {
            bail!("product {id} not found -- it may have been deleted; refresh and retry");
        }
        info!(%id, "product updated");
        self.publish();
        Ok(())
    }

    pub fn delete_product(&self, id: ProductId) -> Result<()> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM products WHERE id = ?", params![id.get()])
            .context("delete product")?;
        if rows_affected == 0 {
            bail!("product {id} not found -- it may already be deleted");
        }
        info!(%id, "product deleted");
        self.publish();
        Ok(())
    }

    pub fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, name, price_cents, created_at, updated_at
                FROM products
                WHERE id = ?
                ",
            )
            .context("prepare product query")?;
        let mut rows = stmt
            .query_map(params![id.get()], product_from_row)
            .context("query product")?;
        rows.next().transpose().context("read product")
    }

    /// Newest first; rows created in the same instant fall back to id.
    pub fn list_products(&self) -> Result<Vec<Product>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, name, price_cents, created_at, updated_at
                FROM products
                ORDER BY created_at DESC, id DESC
                ",
            )
            .context("prepare products query")?;
        let rows = stmt
            .query_map([], product_from_row)
            .context("query products")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect products")
    }

    pub fn apply_write(&self, write: &ProductWrite) -> Result<()> {
        match write {
            ProductWrite::Create(draft) => self.create_product(draft).map(|_| ()),
            ProductWrite::Update { id, draft } => self.update_product(*id, draft),
            ProductWrite::Delete(id) => self.delete_product(*id),
        }
    }

    /// Registers a listener and hands it the current collection right away.
    /// Listeners must not subscribe or unsubscribe from inside the callback.
    pub fn subscribe_products(&self, listener: impl Fn(&FeedEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener.get() + 1);
        self.next_listener.set(id.0);
        listener(&self.snapshot_event());
        self.listeners.borrow_mut().push((id, Box::new(listener)));
        debug!(listener = id.0, "product listener subscribed");
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        before != listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    fn publish(&self) {
        let listeners = self.listeners.borrow();
        if listeners.is_empty() {
            return;
        }
        let event = self.snapshot_event();
        debug!(listeners = listeners.len(), "publishing product snapshot");
        for (_, listener) in listeners.iter() {
            listener(&event);
        }
    }

    fn snapshot_event(&self) -> FeedEvent {
        match self.list_products() {
            Ok(products) => FeedEvent::Snapshot(products),
            Err(error) => {
                warn!(error = %format!("{error:#}"), "product listing failed");
                FeedEvent::Failed(format!("{error:#}"))
            }
        }
    }
}

/// Database path for a store. An explicit `STOCKPILE_DB_PATH` wins; otherwise
/// the file lives in the platform data dir, named after `stem`.
pub fn default_db_path(stem: Option<&str>) -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("STOCKPILE_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set STOCKPILE_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join(format!("{}.db", db_file_stem(stem))))
}

fn db_file_stem(stem: Option<&str>) -> String {
    let cleaned: String = stem
        .unwrap_or_default()
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_'))
        .collect();
    if cleaned.is_empty() {
        DEFAULT_DB_STEM.to_owned()
    } else {
        cleaned
    }
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

fn validate_draft(draft: &ProductDraft) -> Result<()> {
    if draft.name.trim().is_empty() {
        bail!("product name is required -- enter a name and retry");
    }
    if draft.price_cents < 0 {
        bail!("product price cannot be negative");
    }
    Ok(())
}

fn product_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Product> {
    let created_at_raw: String = row.get(3)?;
    let updated_at_raw: Option<String> = row.get(4)?;
    Ok(Product {
        id: ProductId::new(row.get(0)?),
        name: row.get(1)?,
        price_cents: row.get(2)?,
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
        updated_at: updated_at_raw
            .as_deref()
            .map(parse_datetime)
            .transpose()
            .map_err(to_sql_error)?,
    })
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "
            SELECT COUNT(*)
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ",
            [],
            |row| row.get(0),
        )
        .context("count user tables")?;
    Ok(count > 0)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required_columns) in REQUIRED_SCHEMA {
        if !table_exists(conn, table)? {
            bail!(
                "database is missing required table `{table}`; point the store at a stockpile database"
            );
        }

        let columns = table_columns(conn, table)?;
        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();

        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}; run migration before launching",
                missing.join(", ")
            );
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "
            SELECT EXISTS(
              SELECT 1
              FROM sqlite_master
              WHERE type = 'table' AND name = ?
            )
            ",
            params![table],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("check table existence for {table}"))?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;

    let names = rows
        .collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))?;
    Ok(names)
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

// Fixed-width so that text order matches time order.
fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
        ))
        .context("format current timestamp")
}

fn parse_datetime(raw: &str) -> Result<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(value);
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    bail!("invalid timestamp {raw:?}; expected RFC 3339")
}

fn to_sql_error(error: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            error.to_string(),
        )),
    )
}
