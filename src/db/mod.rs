mod catalog;
mod delete;
pub mod migrate;
pub mod migrations;
mod rebuild;
mod schema;
mod series;
mod tags;
mod transactions;
mod watch;

use anyhow::{Context, Result};
use rusqlite::{hooks::Action, Connection};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;

pub use delete::DeleteReport;
pub use schema::{CURRENT_VERSION, TAGGED_VERSION};
pub use series::{Dimension, DimensionTotal, EndBound, Granularity, SeriesFilter, SeriesPoint, SeriesQuery};
pub use tags::TagStore;
pub use watch::Subscription;

pub(crate) use schema::ITEM_VALUE_SQL;

/// Headline numbers of the store, also stamped into backup names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub transactions: i64,
    /// Sum of all transaction totals, scaled.
    pub spending: i64,
}

pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
    /// Tables written since the last publish, filled by the update hook.
    dirty: Arc<Mutex<BTreeSet<String>>>,
    watches: RefCell<Vec<watch::Watch>>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to set database pragmas")?;
        let db = Self::from_connection(conn, Some(path.to_path_buf()))?;
        info!(path = %path.display(), "opened store");
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, None)
    }

    /// Bring the connection to the current schema and wire up change tracking.
    /// Any migration failure aborts the open.
    pub(crate) fn from_connection(mut conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        migrate::Migrator::new(migrations::generation_one())
            .run(&mut conn)
            .context("Database migration failed")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .context("Failed to set database pragmas")?;

        let dirty: Arc<Mutex<BTreeSet<String>>> = Arc::default();
        let hook_dirty = Arc::clone(&dirty);
        conn.update_hook(Some(
            move |_: Action, _: &str, table: &str, _: i64| {
                if let Ok(mut tables) = hook_dirty.lock() {
                    tables.insert(table.to_string());
                }
            },
        ));

        Ok(Self {
            conn,
            path,
            dirty,
            watches: RefCell::new(Vec::new()),
        })
    }

    /// Path of the store file; `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn schema_version(&self) -> Result<u32> {
        migrate::stored_version(&self.conn)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(total_cost), 0) FROM transaction_base",
            [],
            |row| {
                Ok(StoreStats {
                    transactions: row.get(0)?,
                    spending: row.get(1)?,
                })
            },
        )?)
    }

    /// True when no entity table has any rows.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.conn.query_row(
            "SELECT NOT EXISTS(SELECT 1 FROM shop)
                AND NOT EXISTS(SELECT 1 FROM product_producer)
                AND NOT EXISTS(SELECT 1 FROM product_category)
                AND NOT EXISTS(SELECT 1 FROM product)
                AND NOT EXISTS(SELECT 1 FROM product_variant)
                AND NOT EXISTS(SELECT 1 FROM transaction_base)
                AND NOT EXISTS(SELECT 1 FROM item)",
            [],
            |row| row.get(0),
        )?)
    }

    /// Fold this store into the tag generation of the schema. The entity API
    /// no longer applies afterwards, so the handle is consumed.
    pub fn into_tag_store(self) -> Result<TagStore> {
        let Database { conn, .. } = self;
        TagStore::from_connection(conn)
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub(crate) fn into_parts(self) -> (Connection, Option<PathBuf>) {
        let Database { conn, path, .. } = self;
        (conn, path)
    }
}
