//! Rebuilds the normalised graph from denormalised records.
//!
//! Every distinct name gets a fresh id the first time it is seen; later
//! references resolve through in-memory maps. The maps start out holding the
//! rows already in the store, so importing into a non-empty store reuses
//! them instead of tripping the unique indices.

use anyhow::Result;
use rusqlite::{params, Connection};
use std::collections::{HashMap, HashSet};

use super::{ImportError, ImportSummary};
use crate::models::{normalize_name, normalize_note, Price, Quantity};

/// One receipt line as read from a document.
#[derive(Debug, Clone, Default)]
pub(crate) struct ItemRecord {
    pub(crate) product: Option<String>,
    pub(crate) category: Option<String>,
    pub(crate) producer: Option<String>,
    pub(crate) variant: Option<String>,
    pub(crate) variant_global: bool,
    pub(crate) price: Price,
    pub(crate) quantity: Quantity,
}

pub(crate) struct Graph<'c> {
    conn: &'c Connection,
    shops: HashMap<String, i64>,
    producers: HashMap<String, i64>,
    categories: HashMap<String, i64>,
    products: HashMap<(Option<i64>, String), i64>,
    /// Keyed by owning product; `None` for global variants.
    variants: HashMap<(Option<i64>, String), i64>,
    /// Keyed by `(date, scaled total)`. Two receipts with the same date and
    /// total are taken to be the same receipt.
    transactions: HashMap<(i64, i64), i64>,
    /// Receipts created by the document being read. Only these take items;
    /// a receipt matched in the store or an earlier document is complete.
    fresh: HashSet<i64>,
    pub(crate) summary: ImportSummary,
}

fn load_names(conn: &Connection, table: &str) -> rusqlite::Result<HashMap<String, i64>> {
    let mut stmt = conn.prepare(&format!("SELECT name, id FROM {table}"))?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

fn load_keyed<K: std::hash::Hash + Eq>(
    conn: &Connection,
    sql: &str,
    key: impl Fn(&rusqlite::Row<'_>) -> rusqlite::Result<K>,
) -> rusqlite::Result<HashMap<K, i64>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| Ok((key(row)?, row.get("id")?)))?;
    rows.collect()
}

impl<'c> Graph<'c> {
    pub(crate) fn new(conn: &'c Connection) -> Result<Self> {
        Ok(Self {
            conn,
            shops: load_names(conn, "shop")?,
            producers: load_names(conn, "product_producer")?,
            categories: load_names(conn, "product_category")?,
            products: load_keyed(conn, "SELECT id, producer_id, name FROM product", |row| {
                Ok((row.get(1)?, row.get(2)?))
            })?,
            variants: load_keyed(conn, "SELECT id, product_id, name FROM product_variant", |row| {
                Ok((row.get(1)?, row.get(2)?))
            })?,
            transactions: load_keyed(conn, "SELECT id, date, total_cost FROM transaction_base", |row| {
                Ok((row.get(1)?, row.get(2)?))
            })?,
            fresh: HashSet::new(),
            summary: ImportSummary::default(),
        })
    }

    pub(crate) fn begin_document(&mut self) {
        self.fresh.clear();
    }

    fn named(
        conn: &Connection,
        map: &mut HashMap<String, i64>,
        table: &str,
        raw: Option<&str>,
        created: &mut u64,
    ) -> Result<Option<i64>> {
        let Some(name) = raw.and_then(normalize_name) else {
            return Ok(None);
        };
        if let Some(&id) = map.get(&name) {
            return Ok(Some(id));
        }
        conn.execute(
            &format!("INSERT INTO {table} (name) VALUES (?1)"),
            params![name],
        )?;
        let id = conn.last_insert_rowid();
        map.insert(name, id);
        *created += 1;
        Ok(Some(id))
    }

    pub(crate) fn shop(&mut self, name: Option<&str>) -> Result<Option<i64>> {
        Self::named(
            self.conn,
            &mut self.shops,
            "shop",
            name,
            &mut self.summary.names,
        )
    }

    fn producer(&mut self, name: Option<&str>) -> Result<Option<i64>> {
        Self::named(
            self.conn,
            &mut self.producers,
            "product_producer",
            name,
            &mut self.summary.names,
        )
    }

    fn category(&mut self, name: Option<&str>) -> Result<Option<i64>> {
        Self::named(
            self.conn,
            &mut self.categories,
            "product_category",
            name,
            &mut self.summary.names,
        )
    }

    /// A product is identified by producer and name. Its category is only
    /// read when the product is first created.
    fn product(&mut self, record: &ItemRecord) -> Result<Option<i64>> {
        let Some(name) = record.product.as_deref().and_then(normalize_name) else {
            return Ok(None);
        };
        let producer = self.producer(record.producer.as_deref())?;
        let key = (producer, name);
        if let Some(&id) = self.products.get(&key) {
            return Ok(Some(id));
        }
        let category = self
            .category(record.category.as_deref())?
            .ok_or_else(|| ImportError::MissingCategory(key.1.clone()))?;
        self.conn.execute(
            "INSERT INTO product (category_id, producer_id, name) VALUES (?1, ?2, ?3)",
            params![category, producer, key.1],
        )?;
        let id = self.conn.last_insert_rowid();
        self.products.insert(key, id);
        self.summary.names += 1;
        Ok(Some(id))
    }

    fn variant(&mut self, product: i64, record: &ItemRecord) -> Result<Option<i64>> {
        let Some(name) = record.variant.as_deref().and_then(normalize_name) else {
            return Ok(None);
        };
        let owner = (!record.variant_global).then_some(product);
        let key = (owner, name);
        if let Some(&id) = self.variants.get(&key) {
            return Ok(Some(id));
        }
        self.conn.execute(
            "INSERT INTO product_variant (product_id, name) VALUES (?1, ?2)",
            params![owner, key.1],
        )?;
        let id = self.conn.last_insert_rowid();
        self.variants.insert(key, id);
        self.summary.names += 1;
        Ok(Some(id))
    }

    /// Resolve a receipt, creating it on first sight. The stored total is
    /// taken from the document as is.
    pub(crate) fn transaction(
        &mut self,
        date: i64,
        total: Price,
        shop: Option<&str>,
        note: Option<&str>,
    ) -> Result<i64> {
        let key = (date, total.scaled());
        if let Some(&id) = self.transactions.get(&key) {
            return Ok(id);
        }
        let shop = self.shop(shop)?;
        self.conn.execute(
            "INSERT INTO transaction_base (date, shop_id, total_cost, note) VALUES (?1, ?2, ?3, ?4)",
            params![date, shop, total.scaled(), normalize_note(note)],
        )?;
        let id = self.conn.last_insert_rowid();
        self.transactions.insert(key, id);
        self.fresh.insert(id);
        self.summary.transactions += 1;
        Ok(id)
    }

    /// Attach an item to `transaction`. Lines without a product carry no
    /// item and are skipped, as are lines of a receipt this document did not
    /// create.
    pub(crate) fn item(&mut self, transaction: i64, record: &ItemRecord) -> Result<()> {
        if !self.fresh.contains(&transaction) {
            return Ok(());
        }
        let Some(product) = self.product(record)? else {
            return Ok(());
        };
        let variant = self.variant(product, record)?;
        self.conn.execute(
            "INSERT INTO item (transaction_id, product_id, variant_id, quantity, price)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                transaction,
                product,
                variant,
                record.quantity.scaled(),
                record.price.scaled()
            ],
        )?;
        self.summary.items += 1;
        Ok(())
    }
}
