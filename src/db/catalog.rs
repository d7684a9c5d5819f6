//! Shops, producers, categories, products and variants.

use anyhow::Result;
use rusqlite::{params, OptionalExtension};

use super::Database;
use crate::error::{is_unique_violation, WriteError};
use crate::models::*;

/// A table whose rows are just an id and a unique, trimmed name.
#[derive(Clone, Copy)]
pub(crate) struct NamedTable {
    pub(crate) table: &'static str,
    pub(crate) entity: &'static str,
}

pub(crate) const SHOPS: NamedTable = NamedTable {
    table: "shop",
    entity: "shop",
};
pub(crate) const PRODUCERS: NamedTable = NamedTable {
    table: "product_producer",
    entity: "producer",
};
pub(crate) const CATEGORIES: NamedTable = NamedTable {
    table: "product_category",
    entity: "category",
};

impl Database {
    // ── Named tables ──────────────────────────────────────────

    fn insert_named(&self, t: NamedTable, raw: &str) -> Result<i64, WriteError> {
        let name = normalize_name(raw).ok_or(WriteError::BlankName)?;
        if self.named_id(t, &name)?.is_some() {
            return Err(WriteError::DuplicateName(name));
        }
        self.conn
            .execute(
                &format!("INSERT INTO {} (name) VALUES (?1)", t.table),
                params![name],
            )
            .map_err(|e| duplicate_or_storage(e, &name))?;
        let id = self.conn.last_insert_rowid();
        self.publish();
        Ok(id)
    }

    fn rename_named(&self, t: NamedTable, id: i64, raw: &str) -> Result<(), WriteError> {
        let name = normalize_name(raw).ok_or(WriteError::BlankName)?;
        if !self.exists(t.table, id)? {
            return Err(WriteError::NotFound {
                entity: t.entity,
                id,
            });
        }
        if self.named_id(t, &name)?.is_some_and(|other| other != id) {
            return Err(WriteError::DuplicateName(name));
        }
        self.conn
            .execute(
                &format!("UPDATE {} SET name = ?1 WHERE id = ?2", t.table),
                params![name, id],
            )
            .map_err(|e| duplicate_or_storage(e, &name))?;
        self.publish();
        Ok(())
    }

    fn named_id(&self, t: NamedTable, name: &str) -> rusqlite::Result<Option<i64>> {
        self.conn
            .query_row(
                &format!("SELECT id FROM {} WHERE name = ?1", t.table),
                params![name],
                |row| row.get(0),
            )
            .optional()
    }

    fn get_named(&self, t: NamedTable, id: i64) -> Result<Option<(i64, String)>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT id, name FROM {} WHERE id = ?1", t.table),
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?)
    }

    fn list_named(&self, t: NamedTable) -> Result<Vec<(i64, String)>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT id, name FROM {} ORDER BY name", t.table))?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub(crate) fn exists(&self, table: &str, id: i64) -> rusqlite::Result<bool> {
        self.conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1)"),
            params![id],
            |row| row.get(0),
        )
    }

    // ── Shops ─────────────────────────────────────────────────

    pub fn insert_shop(&self, name: &str) -> Result<i64, WriteError> {
        self.insert_named(SHOPS, name)
    }

    pub fn rename_shop(&self, id: i64, name: &str) -> Result<(), WriteError> {
        self.rename_named(SHOPS, id, name)
    }

    pub fn get_shop(&self, id: i64) -> Result<Option<Shop>> {
        Ok(self
            .get_named(SHOPS, id)?
            .map(|(id, name)| Shop { id: Some(id), name }))
    }

    pub fn get_shops(&self) -> Result<Vec<Shop>> {
        Ok(self
            .list_named(SHOPS)?
            .into_iter()
            .map(|(id, name)| Shop { id: Some(id), name })
            .collect())
    }

    pub fn find_shop(&self, name: &str) -> Result<Option<Shop>> {
        let Some(name) = normalize_name(name) else {
            return Ok(None);
        };
        Ok(self
            .named_id(SHOPS, &name)?
            .map(|id| Shop { id: Some(id), name }))
    }

    // ── Producers ─────────────────────────────────────────────

    pub fn insert_producer(&self, name: &str) -> Result<i64, WriteError> {
        self.insert_named(PRODUCERS, name)
    }

    pub fn rename_producer(&self, id: i64, name: &str) -> Result<(), WriteError> {
        self.rename_named(PRODUCERS, id, name)
    }

    pub fn get_producer(&self, id: i64) -> Result<Option<Producer>> {
        Ok(self
            .get_named(PRODUCERS, id)?
            .map(|(id, name)| Producer { id: Some(id), name }))
    }

    pub fn get_producers(&self) -> Result<Vec<Producer>> {
        Ok(self
            .list_named(PRODUCERS)?
            .into_iter()
            .map(|(id, name)| Producer { id: Some(id), name })
            .collect())
    }

    pub fn find_producer(&self, name: &str) -> Result<Option<Producer>> {
        let Some(name) = normalize_name(name) else {
            return Ok(None);
        };
        Ok(self
            .named_id(PRODUCERS, &name)?
            .map(|id| Producer { id: Some(id), name }))
    }

    // ── Categories ────────────────────────────────────────────

    pub fn insert_category(&self, name: &str) -> Result<i64, WriteError> {
        self.insert_named(CATEGORIES, name)
    }

    pub fn rename_category(&self, id: i64, name: &str) -> Result<(), WriteError> {
        self.rename_named(CATEGORIES, id, name)
    }

    pub fn get_category(&self, id: i64) -> Result<Option<Category>> {
        Ok(self
            .get_named(CATEGORIES, id)?
            .map(|(id, name)| Category { id: Some(id), name }))
    }

    pub fn get_categories(&self) -> Result<Vec<Category>> {
        Ok(self
            .list_named(CATEGORIES)?
            .into_iter()
            .map(|(id, name)| Category { id: Some(id), name })
            .collect())
    }

    pub fn find_category(&self, name: &str) -> Result<Option<Category>> {
        let Some(name) = normalize_name(name) else {
            return Ok(None);
        };
        Ok(self
            .named_id(CATEGORIES, &name)?
            .map(|id| Category { id: Some(id), name }))
    }

    // ── Products ──────────────────────────────────────────────

    pub fn insert_product(&self, product: &Product) -> Result<i64, WriteError> {
        let name = self.validate_product(None, product)?;
        self.conn
            .execute(
                "INSERT INTO product (category_id, producer_id, name) VALUES (?1, ?2, ?3)",
                params![product.category_id, product.producer_id, name],
            )
            .map_err(|e| duplicate_or_storage(e, &name))?;
        let id = self.conn.last_insert_rowid();
        self.publish();
        Ok(id)
    }

    pub fn update_product(&self, id: i64, product: &Product) -> Result<(), WriteError> {
        if !self.exists("product", id)? {
            return Err(WriteError::NotFound {
                entity: "product",
                id,
            });
        }
        let name = self.validate_product(Some(id), product)?;
        self.conn
            .execute(
                "UPDATE product SET category_id = ?1, producer_id = ?2, name = ?3 WHERE id = ?4",
                params![product.category_id, product.producer_id, name, id],
            )
            .map_err(|e| duplicate_or_storage(e, &name))?;
        self.publish();
        Ok(())
    }

    fn validate_product(&self, id: Option<i64>, product: &Product) -> Result<String, WriteError> {
        let name = normalize_name(&product.name).ok_or(WriteError::BlankName)?;
        if !self.exists("product_category", product.category_id)? {
            return Err(WriteError::MissingReference {
                entity: "category",
                id: product.category_id,
            });
        }
        if let Some(producer_id) = product.producer_id {
            if !self.exists("product_producer", producer_id)? {
                return Err(WriteError::MissingReference {
                    entity: "producer",
                    id: producer_id,
                });
            }
        }
        // The unique index treats NULL producers as distinct; names still clash.
        let clash: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM product WHERE producer_id IS ?1 AND name = ?2",
                params![product.producer_id, name],
                |row| row.get(0),
            )
            .optional()?;
        if clash.is_some_and(|other| Some(other) != id) {
            return Err(WriteError::DuplicateName(name));
        }
        Ok(name)
    }

    pub fn get_product(&self, id: i64) -> Result<Option<Product>> {
        Ok(self
            .query_products("SELECT id, category_id, producer_id, name FROM product WHERE id = ?1", params![id])?
            .pop())
    }

    pub fn get_products(&self) -> Result<Vec<Product>> {
        self.query_products(
            "SELECT id, category_id, producer_id, name FROM product ORDER BY name, id",
            [],
        )
    }

    pub fn get_products_by_category(&self, category_id: i64) -> Result<Vec<Product>> {
        self.query_products(
            "SELECT id, category_id, producer_id, name FROM product
             WHERE category_id = ?1 ORDER BY name, id",
            params![category_id],
        )
    }

    pub fn get_products_by_producer(&self, producer_id: i64) -> Result<Vec<Product>> {
        self.query_products(
            "SELECT id, category_id, producer_id, name FROM product
             WHERE producer_id = ?1 ORDER BY name, id",
            params![producer_id],
        )
    }

    /// Products with this name, across producers.
    pub fn find_products(&self, name: &str) -> Result<Vec<Product>> {
        let Some(name) = normalize_name(name) else {
            return Ok(Vec::new());
        };
        self.query_products(
            "SELECT id, category_id, producer_id, name FROM product WHERE name = ?1 ORDER BY id",
            params![name],
        )
    }

    fn query_products<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Product>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok(Product {
                id: Some(row.get(0)?),
                category_id: row.get(1)?,
                producer_id: row.get(2)?,
                name: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    // ── Variants ──────────────────────────────────────────────

    pub fn insert_variant(&self, variant: &Variant) -> Result<i64, WriteError> {
        let name = self.validate_variant(None, variant)?;
        self.conn.execute(
            "INSERT INTO product_variant (product_id, name) VALUES (?1, ?2)",
            params![variant.product_id, name],
        )?;
        let id = self.conn.last_insert_rowid();
        self.publish();
        Ok(id)
    }

    pub fn update_variant(&self, id: i64, variant: &Variant) -> Result<(), WriteError> {
        if !self.exists("product_variant", id)? {
            return Err(WriteError::NotFound {
                entity: "variant",
                id,
            });
        }
        let name = self.validate_variant(Some(id), variant)?;
        self.conn.execute(
            "UPDATE product_variant SET product_id = ?1, name = ?2 WHERE id = ?3",
            params![variant.product_id, name, id],
        )?;
        self.publish();
        Ok(())
    }

    fn validate_variant(&self, id: Option<i64>, variant: &Variant) -> Result<String, WriteError> {
        let name = normalize_name(&variant.name).ok_or(WriteError::BlankName)?;
        if let Some(product_id) = variant.product_id {
            if !self.exists("product", product_id)? {
                return Err(WriteError::MissingReference {
                    entity: "product",
                    id: product_id,
                });
            }
        }
        let clash: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM product_variant WHERE product_id IS ?1 AND name = ?2",
                params![variant.product_id, name],
                |row| row.get(0),
            )
            .optional()?;
        if clash.is_some_and(|other| Some(other) != id) {
            return Err(WriteError::DuplicateName(name));
        }
        Ok(name)
    }

    pub fn get_variant(&self, id: i64) -> Result<Option<Variant>> {
        Ok(self
            .query_variants(
                "SELECT id, product_id, name FROM product_variant WHERE id = ?1",
                params![id],
            )?
            .pop())
    }

    /// Variants bound to this product, not including global ones.
    pub fn get_variants_by_product(&self, product_id: i64) -> Result<Vec<Variant>> {
        self.query_variants(
            "SELECT id, product_id, name FROM product_variant
             WHERE product_id = ?1 ORDER BY name, id",
            params![product_id],
        )
    }

    pub fn get_global_variants(&self) -> Result<Vec<Variant>> {
        self.query_variants(
            "SELECT id, product_id, name FROM product_variant
             WHERE product_id IS NULL ORDER BY name, id",
            [],
        )
    }

    /// Everything that may be picked for an item of this product.
    pub fn get_variants_for(&self, product_id: i64) -> Result<Vec<Variant>> {
        self.query_variants(
            "SELECT id, product_id, name FROM product_variant
             WHERE product_id = ?1 OR product_id IS NULL
             ORDER BY product_id IS NULL, name, id",
            params![product_id],
        )
    }

    fn query_variants<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Variant>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok(Variant {
                id: Some(row.get(0)?),
                product_id: row.get(1)?,
                name: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

fn duplicate_or_storage(err: rusqlite::Error, name: &str) -> WriteError {
    if is_unique_violation(&err) {
        WriteError::DuplicateName(name.to_string())
    } else {
        WriteError::Storage(err)
    }
}
