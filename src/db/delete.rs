//! Guarded deletes.
//!
//! Removing a category, producer, product or variant that is still in use is
//! refused unless the caller forces it. A forced delete removes the
//! dependents first, items, then variants, then products, then the entity
//! itself, all in one transaction.

use rusqlite::params;
use tracing::info;

use super::catalog::{NamedTable, CATEGORIES, PRODUCERS, SHOPS};
use super::Database;
use crate::error::{DeleteError, Dependents};

/// What a delete removed. Transaction totals are not touched; the listed
/// transactions lost items and need `recompute_transaction_total`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub products: usize,
    pub variants: usize,
    pub items: usize,
    pub affected_transactions: Vec<i64>,
}

/// The rows hanging off the entity being deleted.
#[derive(Debug, Default)]
struct Cascade {
    products: Vec<i64>,
    variants: Vec<i64>,
    items: Vec<i64>,
    transactions: Vec<i64>,
}

impl Cascade {
    fn dependents(&self) -> Dependents {
        Dependents {
            products: self.products.len(),
            variants: self.variants.len(),
            items: self.items.len(),
        }
    }
}

impl Database {
    pub fn delete_category(&self, id: i64, force: bool) -> Result<DeleteReport, DeleteError> {
        self.guarded_delete(
            CATEGORIES,
            id,
            force,
            "SELECT id FROM product WHERE category_id = ?1 ORDER BY id",
        )
    }

    pub fn delete_producer(&self, id: i64, force: bool) -> Result<DeleteReport, DeleteError> {
        self.guarded_delete(
            PRODUCERS,
            id,
            force,
            "SELECT id FROM product WHERE producer_id = ?1 ORDER BY id",
        )
    }

    pub fn delete_product(&self, id: i64, force: bool) -> Result<DeleteReport, DeleteError> {
        if !self.exists("product", id)? {
            return Err(DeleteError::NotFound {
                entity: "product",
                id,
            });
        }
        let cascade = self.cascade(vec![id], Vec::new())?;
        // The product itself is the entity, not a dependent.
        let dependents = Dependents {
            products: 0,
            ..cascade.dependents()
        };
        if !dependents.is_empty() && !force {
            return Err(DeleteError::Dangerous {
                entity: "product",
                id,
                dependents,
            });
        }
        let mut report = self.remove(&cascade, None)?;
        report.products = 0;
        Ok(report)
    }

    pub fn delete_variant(&self, id: i64, force: bool) -> Result<DeleteReport, DeleteError> {
        if !self.exists("product_variant", id)? {
            return Err(DeleteError::NotFound {
                entity: "variant",
                id,
            });
        }
        let cascade = self.cascade(Vec::new(), vec![id])?;
        let dependents = Dependents {
            variants: 0,
            ..cascade.dependents()
        };
        if !dependents.is_empty() && !force {
            return Err(DeleteError::Dangerous {
                entity: "variant",
                id,
                dependents,
            });
        }
        let mut report = self.remove(&cascade, None)?;
        report.variants = 0;
        Ok(report)
    }

    /// Shops are never guarded: their transactions simply lose the shop.
    pub fn delete_shop(&self, id: i64) -> Result<(), DeleteError> {
        let deleted = self.conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", SHOPS.table),
            params![id],
        )?;
        if deleted == 0 {
            return Err(DeleteError::NotFound {
                entity: SHOPS.entity,
                id,
            });
        }
        self.publish();
        Ok(())
    }

    fn guarded_delete(
        &self,
        t: NamedTable,
        id: i64,
        force: bool,
        products_sql: &str,
    ) -> Result<DeleteReport, DeleteError> {
        if !self.exists(t.table, id)? {
            return Err(DeleteError::NotFound {
                entity: t.entity,
                id,
            });
        }
        let products = self.ids(products_sql, id)?;
        let cascade = self.cascade(products, Vec::new())?;
        let dependents = cascade.dependents();
        if !dependents.is_empty() && !force {
            return Err(DeleteError::Dangerous {
                entity: t.entity,
                id,
                dependents,
            });
        }
        self.remove(&cascade, Some((t, id)))
    }

    /// Collect the variants of `products` (plus `variants` given directly)
    /// and every item pointing at any of them.
    fn cascade(&self, products: Vec<i64>, mut variants: Vec<i64>) -> rusqlite::Result<Cascade> {
        for product in &products {
            variants.extend(self.ids(
                "SELECT id FROM product_variant WHERE product_id = ?1 ORDER BY id",
                *product,
            )?);
        }

        let mut items = Vec::new();
        for product in &products {
            items.extend(self.ids(
                "SELECT id FROM item WHERE product_id = ?1 ORDER BY id",
                *product,
            )?);
        }
        for variant in &variants {
            items.extend(self.ids(
                "SELECT id FROM item WHERE variant_id = ?1 ORDER BY id",
                *variant,
            )?);
        }
        items.sort_unstable();
        items.dedup();

        let mut transactions = Vec::new();
        for item in &items {
            transactions.extend(self.ids(
                "SELECT transaction_id FROM item WHERE id = ?1",
                *item,
            )?);
        }
        transactions.sort_unstable();
        transactions.dedup();

        Ok(Cascade {
            products,
            variants,
            items,
            transactions,
        })
    }

    fn remove(
        &self,
        cascade: &Cascade,
        parent: Option<(NamedTable, i64)>,
    ) -> Result<DeleteReport, DeleteError> {
        let tx = self.conn.unchecked_transaction()?;
        for id in &cascade.items {
            tx.execute("DELETE FROM item WHERE id = ?1", params![id])?;
        }
        for id in &cascade.variants {
            tx.execute("DELETE FROM product_variant WHERE id = ?1", params![id])?;
        }
        for id in &cascade.products {
            tx.execute("DELETE FROM product WHERE id = ?1", params![id])?;
        }
        if let Some((t, id)) = parent {
            tx.execute(&format!("DELETE FROM {} WHERE id = ?1", t.table), params![id])?;
        }
        tx.commit()?;

        let report = DeleteReport {
            products: cascade.products.len(),
            variants: cascade.variants.len(),
            items: cascade.items.len(),
            affected_transactions: cascade.transactions.clone(),
        };
        if report.items + report.variants + report.products > 0 {
            info!(
                products = report.products,
                variants = report.variants,
                items = report.items,
                "forced delete removed dependents"
            );
        }
        self.publish();
        Ok(report)
    }

    fn ids(&self, sql: &str, key: i64) -> rusqlite::Result<Vec<i64>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params![key], |row| row.get(0))?;
        rows.collect()
    }
}
