//! Transactions, their items, and composite reads over both.

use anyhow::Result;
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, ITEM_VALUE_SQL};
use crate::error::WriteError;
use crate::models::*;

const TRANSACTION_COLUMNS: &str = "id, date, shop_id, total_cost, note";
const ITEM_COLUMNS: &str = "id, transaction_id, product_id, variant_id, quantity, price";

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: Some(row.get(0)?),
        date: row.get(1)?,
        shop_id: row.get(2)?,
        total_cost: Price(row.get(3)?),
        note: row.get(4)?,
    })
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: Some(row.get(0)?),
        transaction_id: row.get(1)?,
        product_id: row.get(2)?,
        variant_id: row.get(3)?,
        quantity: Quantity(row.get(4)?),
        price: Price(row.get(5)?),
    })
}

impl Database {
    // ── Transactions ──────────────────────────────────────────

    pub fn insert_transaction(&self, txn: &Transaction) -> Result<i64, WriteError> {
        let id = self.insert_transaction_row(txn)?;
        self.publish();
        Ok(id)
    }

    fn insert_transaction_row(&self, txn: &Transaction) -> Result<i64, WriteError> {
        self.validate_transaction(txn)?;
        self.conn.execute(
            "INSERT INTO transaction_base (date, shop_id, total_cost, note) VALUES (?1, ?2, ?3, ?4)",
            params![
                txn.date,
                txn.shop_id,
                txn.total_cost.scaled(),
                normalize_note(txn.note.as_deref()),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update_transaction(&self, id: i64, txn: &Transaction) -> Result<(), WriteError> {
        if !self.exists("transaction_base", id)? {
            return Err(WriteError::NotFound {
                entity: "transaction",
                id,
            });
        }
        self.validate_transaction(txn)?;
        self.conn.execute(
            "UPDATE transaction_base SET date = ?1, shop_id = ?2, total_cost = ?3, note = ?4 WHERE id = ?5",
            params![
                txn.date,
                txn.shop_id,
                txn.total_cost.scaled(),
                normalize_note(txn.note.as_deref()),
                id,
            ],
        )?;
        self.publish();
        Ok(())
    }

    fn validate_transaction(&self, txn: &Transaction) -> Result<(), WriteError> {
        if txn.total_cost.scaled() < 0 {
            return Err(AmountError::Negative(txn.total_cost.actual()).into());
        }
        if let Some(shop_id) = txn.shop_id {
            if !self.exists("shop", shop_id)? {
                return Err(WriteError::MissingReference {
                    entity: "shop",
                    id: shop_id,
                });
            }
        }
        Ok(())
    }

    /// Insert a transaction together with its items in one write. The stored
    /// total is computed from the items.
    pub fn save_receipt(&mut self, txn: &Transaction, items: &[Item]) -> Result<i64, WriteError> {
        let tx = self.conn.unchecked_transaction()?;
        let total = items
            .iter()
            .try_fold(Price::ZERO, |sum, i| sum.checked_add(i.value()?))?;
        let id = self.insert_transaction_row(&Transaction {
            total_cost: total,
            ..txn.clone()
        })?;
        for item in items {
            self.insert_item_row(&Item {
                transaction_id: id,
                ..item.clone()
            })?;
        }
        tx.commit()?;
        self.publish();
        Ok(id)
    }

    pub fn get_transaction(&self, id: i64) -> Result<Option<Transaction>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {TRANSACTION_COLUMNS} FROM transaction_base WHERE id = ?1"),
                params![id],
                transaction_from_row,
            )
            .optional()?)
    }

    /// Newest first.
    pub fn get_transactions(&self, limit: Option<u32>, offset: Option<u32>) -> Result<Vec<Transaction>> {
        let mut sql =
            format!("SELECT {TRANSACTION_COLUMNS} FROM transaction_base ORDER BY date DESC, id DESC");
        if let Some(l) = limit {
            sql.push_str(&format!(" LIMIT {l}"));
            if let Some(o) = offset {
                sql.push_str(&format!(" OFFSET {o}"));
            }
        }
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], transaction_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn get_transactions_by_shop(&self, shop_id: i64) -> Result<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transaction_base
             WHERE shop_id = ?1 ORDER BY date DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![shop_id], transaction_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn get_transaction_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM transaction_base", [], |row| row.get(0))?)
    }

    /// Items go with their transaction.
    pub fn delete_transaction(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM transaction_base WHERE id = ?1", params![id])?;
        self.publish();
        Ok(deleted > 0)
    }

    pub fn delete_transactions(&mut self, ids: &[i64]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut count = 0;
        for id in ids {
            count += tx.execute("DELETE FROM transaction_base WHERE id = ?1", params![id])?;
        }
        tx.commit()?;
        self.publish();
        Ok(count)
    }

    /// Store the sum of the item values as the transaction's total.
    pub fn recompute_transaction_total(&self, id: i64) -> Result<Price, WriteError> {
        let total: Option<i64> = self
            .conn
            .query_row(
                &format!(
                    "UPDATE transaction_base
                        SET total_cost = (SELECT COALESCE(SUM({ITEM_VALUE_SQL}), 0)
                                            FROM item i WHERE i.transaction_id = ?1)
                      WHERE id = ?1
                  RETURNING total_cost"
                ),
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let total = total.ok_or(WriteError::NotFound {
            entity: "transaction",
            id,
        })?;
        self.publish();
        Ok(Price(total))
    }

    // ── Items ─────────────────────────────────────────────────

    pub fn insert_item(&self, item: &Item) -> Result<i64, WriteError> {
        let id = self.insert_item_row(item)?;
        self.publish();
        Ok(id)
    }

    fn insert_item_row(&self, item: &Item) -> Result<i64, WriteError> {
        self.validate_item(item)?;
        self.conn.execute(
            "INSERT INTO item (transaction_id, product_id, variant_id, quantity, price)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                item.transaction_id,
                item.product_id,
                item.variant_id,
                item.quantity.scaled(),
                item.price.scaled(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update_item(&self, id: i64, item: &Item) -> Result<(), WriteError> {
        if !self.exists("item", id)? {
            return Err(WriteError::NotFound { entity: "item", id });
        }
        self.validate_item(item)?;
        self.conn.execute(
            "UPDATE item SET transaction_id = ?1, product_id = ?2, variant_id = ?3, quantity = ?4, price = ?5
             WHERE id = ?6",
            params![
                item.transaction_id,
                item.product_id,
                item.variant_id,
                item.quantity.scaled(),
                item.price.scaled(),
                id,
            ],
        )?;
        self.publish();
        Ok(())
    }

    fn validate_item(&self, item: &Item) -> Result<(), WriteError> {
        if item.price.scaled() < 0 {
            return Err(AmountError::Negative(item.price.actual()).into());
        }
        if item.quantity.scaled() < 0 {
            return Err(AmountError::Negative(item.quantity.actual()).into());
        }
        if !self.exists("transaction_base", item.transaction_id)? {
            return Err(WriteError::MissingReference {
                entity: "transaction",
                id: item.transaction_id,
            });
        }
        if !self.exists("product", item.product_id)? {
            return Err(WriteError::MissingReference {
                entity: "product",
                id: item.product_id,
            });
        }
        if let Some(variant_id) = item.variant_id {
            let variant = self
                .conn
                .query_row(
                    "SELECT product_id, name FROM product_variant WHERE id = ?1",
                    params![variant_id],
                    |row| {
                        Ok(Variant {
                            id: Some(variant_id),
                            product_id: row.get(0)?,
                            name: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            match variant {
                None => {
                    return Err(WriteError::MissingReference {
                        entity: "variant",
                        id: variant_id,
                    })
                }
                Some(v) if !v.applies_to(item.product_id) => {
                    return Err(WriteError::VariantMismatch {
                        variant_id,
                        product_id: item.product_id,
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    pub fn get_item(&self, id: i64) -> Result<Option<Item>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM item WHERE id = ?1"),
                params![id],
                item_from_row,
            )
            .optional()?)
    }

    pub fn get_items_by_transaction(&self, transaction_id: i64) -> Result<Vec<Item>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM item WHERE transaction_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![transaction_id], item_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn get_items_by_product(&self, product_id: i64) -> Result<Vec<Item>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM item WHERE product_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![product_id], item_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// The caller is responsible for recomputing the transaction total.
    pub fn delete_item(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM item WHERE id = ?1", params![id])?;
        self.publish();
        Ok(deleted > 0)
    }

    pub fn delete_items(&mut self, ids: &[i64]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut count = 0;
        for id in ids {
            count += tx.execute("DELETE FROM item WHERE id = ?1", params![id])?;
        }
        tx.commit()?;
        self.publish();
        Ok(count)
    }

    // ── Composite reads ───────────────────────────────────────

    /// A transaction with its shop and every item's product, category,
    /// producer and variant, all read inside one transaction.
    pub fn transaction_details(&self, id: i64) -> Result<Option<TransactionDetails>> {
        let tx = self.conn.unchecked_transaction()?;
        let Some(transaction) = self.get_transaction(id)? else {
            return Ok(None);
        };
        let shop = match transaction.shop_id {
            Some(shop_id) => self.get_shop(shop_id)?,
            None => None,
        };

        let mut items = Vec::new();
        for item in self.get_items_by_transaction(id)? {
            let product = self
                .get_product(item.product_id)?
                .ok_or_else(|| anyhow::anyhow!("Item {:?} has no product", item.id))?;
            let category = self
                .get_category(product.category_id)?
                .ok_or_else(|| anyhow::anyhow!("Product {:?} has no category", product.id))?;
            let producer = match product.producer_id {
                Some(producer_id) => self.get_producer(producer_id)?,
                None => None,
            };
            let variant = match item.variant_id {
                Some(variant_id) => self.get_variant(variant_id)?,
                None => None,
            };
            items.push(ItemDetails {
                item,
                product,
                category,
                producer,
                variant,
            });
        }
        tx.commit()?;

        Ok(Some(TransactionDetails {
            transaction,
            shop,
            items,
        }))
    }
}
