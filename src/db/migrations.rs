//! The fixed schema history of the store.

use anyhow::Result;

use super::migrate::Migration;
use super::rebuild::Rebuild;
use super::schema::{self, WHITESPACE};
use super::tags;

/// Steps from an empty file to the entity schema `Database` works with.
pub fn generation_one() -> Vec<Migration> {
    vec![
        Migration {
            from: 0,
            to: 1,
            name: "initial schema",
            apply: create_initial,
        },
        Migration {
            from: 1,
            to: 2,
            name: "scaled integer money",
            apply: scale_money,
        },
        Migration {
            from: 2,
            to: 3,
            name: "global variants",
            apply: global_variants,
        },
        Migration {
            from: 3,
            to: 4,
            name: "transaction notes and indices",
            apply: notes_and_indices,
        },
        Migration {
            from: 4,
            to: 5,
            name: "normalise names",
            apply: normalize_names,
        },
    ]
}

/// Every step, including the fold of shops and products into tags.
pub fn all() -> Vec<Migration> {
    let mut steps = generation_one();
    steps.push(tags::UNIFY_TAGS);
    steps
}

fn create_initial(tx: &rusqlite::Transaction<'_>) -> Result<()> {
    tx.execute_batch(schema::SCHEMA_V1)?;
    Ok(())
}

fn scale_money(tx: &rusqlite::Transaction<'_>) -> Result<()> {
    Rebuild {
        table: "transaction_base",
        definition: schema::TRANSACTION_V2,
        columns: &[
            ("id", "id"),
            ("date", "date"),
            ("shop_id", "shop_id"),
            ("total_cost", "CAST(ROUND(total_cost * 100) AS INTEGER)"),
        ],
        indices: &[],
    }
    .apply(tx)?;

    Rebuild {
        table: "item",
        definition: schema::ITEM_V2,
        columns: &[
            ("id", "id"),
            ("transaction_id", "transaction_id"),
            ("product_id", "product_id"),
            ("variant_id", "variant_id"),
            ("quantity", "CAST(ROUND(quantity * 1000) AS INTEGER)"),
            ("price", "CAST(ROUND(price * 100) AS INTEGER)"),
        ],
        indices: &[],
    }
    .apply(tx)
}

fn global_variants(tx: &rusqlite::Transaction<'_>) -> Result<()> {
    Rebuild {
        table: "product_variant",
        definition: schema::VARIANT_V3,
        columns: &[("id", "id"), ("product_id", "product_id"), ("name", "name")],
        indices: &["CREATE INDEX index_product_variant_product_id ON product_variant(product_id)"],
    }
    .apply(tx)?;

    Rebuild {
        table: "item",
        definition: schema::ITEM_V3,
        columns: &[
            ("id", "id"),
            ("transaction_id", "transaction_id"),
            ("product_id", "product_id"),
            ("variant_id", "variant_id"),
            ("quantity", "quantity"),
            ("price", "price"),
        ],
        indices: &[],
    }
    .apply(tx)
}

fn notes_and_indices(tx: &rusqlite::Transaction<'_>) -> Result<()> {
    tx.execute_batch(schema::NOTES_AND_INDICES_V4)?;
    Ok(())
}

/// Rows whose names only differ by surrounding whitespace are merged into
/// the lowest id, with every reference re-pointed, then all names are trimmed.
struct Merge<'a> {
    table: &'a str,
    /// Columns that are part of the name's uniqueness scope.
    scope: &'a [&'a str],
    references: &'a [(&'a str, &'a str)],
}

impl Merge<'_> {
    fn apply(&self, tx: &rusqlite::Transaction<'_>) -> Result<usize> {
        let table = self.table;
        let same_scope: String = self
            .scope
            .iter()
            .map(|c| format!(" AND o.{c} IS t.{c}"))
            .collect();

        tx.execute_batch(&format!(
            "CREATE TEMP TABLE name_merge AS
                 SELECT t.id AS old_id,
                        (SELECT MIN(o.id) FROM {table} o
                          WHERE TRIM(o.name, {WHITESPACE}) = TRIM(t.name, {WHITESPACE}){same_scope}) AS new_id
                 FROM {table} t;
             DELETE FROM temp.name_merge WHERE old_id = new_id;"
        ))?;

        for (ref_table, ref_column) in self.references {
            tx.execute_batch(&format!(
                "UPDATE {ref_table}
                    SET {ref_column} = (SELECT new_id FROM temp.name_merge WHERE old_id = {ref_table}.{ref_column})
                  WHERE {ref_column} IN (SELECT old_id FROM temp.name_merge);"
            ))?;
        }

        let merged = tx.execute(
            &format!("DELETE FROM {table} WHERE id IN (SELECT old_id FROM temp.name_merge)"),
            [],
        )?;
        tx.execute_batch(&format!(
            "DROP TABLE temp.name_merge;
             UPDATE {table} SET name = TRIM(name, {WHITESPACE}) WHERE name != TRIM(name, {WHITESPACE});"
        ))?;
        Ok(merged)
    }
}

fn normalize_names(tx: &rusqlite::Transaction<'_>) -> Result<()> {
    // Merging producers can make two products collide before they are merged.
    tx.execute_batch("DROP INDEX index_product_producer_id_name;")?;

    let merges = [
        Merge {
            table: "shop",
            scope: &[],
            references: &[("transaction_base", "shop_id")],
        },
        Merge {
            table: "product_producer",
            scope: &[],
            references: &[("product", "producer_id")],
        },
        Merge {
            table: "product_category",
            scope: &[],
            references: &[("product", "category_id")],
        },
        Merge {
            table: "product",
            scope: &["producer_id"],
            references: &[("item", "product_id"), ("product_variant", "product_id")],
        },
        Merge {
            table: "product_variant",
            scope: &["product_id"],
            references: &[("item", "variant_id")],
        },
    ];
    for merge in &merges {
        let merged = merge.apply(tx)?;
        if merged > 0 {
            tracing::info!(table = merge.table, merged, "merged duplicate names");
        }
    }

    tx.execute_batch(
        "CREATE UNIQUE INDEX index_product_producer_id_name ON product(producer_id, name);",
    )?;
    Ok(())
}
