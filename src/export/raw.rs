//! One `;`-separated file per table, ids kept.

use anyhow::{bail, Context, Result};
use rusqlite::params;
use rusqlite::types::Value;
use std::path::Path;
use tracing::debug;

use super::ExportSummary;
use crate::db::Database;
use crate::models::{Price, Quantity};
use crate::progress::{CancelFlag, Progress};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    Id,
    OptionalId,
    /// Epoch millis.
    Date,
    Text,
    OptionalText,
    Price,
    Quantity,
}

pub(crate) struct RawTable {
    pub(crate) file: &'static str,
    pub(crate) table: &'static str,
    /// `(header, column, field)`; the first entry is always the id.
    pub(crate) columns: &'static [(&'static str, &'static str, Field)],
}

/// In dependency order: every table only references tables before it.
pub(crate) const RAW_TABLES: &[RawTable] = &[
    RawTable {
        file: "shop.csv",
        table: "shop",
        columns: &[("id", "id", Field::Id), ("name", "name", Field::Text)],
    },
    RawTable {
        file: "producer.csv",
        table: "product_producer",
        columns: &[("id", "id", Field::Id), ("name", "name", Field::Text)],
    },
    RawTable {
        file: "category.csv",
        table: "product_category",
        columns: &[("id", "id", Field::Id), ("name", "name", Field::Text)],
    },
    RawTable {
        file: "product.csv",
        table: "product",
        columns: &[
            ("id", "id", Field::Id),
            ("categoryId", "category_id", Field::Id),
            ("producerId", "producer_id", Field::OptionalId),
            ("name", "name", Field::Text),
        ],
    },
    RawTable {
        file: "variant.csv",
        table: "product_variant",
        columns: &[
            ("id", "id", Field::Id),
            ("productId", "product_id", Field::OptionalId),
            ("name", "name", Field::Text),
        ],
    },
    RawTable {
        file: "transaction.csv",
        table: "transaction_base",
        columns: &[
            ("id", "id", Field::Id),
            ("date", "date", Field::Date),
            ("shopId", "shop_id", Field::OptionalId),
            ("totalCost", "total_cost", Field::Price),
            ("note", "note", Field::OptionalText),
        ],
    },
    RawTable {
        file: "item.csv",
        table: "item",
        columns: &[
            ("id", "id", Field::Id),
            ("transactionId", "transaction_id", Field::Id),
            ("productId", "product_id", Field::Id),
            ("variantId", "variant_id", Field::OptionalId),
            ("quantity", "quantity", Field::Quantity),
            ("price", "price", Field::Price),
        ],
    },
];

impl RawTable {
    pub(crate) fn header(&self) -> Vec<&'static str> {
        self.columns.iter().map(|(header, _, _)| *header).collect()
    }

    pub(crate) fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|(_, column, _)| *column)
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn count(&self, db: &Database) -> Result<u64> {
        let n: i64 = db.conn().query_row(
            &format!("SELECT COUNT(*) FROM {}", self.table),
            [],
            |row| row.get(0),
        )?;
        Ok(n.max(0) as u64)
    }
}

/// Render a stored value. Money and quantities are written human-scale.
pub(crate) fn format_field(field: Field, value: &Value) -> Result<String> {
    Ok(match (field, value) {
        (_, Value::Null) => String::new(),
        (Field::Price, Value::Integer(n)) => Price(*n).to_string(),
        (Field::Quantity, Value::Integer(n)) => Quantity(*n).to_string(),
        (Field::Id | Field::OptionalId | Field::Date, Value::Integer(n)) => n.to_string(),
        (Field::Text | Field::OptionalText, Value::Text(s)) => s.clone(),
        (field, other) => bail!("Unexpected {other:?} in a {field:?} column"),
    })
}

/// Inverse of `format_field`.
pub(crate) fn parse_field(field: Field, raw: &str) -> Result<Value> {
    if raw.is_empty() {
        return match field {
            Field::OptionalId | Field::OptionalText => Ok(Value::Null),
            Field::Text => Ok(Value::Text(String::new())),
            _ => bail!("Missing value for a {field:?} column"),
        };
    }
    Ok(match field {
        Field::Id | Field::OptionalId | Field::Date => Value::Integer(
            raw.trim()
                .parse()
                .with_context(|| format!("'{raw}' is not an integer"))?,
        ),
        Field::Text | Field::OptionalText => Value::Text(raw.to_string()),
        Field::Price => Value::Integer(Price::parse(raw)?.scaled()),
        Field::Quantity => Value::Integer(Quantity::parse(raw)?.scaled()),
    })
}

pub(super) fn export(
    db: &Database,
    dir: &Path,
    batch: usize,
    progress: &mut dyn Progress,
    cancel: &CancelFlag,
) -> Result<ExportSummary> {
    let mut total = 0;
    for table in RAW_TABLES {
        total += table.count(db)?;
    }
    progress.on_max_progress(total);

    let mut summary = ExportSummary::default();
    for table in RAW_TABLES {
        let path = dir.join(table.file);
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b';')
            .from_path(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        writer.write_record(table.header())?;
        summary.files.push(path.clone());

        let sql = format!(
            "SELECT {} FROM {} WHERE id > ?1 ORDER BY id LIMIT ?2",
            table.column_list(),
            table.table
        );
        let mut stmt = db.conn().prepare(&sql)?;
        let mut last_id = i64::MIN;
        loop {
            cancel.check()?;
            let rows: Vec<Vec<Value>> = stmt
                .query_map(params![last_id, batch as i64], |row| {
                    (0..table.columns.len())
                        .map(|i| row.get::<_, Value>(i))
                        .collect()
                })?
                .collect::<std::result::Result<_, _>>()?;
            let Some(last) = rows.last() else {
                break;
            };
            if let Some(Value::Integer(id)) = last.first() {
                last_id = *id;
            }

            for values in &rows {
                let record = table
                    .columns
                    .iter()
                    .zip(values)
                    .map(|((_, _, field), value)| format_field(*field, value))
                    .collect::<Result<Vec<_>>>()?;
                writer.write_record(&record)?;
            }
            summary.rows += rows.len() as u64;
            progress.on_progress(summary.rows);

            if rows.len() < batch {
                break;
            }
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!(file = table.file, "exported table");
    }
    Ok(summary)
}
