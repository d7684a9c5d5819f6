//! Compact JSON: an array of transactions with nested items.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::compact::{for_each_batch, transaction_count, Line};
use super::ExportSummary;
use crate::db::Database;
use crate::progress::{CancelFlag, Progress};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JsonTransaction {
    #[serde(default)]
    pub(crate) id: Option<i64>,
    /// Epoch millis.
    pub(crate) date: i64,
    pub(crate) total_cost: Decimal,
    #[serde(default)]
    pub(crate) note: Option<String>,
    #[serde(default)]
    pub(crate) shop: Option<JsonNamed>,
    #[serde(default)]
    pub(crate) items: Vec<JsonItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct JsonNamed {
    pub(crate) name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct JsonItem {
    pub(crate) price: Decimal,
    pub(crate) quantity: Decimal,
    #[serde(default)]
    pub(crate) product: Option<JsonProduct>,
    #[serde(default)]
    pub(crate) variant: Option<JsonVariant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct JsonProduct {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) category: Option<JsonNamed>,
    #[serde(default)]
    pub(crate) producer: Option<JsonNamed>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct JsonVariant {
    pub(crate) name: String,
    /// Not bound to a product.
    pub(crate) global: bool,
}

fn named(name: Option<String>) -> Option<JsonNamed> {
    name.map(|name| JsonNamed { name })
}

/// Fold consecutive lines of the same transaction into one document.
fn group(lines: Vec<Line>) -> Vec<JsonTransaction> {
    let mut out: Vec<JsonTransaction> = Vec::new();
    for line in lines {
        let same = out
            .last()
            .is_some_and(|t| t.id == Some(line.transaction_id));
        if !same {
            out.push(JsonTransaction {
                id: Some(line.transaction_id),
                date: line.date,
                total_cost: line.total.actual(),
                note: line.note,
                shop: named(line.shop),
                items: Vec::new(),
            });
        }
        let (Some(item), Some(txn)) = (line.item, out.last_mut()) else {
            continue;
        };
        txn.items.push(JsonItem {
            price: item.price.actual(),
            quantity: item.quantity.actual(),
            product: item.product.map(|name| JsonProduct {
                name,
                category: named(item.category),
                producer: named(item.producer),
            }),
            variant: item
                .variant
                .map(|(name, global)| JsonVariant { name, global }),
        });
    }
    out
}

pub(super) fn export(
    db: &Database,
    path: &Path,
    batch: usize,
    progress: &mut dyn Progress,
    cancel: &CancelFlag,
) -> Result<ExportSummary> {
    progress.on_max_progress(transaction_count(db)?);
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    out.write_all(b"[")?;

    let mut rows = 0;
    for_each_batch(db, batch, cancel, |lines, visited| {
        for txn in group(lines) {
            if rows > 0 {
                out.write_all(b",")?;
            }
            out.write_all(b"\n")?;
            serde_json::to_writer(&mut out, &txn)?;
            rows += 1;
        }
        progress.on_progress(visited);
        Ok(())
    })?;

    out.write_all(b"\n]\n")?;
    out.flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(ExportSummary {
        files: vec![path.to_path_buf()],
        rows,
    })
}
