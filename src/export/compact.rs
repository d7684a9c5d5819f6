//! Denormalised export: one line per item, every reference resolved to a
//! name.

use anyhow::{Context, Result};
use rusqlite::{params, Row};
use std::path::Path;

use super::ExportSummary;
use crate::db::Database;
use crate::models::{Price, Quantity};
use crate::progress::{CancelFlag, Progress};

/// Version 1.0 of the compact CSV layout.
pub(crate) const COMPACT_HEADER: &str = "transactionId;transactionDate;transactionTotalPrice;shop;product;variant;variantGlobal;category;producer;price;quantity;transactionNote";

/// A transaction joined with one of its items, or with nothing when it has
/// no items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Line {
    pub(crate) transaction_id: i64,
    /// Epoch millis.
    pub(crate) date: i64,
    pub(crate) total: Price,
    pub(crate) shop: Option<String>,
    pub(crate) note: Option<String>,
    pub(crate) item: Option<LineItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LineItem {
    pub(crate) product: Option<String>,
    pub(crate) category: Option<String>,
    pub(crate) producer: Option<String>,
    /// Name and whether the variant is global.
    pub(crate) variant: Option<(String, bool)>,
    pub(crate) price: Price,
    pub(crate) quantity: Quantity,
}

const LINES_SQL: &str = "
    SELECT t.id, t.date, t.total_cost, s.name, t.note,
           i.id, p.name, c.name, pr.name, v.name, v.product_id IS NULL, i.price, i.quantity
    FROM transaction_base t
    LEFT JOIN shop s ON s.id = t.shop_id
    LEFT JOIN item i ON i.transaction_id = t.id
    LEFT JOIN product p ON p.id = i.product_id
    LEFT JOIN product_category c ON c.id = p.category_id
    LEFT JOIN product_producer pr ON pr.id = p.producer_id
    LEFT JOIN product_variant v ON v.id = i.variant_id
    WHERE t.id > ?1 AND t.id <= ?2
    ORDER BY t.id, i.id";

fn line_from_row(row: &Row<'_>) -> rusqlite::Result<Line> {
    let item_id: Option<i64> = row.get(5)?;
    let item = match item_id {
        None => None,
        Some(_) => {
            let variant_name: Option<String> = row.get(9)?;
            let global: Option<bool> = row.get(10)?;
            Some(LineItem {
                product: row.get(6)?,
                category: row.get(7)?,
                producer: row.get(8)?,
                variant: variant_name.map(|name| (name, global.unwrap_or(false))),
                price: Price(row.get(11)?),
                quantity: Quantity(row.get(12)?),
            })
        }
    };
    Ok(Line {
        transaction_id: row.get(0)?,
        date: row.get(1)?,
        total: Price(row.get(2)?),
        shop: row.get(3)?,
        note: row.get(4)?,
        item,
    })
}

/// Walk the store `batch` transactions at a time, handing each batch of
/// lines to `sink`. Returns the number of transactions visited.
pub(crate) fn for_each_batch(
    db: &Database,
    batch: usize,
    cancel: &CancelFlag,
    mut sink: impl FnMut(Vec<Line>, u64) -> Result<()>,
) -> Result<u64> {
    let mut ids = db
        .conn()
        .prepare("SELECT id FROM transaction_base WHERE id > ?1 ORDER BY id LIMIT ?2")?;
    let mut lines = db.conn().prepare(LINES_SQL)?;
    let mut after = i64::MIN;
    let mut visited = 0;
    loop {
        cancel.check()?;
        let batch_ids: Vec<i64> = ids
            .query_map(params![after, batch as i64], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        let Some(&upto) = batch_ids.last() else {
            break;
        };
        let rows: Vec<Line> = lines
            .query_map(params![after, upto], line_from_row)?
            .collect::<std::result::Result<_, _>>()?;
        visited += batch_ids.len() as u64;
        sink(rows, visited)?;
        after = upto;
        if batch_ids.len() < batch {
            break;
        }
    }
    Ok(visited)
}

pub(crate) fn transaction_count(db: &Database) -> Result<u64> {
    let n: i64 = db
        .conn()
        .query_row("SELECT COUNT(*) FROM transaction_base", [], |row| row.get(0))?;
    Ok(n.max(0) as u64)
}

/// Free text must not break the record layout.
fn sanitize(s: &str) -> String {
    s.replace(';', ",").replace(['\n', '\r'], " ")
}

fn opt(s: Option<&str>) -> String {
    s.map(sanitize).unwrap_or_default()
}

fn record(line: &Line) -> Vec<String> {
    let mut fields = vec![
        line.transaction_id.to_string(),
        line.date.to_string(),
        line.total.to_string(),
        opt(line.shop.as_deref()),
    ];
    match &line.item {
        Some(item) => fields.extend([
            opt(item.product.as_deref()),
            opt(item.variant.as_ref().map(|(name, _)| name.as_str())),
            item.variant
                .as_ref()
                .map(|(_, global)| global.to_string())
                .unwrap_or_default(),
            opt(item.category.as_deref()),
            opt(item.producer.as_deref()),
            item.price.to_string(),
            item.quantity.to_string(),
        ]),
        None => fields.extend(std::iter::repeat(String::new()).take(7)),
    }
    fields.push(opt(line.note.as_deref()));
    fields
}

pub(super) fn export(
    db: &Database,
    path: &Path,
    batch: usize,
    progress: &mut dyn Progress,
    cancel: &CancelFlag,
) -> Result<ExportSummary> {
    progress.on_max_progress(transaction_count(db)?);
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(COMPACT_HEADER.split(';'))?;

    let mut rows = 0;
    for_each_batch(db, batch, cancel, |lines, visited| {
        for line in &lines {
            writer.write_record(record(line))?;
        }
        rows += lines.len() as u64;
        progress.on_progress(visited);
        Ok(())
    })?;
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(ExportSummary {
        files: vec![path.to_path_buf()],
        rows,
    })
}
