use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::path::Path;

use super::graph::{Graph, ItemRecord};
use super::ImportError;
use crate::export::COMPACT_HEADER;
use crate::models::{Price, Quantity};
use crate::progress::{CancelFlag, Progress};

/// One line of a version 1.0 compact CSV. `transactionId` is informative
/// only; receipts are matched by date and total.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompactRow {
    transaction_date: i64,
    transaction_total_price: String,
    shop: Option<String>,
    product: Option<String>,
    variant: Option<String>,
    variant_global: Option<bool>,
    category: Option<String>,
    producer: Option<String>,
    price: Option<String>,
    quantity: Option<String>,
    transaction_note: Option<String>,
}

impl CompactRow {
    fn item(&self) -> Result<ItemRecord> {
        Ok(ItemRecord {
            product: self.product.clone(),
            category: self.category.clone(),
            producer: self.producer.clone(),
            variant: self.variant.clone(),
            variant_global: self.variant_global.unwrap_or(false),
            price: self.price.as_deref().map_or(Ok(Price::ZERO), Price::parse)?,
            quantity: self
                .quantity
                .as_deref()
                .map_or(Ok(Quantity::default()), Quantity::parse)?,
        })
    }
}

/// The header names the file version; anything else is rejected.
pub(crate) fn is_compact_header(header: &csv::StringRecord) -> bool {
    header.iter().eq(COMPACT_HEADER.split(';'))
}

pub(crate) fn import(
    graph: &mut Graph<'_>,
    path: &Path,
    progress: &mut dyn Progress,
    cancel: &CancelFlag,
) -> Result<()> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let size = file.metadata()?.len();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .from_reader(file);

    let header = reader.headers().context("Failed to read CSV header")?.clone();
    if !is_compact_header(&header) {
        return Err(ImportError::UnknownFormat(path.to_path_buf()).into());
    }
    progress.on_max_progress(size);

    let mut record = csv::StringRecord::new();
    while reader.read_record(&mut record)? {
        cancel.check()?;
        let line = record.position().map_or(0, |p| p.line());
        let row: CompactRow = record
            .deserialize(Some(&header))
            .with_context(|| format!("{}: malformed line {line}", path.display()))?;

        let total = Price::parse(&row.transaction_total_price)
            .with_context(|| format!("{}: bad total on line {line}", path.display()))?;
        let txn = graph.transaction(
            row.transaction_date,
            total,
            row.shop.as_deref(),
            row.transaction_note.as_deref(),
        )?;
        let item = row
            .item()
            .with_context(|| format!("{}: bad amount on line {line}", path.display()))?;
        graph.item(txn, &item)?;

        progress.on_progress(reader.position().byte());
    }
    Ok(())
}
