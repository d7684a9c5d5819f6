use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::graph::{Graph, ItemRecord};
use crate::export::{JsonItem, JsonTransaction};
use crate::models::{Price, Quantity};
use crate::progress::{CancelFlag, Progress};

fn item_record(item: &JsonItem) -> Result<ItemRecord> {
    let product = item.product.as_ref();
    Ok(ItemRecord {
        product: product.map(|p| p.name.clone()),
        category: product
            .and_then(|p| p.category.as_ref())
            .map(|c| c.name.clone()),
        producer: product
            .and_then(|p| p.producer.as_ref())
            .map(|p| p.name.clone()),
        variant: item.variant.as_ref().map(|v| v.name.clone()),
        variant_global: item.variant.as_ref().is_some_and(|v| v.global),
        price: Price::from_decimal(item.price)?,
        quantity: Quantity::from_decimal(item.quantity)?,
    })
}

pub(crate) fn import(
    graph: &mut Graph<'_>,
    path: &Path,
    progress: &mut dyn Progress,
    cancel: &CancelFlag,
) -> Result<()> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let txns: Vec<JsonTransaction> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    progress.on_max_progress(txns.len() as u64);

    for (i, txn) in txns.iter().enumerate() {
        cancel.check()?;
        let id = graph.transaction(
            txn.date,
            Price::from_decimal(txn.total_cost)?,
            txn.shop.as_ref().map(|s| s.name.as_str()),
            txn.note.as_deref(),
        )?;
        for item in &txn.items {
            let record = item_record(item)
                .with_context(|| format!("{}: bad amount in transaction {}", path.display(), i + 1))?;
            graph.item(id, &record)?;
        }
        progress.on_progress(i as u64 + 1);
    }
    Ok(())
}
