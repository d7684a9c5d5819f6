//! Restores a raw export into an empty store, keeping every id.

use anyhow::{Context, Result};
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use tracing::debug;

use super::{ImportError, ImportSummary};
use crate::export::{parse_field, RAW_TABLES};
use crate::progress::{CancelFlag, Progress};

pub(crate) fn import(
    conn: &Connection,
    dir: &Path,
    summary: &mut ImportSummary,
    progress: &mut dyn Progress,
    cancel: &CancelFlag,
) -> Result<()> {
    for table in RAW_TABLES {
        let path = dir.join(table.file);
        if !path.exists() {
            return Err(ImportError::MissingRawFile(table.file.to_string()).into());
        }
    }
    progress.on_max_progress(RAW_TABLES.len() as u64);

    for (done, table) in RAW_TABLES.iter().enumerate() {
        let path = dir.join(table.file);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .from_path(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        if !reader.headers()?.iter().eq(table.header()) {
            return Err(ImportError::UnknownFormat(path.clone()).into());
        }

        let placeholders = (1..=table.columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = conn.prepare(&format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            table.table,
            table.column_list()
        ))?;

        let mut rows = 0;
        for result in reader.records() {
            cancel.check()?;
            let record = result.with_context(|| format!("Failed to read {}", path.display()))?;
            let line = record.position().map_or(0, |p| p.line());
            let values = table
                .columns
                .iter()
                .zip(record.iter())
                .map(|((_, _, field), raw)| parse_field(*field, raw))
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("{}: malformed line {line}", path.display()))?;
            stmt.execute(params_from_iter(values))
                .with_context(|| format!("{}: cannot restore line {line}", path.display()))?;
            rows += 1;
        }

        match table.table {
            "transaction_base" => summary.transactions += rows,
            "item" => summary.items += rows,
            _ => summary.names += rows,
        }
        debug!(file = table.file, rows, "restored table");
        progress.on_progress(done as u64 + 1);
    }
    Ok(())
}
