//! Reads an export directory back into the store.
//!
//! A directory holding the raw per-table files is restored as is, ids
//! included, and only into an empty store. Otherwise every `.csv` and
//! `.json` document is read in name order and the graph is rebuilt from the
//! names it carries. Either way the whole import is one SQLite transaction.

mod compact;
mod graph;
mod json;
mod raw;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::db::Database;
use crate::export::RAW_TABLES;
use crate::progress::{report, CancelFlag, Progress};

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("{} is not in a known export format", .0.display())]
    UnknownFormat(PathBuf),

    #[error("nothing to import in {}", .0.display())]
    NothingToImport(PathBuf),

    #[error("a raw export can only be restored into an empty store")]
    StoreNotEmpty,

    #[error("raw export is missing {0}")]
    MissingRawFile(String),

    #[error("product '{0}' has no category")]
    MissingCategory(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Raw,
    CompactCsv,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub files: Vec<PathBuf>,
    /// Transactions created; receipts matched to existing ones are not
    /// counted.
    pub transactions: u64,
    pub items: u64,
    /// Shops, producers, categories, products and variants created.
    pub names: u64,
}

/// The documents in `dir` and how to read each, in import order.
pub fn detect(dir: &Path) -> Result<Vec<(PathBuf, ImportFormat)>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read import directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() {
            names.push(path);
        }
    }
    names.sort();

    let is_raw = names.iter().any(|p| {
        p.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| RAW_TABLES.iter().any(|t| t.file == n))
    });
    if is_raw {
        return Ok(vec![(dir.to_path_buf(), ImportFormat::Raw)]);
    }

    let docs: Vec<_> = names
        .into_iter()
        .filter_map(|p| {
            let ext = p.extension()?.to_str()?.to_ascii_lowercase();
            match ext.as_str() {
                "csv" => Some((p, ImportFormat::CompactCsv)),
                "json" => Some((p, ImportFormat::Json)),
                _ => None,
            }
        })
        .collect();
    if docs.is_empty() {
        return Err(ImportError::NothingToImport(dir.to_path_buf()).into());
    }
    Ok(docs)
}

/// Import every document in `dir`. Nothing is kept when any of them fails
/// or `cancel` is set.
pub fn import_dir(
    db: &mut Database,
    dir: &Path,
    progress: &mut dyn Progress,
    cancel: &CancelFlag,
) -> Result<ImportSummary> {
    report(progress, |progress| {
        let docs = detect(dir)?;
        if docs.iter().any(|(_, f)| *f == ImportFormat::Raw) && !db.is_empty()? {
            return Err(ImportError::StoreNotEmpty.into());
        }

        let tx = db.conn_mut().transaction()?;
        let mut summary = ImportSummary::default();
        {
            let mut graph = graph::Graph::new(&tx)?;
            for (path, format) in &docs {
                info!(file = %path.display(), ?format, "importing");
                graph.begin_document();
                match format {
                    ImportFormat::Raw => {
                        raw::import(&tx, path, &mut graph.summary, progress, cancel)?
                    }
                    ImportFormat::CompactCsv => compact::import(&mut graph, path, progress, cancel)?,
                    ImportFormat::Json => json::import(&mut graph, path, progress, cancel)?,
                }
            }
            summary.transactions = graph.summary.transactions;
            summary.items = graph.summary.items;
            summary.names = graph.summary.names;
        }
        tx.commit().context("Failed to commit import")?;
        db.publish();

        summary.files = docs.into_iter().map(|(path, _)| path).collect();
        info!(
            transactions = summary.transactions,
            items = summary.items,
            names = summary.names,
            "import finished"
        );
        Ok(summary)
    })
}

#[cfg(test)]
mod tests;
