//! Row-level exports.
//!
//! * `Raw`: one `;`-separated file per table with ids kept, read back by the
//!   raw importer.
//! * `CompactCsv` / `Json`: one self-contained document with every foreign
//!   key resolved to its name. Ids do not survive a round trip.

mod compact;
mod json;
mod raw;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::db::Database;
use crate::progress::{report, CancelFlag, Progress};

pub(crate) use compact::COMPACT_HEADER;
pub(crate) use json::{JsonItem, JsonTransaction};
pub(crate) use raw::{parse_field, RAW_TABLES};

pub const COMPACT_CSV_FILE: &str = "arru_export.csv";
pub const JSON_FILE: &str = "arru_export.json";
pub const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Raw,
    CompactCsv,
    Json,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Some(Self::Raw),
            "csv" | "compact" => Some(Self::CompactCsv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    pub format: ExportFormat,
    /// Rows (raw) or transactions (compact) read per query.
    pub batch_size: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: ExportFormat::CompactCsv,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub files: Vec<PathBuf>,
    /// Rows written, headers not counted.
    pub rows: u64,
}

/// Write an export of `db` into `dir`. Stops with `Cancelled` between
/// batches once `cancel` is set; files written so far are left in place.
pub fn export(
    db: &Database,
    dir: &Path,
    options: &ExportOptions,
    progress: &mut dyn Progress,
    cancel: &CancelFlag,
) -> Result<ExportSummary> {
    report(progress, |progress| {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create export directory: {}", dir.display()))?;
        let batch = options.batch_size.max(1);
        let summary = match options.format {
            ExportFormat::Raw => raw::export(db, dir, batch, progress, cancel)?,
            ExportFormat::CompactCsv => {
                compact::export(db, &dir.join(COMPACT_CSV_FILE), batch, progress, cancel)?
            }
            ExportFormat::Json => json::export(db, &dir.join(JSON_FILE), batch, progress, cancel)?,
        };
        info!(
            format = ?options.format,
            files = summary.files.len(),
            rows = summary.rows,
            "export finished"
        );
        Ok(summary)
    })
}
