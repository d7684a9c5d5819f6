use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::export::DEFAULT_BATCH_SIZE;

pub const DB_ENV: &str = "ARRU_DB";
pub const BACKUP_DIR_ENV: &str = "ARRU_BACKUP_DIR";
pub const EXPORT_BATCH_ENV: &str = "ARRU_EXPORT_BATCH";

/// Where the store lives and how exports are paged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub backup_dir: PathBuf,
    pub export_batch_size: usize,
}

impl Config {
    /// Platform data directory, overridden by the `ARRU_*` variables.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = match (lookup(DB_ENV), lookup(BACKUP_DIR_ENV)) {
            (Some(_), Some(_)) => None,
            _ => Some(data_dir()?),
        };
        let db_path = match lookup(DB_ENV) {
            Some(path) => PathBuf::from(path),
            None => data_dir
                .as_ref()
                .map(|d| d.join("arru.db"))
                .context("Could not determine data directory")?,
        };
        let backup_dir = match lookup(BACKUP_DIR_ENV) {
            Some(path) => PathBuf::from(path),
            None => data_dir
                .as_ref()
                .map(|d| d.join("backups"))
                .context("Could not determine data directory")?,
        };
        let export_batch_size = match lookup(EXPORT_BATCH_ENV) {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .with_context(|| format!("{EXPORT_BATCH_ENV} must be a positive integer, got '{raw}'"))?,
            None => DEFAULT_BATCH_SIZE,
        };

        Ok(Self {
            db_path,
            backup_dir,
            export_batch_size,
        })
    }

    /// Make sure the directory holding the store exists.
    pub fn ensure_dirs(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
        }
        Ok(())
    }
}

fn data_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("org", "arru", "Arru")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    Ok(proj_dirs.data_dir().to_path_buf())
}
