//! Whole-file backups of the store.
//!
//! A backup is a byte copy of the store file and its `-wal` / `-shm` side
//! files. Everything worth knowing about a backup is stamped into its file
//! name, `bak_arru_db_<transactions>_<spending>_<millis>.db`, so listing
//! backups never opens them.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{info, warn};

use crate::db::Database;

const PREFIX: &str = "bak_arru_db";
static NAME_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^bak_arru_db_(-?[0-9]+)_(-?[0-9]+)_(-?[0-9]+)\.db$").ok()
});
const SIDE_FILES: [&str; 2] = ["-wal", "-shm"];

/// Metadata recovered from a backup's file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupStamp {
    pub total_transactions: i64,
    /// Scaled, like every stored amount.
    pub total_spending: i64,
    /// Epoch millis.
    pub time: i64,
}

impl BackupStamp {
    pub fn file_name(&self) -> String {
        format!(
            "{PREFIX}_{}_{}_{}.db",
            self.total_transactions, self.total_spending, self.time
        )
    }

    /// Fields are read right to left: time, spending, then the transaction
    /// count.
    pub fn parse(name: &str) -> Option<Self> {
        let caps = NAME_PATTERN.as_ref()?.captures(name)?;
        let time = caps.get(3)?.as_str().parse().ok()?;
        let total_spending = caps.get(2)?.as_str().parse().ok()?;
        let total_transactions = caps.get(1)?.as_str().parse().ok()?;
        Some(Self {
            total_transactions,
            total_spending,
            time,
        })
    }

    pub fn date_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.time)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    pub path: PathBuf,
    pub stamp: BackupStamp,
}

impl Backup {
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Not a backup file: {}", path.display()))?;
        let stamp = BackupStamp::parse(name)
            .with_context(|| format!("Not a backup file name: {name}"))?;
        Ok(Self {
            path: path.to_path_buf(),
            stamp,
        })
    }

    fn side_file(&self, suffix: &str) -> PathBuf {
        side_path(&self.path, suffix)
    }
}

fn side_path(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

/// Backups in `dir`, newest first. Files whose names do not parse are
/// skipped with a warning.
pub fn list_backups(dir: &Path) -> Result<Vec<Backup>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut backups = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Failed to read backup directory: {}", dir.display()))?
    {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.starts_with(PREFIX) || !name.ends_with(".db") {
            continue;
        }
        match BackupStamp::parse(name) {
            Some(stamp) => backups.push(Backup {
                path: path.clone(),
                stamp,
            }),
            None => warn!(file = name, "skipping backup with unrecognised name"),
        }
    }
    backups.sort_by(|a, b| b.stamp.time.cmp(&a.stamp.time));
    Ok(backups)
}

pub fn delete_backup(backup: &Backup) -> Result<()> {
    fs::remove_file(&backup.path)
        .with_context(|| format!("Failed to delete backup: {}", backup.path.display()))?;
    for suffix in SIDE_FILES {
        let side = backup.side_file(suffix);
        if side.exists() {
            fs::remove_file(&side)?;
        }
    }
    info!(file = %backup.path.display(), "deleted backup");
    Ok(())
}

impl Database {
    /// Copy the store into `dir` under a stamped name.
    pub fn backup_to(&self, dir: &Path, now: DateTime<Utc>) -> Result<Backup> {
        let Some(source) = self.path() else {
            bail!("An in-memory store cannot be backed up");
        };
        let stats = self.stats()?;
        let stamp = BackupStamp {
            total_transactions: stats.transactions,
            total_spending: stats.spending,
            time: now.timestamp_millis(),
        };
        let name = stamp.file_name();
        if BackupStamp::parse(&name) != Some(stamp) {
            bail!("Backup name {name} does not parse back to its stamp");
        }

        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create backup directory: {}", dir.display()))?;
        let target = dir.join(&name);
        if target.exists() {
            bail!("Backup already exists: {}", target.display());
        }

        // Fold the log into the main file so the copy is self-contained.
        self.conn()
            .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
            .context("Failed to checkpoint the store")?;

        fs::copy(source, &target)
            .with_context(|| format!("Failed to copy store to {}", target.display()))?;
        for suffix in SIDE_FILES {
            let side = side_path(source, suffix);
            if side.exists() {
                fs::copy(&side, side_path(&target, suffix))?;
            }
        }

        info!(
            file = %target.display(),
            transactions = stamp.total_transactions,
            spending = stamp.total_spending,
            "created backup"
        );
        Ok(Backup {
            path: target,
            stamp,
        })
    }

    /// Write a compacted, self-contained copy of the store to `target`.
    /// Works for in-memory stores too.
    pub fn snapshot_to(&self, target: &Path) -> Result<()> {
        if target.exists() {
            bail!("Refusing to overwrite {}", target.display());
        }
        let target_str = target
            .to_str()
            .with_context(|| format!("Path is not valid UTF-8: {}", target.display()))?;
        self.conn()
            .execute("VACUUM INTO ?1", [target_str])
            .with_context(|| format!("Failed to write snapshot to {}", target.display()))?;
        info!(file = %target.display(), "wrote snapshot");
        Ok(())
    }

    /// Close the store and copy `backup` over its file. The store has to be
    /// opened again afterwards; the returned path is where it lives.
    pub fn restore(self, backup: &Backup) -> Result<PathBuf> {
        let (conn, path) = self.into_parts();
        let Some(path) = path else {
            bail!("An in-memory store cannot be restored");
        };
        conn.close()
            .map_err(|(_, e)| e)
            .context("Failed to close the store before restore")?;
        restore_file(backup, &path)?;
        Ok(path)
    }
}

/// Replace the store at `live` with `backup`. Nothing may hold `live` open.
pub fn restore_file(backup: &Backup, live: &Path) -> Result<()> {
    for suffix in SIDE_FILES {
        let stale = side_path(live, suffix);
        if stale.exists() {
            fs::remove_file(&stale)
                .with_context(|| format!("Failed to remove {}", stale.display()))?;
        }
    }
    fs::copy(&backup.path, live)
        .with_context(|| format!("Failed to restore {}", backup.path.display()))?;
    for suffix in SIDE_FILES {
        let side = backup.side_file(suffix);
        if side.exists() {
            fs::copy(&side, side_path(live, suffix))?;
        }
    }
    info!(
        from = %backup.path.display(),
        to = %live.display(),
        "restored backup"
    );
    Ok(())
}

#[cfg(test)]
mod tests;
