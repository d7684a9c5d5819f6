use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

/// One forward-only schema step. `apply` runs inside a transaction that the
/// engine opens and commits; it must not start its own.
#[derive(Clone, Copy)]
pub struct Migration {
    pub from: u32,
    pub to: u32,
    pub name: &'static str,
    pub apply: fn(&rusqlite::Transaction<'_>) -> Result<()>,
}

impl std::fmt::Debug for Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Migration({} -> {}: {})", self.from, self.to, self.name)
    }
}

/// Applies an ordered list of migrations to a connection.
#[derive(Debug, Clone)]
pub struct Migrator {
    steps: Vec<Migration>,
}

impl Migrator {
    pub fn new(steps: Vec<Migration>) -> Self {
        Self { steps }
    }

    /// Highest version reachable through the registered steps.
    pub fn target(&self) -> u32 {
        self.steps.iter().map(|m| m.to).max().unwrap_or(0)
    }

    pub fn run(&self, conn: &mut Connection) -> Result<u32> {
        self.run_to(conn, self.target())
    }

    /// Advance the store one version at a time until it reaches `target`.
    /// Each step commits on its own, so a failure leaves the store at the
    /// last completed version.
    pub fn run_to(&self, conn: &mut Connection, target: u32) -> Result<u32> {
        let mut version = stored_version(conn)?;
        if version > target {
            bail!("Store is at schema version {version}, newer than supported version {target}");
        }
        if version == target {
            debug!(version, "schema up to date");
            return Ok(version);
        }

        // Table rebuilds drop and rename tables that others reference.
        conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
        let result = self.advance(conn, &mut version, target);
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        result?;
        Ok(version)
    }

    fn advance(&self, conn: &mut Connection, version: &mut u32, target: u32) -> Result<()> {
        while *version < target {
            let from = *version;
            let step = self
                .steps
                .iter()
                .find(|m| m.from == from && m.to == from + 1)
                .with_context(|| {
                    format!("No migration registered from version {from} to {}", from + 1)
                })?;

            let tx = conn.transaction()?;
            (step.apply)(&tx).with_context(|| format!("Migration {step:?} failed"))?;
            write_version(&tx, step.to)?;
            check_foreign_keys(&tx).with_context(|| format!("Migration {step:?} failed"))?;
            tx.commit()?;

            info!(from = step.from, to = step.to, name = step.name, "applied migration");
            *version = step.to;
        }
        Ok(())
    }
}

/// Version recorded in the store. A store without any tables is version 0;
/// a store with tables but no version record is not one of ours.
pub fn stored_version(conn: &Connection) -> Result<u32> {
    let has_version_table: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;
    if !has_version_table {
        let tables: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
            [],
            |row| row.get(0),
        )?;
        if tables > 0 {
            bail!("Unrecognised store: {tables} tables but no schema version");
        }
        return Ok(0);
    }

    let version: Option<u32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?;
    version.context("Schema version table is empty")
}

fn write_version(tx: &rusqlite::Transaction<'_>, version: u32) -> Result<()> {
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);
         DELETE FROM schema_version;",
    )?;
    tx.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        params![version],
    )?;
    Ok(())
}

fn check_foreign_keys(tx: &rusqlite::Transaction<'_>) -> Result<()> {
    let mut stmt = tx.prepare("PRAGMA foreign_key_check")?;
    let mut rows = stmt.query([])?;
    if let Some(row) = rows.next()? {
        let table: String = row.get(0)?;
        let parent: String = row.get(2)?;
        bail!("Foreign key violation: {table} references a missing {parent} row");
    }
    Ok(())
}

#[cfg(test)]
#[path = "migrate_tests.rs"]
mod tests;
