use anyhow::Result;
use rusqlite::{params, OptionalExtension};

/// Reshape a table SQLite cannot alter in place: create the new shape under a
/// shadow name, copy rows across, drop the original, rename the shadow into
/// place and recreate the indices. The autoincrement counter carries over so
/// ids handed out later never reuse ones that existed before.
///
/// Foreign key enforcement must be off while this runs.
pub(crate) struct Rebuild<'a> {
    pub table: &'a str,
    /// Column definitions of the new shape, without the surrounding parens.
    pub definition: &'a str,
    /// `(new column, expression over the old row)` pairs.
    pub columns: &'a [(&'a str, &'a str)],
    /// Full `CREATE INDEX` statements for the new shape.
    pub indices: &'a [&'a str],
}

impl Rebuild<'_> {
    pub(crate) fn apply(&self, tx: &rusqlite::Transaction<'_>) -> Result<()> {
        let table = self.table;
        let shadow = format!("{table}_new");
        let targets: Vec<&str> = self.columns.iter().map(|(c, _)| *c).collect();
        let sources: Vec<&str> = self.columns.iter().map(|(_, e)| *e).collect();

        let sequence: Option<i64> = tx
            .query_row(
                "SELECT seq FROM sqlite_sequence WHERE name = ?1",
                params![table],
                |row| row.get(0),
            )
            .optional()?;

        tx.execute_batch(&format!(
            "CREATE TABLE {shadow} ({definition});
             INSERT INTO {shadow} ({targets}) SELECT {sources} FROM {table} ORDER BY id;
             DROP TABLE {table};
             ALTER TABLE {shadow} RENAME TO {table};",
            definition = self.definition,
            targets = targets.join(", "),
            sources = sources.join(", "),
        ))?;

        for index in self.indices {
            tx.execute_batch(index)?;
        }

        if let Some(seq) = sequence {
            tx.execute("DELETE FROM sqlite_sequence WHERE name = ?1", params![table])?;
            let restore = format!(
                "INSERT INTO sqlite_sequence (name, seq)
                 VALUES (?1, MAX(?2, (SELECT COALESCE(MAX(id), 0) FROM {table})))"
            );
            tx.execute(&restore, params![table, seq])?;
        }
        Ok(())
    }
}
