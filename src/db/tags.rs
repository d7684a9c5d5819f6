//! Folding the categorical columns into a tag graph (schema v5 -> v6).
//!
//! Every dimension (shop, variant, producer, category, product) becomes a
//! reserved parent tag with one child tag per distinct name. Associations are
//! carried over to `transaction_tag` / `item_tag`, then the old column and
//! table are dropped. The dimension owns every constant it uses, so one
//! dimension can never link into another's parent tag.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::{debug, info};

use super::migrate::{Migration, Migrator};
use super::migrations;
use super::rebuild::Rebuild;
use super::schema::TAGGED_VERSION;
use crate::models::{SystemTag, Tag};

pub(crate) const UNIFY_TAGS: Migration = Migration {
    from: 5,
    to: 6,
    name: "unify categorical columns into tags",
    apply: unify_tags,
};

const TAG_TABLES: &str = r#"
CREATE TABLE tag (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    name          TEXT NOT NULL,
    color_ordinal INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE tag_tag (
    tag_id        INTEGER NOT NULL REFERENCES tag(id) ON DELETE CASCADE,
    parent_tag_id INTEGER NOT NULL REFERENCES tag(id) ON DELETE CASCADE,
    PRIMARY KEY (tag_id, parent_tag_id)
);
CREATE INDEX index_tag_tag_parent_tag_id ON tag_tag(parent_tag_id);

CREATE TABLE transaction_tag (
    transaction_id INTEGER NOT NULL REFERENCES transaction_base(id) ON DELETE CASCADE,
    tag_id         INTEGER NOT NULL REFERENCES tag(id) ON DELETE CASCADE,
    PRIMARY KEY (transaction_id, tag_id)
);
CREATE INDEX index_transaction_tag_tag_id ON transaction_tag(tag_id);

CREATE TABLE item_tag (
    item_id INTEGER NOT NULL REFERENCES item(id) ON DELETE CASCADE,
    tag_id  INTEGER NOT NULL REFERENCES tag(id) ON DELETE CASCADE,
    PRIMARY KEY (item_id, tag_id)
);
CREATE INDEX index_item_tag_tag_id ON item_tag(tag_id);
"#;

/// Tags that sit directly under the dimension's parent tag. `?1` is the
/// parent id.
const DIMENSION_TAGS: &str = "dimension_tag(id, name) AS (
    SELECT t.id, t.name FROM tag t
    JOIN tag_tag l ON l.tag_id = t.id
    WHERE l.parent_tag_id = ?1
)";

struct Dimension {
    system: SystemTag,
    /// Every name of the old value table, one row per stored value.
    source: &'static str,
    /// Inserts the new association rows, using `dimension_tag`.
    associate: &'static str,
    teardown: fn(&rusqlite::Transaction<'_>) -> Result<()>,
}

/// Processing order matters: producer and category reach their items through
/// `item.product_id`, so the product dimension goes last.
const DIMENSIONS: [Dimension; 5] = [
    Dimension {
        system: SystemTag::Shop,
        source: "SELECT id, name FROM shop",
        associate: "INSERT OR IGNORE INTO transaction_tag (transaction_id, tag_id)
            SELECT tb.id, dt.id FROM transaction_base tb
            JOIN shop s ON s.id = tb.shop_id
            JOIN dimension_tag dt ON dt.name = s.name
            ORDER BY tb.id",
        teardown: drop_shop,
    },
    Dimension {
        system: SystemTag::Variant,
        source: "SELECT id, name FROM product_variant",
        associate: "INSERT OR IGNORE INTO item_tag (item_id, tag_id)
            SELECT i.id, dt.id FROM item i
            JOIN product_variant v ON v.id = i.variant_id
            JOIN dimension_tag dt ON dt.name = v.name
            ORDER BY i.id",
        teardown: drop_variant,
    },
    Dimension {
        system: SystemTag::Producer,
        source: "SELECT id, name FROM product_producer",
        associate: "INSERT OR IGNORE INTO item_tag (item_id, tag_id)
            SELECT i.id, dt.id FROM item i
            JOIN product p ON p.id = i.product_id
            JOIN product_producer pp ON pp.id = p.producer_id
            JOIN dimension_tag dt ON dt.name = pp.name
            ORDER BY i.id",
        teardown: drop_producer,
    },
    Dimension {
        system: SystemTag::Category,
        source: "SELECT id, name FROM product_category",
        associate: "INSERT OR IGNORE INTO item_tag (item_id, tag_id)
            SELECT i.id, dt.id FROM item i
            JOIN product p ON p.id = i.product_id
            JOIN product_category pc ON pc.id = p.category_id
            JOIN dimension_tag dt ON dt.name = pc.name
            ORDER BY i.id",
        teardown: drop_category,
    },
    Dimension {
        system: SystemTag::Product,
        source: "SELECT id, name FROM product",
        associate: "INSERT OR IGNORE INTO item_tag (item_id, tag_id)
            SELECT i.id, dt.id FROM item i
            JOIN product p ON p.id = i.product_id
            JOIN dimension_tag dt ON dt.name = p.name
            ORDER BY i.id",
        teardown: drop_product,
    },
];

fn unify_tags(tx: &rusqlite::Transaction<'_>) -> Result<()> {
    tx.execute_batch(TAG_TABLES)?;
    for dimension in &DIMENSIONS {
        dimension
            .apply(tx)
            .with_context(|| format!("Failed to fold {} into tags", dimension.system))?;
    }
    Ok(())
}

impl Dimension {
    fn apply(&self, tx: &rusqlite::Transaction<'_>) -> Result<()> {
        let parent = self.system.id();

        // 1. the reserved parent tag
        tx.execute(
            "INSERT INTO tag (id, name, color_ordinal) VALUES (?1, ?2, ?3)",
            params![parent, self.system.as_str(), self.system.color_ordinal()],
        )?;

        // 2. one tag per distinct value, in first-stored order
        let watermark: i64 = tx.query_row("SELECT MAX(id) FROM tag", [], |row| row.get(0))?;
        tx.execute(
            &format!(
                "INSERT INTO tag (name)
                 SELECT name FROM ({source}) GROUP BY name ORDER BY MIN(id)",
                source = self.source
            ),
            [],
        )?;

        // 3. hang the new tags under the parent, skipping ids already linked
        tx.execute(
            "INSERT INTO tag_tag (tag_id, parent_tag_id)
             SELECT id, ?1 FROM tag
             WHERE id > ?2 AND id NOT IN (SELECT tag_id FROM tag_tag)
             ORDER BY id",
            params![parent, watermark],
        )?;

        // 4. carry the associations over by name
        let associated = tx.execute(
            &format!("WITH {DIMENSION_TAGS} {}", self.associate),
            params![parent],
        )?;

        // 5. drop tags nothing ended up pointing at
        let unused = "SELECT id FROM tag
             WHERE id > ?1
               AND id NOT IN (SELECT tag_id FROM transaction_tag)
               AND id NOT IN (SELECT tag_id FROM item_tag)";
        tx.execute(
            &format!("DELETE FROM tag_tag WHERE tag_id IN ({unused})"),
            params![watermark],
        )?;
        let removed = tx.execute(
            &format!("DELETE FROM tag WHERE id IN ({unused})"),
            params![watermark],
        )?;

        // 6. drop the old column and table
        (self.teardown)(tx)?;

        debug!(
            dimension = %self.system,
            associated,
            removed,
            "folded dimension into tags"
        );
        Ok(())
    }
}

fn drop_shop(tx: &rusqlite::Transaction<'_>) -> Result<()> {
    Rebuild {
        table: "transaction_base",
        definition: "
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            date       INTEGER NOT NULL,
            total_cost INTEGER NOT NULL,
            note       TEXT",
        columns: &[
            ("id", "id"),
            ("date", "date"),
            ("total_cost", "total_cost"),
            ("note", "note"),
        ],
        indices: &["CREATE INDEX index_transaction_base_date ON transaction_base(date)"],
    }
    .apply(tx)?;
    tx.execute_batch("DROP TABLE shop;")?;
    Ok(())
}

fn drop_variant(tx: &rusqlite::Transaction<'_>) -> Result<()> {
    Rebuild {
        table: "item",
        definition: "
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            transaction_id INTEGER NOT NULL REFERENCES transaction_base(id) ON DELETE CASCADE,
            product_id     INTEGER NOT NULL REFERENCES product(id),
            quantity       INTEGER NOT NULL,
            price          INTEGER NOT NULL",
        columns: &[
            ("id", "id"),
            ("transaction_id", "transaction_id"),
            ("product_id", "product_id"),
            ("quantity", "quantity"),
            ("price", "price"),
        ],
        indices: &[
            "CREATE INDEX index_item_transaction_id ON item(transaction_id)",
            "CREATE INDEX index_item_product_id ON item(product_id)",
        ],
    }
    .apply(tx)?;
    tx.execute_batch("DROP TABLE product_variant;")?;
    Ok(())
}

fn drop_producer(tx: &rusqlite::Transaction<'_>) -> Result<()> {
    Rebuild {
        table: "product",
        definition: "
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            category_id INTEGER NOT NULL REFERENCES product_category(id) ON DELETE RESTRICT,
            name        TEXT NOT NULL",
        columns: &[("id", "id"), ("category_id", "category_id"), ("name", "name")],
        indices: &["CREATE INDEX index_product_category_id ON product(category_id)"],
    }
    .apply(tx)?;
    tx.execute_batch("DROP TABLE product_producer;")?;
    Ok(())
}

fn drop_category(tx: &rusqlite::Transaction<'_>) -> Result<()> {
    Rebuild {
        table: "product",
        definition: "
            id   INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL",
        columns: &[("id", "id"), ("name", "name")],
        indices: &[],
    }
    .apply(tx)?;
    tx.execute_batch("DROP TABLE product_category;")?;
    Ok(())
}

fn drop_product(tx: &rusqlite::Transaction<'_>) -> Result<()> {
    Rebuild {
        table: "item",
        definition: "
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            transaction_id INTEGER NOT NULL REFERENCES transaction_base(id) ON DELETE CASCADE,
            quantity       INTEGER NOT NULL,
            price          INTEGER NOT NULL",
        columns: &[
            ("id", "id"),
            ("transaction_id", "transaction_id"),
            ("quantity", "quantity"),
            ("price", "price"),
        ],
        indices: &["CREATE INDEX index_item_transaction_id ON item(transaction_id)"],
    }
    .apply(tx)?;
    tx.execute_batch("DROP TABLE product;")?;
    Ok(())
}

// ── Tag graph reads ───────────────────────────────────────────

/// Read access to a store in the tag generation of the schema.
pub struct TagStore {
    conn: Connection,
}

impl TagStore {
    /// Open a store file and advance it through every migration, including
    /// the fold into tags. This is irreversible for that file.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to set database pragmas")?;
        Self::from_connection(conn)
    }

    pub(crate) fn from_connection(mut conn: Connection) -> Result<Self> {
        let version = Migrator::new(migrations::all())
            .run(&mut conn)
            .context("Database migration failed")?;
        debug_assert_eq!(version, TAGGED_VERSION);
        info!(version, "opened tag store");
        Ok(Self { conn })
    }

    pub fn tags(&self) -> Result<Vec<Tag>> {
        self.query_tags("SELECT id, name, color_ordinal FROM tag ORDER BY id", [])
    }

    pub fn tag(&self, id: i64) -> Result<Option<Tag>> {
        Ok(self
            .query_tags(
                "SELECT id, name, color_ordinal FROM tag WHERE id = ?1",
                params![id],
            )?
            .pop())
    }

    /// Direct sub-tags of `parent`.
    pub fn children(&self, parent: i64) -> Result<Vec<Tag>> {
        self.query_tags(
            "SELECT t.id, t.name, t.color_ordinal FROM tag t
             JOIN tag_tag l ON l.tag_id = t.id
             WHERE l.parent_tag_id = ?1
             ORDER BY t.id",
            params![parent],
        )
    }

    pub fn parents(&self, tag_id: i64) -> Result<Vec<Tag>> {
        self.query_tags(
            "SELECT t.id, t.name, t.color_ordinal FROM tag t
             JOIN tag_tag l ON l.parent_tag_id = t.id
             WHERE l.tag_id = ?1
             ORDER BY t.id",
            params![tag_id],
        )
    }

    pub fn transaction_tags(&self, transaction_id: i64) -> Result<Vec<Tag>> {
        self.query_tags(
            "SELECT t.id, t.name, t.color_ordinal FROM tag t
             JOIN transaction_tag x ON x.tag_id = t.id
             WHERE x.transaction_id = ?1
             ORDER BY t.id",
            params![transaction_id],
        )
    }

    pub fn item_tags(&self, item_id: i64) -> Result<Vec<Tag>> {
        self.query_tags(
            "SELECT t.id, t.name, t.color_ordinal FROM tag t
             JOIN item_tag x ON x.tag_id = t.id
             WHERE x.item_id = ?1
             ORDER BY t.id",
            params![item_id],
        )
    }

    /// The dimension a tag was created for, if it is one of the folded values.
    pub fn dimension_of(&self, tag_id: i64) -> Result<Option<SystemTag>> {
        Ok(self
            .parents(tag_id)?
            .iter()
            .find_map(|p| SystemTag::from_id(p.id)))
    }

    fn query_tags<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Tag>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok(Tag {
                id: row.get(0)?,
                name: row.get(1)?,
                color_ordinal: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
#[path = "tags_tests.rs"]
mod tests;
