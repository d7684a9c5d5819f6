/// The first on-disk generation: money as REAL, every variant bound to a
/// product, item references restricted.
pub(crate) const SCHEMA_V1: &str = r#"
CREATE TABLE shop (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL
);
CREATE UNIQUE INDEX index_shop_name ON shop(name);

CREATE TABLE product_producer (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL
);
CREATE UNIQUE INDEX index_product_producer_name ON product_producer(name);

CREATE TABLE product_category (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL
);

CREATE TABLE product (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    category_id INTEGER NOT NULL REFERENCES product_category(id) ON DELETE RESTRICT,
    producer_id INTEGER REFERENCES product_producer(id) ON DELETE RESTRICT,
    name        TEXT NOT NULL
);
CREATE UNIQUE INDEX index_product_producer_id_name ON product(producer_id, name);
CREATE INDEX index_product_category_id ON product(category_id);

CREATE TABLE product_variant (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    product_id INTEGER NOT NULL REFERENCES product(id) ON DELETE RESTRICT,
    name       TEXT NOT NULL
);
CREATE INDEX index_product_variant_product_id ON product_variant(product_id);

CREATE TABLE transaction_base (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    date       INTEGER NOT NULL,
    shop_id    INTEGER REFERENCES shop(id) ON DELETE SET NULL,
    total_cost REAL NOT NULL
);

CREATE TABLE item (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    transaction_id INTEGER NOT NULL REFERENCES transaction_base(id) ON DELETE CASCADE,
    product_id     INTEGER NOT NULL REFERENCES product(id) ON DELETE RESTRICT,
    variant_id     INTEGER REFERENCES product_variant(id) ON DELETE RESTRICT,
    quantity       REAL NOT NULL,
    price          REAL NOT NULL
);
"#;

// ── v2: scaled integer money ──────────────────────────────────

pub(crate) const TRANSACTION_V2: &str = "
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    date       INTEGER NOT NULL,
    shop_id    INTEGER REFERENCES shop(id) ON DELETE SET NULL,
    total_cost INTEGER NOT NULL";

pub(crate) const ITEM_V2: &str = "
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    transaction_id INTEGER NOT NULL REFERENCES transaction_base(id) ON DELETE CASCADE,
    product_id     INTEGER NOT NULL REFERENCES product(id) ON DELETE RESTRICT,
    variant_id     INTEGER REFERENCES product_variant(id) ON DELETE RESTRICT,
    quantity       INTEGER NOT NULL,
    price          INTEGER NOT NULL";

// ── v3: global variants, relaxed item references ──────────────

pub(crate) const VARIANT_V3: &str = "
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    product_id INTEGER REFERENCES product(id) ON DELETE RESTRICT,
    name       TEXT NOT NULL";

pub(crate) const ITEM_V3: &str = "
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    transaction_id INTEGER NOT NULL REFERENCES transaction_base(id) ON DELETE CASCADE,
    product_id     INTEGER NOT NULL REFERENCES product(id),
    variant_id     INTEGER REFERENCES product_variant(id) ON DELETE SET NULL,
    quantity       INTEGER NOT NULL,
    price          INTEGER NOT NULL";

// ── v4: notes and lookup indices ──────────────────────────────

pub(crate) const NOTES_AND_INDICES_V4: &str = "
ALTER TABLE transaction_base ADD COLUMN note TEXT;
CREATE INDEX index_transaction_base_date ON transaction_base(date);
CREATE INDEX index_transaction_base_shop_id ON transaction_base(shop_id);
CREATE INDEX index_item_transaction_id ON item(transaction_id);
CREATE INDEX index_item_product_id ON item(product_id);
CREATE INDEX index_item_variant_id ON item(variant_id);
";

/// SQLite's `TRIM` only strips spaces by default; match `str::trim` for the
/// common whitespace characters.
pub(crate) const WHITESPACE: &str = "' ' || char(9) || char(10) || char(13)";

/// Value of an item row in price units, rounded half up.
/// Keep in sync with `models::line_value`.
pub(crate) const ITEM_VALUE_SQL: &str = "((i.price * i.quantity + 500) / 1000)";

pub const CURRENT_VERSION: u32 = 5;
pub const TAGGED_VERSION: u32 = 6;
