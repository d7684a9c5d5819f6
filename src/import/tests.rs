#![allow(clippy::unwrap_used)]

use rust_decimal_macros::dec;
use std::fs;

use super::*;
use crate::export::{export, ExportFormat, ExportOptions, COMPACT_HEADER};
use crate::models::*;
use crate::progress::{Cancelled, Silent};

const DAY: i64 = 86_400_000;

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

fn compact(rows: &[&str]) -> String {
    let mut text = format!("{COMPACT_HEADER}\n");
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    text
}

fn import(db: &mut Database, dir: &Path) -> Result<ImportSummary> {
    import_dir(db, dir, &mut Silent, &CancelFlag::new())
}

fn count(db: &Database, table: &str) -> i64 {
    db.conn()
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .unwrap()
}

fn seeded() -> Database {
    let mut db = Database::open_in_memory().unwrap();
    let shop = db.insert_shop("Corner Shop").unwrap();
    let food = db.insert_category("Food").unwrap();
    let dairy = db.insert_producer("Dairy Co").unwrap();
    let milk = db
        .insert_product(&Product::new("Milk".into(), food, Some(dairy)))
        .unwrap();
    let large = db.insert_variant(&Variant::global("Large".into())).unwrap();
    let small = db
        .insert_variant(&Variant::new("Small".into(), Some(milk)))
        .unwrap();

    let mut a = Item::new(0, milk, Quantity(2000), Price(125));
    a.variant_id = Some(large);
    let mut b = Item::new(0, milk, Quantity(1500), Price(80));
    b.variant_id = Some(small);
    let mut receipt = Transaction::new(DAY, Some(shop), Price::ZERO);
    receipt.note = Some("weekly".into());
    db.save_receipt(&receipt, &[a, b]).unwrap();
    db.insert_transaction(&Transaction::new(2 * DAY, None, Price(400)))
        .unwrap();
    db
}

// ── Detection ─────────────────────────────────────────────────

#[test]
fn test_empty_directory_has_nothing_to_import() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "readme.txt", "hello");
    let mut db = Database::open_in_memory().unwrap();
    let err = import(&mut db, dir.path()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ImportError>(),
        Some(ImportError::NothingToImport(_))
    ));
}

#[test]
fn test_detect_orders_documents_by_name() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "b.json", "[]");
    write(dir.path(), "a.csv", COMPACT_HEADER);
    write(dir.path(), "c.txt", "");
    let docs = detect(dir.path()).unwrap();
    let formats: Vec<ImportFormat> = docs.iter().map(|(_, f)| *f).collect();
    assert_eq!(formats, vec![ImportFormat::CompactCsv, ImportFormat::Json]);
}

#[test]
fn test_unknown_header_fails_whole_import() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.csv",
        &compact(&["1;86400000;1.00;Market;Tea;;;Drinks;;1.00;1;"]),
    );
    write(dir.path(), "b.csv", "date;amount\n1;2\n");
    let mut db = Database::open_in_memory().unwrap();

    let err = import(&mut db, dir.path()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ImportError>(),
        Some(ImportError::UnknownFormat(_))
    ));
    // a.csv was read first but nothing was kept.
    assert!(db.is_empty().unwrap());
}

// ── Compact CSV ───────────────────────────────────────────────

#[test]
fn test_rows_with_same_date_and_total_share_a_transaction() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "receipts.csv",
        &compact(&[
            "7;86400000;5.00;Market;Tea;;;Drinks;;2.00;1;",
            "8;86400000;5.00;Market;Coffee;;;Drinks;;3.00;1;",
        ]),
    );
    let mut db = Database::open_in_memory().unwrap();
    let summary = import(&mut db, dir.path()).unwrap();

    assert_eq!(summary.transactions, 1);
    assert_eq!(summary.items, 2);
    assert_eq!(count(&db, "transaction_base"), 1);
    assert_eq!(count(&db, "item"), 2);
    let txn = db.get_transactions(None, None).unwrap().remove(0);
    assert_eq!(db.get_items_by_transaction(txn.id.unwrap()).unwrap().len(), 2);
}

#[test]
fn test_names_get_one_id_each() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "receipts.csv",
        &compact(&[
            "1;86400000;2.00;Market;Tea;Green;false;Drinks;Leafy;2.00;1;",
            "2;172800000;2.00; Market ;Tea;Green;false;Drinks;Leafy;2.00;1;",
            "3;259200000;1.00;Bazaar;Tea;Big;true;Drinks;Leafy;1.00;1;",
        ]),
    );
    let mut db = Database::open_in_memory().unwrap();
    let summary = import(&mut db, dir.path()).unwrap();

    assert_eq!(summary.transactions, 3);
    assert_eq!(count(&db, "shop"), 2);
    assert_eq!(count(&db, "product"), 1);
    assert_eq!(count(&db, "product_producer"), 1);
    assert_eq!(db.get_global_variants().unwrap().len(), 1);
    assert_eq!(
        db.find_products("Tea").unwrap()[0].producer_id,
        db.find_producer("Leafy").unwrap().unwrap().id
    );
}

#[test]
fn test_bare_transaction_line_has_no_item() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "receipts.csv",
        &compact(&["1;86400000;9.99;;;;;;;;;paid cash"]),
    );
    let mut db = Database::open_in_memory().unwrap();
    import(&mut db, dir.path()).unwrap();

    let txn = db.get_transactions(None, None).unwrap().remove(0);
    assert_eq!(txn.total_cost, Price(999));
    assert_eq!(txn.shop_id, None);
    assert_eq!(txn.note.as_deref(), Some("paid cash"));
    assert_eq!(count(&db, "item"), 0);
}

#[test]
fn test_existing_names_are_reused() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Database::open_in_memory().unwrap();
    let market = db.insert_shop("Market").unwrap();
    write(
        dir.path(),
        "receipts.csv",
        &compact(&["1;86400000;2.00;Market;Tea;;;Drinks;;2.00;1;"]),
    );
    import(&mut db, dir.path()).unwrap();

    assert_eq!(count(&db, "shop"), 1);
    let txn = db.get_transactions(None, None).unwrap().remove(0);
    assert_eq!(txn.shop_id, Some(market));
}

#[test]
fn test_product_without_category_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "receipts.csv",
        &compact(&["1;86400000;2.00;Market;Tea;;;;;2.00;1;"]),
    );
    let mut db = Database::open_in_memory().unwrap();
    let err = import(&mut db, dir.path()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ImportError>(),
        Some(ImportError::MissingCategory(name)) if name == "Tea"
    ));
    assert!(db.is_empty().unwrap());
}

#[test]
fn test_cancelled_import_keeps_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "receipts.csv",
        &compact(&["1;86400000;2.00;Market;Tea;;;Drinks;;2.00;1;"]),
    );
    let mut db = Database::open_in_memory().unwrap();
    let cancel = CancelFlag::new();
    cancel.cancel();

    let err = import_dir(&mut db, dir.path(), &mut Silent, &cancel).unwrap_err();
    assert!(err.downcast_ref::<Cancelled>().is_some());
    assert!(db.is_empty().unwrap());
}

// ── Round trips ───────────────────────────────────────────────

fn export_to(db: &Database, dir: &Path, format: ExportFormat) {
    export(
        db,
        dir,
        &ExportOptions {
            format,
            batch_size: 1,
        },
        &mut Silent,
        &CancelFlag::new(),
    )
    .unwrap();
}

fn assert_same_receipts(a: &Database, b: &Database) {
    let left = a.get_transactions(None, None).unwrap();
    let right = b.get_transactions(None, None).unwrap();
    assert_eq!(left.len(), right.len());
    for (l, r) in left.iter().zip(&right) {
        assert_eq!((l.date, l.total_cost, &l.note), (r.date, r.total_cost, &r.note));
        let ld = a.transaction_details(l.id.unwrap()).unwrap().unwrap();
        let rd = b.transaction_details(r.id.unwrap()).unwrap().unwrap();
        assert_eq!(
            ld.shop.as_ref().map(|s| &s.name),
            rd.shop.as_ref().map(|s| &s.name)
        );
        let names = |d: &TransactionDetails| -> Vec<(String, Option<String>, Price, Quantity)> {
            d.items
                .iter()
                .map(|i| {
                    (
                        i.product.name.clone(),
                        i.variant.as_ref().map(|v| v.name.clone()),
                        i.item.price,
                        i.item.quantity,
                    )
                })
                .collect()
        };
        assert_eq!(names(&ld), names(&rd));
    }
}

#[test]
fn test_compact_csv_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let source = seeded();
    export_to(&source, dir.path(), ExportFormat::CompactCsv);

    let mut target = Database::open_in_memory().unwrap();
    import(&mut target, dir.path()).unwrap();
    assert_same_receipts(&source, &target);
    assert_eq!(target.get_global_variants().unwrap().len(), 1);
}

#[test]
fn test_json_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let source = seeded();
    export_to(&source, dir.path(), ExportFormat::Json);

    let mut target = Database::open_in_memory().unwrap();
    let summary = import(&mut target, dir.path()).unwrap();
    assert_eq!(summary.transactions, 2);
    assert_eq!(summary.items, 2);
    assert_same_receipts(&source, &target);
}

#[test]
fn test_same_receipts_in_two_documents_are_imported_once() {
    let dir = tempfile::tempdir().unwrap();
    let source = seeded();
    export_to(&source, dir.path(), ExportFormat::CompactCsv);
    export_to(&source, dir.path(), ExportFormat::Json);

    let mut target = Database::open_in_memory().unwrap();
    let summary = import(&mut target, dir.path()).unwrap();
    assert_eq!(summary.files.len(), 2);
    assert_eq!(summary.transactions, 2);
    assert_eq!(summary.items, 2);
    assert_eq!(count(&target, "item"), 2);
    assert_same_receipts(&source, &target);
}

#[test]
fn test_reimport_adds_no_items_to_existing_receipts() {
    let dir = tempfile::tempdir().unwrap();
    let source = seeded();
    export_to(&source, dir.path(), ExportFormat::CompactCsv);

    let mut target = Database::open_in_memory().unwrap();
    import(&mut target, dir.path()).unwrap();
    let again = import(&mut target, dir.path()).unwrap();

    assert_eq!(again.transactions, 0);
    assert_eq!(again.items, 0);
    assert_eq!(count(&target, "transaction_base"), 2);
    assert_eq!(count(&target, "item"), 2);
    for txn in target.get_transactions(None, None).unwrap() {
        let details = target.transaction_details(txn.id.unwrap()).unwrap().unwrap();
        if !details.items.is_empty() {
            assert_eq!(details.items_total().unwrap(), txn.total_cost);
        }
    }
}

#[test]
fn test_json_import_of_hand_written_document() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "receipt.json",
        r#"[{"date": 86400000, "totalCost": "3.50", "shop": {"name": "Kiosk"},
             "items": [{"price": "3.50", "quantity": "1",
                        "product": {"name": "Paper", "category": {"name": "News"}}}]}]"#,
    );
    let mut db = Database::open_in_memory().unwrap();
    import(&mut db, dir.path()).unwrap();

    let txn = db.get_transactions(None, None).unwrap().remove(0);
    assert_eq!(txn.total_cost.actual(), dec!(3.50));
    let details = db.transaction_details(txn.id.unwrap()).unwrap().unwrap();
    assert_eq!(details.items[0].category.name, "News");
    assert_eq!(details.items[0].producer, None);
}

#[test]
fn test_raw_round_trip_keeps_ids() {
    let dir = tempfile::tempdir().unwrap();
    let source = seeded();
    source.delete_transaction(1).unwrap();
    export_to(&source, dir.path(), ExportFormat::Raw);

    let mut target = Database::open_in_memory().unwrap();
    let summary = import(&mut target, dir.path()).unwrap();
    assert_eq!(summary.transactions, 1);
    assert_eq!(
        source.get_transactions(None, None).unwrap(),
        target.get_transactions(None, None).unwrap()
    );
    assert_eq!(source.get_variant(2).unwrap(), target.get_variant(2).unwrap());

    // New rows continue after the restored ids.
    let next = target
        .insert_transaction(&Transaction::new(0, None, Price::ZERO))
        .unwrap();
    assert_eq!(next, 3);
}

#[test]
fn test_raw_import_needs_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let source = seeded();
    export_to(&source, dir.path(), ExportFormat::Raw);

    let mut target = Database::open_in_memory().unwrap();
    target.insert_shop("Already here").unwrap();
    let err = import(&mut target, dir.path()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ImportError>(),
        Some(ImportError::StoreNotEmpty)
    ));
}

#[test]
fn test_raw_import_needs_every_table() {
    let dir = tempfile::tempdir().unwrap();
    let source = seeded();
    export_to(&source, dir.path(), ExportFormat::Raw);
    fs::remove_file(dir.path().join("item.csv")).unwrap();

    let mut db = Database::open_in_memory().unwrap();
    let err = import(&mut db, dir.path()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ImportError>(),
        Some(ImportError::MissingRawFile(name)) if name == "item.csv"
    ));
}
