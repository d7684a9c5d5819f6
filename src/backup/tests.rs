#![allow(clippy::unwrap_used)]

use chrono::TimeZone;

use super::*;
use crate::models::{Price, Transaction};

fn at(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).unwrap()
}

fn store(dir: &Path) -> Database {
    Database::open(&dir.join("arru.db")).unwrap()
}

// ── File names ────────────────────────────────────────────────

#[test]
fn test_stamp_round_trip() {
    for stamp in [
        BackupStamp {
            total_transactions: 0,
            total_spending: 0,
            time: 0,
        },
        BackupStamp {
            total_transactions: 1234,
            total_spending: 98_765_432,
            time: 1_700_000_000_123,
        },
    ] {
        assert_eq!(BackupStamp::parse(&stamp.file_name()), Some(stamp));
    }
}

#[test]
fn test_file_name_layout() {
    let stamp = BackupStamp {
        total_transactions: 3,
        total_spending: 1150,
        time: 42,
    };
    assert_eq!(stamp.file_name(), "bak_arru_db_3_1150_42.db");
}

#[test]
fn test_malformed_names_do_not_parse() {
    for name in [
        "bak_arru_db_3_1150.db",
        "bak_arru_db_3_1150_42.db-wal",
        "bak_arru_db_a_1150_42.db",
        "backup.db",
        "bak_arru_db_3_1150_42_7.db",
    ] {
        assert_eq!(BackupStamp::parse(name), None, "{name}");
    }
}

#[test]
fn test_name_pattern_compiles() {
    assert!(NAME_PATTERN.is_some());
}

// ── Backup and restore ────────────────────────────────────────

#[test]
fn test_backup_is_stamped_with_stats() {
    let dir = tempfile::tempdir().unwrap();
    let db = store(dir.path());
    db.insert_transaction(&Transaction::new(0, None, Price(1150)))
        .unwrap();

    let backup = db.backup_to(&dir.path().join("backups"), at(5_000)).unwrap();
    assert!(backup.path.exists());
    assert_eq!(
        backup.stamp,
        BackupStamp {
            total_transactions: 1,
            total_spending: 1150,
            time: 5_000
        }
    );
    assert_eq!(Backup::from_path(&backup.path).unwrap(), backup);
}

#[test]
fn test_in_memory_store_cannot_back_up() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_in_memory().unwrap();
    assert!(db.backup_to(dir.path(), at(0)).is_err());
}

#[test]
fn test_list_backups_newest_first_skipping_junk() {
    let dir = tempfile::tempdir().unwrap();
    let backups = dir.path().join("backups");
    let db = store(dir.path());
    db.backup_to(&backups, at(1_000)).unwrap();
    db.insert_transaction(&Transaction::new(0, None, Price(5)))
        .unwrap();
    db.backup_to(&backups, at(2_000)).unwrap();
    fs::write(backups.join("bak_arru_db_broken.db"), b"junk").unwrap();
    fs::write(backups.join("notes.txt"), b"junk").unwrap();

    let listed = list_backups(&backups).unwrap();
    let times: Vec<i64> = listed.iter().map(|b| b.stamp.time).collect();
    assert_eq!(times, vec![2_000, 1_000]);
    assert_eq!(listed[0].stamp.total_transactions, 1);
}

#[test]
fn test_list_missing_directory_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    assert!(list_backups(&dir.path().join("nowhere")).unwrap().is_empty());
}

#[test]
fn test_duplicate_backup_refused() {
    let dir = tempfile::tempdir().unwrap();
    let db = store(dir.path());
    db.backup_to(dir.path(), at(1)).unwrap();
    assert!(db.backup_to(dir.path(), at(1)).is_err());
}

#[test]
fn test_delete_backup() {
    let dir = tempfile::tempdir().unwrap();
    let backups = dir.path().join("backups");
    let db = store(dir.path());
    let backup = db.backup_to(&backups, at(1)).unwrap();

    delete_backup(&backup).unwrap();
    assert!(!backup.path.exists());
    assert!(list_backups(&backups).unwrap().is_empty());
}

#[test]
fn test_restore_brings_back_old_state() {
    let dir = tempfile::tempdir().unwrap();
    let backups = dir.path().join("backups");
    let db = store(dir.path());
    db.insert_shop("Market").unwrap();
    let backup = db.backup_to(&backups, at(1)).unwrap();

    db.insert_shop("Bazaar").unwrap();
    db.insert_transaction(&Transaction::new(0, None, Price(100)))
        .unwrap();

    let path = db.restore(&backup).unwrap();
    let reopened = Database::open(&path).unwrap();
    let shops: Vec<String> = reopened
        .get_shops()
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(shops, vec!["Market"]);
    assert_eq!(reopened.get_transaction_count().unwrap(), 0);
}

#[test]
fn test_snapshot_of_in_memory_store() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_in_memory().unwrap();
    db.insert_shop("Market").unwrap();
    let target = dir.path().join("copy.db");

    db.snapshot_to(&target).unwrap();
    let copy = Database::open(&target).unwrap();
    assert_eq!(copy.get_shops().unwrap().len(), 1);
    assert!(db.snapshot_to(&target).is_err());
}
