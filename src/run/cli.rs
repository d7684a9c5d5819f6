use anyhow::Result;
use chrono::Utc;
use std::path::Path;

use super::Printer;
use crate::backup::{list_backups, Backup};
use crate::config::Config;
use crate::db::{Database, Dimension, Granularity, SeriesFilter, SeriesQuery, TagStore};
use crate::export::{export, ExportFormat, ExportOptions};
use crate::import::import_dir;
use crate::models::Price;
use crate::progress::CancelFlag;

pub fn as_cli(args: &[String], config: &Config) -> Result<()> {
    let Some(command) = args.get(1) else {
        print_usage();
        return Ok(());
    };
    let rest = &args[2..];
    match command.as_str() {
        "stats" | "s" => cli_stats(config),
        "series" => cli_series(rest, config),
        "totals" => cli_totals(rest, config),
        "backup" => cli_backup(config),
        "backups" => cli_backups(config),
        "restore" => cli_restore(rest, config),
        "export" => cli_export(rest, config),
        "import" => cli_import(rest, config),
        "tag-upgrade" => cli_tag_upgrade(rest, config),
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        "--version" | "-V" | "version" => {
            println!("arru {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => {
            print_usage();
            anyhow::bail!("Unknown command: {other}");
        }
    }
}

fn print_usage() {
    println!("Arru: receipt and expense tracker storage");
    println!();
    println!("Usage: arru [command]");
    println!();
    println!("Commands:");
    println!("  stats                         Transaction count and total spending");
    println!("  series <day|week|month|year>  Zero-filled spending series");
    println!("    --shop|--category|--producer|--product <id>");
    println!("                                Restrict the series to one entity");
    println!("  totals <shop|category|producer|product>");
    println!("                                Spending per entity, largest first");
    println!("  backup                        Copy the store into the backup directory");
    println!("  backups                       List backups, newest first");
    println!("  restore <file>                Replace the store with a backup");
    println!("  export <dir>                  Export the store");
    println!("    --format <raw|csv|json>     Export format (default: csv)");
    println!("  import <dir>                  Import an export directory");
    println!("  tag-upgrade <target.db>       Write a copy of the store folded into tags");
    println!("  --help, -h                    Show this help");
    println!("  --version, -V                 Show version");
}

fn open(config: &Config) -> Result<Database> {
    config.ensure_dirs()?;
    Database::open(&config.db_path)
}

/// Value following `flag`, e.g. `--format csv`.
fn flag<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

/// First argument that is not a flag or a flag's value.
fn positional(args: &[String]) -> Option<&str> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg.starts_with("--") {
            iter.next();
        } else {
            return Some(arg);
        }
    }
    None
}

fn cli_stats(config: &Config) -> Result<()> {
    let db = open(config)?;
    let stats = db.stats()?;
    println!("Arru: {}", config.db_path.display());
    println!("{}", "─".repeat(40));
    println!("  Schema:       v{}", db.schema_version()?);
    println!("  Transactions: {}", stats.transactions);
    println!("  Spending:     {}", Price(stats.spending));
    Ok(())
}

fn cli_series(args: &[String], config: &Config) -> Result<()> {
    let usage = "Usage: arru series <day|week|month|year> [--shop|--category|--producer|--product <id>]";
    let granularity = positional(args)
        .and_then(Granularity::parse)
        .ok_or_else(|| anyhow::anyhow!(usage))?;

    let mut filter = SeriesFilter::All;
    for (name, make) in [
        ("--shop", SeriesFilter::Shop as fn(i64) -> SeriesFilter),
        ("--category", SeriesFilter::Category),
        ("--producer", SeriesFilter::Producer),
        ("--product", SeriesFilter::Product),
    ] {
        if let Some(raw) = flag(args, name) {
            let id = raw
                .parse()
                .map_err(|_| anyhow::anyhow!("{name} expects an id, got '{raw}'"))?;
            filter = make(id);
        }
    }

    let db = open(config)?;
    let series = db.spending_series(&SeriesQuery::new(granularity, filter), Utc::now())?;
    if series.is_empty() {
        println!("No spending");
        return Ok(());
    }
    let format = match granularity {
        Granularity::Day | Granularity::Week => "%Y-%m-%d",
        Granularity::Month => "%Y-%m",
        Granularity::Year => "%Y",
    };
    for point in &series {
        let label = point
            .bucket_time()
            .map(|t| t.format(format).to_string())
            .unwrap_or_else(|| point.bucket.to_string());
        println!("  {label:<12} {:>12}", Price(point.total).to_string());
    }
    Ok(())
}

fn cli_totals(args: &[String], config: &Config) -> Result<()> {
    let dimension = match positional(args) {
        Some("shop") => Dimension::Shop,
        Some("category") => Dimension::Category,
        Some("producer") => Dimension::Producer,
        Some("product") => Dimension::Product,
        _ => anyhow::bail!("Usage: arru totals <shop|category|producer|product>"),
    };
    let db = open(config)?;
    let totals = db.spending_by(dimension)?;
    if totals.is_empty() {
        println!("No spending");
        return Ok(());
    }
    for row in &totals {
        println!("  {:<24} {:>12}", row.name, Price(row.total).to_string());
    }
    Ok(())
}

fn cli_backup(config: &Config) -> Result<()> {
    let db = open(config)?;
    let backup = db.backup_to(&config.backup_dir, Utc::now())?;
    println!("Backed up to {}", backup.path.display());
    Ok(())
}

fn cli_backups(config: &Config) -> Result<()> {
    let backups = list_backups(&config.backup_dir)?;
    if backups.is_empty() {
        println!("No backups in {}", config.backup_dir.display());
        return Ok(());
    }
    println!("{:<20} {:>8} {:>12}  File", "Taken", "Txns", "Spending");
    println!("{}", "─".repeat(60));
    for backup in &backups {
        let taken = backup
            .stamp
            .date_time()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        let file = backup
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!(
            "{taken:<20} {:>8} {:>12}  {file}",
            backup.stamp.total_transactions,
            Price(backup.stamp.total_spending).to_string()
        );
    }
    Ok(())
}

fn cli_restore(args: &[String], config: &Config) -> Result<()> {
    let Some(file) = positional(args) else {
        anyhow::bail!("Usage: arru restore <file>");
    };
    // A bare name refers to the backup directory.
    let path = Path::new(file);
    let path = if path.exists() {
        path.to_path_buf()
    } else {
        config.backup_dir.join(file)
    };
    let backup = Backup::from_path(&path)?;
    if !backup.path.exists() {
        anyhow::bail!("File not found: {}", backup.path.display());
    }

    let db = open(config)?;
    let live = db.restore(&backup)?;
    let db = Database::open(&live)?;
    println!(
        "Restored {} ({} transactions)",
        backup.path.display(),
        db.stats()?.transactions
    );
    Ok(())
}

fn cli_export(args: &[String], config: &Config) -> Result<()> {
    let Some(dir) = positional(args) else {
        anyhow::bail!("Usage: arru export <dir> [--format raw|csv|json]");
    };
    let format = match flag(args, "--format") {
        Some(raw) => ExportFormat::parse(raw)
            .ok_or_else(|| anyhow::anyhow!("Unknown export format: {raw}"))?,
        None => ExportFormat::CompactCsv,
    };
    let options = ExportOptions {
        format,
        batch_size: config.export_batch_size,
    };

    let db = open(config)?;
    let summary = export(
        &db,
        Path::new(dir),
        &options,
        &mut Printer::new("export"),
        &CancelFlag::new(),
    )?;
    println!("Exported {} rows to {dir}", summary.rows);
    for file in &summary.files {
        println!("  {}", file.display());
    }
    Ok(())
}

fn cli_import(args: &[String], config: &Config) -> Result<()> {
    let Some(dir) = positional(args) else {
        anyhow::bail!("Usage: arru import <dir>");
    };
    let path = Path::new(dir);
    if !path.is_dir() {
        anyhow::bail!("Not a directory: {dir}");
    }

    let mut db = open(config)?;
    let summary = import_dir(
        &mut db,
        path,
        &mut Printer::new("import"),
        &CancelFlag::new(),
    )?;
    println!(
        "Imported {} transactions, {} items and {} names from {} file(s)",
        summary.transactions,
        summary.items,
        summary.names,
        summary.files.len()
    );
    Ok(())
}

fn cli_tag_upgrade(args: &[String], config: &Config) -> Result<()> {
    let Some(target) = positional(args) else {
        anyhow::bail!("Usage: arru tag-upgrade <target.db>");
    };
    let target = Path::new(target);

    let db = open(config)?;
    db.snapshot_to(target)?;
    drop(db);

    let tags = TagStore::open(target)?;
    println!(
        "Wrote {} with {} tags",
        target.display(),
        tags.tags()?.len()
    );
    Ok(())
}
