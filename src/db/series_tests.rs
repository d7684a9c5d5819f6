#![allow(clippy::unwrap_used)]

use super::*;
use crate::models::{Item, Price, Product, Quantity, Transaction};

fn at(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).unwrap()
}

fn ymd(y: i32, m: u32, d: u32) -> i64 {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0)
        .unwrap()
        .timestamp_millis()
}

fn month_start(y: i32, m: u32) -> i64 {
    Utc.with_ymd_and_hms(y, m, 1, 0, 0, 0)
        .unwrap()
        .timestamp_millis()
}

fn spend(db: &Database, date: i64, total: i64) -> i64 {
    db.insert_transaction(&Transaction::new(date, None, Price(total)))
        .unwrap()
}

fn points(series: &[SeriesPoint]) -> Vec<(i64, i64)> {
    series.iter().map(|p| (p.bucket, p.total)).collect()
}

fn all(g: Granularity) -> SeriesQuery {
    SeriesQuery::new(g, SeriesFilter::All)
}

// ── Day buckets ───────────────────────────────────────────────

#[test]
fn test_day_series_fills_gaps_with_zero() {
    let db = Database::open_in_memory().unwrap();
    spend(&db, 0, 500);
    spend(&db, 2 * DAY_MS, 300);

    let series = db
        .spending_series(&all(Granularity::Day), at(2 * DAY_MS))
        .unwrap();
    assert_eq!(
        points(&series),
        vec![(0, 500), (DAY_MS, 0), (2 * DAY_MS, 300)]
    );
}

#[test]
fn test_day_series_sums_within_bucket() {
    let db = Database::open_in_memory().unwrap();
    spend(&db, 1_000, 100);
    spend(&db, DAY_MS - 1, 250);

    let series = db
        .spending_series(&all(Granularity::Day), at(DAY_MS - 1))
        .unwrap();
    assert_eq!(points(&series), vec![(0, 350)]);
}

#[test]
fn test_series_runs_up_to_now() {
    let db = Database::open_in_memory().unwrap();
    spend(&db, DAY_MS + 5, 100);

    let series = db
        .spending_series(&all(Granularity::Day), at(4 * DAY_MS + 10))
        .unwrap();
    assert_eq!(series.len(), 4);
    assert_eq!(series[0], SeriesPoint { bucket: DAY_MS, total: 100 });
    assert!(series[1..].iter().all(|p| p.total == 0));
    // Strictly ascending, one bucket apart.
    assert!(series
        .windows(2)
        .all(|w| w[1].bucket - w[0].bucket == DAY_MS));
}

#[test]
fn test_empty_store_gives_empty_series() {
    let db = Database::open_in_memory().unwrap();
    for g in [
        Granularity::Day,
        Granularity::Week,
        Granularity::Month,
        Granularity::Year,
    ] {
        assert!(db.spending_series(&all(g), at(DAY_MS)).unwrap().is_empty());
    }
}

#[test]
fn test_future_receipt_still_yields_its_bucket() {
    let db = Database::open_in_memory().unwrap();
    spend(&db, 10 * DAY_MS, 100);
    let series = db.spending_series(&all(Granularity::Day), at(0)).unwrap();
    assert_eq!(points(&series), vec![(10 * DAY_MS, 100)]);
}

#[test]
fn test_pre_epoch_dates_fall_in_their_own_day() {
    let db = Database::open_in_memory().unwrap();
    spend(&db, -DAY_MS, 50);
    spend(&db, -1, 100);
    spend(&db, 0, 10);

    let series = db.spending_series(&all(Granularity::Day), at(0)).unwrap();
    assert_eq!(points(&series), vec![(-DAY_MS, 150), (0, 10)]);
}

// ── Week buckets ──────────────────────────────────────────────

#[test]
fn test_weeks_start_on_monday() {
    let db = Database::open_in_memory().unwrap();
    // 1970-01-01 was a Thursday, 1970-01-12 a Monday.
    spend(&db, 0, 100);
    spend(&db, 11 * DAY_MS, 200);

    let series = db
        .spending_series(&all(Granularity::Week), at(11 * DAY_MS))
        .unwrap();
    assert_eq!(
        points(&series),
        vec![(-3 * DAY_MS, 100), (4 * DAY_MS, 0), (11 * DAY_MS, 200)]
    );
    let monday = series[1].bucket_time().unwrap();
    assert_eq!(monday.format("%A").to_string(), "Monday");
}

#[test]
fn test_sunday_belongs_to_previous_week() {
    let db = Database::open_in_memory().unwrap();
    // Sunday 1970-01-11, late evening.
    spend(&db, 11 * DAY_MS - 1, 100);
    let series = db
        .spending_series(&all(Granularity::Week), at(11 * DAY_MS - 1))
        .unwrap();
    assert_eq!(points(&series), vec![(4 * DAY_MS, 100)]);
}

#[test]
fn test_pre_epoch_sunday_belongs_to_its_week() {
    let db = Database::open_in_memory().unwrap();
    // Sunday 1969-12-28, week starting Monday 1969-12-22.
    let sunday = ymd(1969, 12, 28);
    spend(&db, sunday, 100);
    let series = db
        .spending_series(&all(Granularity::Week), at(sunday))
        .unwrap();
    assert_eq!(points(&series), vec![(-10 * DAY_MS, 100)]);
}

// ── Calendar buckets ──────────────────────────────────────────

#[test]
fn test_month_series_is_calendar_aligned() {
    let db = Database::open_in_memory().unwrap();
    spend(&db, ymd(2024, 1, 15), 1000);
    spend(&db, ymd(2024, 1, 31), 500);
    spend(&db, ymd(2024, 3, 2), 700);

    let series = db
        .spending_series(&all(Granularity::Month), at(ymd(2024, 4, 20)))
        .unwrap();
    assert_eq!(
        points(&series),
        vec![
            (month_start(2024, 1), 1500),
            (month_start(2024, 2), 0),
            (month_start(2024, 3), 700),
            (month_start(2024, 4), 0),
        ]
    );
}

#[test]
fn test_year_series() {
    let db = Database::open_in_memory().unwrap();
    spend(&db, ymd(2021, 6, 1), 100);
    spend(&db, ymd(2023, 12, 31), 200);

    let series = db
        .spending_series(&all(Granularity::Year), at(ymd(2023, 12, 31)))
        .unwrap();
    assert_eq!(
        points(&series),
        vec![
            (month_start(2021, 1), 100),
            (month_start(2022, 1), 0),
            (month_start(2023, 1), 200),
        ]
    );
}

#[test]
fn test_last_millisecond_of_1969_is_in_december() {
    let db = Database::open_in_memory().unwrap();
    spend(&db, -1, 100);
    let series = db
        .spending_series(&all(Granularity::Month), at(-1))
        .unwrap();
    assert_eq!(points(&series), vec![(month_start(1969, 12), 100)]);
}

// ── Filters ───────────────────────────────────────────────────

#[test]
fn test_shop_series_ends_at_latest_receipt() {
    let db = Database::open_in_memory().unwrap();
    let shop = db.insert_shop("Market").unwrap();
    db.insert_transaction(&Transaction::new(0, Some(shop), Price(100)))
        .unwrap();
    db.insert_transaction(&Transaction::new(DAY_MS, Some(shop), Price(50)))
        .unwrap();
    spend(&db, 0, 999);

    let query = SeriesQuery::new(Granularity::Day, SeriesFilter::Shop(shop));
    assert_eq!(query.end, EndBound::LatestTransaction);
    let series = db.spending_series(&query, at(10 * DAY_MS)).unwrap();
    assert_eq!(points(&series), vec![(0, 100), (DAY_MS, 50)]);

    let to_now = query.ending_at(EndBound::Now);
    assert_eq!(db.spending_series(&to_now, at(10 * DAY_MS)).unwrap().len(), 11);
}

#[test]
fn test_default_end_bound() {
    assert_eq!(all(Granularity::Day).end, EndBound::Now);
    assert_eq!(
        SeriesQuery::new(Granularity::Week, SeriesFilter::Shop(1)).end,
        EndBound::LatestTransaction
    );
    assert_eq!(
        SeriesQuery::new(Granularity::Month, SeriesFilter::Shop(1)).end,
        EndBound::Now
    );
    assert_eq!(
        SeriesQuery::new(Granularity::Day, SeriesFilter::Category(1)).end,
        EndBound::Now
    );
}

#[test]
fn test_product_dimensions_sum_item_values() {
    let mut db = Database::open_in_memory().unwrap();
    let food = db.insert_category("Food").unwrap();
    let drinks = db.insert_category("Drinks").unwrap();
    let acme = db.insert_producer("Acme").unwrap();
    let bread = db
        .insert_product(&Product::new("Bread".into(), food, Some(acme)))
        .unwrap();
    let juice = db
        .insert_product(&Product::new("Juice".into(), drinks, None))
        .unwrap();

    db.save_receipt(
        &Transaction::new(0, None, Price::ZERO),
        &[
            Item::new(0, bread, Quantity(2000), Price(150)),
            Item::new(0, juice, Quantity(1000), Price(400)),
        ],
    )
    .unwrap();
    db.save_receipt(
        &Transaction::new(2 * DAY_MS, None, Price::ZERO),
        &[Item::new(0, bread, Quantity(500), Price(150))],
    )
    .unwrap();

    let now = at(2 * DAY_MS);
    let by_category = db
        .spending_series(
            &SeriesQuery::new(Granularity::Day, SeriesFilter::Category(food)),
            now,
        )
        .unwrap();
    assert_eq!(
        points(&by_category),
        vec![(0, 300), (DAY_MS, 0), (2 * DAY_MS, 75)]
    );

    let by_producer = db
        .spending_series(
            &SeriesQuery::new(Granularity::Day, SeriesFilter::Producer(acme)),
            now,
        )
        .unwrap();
    assert_eq!(by_producer, by_category);

    let by_product = db
        .spending_series(
            &SeriesQuery::new(Granularity::Day, SeriesFilter::Product(juice)),
            now,
        )
        .unwrap();
    assert_eq!(
        points(&by_product),
        vec![(0, 400), (DAY_MS, 0), (2 * DAY_MS, 0)]
    );

    let unknown = db
        .spending_series(
            &SeriesQuery::new(Granularity::Day, SeriesFilter::Product(999)),
            now,
        )
        .unwrap();
    assert!(unknown.is_empty());
}

#[test]
fn test_granularity_parse() {
    assert_eq!(Granularity::parse("Week"), Some(Granularity::Week));
    assert_eq!(Granularity::parse("monthly"), Some(Granularity::Month));
    assert_eq!(Granularity::parse("fortnight"), None);
    assert_eq!(Granularity::Year.as_str(), "year");
}
