//! Spending over time, bucketed and zero-filled for charting.
//!
//! A recursive CTE walks every bucket between the first matching transaction
//! and the end bound; the real sums are left-joined onto that walk so empty
//! buckets come out as `0` instead of going missing.

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::types::ToSql;

use super::schema::ITEM_VALUE_SQL;
use super::Database;

const DAY_MS: i64 = 86_400_000;
const WEEK_MS: i64 = 7 * DAY_MS;
/// The epoch fell on a Thursday; shifting by three days makes week buckets
/// start on Monday.
const WEEK_SHIFT_MS: i64 = 3 * DAY_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Day,
    Week,
    Month,
    Year,
}

impl Granularity {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" | "daily" => Some(Self::Day),
            "week" | "weekly" => Some(Self::Week),
            "month" | "monthly" => Some(Self::Month),
            "year" | "yearly" => Some(Self::Year),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

/// Which transactions feed the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesFilter {
    All,
    Shop(i64),
    Category(i64),
    Producer(i64),
    Product(i64),
}

impl SeriesFilter {
    /// `spend(date, value)` rows for this filter, plus the bound id if any.
    /// Shop and global series sum receipt totals; the product dimensions sum
    /// item values.
    fn spend_sql(self) -> (String, Option<i64>) {
        let items = format!(
            "SELECT t.date, {ITEM_VALUE_SQL}
             FROM item i
             JOIN transaction_base t ON t.id = i.transaction_id
             JOIN product p ON p.id = i.product_id"
        );
        match self {
            Self::All => ("SELECT t.date, t.total_cost FROM transaction_base t".into(), None),
            Self::Shop(id) => (
                "SELECT t.date, t.total_cost FROM transaction_base t WHERE t.shop_id = ?1".into(),
                Some(id),
            ),
            Self::Category(id) => (format!("{items} WHERE p.category_id = ?1"), Some(id)),
            Self::Producer(id) => (format!("{items} WHERE p.producer_id = ?1"), Some(id)),
            Self::Product(id) => (format!("{items} WHERE i.product_id = ?1"), Some(id)),
        }
    }
}

/// Where the bucket walk stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndBound {
    /// The bucket containing the caller's "now".
    Now,
    /// The bucket of the latest matching transaction.
    LatestTransaction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesQuery {
    pub granularity: Granularity,
    pub filter: SeriesFilter,
    pub end: EndBound,
}

impl SeriesQuery {
    /// Shop-scoped day and week series end at the shop's latest receipt;
    /// everything else runs up to now. Use [`SeriesQuery::ending_at`] to
    /// pick the bound explicitly.
    pub fn new(granularity: Granularity, filter: SeriesFilter) -> Self {
        let end = match (filter, granularity) {
            (SeriesFilter::Shop(_), Granularity::Day | Granularity::Week) => {
                EndBound::LatestTransaction
            }
            _ => EndBound::Now,
        };
        Self {
            granularity,
            filter,
            end,
        }
    }

    pub fn ending_at(mut self, end: EndBound) -> Self {
        self.end = end;
        self
    }
}

/// One bucket: its start as epoch millis (UTC) and the scaled total spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesPoint {
    pub bucket: i64,
    pub total: i64,
}

impl SeriesPoint {
    pub fn bucket_time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.bucket).single()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Shop,
    Category,
    Producer,
    Product,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionTotal {
    pub id: i64,
    pub name: String,
    pub total: i64,
}

impl Database {
    pub fn spending_series_now(&self, query: &SeriesQuery) -> Result<Vec<SeriesPoint>> {
        self.spending_series(query, Utc::now())
    }

    /// Zero-filled series, one point per bucket from the first matching
    /// transaction up to the end bound, ascending. Empty when nothing
    /// matches. The walk never stops before the first bucket, so a store
    /// whose only receipts lie after `now` still yields that bucket.
    pub fn spending_series(
        &self,
        query: &SeriesQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<SeriesPoint>> {
        let (spend, filter_id) = query.filter.spend_sql();
        let mut param_values: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(id) = filter_id {
            param_values.push(Box::new(id));
        }

        let end = match query.end {
            EndBound::LatestTransaction => "MAX(date)".to_string(),
            EndBound::Now => {
                param_values.push(Box::new(now.timestamp_millis()));
                format!("?{}", param_values.len())
            }
        };

        let sql = match query.granularity {
            Granularity::Day => fixed_width_sql(&spend, &end, DAY_MS, 0),
            Granularity::Week => fixed_width_sql(&spend, &end, WEEK_MS, WEEK_SHIFT_MS),
            Granularity::Month => calendar_sql(&spend, &end, "start of month", "+1 month", "%Y-%m"),
            Granularity::Year => calendar_sql(&spend, &end, "start of year", "+1 year", "%Y"),
        };

        let params_ref: Vec<&dyn ToSql> = param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_ref.as_slice(), |row| {
            Ok(SeriesPoint {
                bucket: row.get(0)?,
                total: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Total scaled spending per entity of a dimension, largest first.
    /// Entities without spending are left out.
    pub fn spending_by(&self, dimension: Dimension) -> Result<Vec<DimensionTotal>> {
        let sql = match dimension {
            Dimension::Shop => "SELECT s.id, s.name, SUM(t.total_cost) AS total
                 FROM transaction_base t
                 JOIN shop s ON s.id = t.shop_id
                 GROUP BY s.id"
                .to_string(),
            Dimension::Category => format!(
                "SELECT c.id, c.name, SUM({ITEM_VALUE_SQL}) AS total
                 FROM item i
                 JOIN product p ON p.id = i.product_id
                 JOIN product_category c ON c.id = p.category_id
                 GROUP BY c.id"
            ),
            Dimension::Producer => format!(
                "SELECT pr.id, pr.name, SUM({ITEM_VALUE_SQL}) AS total
                 FROM item i
                 JOIN product p ON p.id = i.product_id
                 JOIN product_producer pr ON pr.id = p.producer_id
                 GROUP BY pr.id"
            ),
            Dimension::Product => format!(
                "SELECT p.id, p.name, SUM({ITEM_VALUE_SQL}) AS total
                 FROM item i
                 JOIN product p ON p.id = i.product_id
                 GROUP BY p.id"
            ),
        };
        let sql = format!("{sql} ORDER BY total DESC, 2 ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(DimensionTotal {
                id: row.get(0)?,
                name: row.get(1)?,
                total: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

/// `x / width` rounded toward negative infinity; SQLite's `/` truncates
/// toward zero.
fn floor_div(x: &str, width: i64) -> String {
    format!("((({x}) - ((({x}) % {width}) + {width}) % {width}) / {width})")
}

/// Day and week buckets are fixed-width: the bucket key is the shifted date
/// divided by the width.
fn fixed_width_sql(spend: &str, end: &str, width: i64, shift: i64) -> String {
    let first = floor_div(&format!("MIN(date) + {shift}"), width);
    let last = floor_div(&format!("{end} + {shift}"), width);
    let key = floor_div(&format!("date + {shift}"), width);
    format!(
        "WITH RECURSIVE
         spend(date, value) AS ({spend}),
         bounds(first_key, last_key) AS (
             SELECT {first}, {last} FROM spend
         ),
         buckets(key) AS (
             SELECT first_key FROM bounds WHERE first_key IS NOT NULL
             UNION ALL
             SELECT key + 1 FROM buckets, bounds WHERE key + 1 <= last_key
         ),
         totals(key, total) AS (
             SELECT {key}, SUM(value) FROM spend GROUP BY 1
         )
         SELECT b.key * {width} - {shift}, COALESCE(t.total, 0)
         FROM buckets b
         LEFT JOIN totals t ON t.key = b.key
         ORDER BY b.key"
    )
}

/// Month and year buckets differ in length, so the walk steps with SQLite's
/// calendar modifiers and joins on a formatted key.
fn calendar_sql(spend: &str, end: &str, truncate: &str, step: &str, key: &str) -> String {
    let first = floor_div("MIN(date)", 1000);
    let last = floor_div(end, 1000);
    let seconds = floor_div("date", 1000);
    format!(
        "WITH RECURSIVE
         spend(date, value) AS ({spend}),
         bounds(first_start, last_start) AS (
             SELECT date({first}, 'unixepoch', '{truncate}'),
                    date({last}, 'unixepoch', '{truncate}')
             FROM spend
         ),
         buckets(start) AS (
             SELECT first_start FROM bounds WHERE first_start IS NOT NULL
             UNION ALL
             SELECT date(start, '{step}') FROM buckets, bounds
             WHERE date(start, '{step}') <= last_start
         ),
         totals(key, total) AS (
             SELECT strftime('{key}', {seconds}, 'unixepoch'), SUM(value)
             FROM spend GROUP BY 1
         )
         SELECT CAST(strftime('%s', b.start) AS INTEGER) * 1000, COALESCE(t.total, 0)
         FROM buckets b
         LEFT JOIN totals t ON t.key = strftime('{key}', b.start)
         ORDER BY b.start"
    )
}

#[cfg(test)]
#[path = "series_tests.rs"]
mod tests;
