//! Push subscriptions over store queries.
//!
//! The connection's update hook records which tables a write touched. After
//! each write the store re-runs every live query that reads one of those
//! tables and sends the result, unless it equals the last value sent.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use tracing::{debug, warn};

use super::series::{SeriesPoint, SeriesQuery};
use super::Database;
use crate::models::TransactionDetails;

const SERIES_TABLES: &[&str] = &["transaction_base", "item", "product"];
const DETAILS_TABLES: &[&str] = &[
    "transaction_base",
    "item",
    "shop",
    "product",
    "product_category",
    "product_producer",
    "product_variant",
];

type Poll = Box<dyn FnMut(&Database) -> Result<bool> + Send>;

pub(crate) struct Watch {
    tables: Vec<String>,
    active: Arc<AtomicBool>,
    /// Re-runs the query; `Ok(false)` once nobody is listening.
    poll: Poll,
}

/// A stream of query results. The current value is delivered on creation,
/// later values only when they change. Dropping the subscription ends it.
pub struct Subscription<T> {
    rx: Receiver<T>,
    active: Arc<AtomicBool>,
}

impl<T> Subscription<T> {
    /// The next undelivered value, if any.
    pub fn try_next(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Skip to the newest undelivered value.
    pub fn latest(&self) -> Option<T> {
        self.rx.try_iter().last()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn cancel(self) {}
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Relaxed);
    }
}

impl Database {
    /// Subscribe to `query`, re-evaluated whenever one of `tables` is written.
    pub fn watch<T, F>(&self, tables: &[&str], mut query: F) -> Result<Subscription<T>>
    where
        T: PartialEq + Clone + Send + 'static,
        F: FnMut(&Database) -> Result<T> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let active = Arc::new(AtomicBool::new(true));

        let first = query(self)?;
        let mut last = first.clone();
        // The receiver is still in hand, so this cannot fail.
        let _ = tx.send(first);

        let poll: Poll = Box::new(move |db: &Database| {
            let value = query(db)?;
            if value == last {
                return Ok(true);
            }
            last = value.clone();
            Ok(tx.send(value).is_ok())
        });

        self.watches.borrow_mut().push(Watch {
            tables: tables.iter().map(|t| (*t).to_string()).collect(),
            active: Arc::clone(&active),
            poll,
        });
        Ok(Subscription { rx, active })
    }

    pub fn watch_series(&self, query: SeriesQuery) -> Result<Subscription<Vec<SeriesPoint>>> {
        self.watch(SERIES_TABLES, move |db| db.spending_series_now(&query))
    }

    pub fn watch_transaction(&self, id: i64) -> Result<Subscription<Option<TransactionDetails>>> {
        self.watch(DETAILS_TABLES, move |db| db.transaction_details(id))
    }

    /// Re-run the subscriptions affected by writes since the last call.
    pub(crate) fn publish(&self) {
        let touched = match self.dirty.lock() {
            Ok(mut tables) => std::mem::take(&mut *tables),
            Err(_) => return,
        };
        if touched.is_empty() {
            return;
        }

        // Taken out so a query may itself subscribe without a double borrow.
        let mut watches = std::mem::take(&mut *self.watches.borrow_mut());
        watches.retain_mut(|w| {
            if !w.active.load(Ordering::Relaxed) {
                return false;
            }
            if !w.tables.iter().any(|t| touched.contains(t)) {
                return true;
            }
            match (w.poll)(self) {
                Ok(listening) => listening,
                Err(e) => {
                    warn!(error = %e, "subscription query failed");
                    true
                }
            }
        });

        let mut slot = self.watches.borrow_mut();
        watches.append(&mut slot);
        debug!(subscriptions = watches.len(), "published changes");
        *slot = watches;
    }
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
