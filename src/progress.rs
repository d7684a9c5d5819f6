//! Progress reporting and cancellation for long-running store operations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Receives `current / max` updates from exports, imports and backups.
/// Every method has a no-op default.
pub trait Progress {
    fn on_max_progress(&mut self, _max: u64) {}
    fn on_progress(&mut self, _current: u64) {}
    fn on_finished(&mut self) {}
    fn on_error(&mut self, _error: &anyhow::Error) {}
}

/// Ignores every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Progress for Silent {}

/// Shared flag a caller sets to stop an operation between batches.
#[derive(Debug, Default, Clone)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// `Err(Cancelled)` once the flag is set.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Run `op`, then tell `progress` how it ended.
pub fn report<T>(
    progress: &mut dyn Progress,
    op: impl FnOnce(&mut dyn Progress) -> anyhow::Result<T>,
) -> anyhow::Result<T> {
    match op(&mut *progress) {
        Ok(value) => {
            progress.on_finished();
            Ok(value)
        }
        Err(e) => {
            progress.on_error(&e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[derive(Default)]
    struct Recorder {
        max: u64,
        current: Vec<u64>,
        finished: bool,
        errors: Vec<String>,
    }

    impl Progress for Recorder {
        fn on_max_progress(&mut self, max: u64) {
            self.max = max;
        }
        fn on_progress(&mut self, current: u64) {
            self.current.push(current);
        }
        fn on_finished(&mut self) {
            self.finished = true;
        }
        fn on_error(&mut self, error: &anyhow::Error) {
            self.errors.push(error.to_string());
        }
    }

    #[test]
    fn test_report_success() {
        let mut rec = Recorder::default();
        let value = report(&mut rec, |p| {
            p.on_max_progress(2);
            p.on_progress(1);
            p.on_progress(2);
            Ok(7)
        })
        .unwrap();
        assert_eq!(value, 7);
        assert_eq!(rec.max, 2);
        assert_eq!(rec.current, vec![1, 2]);
        assert!(rec.finished);
        assert!(rec.errors.is_empty());
    }

    #[test]
    fn test_report_failure() {
        let mut rec = Recorder::default();
        let result: anyhow::Result<()> = report(&mut rec, |_| anyhow::bail!("disk full"));
        assert!(result.is_err());
        assert!(!rec.finished);
        assert_eq!(rec.errors, vec!["disk full".to_string()]);
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(flag.check().is_ok());
        other.cancel();
        assert!(flag.is_cancelled());
        assert_eq!(flag.check(), Err(Cancelled));
    }
}
