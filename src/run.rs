mod cli;

pub use cli::as_cli;

use crate::progress::Progress;

/// Percent-complete line on stderr for long commands.
pub(crate) struct Printer {
    label: &'static str,
    max: u64,
    shown: Option<u64>,
}

impl Printer {
    pub(crate) fn new(label: &'static str) -> Self {
        Self {
            label,
            max: 0,
            shown: None,
        }
    }
}

impl Progress for Printer {
    fn on_max_progress(&mut self, max: u64) {
        self.max = max;
    }

    fn on_progress(&mut self, current: u64) {
        let percent = if self.max == 0 {
            100
        } else {
            (current.min(self.max) * 100) / self.max
        };
        if self.shown != Some(percent) {
            self.shown = Some(percent);
            eprint!("\r{}: {percent:>3}%", self.label);
        }
    }

    fn on_finished(&mut self) {
        eprintln!("\r{}: done ", self.label);
    }

    fn on_error(&mut self, _error: &anyhow::Error) {
        if self.shown.is_some() {
            eprintln!();
        }
    }
}
