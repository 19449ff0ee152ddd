//! Progress reporting for learning runs.
//!
//! The CLI uses [`BarReporter`] to draw a file counter on stderr; library
//! callers and tests use [`NoopReporter`].

use indicatif::{ProgressBar, ProgressStyle};

/// Receives per-file progress from a learning run.
pub trait ProgressReporter: Send + Sync {
    /// A run over `total` files is starting.
    fn begin(&self, total: u64);

    /// One file has been processed.
    fn file_done(&self, path: &str);

    /// The run ended; `summary` is a one-line outcome.
    fn end(&self, summary: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn begin(&self, _total: u64) {}
    fn file_done(&self, _path: &str) {}
    fn end(&self, _summary: &str) {}
}

/// `indicatif` bar showing files learned so far.
#[derive(Debug)]
pub struct BarReporter {
    bar: ProgressBar,
}

impl Default for BarReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl BarReporter {
    pub fn new() -> Self {
        Self {
            bar: ProgressBar::new(0),
        }
    }

    /// A reporter that never draws (for `--quiet` and tests).
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }
}

impl ProgressReporter for BarReporter {
    fn begin(&self, total: u64) {
        if let Ok(style) =
            ProgressStyle::with_template("{spinner:.green} learning [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
        {
            self.bar.set_style(style.progress_chars("=> "));
        }
        self.bar.set_length(total);
        self.bar.reset();
    }

    fn file_done(&self, path: &str) {
        self.bar.set_message(path.to_string());
        self.bar.inc(1);
    }

    fn end(&self, summary: &str) {
        self.bar.finish_and_clear();
        if !self.bar.is_hidden() {
            self.bar.println(summary);
        }
    }
}
