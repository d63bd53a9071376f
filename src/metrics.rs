//! Execution counters for an import run.
//!
//! [`ImportMetrics`] is shared by every worker of a run and updated with
//! relaxed atomic increments. At the end of the run it is frozen into a
//! [`MetricsSnapshot`], which is part of the
//! [`ImportSummary`](crate::runner::ImportSummary) and can be logged or saved
//! as JSON.
//!
//! # Example
//!
//! ```no_run
//! use tablebeam::metrics::ImportMetrics;
//!
//! # fn main() -> anyhow::Result<()> {
//! let metrics = ImportMetrics::new();
//! metrics.add_lines_read(3);
//! metrics.add_groups_written(3, 6);
//!
//! let snapshot = metrics.snapshot();
//! snapshot.log_summary();
//! snapshot.save_to_file("metrics.json")?;
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

/// Live counters of one import run.
#[derive(Debug)]
pub struct ImportMetrics {
    started: Instant,
    lines_read: AtomicU64,
    groups_submitted: AtomicU64,
    groups_written: AtomicU64,
    cells_written: AtomicU64,
    validation_failures: AtomicU64,
    write_failures: AtomicU64,
    redeliveries: AtomicU64,
}

impl Default for ImportMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportMetrics {
    /// Start the clock with every counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            lines_read: AtomicU64::new(0),
            groups_submitted: AtomicU64::new(0),
            groups_written: AtomicU64::new(0),
            cells_written: AtomicU64::new(0),
            validation_failures: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            redeliveries: AtomicU64::new(0),
        }
    }

    pub fn add_lines_read(&self, n: u64) {
        self.lines_read.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_groups_submitted(&self, n: u64) {
        self.groups_submitted.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_groups_written(&self, groups: u64, cells: u64) {
        self.groups_written.fetch_add(groups, Ordering::Relaxed);
        self.cells_written.fetch_add(cells, Ordering::Relaxed);
    }

    pub fn add_validation_failure(&self) {
        self.validation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_redeliveries(&self, n: u64) {
        self.redeliveries.fetch_add(n, Ordering::Relaxed);
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Freeze the counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            lines_read: self.lines_read.load(Ordering::Relaxed),
            groups_submitted: self.groups_submitted.load(Ordering::Relaxed),
            groups_written: self.groups_written.load(Ordering::Relaxed),
            cells_written: self.cells_written.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            redeliveries: self.redeliveries.load(Ordering::Relaxed),
            elapsed_ms: u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Point-in-time copy of [`ImportMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub lines_read: u64,
    pub groups_submitted: u64,
    pub groups_written: u64,
    pub cells_written: u64,
    pub validation_failures: u64,
    pub write_failures: u64,
    pub redeliveries: u64,
    pub elapsed_ms: u64,
}

impl MetricsSnapshot {
    fn entries(&self) -> [(&'static str, u64, &'static str); 8] {
        [
            ("lines_read", self.lines_read, "Input lines read"),
            ("groups_submitted", self.groups_submitted, "Mutation groups handed to the sink"),
            ("groups_written", self.groups_written, "Mutation groups acknowledged as written"),
            ("cells_written", self.cells_written, "Cell writes acknowledged"),
            ("validation_failures", self.validation_failures, "Malformed input lines"),
            ("write_failures", self.write_failures, "Groups that failed after redelivery"),
            ("redeliveries", self.redeliveries, "Groups resubmitted after a transient failure"),
            ("execution_time_ms", self.elapsed_ms, "Total import time in milliseconds"),
        ]
    }

    /// Every metric as `{"name": {"value": .., "description": ..}}`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let metrics: serde_json::Map<String, Value> = self
            .entries()
            .into_iter()
            .map(|(name, value, description)| {
                (
                    name.to_string(),
                    json!({ "value": value, "description": description }),
                )
            })
            .collect();
        Value::Object(metrics)
    }

    /// Emit the counters as one `info` event.
    pub fn log_summary(&self) {
        info!(
            lines_read = self.lines_read,
            groups_submitted = self.groups_submitted,
            groups_written = self.groups_written,
            cells_written = self.cells_written,
            validation_failures = self.validation_failures,
            write_failures = self.write_failures,
            redeliveries = self.redeliveries,
            elapsed_ms = self.elapsed_ms,
            "import metrics"
        );
    }

    /// Save all metrics to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written to.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let formatted = serde_json::to_string_pretty(&self.to_json())?;
        let mut file =
            File::create(path).with_context(|| format!("create metrics file {}", path.display()))?;
        file.write_all(formatted.as_bytes())?;
        Ok(())
    }
}
