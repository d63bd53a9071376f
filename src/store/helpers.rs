//! Batching and redelivery helpers shared by the sink and the runner.
//!
//! - [`RetryConfig`] - redelivery budget and exponential backoff
//! - [`chunk_groups`] - split groups into requests that respect bulk-write limits

use crate::record::MutationGroup;
use std::ops::Range;
use std::time::Duration;

// ============================================================================
// Redelivery
// ============================================================================

/// How often, and how patiently, a failed group is redelivered.
///
/// `max_attempts` counts the first delivery, so `1` disables redelivery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// A config that never redelivers.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
        }
    }

    /// Delay to wait before delivery attempt `attempt` (1-based).
    ///
    /// The first attempt has no delay; attempt 2 waits `initial_delay_ms`, and
    /// each later one multiplies the previous delay, capped at `max_delay_ms`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt - 2).unwrap_or(i32::MAX);
        let factor = self.backoff_multiplier.max(1.0).powi(exponent);
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let delay_ms = (self.initial_delay_ms as f64 * factor).min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(delay_ms)
    }
}

// ============================================================================
// Batch Helper
// ============================================================================

/// Split `groups` into contiguous request ranges.
///
/// A range holds at most `max_groups` groups and at most `max_cells` cell
/// writes in total. A single group larger than `max_cells` still gets a range
/// of its own, so the store can reject it with a per-row error instead of the
/// group being dropped here.
#[must_use]
pub fn chunk_groups(
    groups: &[MutationGroup],
    max_groups: usize,
    max_cells: usize,
) -> Vec<Range<usize>> {
    let max_groups = max_groups.max(1);
    let mut ranges = Vec::new();
    let mut start = 0;
    let mut cells = 0;

    for (i, group) in groups.iter().enumerate() {
        let n = group.cells.len();
        let full = i - start >= max_groups || (i > start && cells + n > max_cells);
        if full {
            ranges.push(start..i);
            start = i;
            cells = 0;
        }
        cells += n;
    }
    if start < groups.len() {
        ranges.push(start..groups.len());
    }
    ranges
}
