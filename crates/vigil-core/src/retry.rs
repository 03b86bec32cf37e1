//! Backoff retry policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponential backoff parameters for rescheduling a monitor whose
/// target keeps reporting `down`.
///
/// The delay before attempt `n` (zero-based) is
/// `round(min(min_ms × factor^n, max_ms))` milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Multiplicative growth per consecutive failure.
    pub factor: f64,
    /// First (smallest) delay, milliseconds.
    pub min_ms: u64,
    /// Delay ceiling, milliseconds.
    pub max_ms: u64,
}

impl RetryPolicy {
    /// Cap applied to the default minimum delay.
    pub const DEFAULT_MIN_CAP_MS: u64 = 5000;

    /// Policy used when a monitor config does not specify one:
    /// factor 2, min = min(interval, 5000), max = interval.
    pub fn default_for(interval_ms: u64) -> Self {
        Self {
            factor: 2.0,
            min_ms: interval_ms.min(Self::DEFAULT_MIN_CAP_MS),
            max_ms: interval_ms,
        }
    }

    /// Delay before the given consecutive-failure attempt.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let raw = self.min_ms as f64 * self.factor.powi(attempt as i32);
        let capped = raw.min(self.max_ms as f64).round();
        Duration::from_millis(capped as u64)
    }
}
