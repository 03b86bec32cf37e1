//! Monitor and broker configuration.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Connection settings for the report broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Topic report lists are published to.
    pub topic: String,
    /// Comma-separated broker addresses.
    pub bootstrap_servers: String,
    /// Bound on how long `connect()` waits for broker readiness.
    /// `None` waits indefinitely.
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
    /// Ceiling for the pre-disconnect flush. Defaults to 10 minutes.
    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,
    /// Additional client properties passed through verbatim.
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

fn default_flush_timeout_ms() -> u64 {
    600_000
}

impl BrokerConfig {
    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }
}

/// Configuration for one monitor instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Stable identifier carried in every report list.
    pub id: String,
    /// Display name carried in every report list.
    pub name: String,
    /// Base check interval, milliseconds.
    pub interval_ms: u64,
    /// Delay before the first check after enabling. Clamped to
    /// `interval_ms`; defaults to it when unset.
    #[serde(default)]
    pub initial_interval_ms: Option<u64>,
    /// Backoff policy for consecutive `down` results.
    /// `RetryPolicy::default_for(interval_ms)` when unset.
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
    pub broker: BrokerConfig,
    /// Connect (and enable on readiness) as soon as the monitor is
    /// constructed.
    #[serde(default = "default_auto_start")]
    pub auto_start: bool,
}

fn default_auto_start() -> bool {
    true
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// First-activation delay; never exceeds the base interval.
    pub fn initial_interval(&self) -> Duration {
        let ms = self
            .initial_interval_ms
            .unwrap_or(self.interval_ms)
            .min(self.interval_ms);
        Duration::from_millis(ms)
    }

    /// Configured retry policy, or the default derived from the interval.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
            .unwrap_or_else(|| RetryPolicy::default_for(self.interval_ms))
    }
}
