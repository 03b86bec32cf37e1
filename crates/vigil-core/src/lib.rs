//! vigil-core — shared types for the Vigil health-check agent.
//!
//! Defines the wire-level report model published to the broker, the
//! monitor configuration (including the clamped initial interval and
//! the default retry policy), and the exponential-backoff retry policy
//! used to reschedule failing monitors.

pub mod config;
pub mod error;
pub mod report;
pub mod retry;

pub use config::{BrokerConfig, MonitorConfig};
pub use error::{BrokerError, BrokerResult};
pub use report::{
    CheckReport, CheckReportList, CheckStatus, ReportDraft, ReportList, Routing, REPORT_VERSION,
};
pub use retry::RetryPolicy;
