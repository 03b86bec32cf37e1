//! Health report model.
//!
//! A check produces a `ReportList` of `ReportDraft`s — loosely shaped
//! verdicts where fields may be missing (a check that deserializes a
//! remote payload can hand back whatever it got). The monitor's check
//! runner normalizes drafts into `CheckReport`s, replacing defective
//! entries with synthesized `broken` reports, and wraps them in the
//! versioned `CheckReportList` envelope that goes on the wire.

use serde::{Deserialize, Serialize};

/// Envelope version tag carried by every published report list.
pub const REPORT_VERSION: &str = "1.0";

/// Health verdict for a single check. The enum is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Healthy,
    Down,
    Failing,
    Broken,
}

/// A validated, wire-ready health report. Status and message are
/// always present once a report has passed through normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckReport {
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_status: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// What a pluggable check hands back before normalization: every field
/// optional. A draft missing status or message is replaced by a
/// `broken` report carrying its JSON serialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CheckStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ReportDraft {
    /// A complete draft with the two required fields set.
    pub fn new(status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            custom_status: None,
            message: Some(message.into()),
            name: None,
        }
    }
}

/// Broker routing hint: steers `produce()` but is never part of the
/// serialized payload body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Routing {
    pub partition: Option<i32>,
    pub key: Option<String>,
}

/// Unnormalized report envelope returned by a check invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportList {
    pub id: String,
    pub name: String,
    /// Epoch milliseconds. Defaulted to the invocation time when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,
    pub reports: Vec<ReportDraft>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing: Option<Routing>,
}

impl ReportList {
    /// A single-report list, the common case for simple checks.
    pub fn single(
        id: impl Into<String>,
        name: impl Into<String>,
        status: CheckStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            time: None,
            reports: vec![ReportDraft::new(status, message)],
            routing: None,
        }
    }
}

/// The normalized envelope published to the broker. Invariants: the
/// report sequence is non-empty, every report has status and message,
/// and `time` is resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckReportList {
    pub version: String,
    pub id: String,
    pub name: String,
    /// Epoch milliseconds of the check invocation.
    pub time: u64,
    pub reports: Vec<CheckReport>,
    /// Routing only — excluded from the payload body.
    #[serde(skip_serializing, default)]
    pub routing: Option<Routing>,
}
