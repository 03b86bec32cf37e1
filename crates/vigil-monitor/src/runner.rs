//! Check-result normalization.
//!
//! Everything leaving the runner satisfies the report-list invariants:
//! non-empty reports, status and message present on every report, and
//! a resolved time.

use tracing::warn;

use vigil_core::{CheckReport, CheckReportList, CheckStatus, ReportDraft, ReportList, REPORT_VERSION};

/// Normalize a check's draft list. Drafts missing status or message
/// are replaced by a `broken` report carrying the serialized original;
/// an unset list time becomes `now_ms`.
pub(crate) fn normalize(list: ReportList, now_ms: u64) -> CheckReportList {
    let mut reports = Vec::with_capacity(list.reports.len());
    for draft in list.reports {
        match draft {
            ReportDraft {
                status: Some(status),
                custom_status,
                message: Some(message),
                name,
            } => reports.push(CheckReport {
                status,
                custom_status,
                message,
                name,
            }),
            incomplete => {
                warn!(monitor = %list.id, "check report missing status or message");
                reports.push(broken_report(&incomplete));
            }
        }
    }

    // An empty list would leave the rescheduler with no status to
    // inspect; surface it as a defect instead.
    if reports.is_empty() {
        warn!(monitor = %list.id, "check returned no reports");
        reports.push(CheckReport {
            status: CheckStatus::Broken,
            custom_status: None,
            message: "check returned no reports".to_string(),
            name: None,
        });
    }

    CheckReportList {
        version: REPORT_VERSION.to_string(),
        id: list.id,
        name: list.name,
        time: list.time.unwrap_or(now_ms),
        reports,
        routing: list.routing,
    }
}

/// Single-report `down` list synthesized when the check itself fails.
pub(crate) fn failure_list(
    id: &str,
    name: &str,
    error: &anyhow::Error,
    now_ms: u64,
) -> CheckReportList {
    CheckReportList {
        version: REPORT_VERSION.to_string(),
        id: id.to_string(),
        name: name.to_string(),
        time: now_ms,
        reports: vec![CheckReport {
            status: CheckStatus::Down,
            custom_status: None,
            message: error.to_string(),
            name: None,
        }],
        routing: None,
    }
}

fn broken_report(original: &ReportDraft) -> CheckReport {
    let serialized =
        serde_json::to_string(original).unwrap_or_else(|_| "{}".to_string());
    CheckReport {
        status: CheckStatus::Broken,
        custom_status: None,
        message: serialized,
        name: None,
    }
}
