//! Transformer-node snapshot validation.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use vigil_core::{CheckStatus, ReportList};
use vigil_rest::Validator;

use crate::detector::ChangeDetector;

const INBOUND_FIELD: &str = "inbound.total_messages";
const OUTBOUND_FIELD: &str = "outbound.total_messages";
const COMPACTION_FIELD: &str = "compaction_percentage";

/// Grace period for the outbound counter: a transformer may
/// legitimately publish nothing for a short while.
const OUTBOUND_GRACE_MS: u64 = 10_000;

/// Extra watched field supplied by configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchedFieldSpec {
    /// Dotted path into the stats snapshot.
    pub path: String,
    /// Message reported when the field violates its rule.
    pub message: String,
    #[serde(default = "default_true")]
    pub should_change: bool,
    #[serde(default)]
    pub detect_interval_ms: u64,
    #[serde(default)]
    pub ignore: Vec<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformerValidatorConfig {
    /// Also require the outbound counter to move.
    #[serde(default = "default_true")]
    pub outbound: bool,
    /// The node is a compactor: skip the running-status check and
    /// watch compaction progress instead.
    #[serde(default)]
    pub compaction: bool,
    /// Additional transformer-specific fields to watch.
    #[serde(default)]
    pub fields: Vec<WatchedFieldSpec>,
}

impl Default for TransformerValidatorConfig {
    fn default() -> Self {
        Self {
            outbound: true,
            compaction: false,
            fields: Vec::new(),
        }
    }
}

/// Validates a transformer node's stats snapshot: the service must
/// report `running` and its counters must keep moving between
/// consecutive checks.
pub struct TransformerValidator {
    id: String,
    name: String,
    compaction: bool,
    detector: Mutex<ChangeDetector>,
    messages: HashMap<String, String>,
}

impl TransformerValidator {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        config: TransformerValidatorConfig,
    ) -> Self {
        let mut detector = ChangeDetector::new();
        let mut messages = HashMap::from([
            (
                INBOUND_FIELD.to_string(),
                "Service is not consuming anything new".to_string(),
            ),
            (
                OUTBOUND_FIELD.to_string(),
                "Service is not publishing anything new".to_string(),
            ),
            (
                COMPACTION_FIELD.to_string(),
                "Service is stuck while compacting".to_string(),
            ),
        ]);

        detector.watch(INBOUND_FIELD, true, 0, &[]);
        if config.outbound {
            detector.watch(OUTBOUND_FIELD, true, OUTBOUND_GRACE_MS, &[]);
        }
        if config.compaction {
            detector.watch(COMPACTION_FIELD, true, 0, &["100%"]);
        }
        for field in config.fields {
            let ignore: Vec<&str> = field.ignore.iter().map(String::as_str).collect();
            detector.watch(
                field.path.clone(),
                field.should_change,
                field.detect_interval_ms,
                &ignore,
            );
            messages.insert(field.path, field.message);
        }

        Self {
            id: id.into(),
            name: name.into(),
            compaction: config.compaction,
            detector: Mutex::new(detector),
            messages,
        }
    }
}

#[async_trait]
impl Validator for TransformerValidator {
    async fn validate(&self, body: &str) -> anyhow::Result<ReportList> {
        let snapshot: Value = serde_json::from_str(body)?;
        let service_status = snapshot
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("<missing>");

        let mut message = String::new();
        if !self.compaction && service_status != "running" {
            message.push_str(&format!(
                "Service is not running `status = {service_status}`."
            ));
        } else {
            let mut detector = self.detector.lock().await;
            if detector.detect(&snapshot) {
                for failure in detector.failures() {
                    let hint = self
                        .messages
                        .get(&failure.field)
                        .map(String::as_str)
                        .unwrap_or("Field violated its change rule");
                    message.push_str(&format!(
                        "{hint} `{} = {}`.\n",
                        failure.field, failure.value
                    ));
                }
            }
        }

        let (status, message) = if message.is_empty() {
            let pretty = serde_json::to_string_pretty(&snapshot)?;
            (CheckStatus::Healthy, format!("```\n{pretty}\n```"))
        } else {
            (CheckStatus::Failing, message)
        };

        Ok(ReportList::single(&self.id, &self.name, status, message))
    }
}
