//! Stuck-value detection over JSON snapshots.

use serde_json::Value;

/// A field the detector watches, addressed by dotted path
/// (e.g. `inbound.total_messages`).
struct WatchedField {
    path: String,
    /// When true the value must change within `detect_interval_ms`;
    /// when false any change is a failure.
    should_change: bool,
    /// Grace period for should-change fields. 0 means the value must
    /// differ on every observation.
    detect_interval_ms: u64,
    /// Values exempt from the should-change rule (a compaction stuck
    /// at "100%" is done, not stuck).
    ignore: Vec<String>,
    last_value: Option<String>,
    last_change_ms: u64,
}

/// A watched field that violated its rule during the last `detect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedFailure {
    pub field: String,
    pub value: String,
}

/// Compares consecutive snapshots of a JSON document and reports
/// fields whose values are stuck (or, for frozen fields, moved).
///
/// The first observation of a field only records a baseline.
#[derive(Default)]
pub struct ChangeDetector {
    fields: Vec<WatchedField>,
    failures: Vec<DetectedFailure>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watch a dotted-path field.
    pub fn watch(
        &mut self,
        path: impl Into<String>,
        should_change: bool,
        detect_interval_ms: u64,
        ignore: &[&str],
    ) {
        self.fields.push(WatchedField {
            path: path.into(),
            should_change,
            detect_interval_ms,
            ignore: ignore.iter().map(|s| s.to_string()).collect(),
            last_value: None,
            last_change_ms: 0,
        });
    }

    /// Inspect a snapshot now; returns whether any watched field
    /// violated its rule. Findings are available via `failures()`.
    pub fn detect(&mut self, snapshot: &Value) -> bool {
        self.detect_at(snapshot, epoch_ms())
    }

    /// `detect` with an explicit clock, for deterministic tests.
    pub fn detect_at(&mut self, snapshot: &Value, now_ms: u64) -> bool {
        self.failures.clear();
        for field in &mut self.fields {
            let value = string_value(snapshot, &field.path);
            match field.last_value.take() {
                None => {
                    field.last_value = Some(value);
                    field.last_change_ms = now_ms;
                }
                Some(previous) if previous != value => {
                    if !field.should_change {
                        self.failures.push(DetectedFailure {
                            field: field.path.clone(),
                            value: value.clone(),
                        });
                    }
                    field.last_value = Some(value);
                    field.last_change_ms = now_ms;
                }
                Some(same) => {
                    let elapsed = now_ms.saturating_sub(field.last_change_ms);
                    if field.should_change
                        && elapsed >= field.detect_interval_ms
                        && !field.ignore.contains(&same)
                    {
                        self.failures.push(DetectedFailure {
                            field: field.path.clone(),
                            value: same.clone(),
                        });
                    }
                    field.last_value = Some(same);
                }
            }
        }
        !self.failures.is_empty()
    }

    /// Fields that failed during the last `detect`.
    pub fn failures(&self) -> &[DetectedFailure] {
        &self.failures
    }
}

/// Resolve a dotted path against a JSON document and render the value
/// as a comparison string. Missing paths render as `<missing>`.
pub fn string_value(snapshot: &Value, path: &str) -> String {
    let mut current = snapshot;
    for segment in path.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            None => return "<missing>".to_string(),
        }
    }
    match current {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
