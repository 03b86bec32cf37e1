//! vigil-transform — change-detection check for transformer nodes.
//!
//! A Kafka-to-Kafka transformer exposes a stats snapshot over HTTP.
//! The service being "up" is not enough: its counters must keep
//! moving. `ChangeDetector` watches dotted-path fields of consecutive
//! snapshots and flags counters that stay stuck past a per-field
//! interval; `TransformerValidator` folds those findings (plus the
//! service's own status field) into a health report.

pub mod detector;
pub mod validator;

pub use detector::{ChangeDetector, DetectedFailure};
pub use validator::{TransformerValidator, TransformerValidatorConfig, WatchedFieldSpec};
