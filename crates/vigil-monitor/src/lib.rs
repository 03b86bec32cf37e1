//! vigil-monitor — the long-running health-check agent runtime.
//!
//! One `Monitor` supervises one target: it periodically invokes a
//! pluggable `Check`, normalizes the result into a versioned report
//! list, publishes it to the broker topic, and reschedules itself with
//! exponential backoff while the target stays down.
//!
//! # Architecture
//!
//! ```text
//! Monitor
//!   ├── connect()/disconnect()   idempotent, single-slot pending ops
//!   ├── enable()/disable()       timer armed only while connected
//!   └── run() cycle
//!       ├── Check (pluggable)    → ReportList or failure
//!       ├── normalization        → CheckReportList (never fails)
//!       ├── publish              → broker topic (failures swallowed)
//!       └── reschedule           → interval, or backoff while down
//! ```
//!
//! # Failure containment
//!
//! A failing check becomes a synthesized `down` report; a defective
//! report becomes `broken`; a publish error is logged and swallowed.
//! Nothing a check or the broker does can stop the cycle loop — the
//! agent self-heals through backoff retries instead of terminating.

pub mod monitor;
mod runner;

pub use monitor::{Check, Monitor};
