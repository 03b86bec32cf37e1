//! vigil-rest — HTTP-poll check strategy.
//!
//! `RestCheck` implements the monitor's `Check` capability by fetching
//! a status endpoint over HTTP/1.1. A 200 response hands the body to
//! an injected `Validator` which turns it into a report list; any
//! other status becomes a single `down` report. Transport failures
//! propagate as check failures and are absorbed by the monitor's run
//! cycle.

pub mod check;

pub use check::{RestCheck, Validator};
