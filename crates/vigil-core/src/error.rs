//! Error types for broker operations.

use thiserror::Error;

/// Result type alias for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Errors from the broker producer. Variants carry rendered messages
/// so the type stays `Clone` — a pending connect/disconnect operation
/// is shared between concurrent callers and every waiter receives the
/// same outcome.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrokerError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("connect timed out after {0}ms")]
    ConnectTimeout(u64),

    #[error("produce failed: {0}")]
    Produce(String),

    #[error("flush failed: {0}")]
    Flush(String),

    #[error("disconnect failed: {0}")]
    Disconnect(String),

    #[error("not connected")]
    NotConnected,
}
