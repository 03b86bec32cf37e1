//! Broker producer contract.

use std::time::Duration;

use async_trait::async_trait;

use vigil_core::BrokerResult;

/// What the monitor runtime needs from a broker client.
///
/// Implementations own the underlying connection exclusively; the
/// monitor serializes connect/disconnect calls against it.
#[async_trait]
pub trait BrokerProducer: Send + Sync {
    /// Establish the connection and wait for the broker to report
    /// ready. Must be safe to call again after a failure.
    async fn connect(&self) -> BrokerResult<()>;

    /// Whether the connection currently reports connected.
    fn is_connected(&self) -> bool;

    /// Enqueue one payload. Synchronous: a returned error is an
    /// immediate enqueue failure, delivery itself is asynchronous.
    fn produce(
        &self,
        topic: &str,
        partition: Option<i32>,
        payload: &[u8],
        key: Option<&str>,
    ) -> BrokerResult<()>;

    /// Drain buffered outbound messages, waiting at most `timeout`.
    async fn flush(&self, timeout: Duration) -> BrokerResult<()>;

    /// Tear down the connection.
    async fn disconnect(&self) -> BrokerResult<()>;
}
