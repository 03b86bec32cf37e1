//! rdkafka-backed broker producer.
//!
//! Uses a `ThreadedProducer`, which polls delivery callbacks on a
//! dedicated background thread, so no explicit poll loop is needed
//! after connecting. Readiness is probed with a metadata fetch — the
//! producer itself connects lazily, and a successful metadata round
//! trip is the first signal that the cluster is reachable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::ClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::message::DeliveryResult;
use rdkafka::producer::{BaseRecord, Producer, ProducerContext, ThreadedProducer};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::util::Timeout;
use tracing::{debug, error, info, warn};

use vigil_core::{BrokerConfig, BrokerError, BrokerResult};

use crate::producer::BrokerProducer;

/// Client context that routes librdkafka's asynchronous error events
/// and delivery failures to the tracing sink. These events never
/// settle a pending connect or disconnect on the monitor.
pub struct MonitorContext;

impl ClientContext for MonitorContext {
    fn error(&self, error: KafkaError, reason: &str) {
        error!(%error, reason, "kafka client error");
    }
}

impl ProducerContext for MonitorContext {
    type DeliveryOpaque = ();

    fn delivery(&self, result: &DeliveryResult<'_>, _: ()) {
        if let Err((error, _)) = result {
            warn!(%error, "kafka delivery failed");
        }
    }
}

type Client = Arc<ThreadedProducer<MonitorContext>>;

/// Kafka implementation of the broker producer contract.
///
/// The underlying client lives in a replaceable slot: `disconnect()`
/// drops it, tearing the broker connections down, and a later
/// `connect()` builds a fresh one from the retained client config.
pub struct KafkaProducer {
    client_config: ClientConfig,
    client: RwLock<Option<Client>>,
    config: BrokerConfig,
    connected: AtomicBool,
}

impl KafkaProducer {
    /// Build the client from the broker config. Does not connect —
    /// call `connect()` to wait for readiness.
    pub fn new(config: &BrokerConfig) -> BrokerResult<Self> {
        let mut client_config = ClientConfig::new();
        client_config.set("bootstrap.servers", &config.bootstrap_servers);
        for (key, value) in &config.properties {
            client_config.set(key, value);
        }

        let client: ThreadedProducer<MonitorContext> = client_config
            .create_with_context(MonitorContext)
            .map_err(|e| BrokerError::Connect(e.to_string()))?;

        Ok(Self {
            client_config,
            client: RwLock::new(Some(Arc::new(client))),
            config: config.clone(),
            connected: AtomicBool::new(false),
        })
    }

    fn current_client(&self) -> Option<Client> {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Get the live client, building a fresh one if `disconnect()`
    /// dropped the previous one.
    fn client_for_connect(&self) -> BrokerResult<Client> {
        let mut slot = self.client.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = slot.as_ref() {
            return Ok(Arc::clone(client));
        }
        let client: ThreadedProducer<MonitorContext> = self
            .client_config
            .create_with_context(MonitorContext)
            .map_err(|e| BrokerError::Connect(e.to_string()))?;
        let client = Arc::new(client);
        *slot = Some(Arc::clone(&client));
        Ok(client)
    }
}

#[async_trait]
impl BrokerProducer for KafkaProducer {
    async fn connect(&self) -> BrokerResult<()> {
        if self.is_connected() {
            return Ok(());
        }

        // The fetch is blocking, so the bound is handed to librdkafka
        // itself rather than enforced from outside: an abandoned
        // `spawn_blocking` task would pin a blocking-pool thread and
        // stall runtime shutdown. Without a configured bound it waits
        // for the cluster indefinitely.
        let timeout = match self.config.connect_timeout_ms {
            Some(ms) => Timeout::After(Duration::from_millis(ms)),
            None => Timeout::Never,
        };
        let client = self.client_for_connect()?;
        let result = tokio::task::spawn_blocking(move || {
            client.client().fetch_metadata(None, timeout)
        })
        .await
        .map_err(|e| BrokerError::Connect(e.to_string()))?;

        let metadata = result.map_err(|e| match (&e, self.config.connect_timeout_ms) {
            (KafkaError::MetadataFetch(RDKafkaErrorCode::OperationTimedOut), Some(ms)) => {
                BrokerError::ConnectTimeout(ms)
            }
            _ => BrokerError::Connect(e.to_string()),
        })?;
        debug!(brokers = metadata.brokers().len(), "kafka metadata fetched");

        self.connected.store(true, Ordering::SeqCst);
        info!(servers = %self.config.bootstrap_servers, "kafka producer connected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn produce(
        &self,
        topic: &str,
        partition: Option<i32>,
        payload: &[u8],
        key: Option<&str>,
    ) -> BrokerResult<()> {
        if !self.is_connected() {
            return Err(BrokerError::NotConnected);
        }
        let Some(client) = self.current_client() else {
            return Err(BrokerError::NotConnected);
        };

        let mut record = BaseRecord::<str, [u8]>::to(topic).payload(payload);
        if let Some(partition) = partition {
            record = record.partition(partition);
        }
        if let Some(key) = key {
            record = record.key(key);
        }

        client
            .send(record)
            .map_err(|(e, _)| BrokerError::Produce(e.to_string()))
    }

    async fn flush(&self, timeout: Duration) -> BrokerResult<()> {
        let Some(client) = self.current_client() else {
            // Nothing queued without a client.
            return Ok(());
        };
        tokio::task::spawn_blocking(move || client.flush(timeout))
            .await
            .map_err(|e| BrokerError::Flush(e.to_string()))?
            .map_err(|e| BrokerError::Flush(e.to_string()))
    }

    async fn disconnect(&self) -> BrokerResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        let dropped = self
            .client
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(client) = dropped {
            // Dropping the producer joins librdkafka's polling thread
            // and closes the broker connections; the outbound queue was
            // drained by the flush that precedes disconnect in the
            // monitor lifecycle.
            tokio::task::spawn_blocking(move || drop(client))
                .await
                .map_err(|e| BrokerError::Disconnect(e.to_string()))?;
        }
        info!("kafka producer disconnected");
        Ok(())
    }
}
