//! vigil-broker — the message-broker producer dependency.
//!
//! `BrokerProducer` is the contract the monitor runtime consumes:
//! readiness-gated connect, synchronous enqueue, bounded flush, and
//! teardown. `KafkaProducer` implements it over rdkafka's
//! `ThreadedProducer`, which polls delivery callbacks on a background
//! thread. Asynchronous client errors are reported through `tracing`
//! and never settle an in-flight connect or disconnect.

pub mod kafka;
pub mod producer;

pub use kafka::KafkaProducer;
pub use producer::BrokerProducer;
