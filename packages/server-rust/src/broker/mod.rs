//! Message broker integration: connection establishment with backoff, topic
//! publishing, and topic consumption with concurrent handler fan-out.
//!
//! The broker is reached through two small traits, `BrokerSession` (a
//! process-wide connection) and `BrokerChannel` (a channel derived from it).
//! The AMQP binding in [`amqp`] implements them on top of `lapin`; the
//! publisher and consumer only ever talk to the traits.

pub mod amqp;
pub mod connection;
pub mod consumer;
pub mod error;
pub mod handler;
#[cfg(test)]
pub(crate) mod memory;
pub mod publisher;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use tracing::{info, warn};

pub use amqp::AmqpConnector;
pub use connection::{Backoff, BackoffPolicy, ConnectionManager, Connector};
pub use consumer::{ConsumerState, DeliveryHandler, TopicConsumer};
pub use error::{BrokerError, ConnectionError, ConsumeError, PublishError};
pub use handler::LogEventHandler;
pub use publisher::Publisher;

/// A single message taken off a bound queue. Auto-acknowledged on receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub routing_key: String,
    pub body: Vec<u8>,
}

/// The infinite sequence of deliveries for one consumer.
pub type DeliveryStream = BoxStream<'static, Result<Delivery, BrokerError>>;

/// A long-lived broker connection owned by one process.
///
/// Shared read-only (behind `Arc`) by every component that needs to derive
/// channels from it.
#[async_trait]
pub trait BrokerSession: Send + Sync + 'static {
    type Channel: BrokerChannel;

    /// Open a fresh channel. Channels are never shared between concurrent
    /// operations.
    async fn open_channel(&self) -> Result<Self::Channel, BrokerError>;

    /// Close the connection.
    async fn close(&self) -> Result<(), BrokerError>;
}

/// Tears down a process's broker connection at shutdown. Failure is logged,
/// since the process is exiting either way.
pub async fn close_session<S: BrokerSession>(session: &S) {
    match session.close().await {
        Ok(()) => info!("broker connection closed"),
        Err(err) => warn!(error = %err, "failed to close broker connection"),
    }
}

/// A channel on a `BrokerSession`.
#[async_trait]
pub trait BrokerChannel: Send + Sync + 'static {
    /// Declare `name` as a durable, non-auto-deleted topic exchange.
    /// Repeating the declaration is a no-op.
    async fn declare_topic_exchange(&self, name: &str) -> Result<(), BrokerError>;

    /// Publish `body` with `routing_key` and wait for the broker to accept it.
    async fn publish(&self, exchange: &str, routing_key: &str, body: &[u8])
        -> Result<(), BrokerError>;

    /// Declare a server-named, exclusive, auto-deleting queue and return its name.
    async fn declare_anonymous_queue(&self) -> Result<String, BrokerError>;

    /// Bind `queue` to `exchange` for routing keys matching `pattern`.
    async fn bind_queue(&self, queue: &str, exchange: &str, pattern: &str)
        -> Result<(), BrokerError>;

    /// Start consuming `queue` with automatic acknowledgement.
    async fn consume(&self, queue: &str, consumer_tag: &str)
        -> Result<DeliveryStream, BrokerError>;

    /// Close the channel.
    async fn close(&self) -> Result<(), BrokerError>;
}
