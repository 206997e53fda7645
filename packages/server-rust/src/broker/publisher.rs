//! Topic publisher.
//!
//! One channel per publish: open, declare the exchange, publish, close. The
//! publisher never retries; the caller decides what a failed publish means.

use std::sync::Arc;

use relay_core::action::LogPayload;
use relay_core::broker::{encode_log, Severity, LOGS_EXCHANGE};
use tracing::debug;

use super::error::PublishError;
use super::{BrokerChannel, BrokerSession};

/// Publishes to topic exchanges over a shared broker session.
pub struct Publisher<S> {
    session: Arc<S>,
}

impl<S> Clone for Publisher<S> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
        }
    }
}

impl<S: BrokerSession> Publisher<S> {
    #[must_use]
    pub fn new(session: Arc<S>) -> Self {
        Self { session }
    }

    /// Publish `body` to `exchange` with `routing_key`.
    ///
    /// The exchange is declared (durable topic) before every publish, so the
    /// first publisher to run creates it and later declarations are no-ops.
    ///
    /// # Errors
    ///
    /// Returns `PublishError` if the channel cannot be opened, the exchange
    /// cannot be declared, or the broker does not confirm the message.
    pub async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
    ) -> Result<(), PublishError> {
        let channel = self
            .session
            .open_channel()
            .await
            .map_err(PublishError::Channel)?;

        let result = publish_on(&channel, exchange, routing_key, body).await;

        if let Err(err) = channel.close().await {
            debug!(exchange, error = %err, "failed to close publish channel");
        }
        result
    }

    /// Publish a log record to `logs_topic` tagged `log.<SEVERITY>`.
    ///
    /// # Errors
    ///
    /// Same as [`Publisher::publish`], plus `PublishError::Encode`.
    pub async fn emit_log(&self, severity: Severity, payload: &LogPayload) -> Result<(), PublishError> {
        let body = encode_log(payload)?;
        self.publish(LOGS_EXCHANGE, severity.routing_key(), &body).await
    }
}

async fn publish_on<C: BrokerChannel>(
    channel: &C,
    exchange: &str,
    routing_key: &str,
    body: &[u8],
) -> Result<(), PublishError> {
    channel
        .declare_topic_exchange(exchange)
        .await
        .map_err(|source| PublishError::Declare {
            exchange: exchange.to_string(),
            source,
        })?;

    channel
        .publish(exchange, routing_key, body)
        .await
        .map_err(|source| PublishError::Publish {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            source,
        })?;

    debug!(exchange, routing_key, bytes = body.len(), "published");
    Ok(())
}
