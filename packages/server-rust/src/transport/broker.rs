//! `log` actions published to the topic exchange.

use async_trait::async_trait;
use relay_core::action::ActionEnvelope;
use relay_core::broker::Severity;

use super::{wrong_transport, Transport};
use crate::broker::{BrokerSession, Publisher};
use crate::dispatch::operation::{Delivered, DispatchContext, DispatchError, TransportKind};

/// Publishes log records to `logs_topic` at `log.INFO`.
pub struct BrokerTransport<S> {
    publisher: Publisher<S>,
}

impl<S: BrokerSession> BrokerTransport<S> {
    #[must_use]
    pub fn new(publisher: Publisher<S>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl<S: BrokerSession> Transport for BrokerTransport<S> {
    fn kind(&self) -> TransportKind {
        TransportKind::Broker
    }

    async fn send(
        &self,
        ctx: &DispatchContext,
        envelope: ActionEnvelope,
    ) -> Result<Delivered, DispatchError> {
        let record = match envelope {
            ActionEnvelope::Log(record) => record,
            other => return Err(wrong_transport(self.kind(), &other)),
        };

        match tokio::time::timeout(ctx.timeout, self.publisher.emit_log(Severity::Info, &record)).await
        {
            Ok(Ok(())) => Ok(Delivered::message("logged via message broker")),
            Ok(Err(err)) => Err(err.into()),
            Err(_elapsed) => Err(DispatchError::Timeout {
                timeout_ms: ctx.timeout_ms(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use relay_core::action::{ActionKind, LogPayload};
    use relay_core::broker::LOGS_EXCHANGE;

    use super::*;
    use crate::broker::memory::MemoryBroker;
    use crate::broker::{BrokerChannel, PublishError};

    fn ctx() -> DispatchContext {
        DispatchContext {
            call_id: 1,
            kind: ActionKind::Log,
            transport: TransportKind::Broker,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn publishes_info_record() {
        let broker = MemoryBroker::new();
        let channel = broker.open_channel().await.unwrap();
        channel.declare_topic_exchange(LOGS_EXCHANGE).await.unwrap();
        let queue = channel.declare_anonymous_queue().await.unwrap();
        channel.bind_queue(&queue, LOGS_EXCHANGE, "log.INFO").await.unwrap();
        let mut deliveries = channel.consume(&queue, "test").await.unwrap();

        let transport = BrokerTransport::new(Publisher::new(Arc::new(broker)));
        let record = LogPayload {
            name: "event".to_string(),
            data: "queued".to_string(),
        };
        let delivered = transport
            .send(&ctx(), ActionEnvelope::Log(record.clone()))
            .await
            .unwrap();

        assert_eq!(delivered.message, "logged via message broker");
        let delivery = futures_util::StreamExt::next(&mut deliveries).await.unwrap().unwrap();
        assert_eq!(delivery.routing_key, "log.INFO");
        assert_eq!(serde_json::from_slice::<LogPayload>(&delivery.body).unwrap(), record);
    }

    #[tokio::test]
    async fn broker_failure_is_publish_error() {
        let broker = MemoryBroker::new();
        broker.refuse_channels(true);
        let transport = BrokerTransport::new(Publisher::new(Arc::new(broker)));

        let err = transport
            .send(&ctx(), ActionEnvelope::Log(LogPayload::default()))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Publish(PublishError::Channel(_))));
        assert_eq!(err.failure_kind(), relay_core::outcome::FailureKind::BrokerUnavailable);
    }
}
