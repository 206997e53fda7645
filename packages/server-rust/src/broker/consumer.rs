//! Topic consumer with concurrent per-delivery handling.
//!
//! A consumer owns a fixed, ordered set of routing-key patterns. `listen`
//! walks the setup states on a dedicated channel and then drains the
//! delivery stream, spawning one task per delivery. There is no bound on
//! the number of handler tasks in flight.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use futures_util::StreamExt;
use relay_core::action::LogPayload;
use relay_core::broker::decode_log_lenient;
use tracing::{debug, info, warn};

use super::error::ConsumeError;
use super::{BrokerChannel, BrokerSession, Delivery};

// ---------------------------------------------------------------------------
// ConsumerState
// ---------------------------------------------------------------------------

/// Lifecycle of a topic consumer.
///
/// ```text
/// Created -> ChannelOpen -> QueueDeclared -> Bound(1..=n) -> Consuming -> Stopped
///                                                                     \-> Failed
/// ```
/// Any setup step may also move straight to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Created,
    ChannelOpen,
    QueueDeclared,
    /// Number of patterns bound so far.
    Bound(usize),
    Consuming,
    Stopped,
    Failed,
}

impl fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsumerState::Created => f.write_str("created"),
            ConsumerState::ChannelOpen => f.write_str("channel_open"),
            ConsumerState::QueueDeclared => f.write_str("queue_declared"),
            ConsumerState::Bound(n) => write!(f, "bound({n})"),
            ConsumerState::Consuming => f.write_str("consuming"),
            ConsumerState::Stopped => f.write_str("stopped"),
            ConsumerState::Failed => f.write_str("failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// DeliveryHandler
// ---------------------------------------------------------------------------

/// Processes one decoded log record.
///
/// Deliveries are acknowledged before the handler runs, so an error here is
/// logged and the message is gone.
#[async_trait]
pub trait DeliveryHandler: Send + Sync + 'static {
    async fn handle(&self, record: LogPayload) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// TopicConsumer
// ---------------------------------------------------------------------------

pub struct TopicConsumer<S> {
    session: Arc<S>,
    exchange: String,
    bindings: Vec<String>,
    state: ArcSwap<ConsumerState>,
}

impl<S: BrokerSession> TopicConsumer<S> {
    /// Create a consumer for `bindings` on `exchange`, declaring the exchange
    /// on a short-lived setup channel.
    ///
    /// # Errors
    ///
    /// Returns `ConsumeError::Channel` or `ConsumeError::DeclareExchange` if
    /// the setup channel cannot be used.
    pub async fn new(
        session: Arc<S>,
        exchange: impl Into<String>,
        bindings: Vec<String>,
    ) -> Result<Self, ConsumeError> {
        let exchange = exchange.into();

        let channel = session.open_channel().await.map_err(ConsumeError::Channel)?;
        let declared = declare(&channel, &exchange).await;
        if let Err(err) = channel.close().await {
            debug!(exchange = %exchange, error = %err, "failed to close setup channel");
        }
        declared?;

        Ok(Self {
            session,
            exchange,
            bindings,
            state: ArcSwap::from_pointee(ConsumerState::Created),
        })
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConsumerState {
        **self.state.load()
    }

    #[must_use]
    pub fn bindings(&self) -> &[String] {
        &self.bindings
    }

    /// Consume until the delivery stream ends or fails.
    ///
    /// # Errors
    ///
    /// See [`TopicConsumer::listen_until`].
    pub async fn listen<H: DeliveryHandler>(&self, handler: Arc<H>) -> Result<(), ConsumeError> {
        self.listen_until(handler, std::future::pending()).await
    }

    /// Consume until the delivery stream ends, fails, or `shutdown` resolves.
    ///
    /// Handler tasks already spawned keep running after this returns.
    ///
    /// # Errors
    ///
    /// Returns the `ConsumeError` of the first failing setup step, or
    /// `ConsumeError::Stream` if the delivery stream yields an error. The
    /// consumer is `Failed` afterwards.
    pub async fn listen_until<H, F>(&self, handler: Arc<H>, shutdown: F) -> Result<(), ConsumeError>
    where
        H: DeliveryHandler,
        F: Future<Output = ()> + Send,
    {
        let channel = self
            .session
            .open_channel()
            .await
            .map_err(|err| self.fail(ConsumeError::Channel(err)))?;
        self.transition(ConsumerState::ChannelOpen);

        let result = self.consume_on(&channel, handler, shutdown).await;

        if let Err(err) = channel.close().await {
            debug!(exchange = %self.exchange, error = %err, "failed to close consumer channel");
        }
        result
    }

    async fn consume_on<C, H, F>(
        &self,
        channel: &C,
        handler: Arc<H>,
        shutdown: F,
    ) -> Result<(), ConsumeError>
    where
        C: BrokerChannel,
        H: DeliveryHandler,
        F: Future<Output = ()> + Send,
    {
        declare(channel, &self.exchange)
            .await
            .map_err(|err| self.fail(err))?;

        let queue = channel
            .declare_anonymous_queue()
            .await
            .map_err(|err| self.fail(ConsumeError::DeclareQueue(err)))?;
        self.transition(ConsumerState::QueueDeclared);

        for (bound, pattern) in self.bindings.iter().enumerate() {
            channel
                .bind_queue(&queue, &self.exchange, pattern)
                .await
                .map_err(|source| {
                    self.fail(ConsumeError::Bind {
                        queue: queue.clone(),
                        pattern: pattern.clone(),
                        source,
                    })
                })?;
            self.transition(ConsumerState::Bound(bound + 1));
        }

        let consumer_tag = format!("relay-{}", uuid::Uuid::new_v4());
        let mut deliveries = channel
            .consume(&queue, &consumer_tag)
            .await
            .map_err(|source| {
                self.fail(ConsumeError::Consume {
                    queue: queue.clone(),
                    source,
                })
            })?;
        self.transition(ConsumerState::Consuming);
        info!(
            exchange = %self.exchange,
            queue = %queue,
            bindings = ?self.bindings,
            "waiting for messages"
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    self.transition(ConsumerState::Stopped);
                    return Ok(());
                }
                next = deliveries.next() => match next {
                    Some(Ok(delivery)) => spawn_handler(&handler, delivery),
                    Some(Err(err)) => return Err(self.fail(ConsumeError::Stream(err))),
                    None => {
                        self.transition(ConsumerState::Stopped);
                        return Ok(());
                    }
                },
            }
        }
    }

    fn transition(&self, next: ConsumerState) {
        debug!(exchange = %self.exchange, state = %next, "consumer state");
        self.state.store(Arc::new(next));
    }

    fn fail(&self, err: ConsumeError) -> ConsumeError {
        warn!(exchange = %self.exchange, error = %err, "consumer failed");
        self.state.store(Arc::new(ConsumerState::Failed));
        err
    }
}

async fn declare<C: BrokerChannel>(channel: &C, exchange: &str) -> Result<(), ConsumeError> {
    channel
        .declare_topic_exchange(exchange)
        .await
        .map_err(|source| ConsumeError::DeclareExchange {
            exchange: exchange.to_string(),
            source,
        })
}

/// Decode leniently and hand the record to its own task.
fn spawn_handler<H: DeliveryHandler>(handler: &Arc<H>, delivery: Delivery) {
    let (record, decode_error) = decode_log_lenient(&delivery.body);
    if let Some(err) = decode_error {
        debug!(
            routing_key = %delivery.routing_key,
            error = %err,
            "undecodable delivery body, handling empty record"
        );
    }

    let handler = Arc::clone(handler);
    let routing_key = delivery.routing_key;
    tokio::spawn(async move {
        if let Err(err) = handler.handle(record).await {
            warn!(routing_key = %routing_key, error = %format_args!("{err:#}"), "delivery handler failed");
        }
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
