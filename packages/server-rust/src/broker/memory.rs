//! In-process topic broker used by tests.
//!
//! Implements `BrokerSession`/`BrokerChannel` with AMQP topic semantics:
//! exchanges route to every queue with a matching binding, anonymous queues
//! get server-generated names, and consuming hands out an unbounded stream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::Mutex;
use relay_core::broker::topic_matches;
use tokio::sync::mpsc;

use super::{BrokerChannel, BrokerError, BrokerSession, Delivery, DeliveryStream};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Binding {
    pub queue: String,
    pub pattern: String,
}

#[derive(Default)]
struct State {
    /// Exchange name -> bindings, in bind order.
    exchanges: HashMap<String, Vec<Binding>>,
    queues: HashMap<String, mpsc::UnboundedSender<Delivery>>,
    unconsumed: HashMap<String, mpsc::UnboundedReceiver<Delivery>>,
    next_queue: u64,
    declarations: usize,
}

/// A shared in-memory broker. Cloning yields another handle to the same state.
#[derive(Clone, Default)]
pub(crate) struct MemoryBroker {
    state: Arc<Mutex<State>>,
    refuse_channels: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
    nack_publishes: Arc<AtomicBool>,
    channels_opened: Arc<AtomicUsize>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `open_channel` fail with a network error.
    pub fn refuse_channels(&self, refuse: bool) {
        self.refuse_channels.store(refuse, Ordering::SeqCst);
    }

    /// Make every subsequent publish come back negatively acknowledged.
    pub fn nack_publishes(&self, nack: bool) {
        self.nack_publishes.store(nack, Ordering::SeqCst);
    }

    pub fn channels_opened(&self) -> usize {
        self.channels_opened.load(Ordering::SeqCst)
    }

    pub fn bindings(&self, exchange: &str) -> Vec<Binding> {
        self.state
            .lock()
            .exchanges
            .get(exchange)
            .cloned()
            .unwrap_or_default()
    }

    pub fn exchange_declarations(&self) -> usize {
        self.state.lock().declarations
    }
}

#[async_trait]
impl BrokerSession for MemoryBroker {
    type Channel = MemoryChannel;

    async fn open_channel(&self) -> Result<MemoryChannel, BrokerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Protocol("connection is closed".to_string()));
        }
        if self.refuse_channels.load(Ordering::SeqCst) {
            return Err(BrokerError::Network("connection reset by peer".to_string()));
        }
        self.channels_opened.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryChannel {
            state: Arc::clone(&self.state),
            nack_publishes: Arc::clone(&self.nack_publishes),
        })
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.closed.store(true, Ordering::SeqCst);
        let mut state = self.state.lock();
        state.queues.clear();
        state.unconsumed.clear();
        Ok(())
    }
}

pub(crate) struct MemoryChannel {
    state: Arc<Mutex<State>>,
    nack_publishes: Arc<AtomicBool>,
}

#[async_trait]
impl BrokerChannel for MemoryChannel {
    async fn declare_topic_exchange(&self, name: &str) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        state.declarations += 1;
        state.exchanges.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
    ) -> Result<(), BrokerError> {
        let state = self.state.lock();
        let Some(bindings) = state.exchanges.get(exchange) else {
            return Err(BrokerError::Protocol(format!(
                "NOT_FOUND - no exchange '{exchange}'"
            )));
        };
        if self.nack_publishes.load(Ordering::SeqCst) {
            return Err(BrokerError::Protocol(format!(
                "broker nacked publish to `{exchange}`"
            )));
        }

        // A queue bound by several matching patterns still gets one copy.
        let mut delivered: Vec<&str> = Vec::new();
        for binding in bindings {
            if delivered.contains(&binding.queue.as_str())
                || !topic_matches(&binding.pattern, routing_key)
            {
                continue;
            }
            if let Some(queue) = state.queues.get(&binding.queue) {
                let _ = queue.send(Delivery {
                    routing_key: routing_key.to_string(),
                    body: body.to_vec(),
                });
            }
            delivered.push(&binding.queue);
        }
        Ok(())
    }

    async fn declare_anonymous_queue(&self) -> Result<String, BrokerError> {
        let mut state = self.state.lock();
        state.next_queue += 1;
        let name = format!("amq.gen-{}", state.next_queue);
        let (tx, rx) = mpsc::unbounded_channel();
        state.queues.insert(name.clone(), tx);
        state.unconsumed.insert(name.clone(), rx);
        Ok(name)
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        pattern: &str,
    ) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        if !state.queues.contains_key(queue) {
            return Err(BrokerError::Protocol(format!("NOT_FOUND - no queue '{queue}'")));
        }
        let Some(bindings) = state.exchanges.get_mut(exchange) else {
            return Err(BrokerError::Protocol(format!(
                "NOT_FOUND - no exchange '{exchange}'"
            )));
        };
        let binding = Binding {
            queue: queue.to_string(),
            pattern: pattern.to_string(),
        };
        if !bindings.contains(&binding) {
            bindings.push(binding);
        }
        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        _consumer_tag: &str,
    ) -> Result<DeliveryStream, BrokerError> {
        let Some(rx) = self.state.lock().unconsumed.remove(queue) else {
            return Err(BrokerError::Protocol(format!(
                "RESOURCE_LOCKED - queue '{queue}' already consumed or missing"
            )));
        };

        Ok(futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|delivery| (Ok(delivery), rx))
        })
        .boxed())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        Ok(())
    }
}
