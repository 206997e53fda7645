//! Delivery handler for the listener: decode each log record and write it to the sink.

use std::sync::Arc;

use async_trait::async_trait;
use relay_core::action::LogPayload;
use tracing::debug;

use super::consumer::DeliveryHandler;
use crate::sink::LogSink;

/// The listener's handler: `log` and `event` records go to the sink,
/// anything else is ignored.
pub struct LogEventHandler<K> {
    sink: Arc<K>,
}

impl<K: LogSink> LogEventHandler<K> {
    #[must_use]
    pub fn new(sink: Arc<K>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl<K: LogSink> DeliveryHandler for LogEventHandler<K> {
    async fn handle(&self, record: LogPayload) -> anyhow::Result<()> {
        match record.name.as_str() {
            "log" | "event" => {
                self.sink.write(&record).await?;
                Ok(())
            }
            other => {
                debug!(name = %other, "no route for record");
                Ok(())
            }
        }
    }
}
