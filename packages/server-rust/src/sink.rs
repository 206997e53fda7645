//! Destinations for log records that arrive over the broker or RPC.

use async_trait::async_trait;
use relay_core::action::LogPayload;

use crate::dispatch::operation::DispatchError;
use crate::transport::http::{post_log, HttpPeer};

/// Persists one log record.
#[async_trait]
pub trait LogSink: Send + Sync + 'static {
    async fn write(&self, record: &LogPayload) -> Result<(), DispatchError>;
}

/// Writes records to the log-persistence peer with `POST /log`.
#[derive(Debug, Clone)]
pub struct HttpLogSink {
    peer: HttpPeer,
}

impl HttpLogSink {
    #[must_use]
    pub fn new(peer: HttpPeer) -> Self {
        Self { peer }
    }
}

#[async_trait]
impl LogSink for HttpLogSink {
    async fn write(&self, record: &LogPayload) -> Result<(), DispatchError> {
        post_log(&self.peer, record, None).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;

    use super::*;
    use crate::test_support::spawn_peer;

    #[tokio::test]
    async fn non_success_status_is_rejection() {
        let router = Router::new().route("/log", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
        let base = spawn_peer(router).await;
        let sink = HttpLogSink::new(HttpPeer::new("logger", base, Duration::from_secs(5)).unwrap());

        let err = sink.write(&LogPayload::default()).await.unwrap_err();

        assert!(matches!(
            err,
            DispatchError::PeerRejected { peer: "logger", status: Some(500), .. }
        ));
    }
}
