//! Helpers shared by in-crate tests.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use relay_core::action::LogPayload;
use tokio::net::TcpListener;

use crate::dispatch::operation::DispatchError;
use crate::sink::LogSink;

/// Serve `router` on an ephemeral loopback port and return its base URL.
pub(crate) async fn spawn_peer(router: axum::Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// A loopback address nothing is listening on.
pub(crate) async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Sink that keeps every record in memory.
#[derive(Default, Clone)]
pub(crate) struct MemorySink {
    records: Arc<Mutex<Vec<LogPayload>>>,
}

impl MemorySink {
    pub fn records(&self) -> Vec<LogPayload> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn write(&self, record: &LogPayload) -> Result<(), DispatchError> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}
