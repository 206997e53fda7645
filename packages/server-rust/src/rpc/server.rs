//! RPC callee: a method table served over the length-delimited framing.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, Stream, StreamExt};
use relay_core::action::LogPayload;
use relay_core::rpc::{self, RpcLogPayload, RpcRequest, RpcResponse, LOG_INFO_METHOD};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use super::{framed, RpcFramed};
use crate::sink::LogSink;

/// Pause after a failed accept before trying again.
pub const ACCEPT_ERROR_DELAY: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// RpcMethod
// ---------------------------------------------------------------------------

/// A callable method. Takes and returns `MsgPack` bytes; an `Err` string is
/// sent to the caller as the reply's error.
#[async_trait]
pub trait RpcMethod: Send + Sync + 'static {
    async fn call(&self, params: &[u8]) -> Result<Vec<u8>, String>;
}

/// `RPCServer.LogInfo`: writes a `{Name, Data}` record to a `LogSink`.
pub struct LogInfoMethod<K> {
    sink: Arc<K>,
}

impl<K: LogSink> LogInfoMethod<K> {
    #[must_use]
    pub fn new(sink: Arc<K>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl<K: LogSink> RpcMethod for LogInfoMethod<K> {
    async fn call(&self, params: &[u8]) -> Result<Vec<u8>, String> {
        let payload: RpcLogPayload =
            rpc::decode(params).map_err(|err| format!("invalid LogInfo payload: {err}"))?;
        let reply = format!("Processed payload via RPC: {}", payload.name);

        self.sink
            .write(&LogPayload::from(payload))
            .await
            .map_err(|err| err.to_string())?;

        rpc::encode(&reply).map_err(|err| err.to_string())
    }
}

// ---------------------------------------------------------------------------
// RpcServer
// ---------------------------------------------------------------------------

/// Serves registered methods, one task per connection.
#[derive(Default, Clone)]
pub struct RpcServer {
    methods: Arc<HashMap<String, Arc<dyn RpcMethod>>>,
}

impl RpcServer {
    #[must_use]
    pub fn builder() -> RpcServerBuilder {
        RpcServerBuilder::default()
    }

    /// A server exposing only `RPCServer.LogInfo` backed by `sink`.
    #[must_use]
    pub fn log_service<K: LogSink>(sink: Arc<K>) -> Self {
        Self::builder()
            .method(LOG_INFO_METHOD, LogInfoMethod::new(sink))
            .build()
    }

    /// Accept connections on `listener` until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Never fails today; accept errors are logged and retried.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let incoming = futures_util::stream::unfold(listener, |listener| async move {
            let accepted = listener.accept().await;
            Some((accepted, listener))
        });
        self.serve_incoming(incoming, shutdown).await
    }

    /// Serve every connection `incoming` yields until `shutdown` resolves.
    ///
    /// A failed accept (aborted handshake, descriptor exhaustion) pauses for
    /// [`ACCEPT_ERROR_DELAY`] and keeps serving.
    ///
    /// # Errors
    ///
    /// Never fails today; accept errors are logged and retried.
    pub async fn serve_incoming<I, F>(self, incoming: I, shutdown: F) -> anyhow::Result<()>
    where
        I: Stream<Item = io::Result<(TcpStream, SocketAddr)>> + Send,
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(incoming);
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("rpc server stopping");
                    return Ok(());
                }
                accepted = incoming.next() => {
                    let (stream, peer) = match accepted {
                        Some(Ok(pair)) => pair,
                        Some(Err(err)) => {
                            warn!(error = %err, "rpc accept failed");
                            tokio::time::sleep(ACCEPT_ERROR_DELAY).await;
                            continue;
                        }
                        None => {
                            info!("rpc listener closed");
                            return Ok(());
                        }
                    };
                    debug!(peer = %peer, "rpc connection accepted");
                    let server = self.clone();
                    tokio::spawn(async move {
                        server.serve_connection(framed(stream)).await;
                        debug!(peer = %peer, "rpc connection closed");
                    });
                }
            }
        }
    }

    async fn serve_connection(&self, mut frames: RpcFramed) {
        while let Some(frame) = frames.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(err) => {
                    warn!(error = %err, "rpc read failed");
                    return;
                }
            };
            let request: RpcRequest = match rpc::decode(&frame) {
                Ok(request) => request,
                Err(err) => {
                    warn!(error = %err, "undecodable rpc request, dropping connection");
                    return;
                }
            };

            let response = self.dispatch(request).await;
            let bytes = match rpc::encode(&response) {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(error = %err, "failed to encode rpc reply");
                    return;
                }
            };
            if let Err(err) = frames.send(Bytes::from(bytes)).await {
                warn!(error = %err, "rpc write failed");
                return;
            }
        }
    }

    async fn dispatch(&self, request: RpcRequest) -> RpcResponse {
        let result = match self.methods.get(&request.method) {
            Some(method) => method.call(&request.params).await,
            None => Err(format!("rpc: can't find method {}", request.method)),
        };
        match result {
            Ok(result) => RpcResponse {
                seq: request.seq,
                error: None,
                result,
            },
            Err(message) => {
                debug!(method = %request.method, error = %message, "rpc call failed");
                RpcResponse {
                    seq: request.seq,
                    error: Some(message),
                    result: Vec::new(),
                }
            }
        }
    }
}

#[derive(Default)]
pub struct RpcServerBuilder {
    methods: HashMap<String, Arc<dyn RpcMethod>>,
}

impl RpcServerBuilder {
    #[must_use]
    pub fn method(mut self, name: impl Into<String>, method: impl RpcMethod) -> Self {
        self.methods.insert(name.into(), Arc::new(method));
        self
    }

    #[must_use]
    pub fn build(self) -> RpcServer {
        RpcServer {
            methods: Arc::new(self.methods),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
