//! `log` actions over the binary RPC protocol.
//!
//! Every dispatch dials, makes one `RPCServer.LogInfo` call and closes the
//! connection; nothing is pooled. The whole exchange is bounded by the
//! dispatch deadline, and dropping the connection on expiry closes it.

use async_trait::async_trait;
use relay_core::action::ActionEnvelope;
use relay_core::rpc::{RpcLogPayload, LOG_INFO_METHOD};
use tracing::debug;

use super::{wrong_transport, Transport};
use crate::dispatch::operation::{Delivered, DispatchContext, DispatchError, TransportKind};
use crate::rpc::{RpcClient, RpcError};

const PEER: &str = "logger rpc";

pub struct RpcTransport {
    addr: String,
}

impl RpcTransport {
    #[must_use]
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    async fn log_info(&self, payload: RpcLogPayload) -> Result<String, RpcError> {
        let mut client = RpcClient::dial(&self.addr).await?;
        let result = client.call(LOG_INFO_METHOD, &payload).await;
        if let Err(err) = client.close().await {
            debug!(addr = %self.addr, error = %err, "failed to close rpc connection");
        }
        result
    }
}

#[async_trait]
impl Transport for RpcTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Rpc
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

        match tokio::time::timeout(ctx.timeout, self.log_info(record.into())).await {
            Ok(Ok(reply)) => Ok(Delivered::message(reply)),
            Ok(Err(err)) => Err(classify(err)),
            Err(_elapsed) => Err(DispatchError::Timeout {
                timeout_ms: ctx.timeout_ms(),
            }),
        }
    }
}

fn classify(err: RpcError) -> DispatchError {
    match err {
        RpcError::Dial { .. } | RpcError::Io(_) | RpcError::Closed => DispatchError::PeerUnreachable {
            peer: PEER,
            reason: err.to_string(),
        },
        RpcError::Remote(_)
        | RpcError::Encode(_)
        | RpcError::Decode(_)
        | RpcError::SequenceMismatch { .. } => DispatchError::PeerRejected {
            peer: PEER,
            status: None,
            message: err.to_string(),
        },
    }
}
