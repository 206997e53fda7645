//! Transport adapters: carry one action to its peer and normalize the result.
//!
//! - [`http`]: JSON over HTTP (identity, mail, log peers)
//! - [`rpc`]: `RPCServer.LogInfo` over the binary RPC protocol
//! - [`broker`]: publish log records to the topic exchange

pub mod broker;
pub mod http;
pub mod rpc;

use async_trait::async_trait;
use relay_core::action::ActionEnvelope;

use crate::dispatch::operation::{Delivered, DispatchContext, DispatchError, TransportKind};

pub use broker::BrokerTransport;
pub use http::{AuthTransport, HttpPeer, LogHttpTransport, MailTransport};
pub use rpc::RpcTransport;

/// One way of delivering an action.
///
/// Adapters translate their own failures into `PeerUnreachable`,
/// `PeerRejected`, `Timeout` (or `InvalidCredentials` for identity checks)
/// and honour `ctx.timeout` themselves.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    fn kind(&self) -> TransportKind;

    async fn send(
        &self,
        ctx: &DispatchContext,
        envelope: ActionEnvelope,
    ) -> Result<Delivered, DispatchError>;
}

/// Rejects an envelope that reached an adapter registered for another kind.
pub(crate) fn wrong_transport(transport: TransportKind, envelope: &ActionEnvelope) -> DispatchError {
    DispatchError::WrongTransport {
        kind: envelope.kind(),
        transport,
    }
}
