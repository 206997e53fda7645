//! Dispatch routing: sends each `Dispatch` to the transport registered for its kind.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use relay_core::action::ActionKind;
use tower::Service;

use super::operation::{Delivered, Dispatch, DispatchError};
use crate::transport::Transport;

// ---------------------------------------------------------------------------
// DispatchRouter
// ---------------------------------------------------------------------------

/// Routes `Dispatch` values to the transport registered for their kind.
///
/// Cloning is cheap: clones share the same frozen transport table.
#[derive(Clone, Default)]
pub struct DispatchRouter {
    transports: Arc<HashMap<ActionKind, Arc<dyn Transport>>>,
}

impl DispatchRouter {
    #[must_use]
    pub fn builder() -> DispatchRouterBuilder {
        DispatchRouterBuilder::default()
    }

    /// Kinds that have a transport.
    #[must_use]
    pub fn kinds(&self) -> Vec<ActionKind> {
        let mut kinds: Vec<ActionKind> = self.transports.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

/// Collects transports before the table is frozen.
#[derive(Default)]
pub struct DispatchRouterBuilder {
    transports: HashMap<ActionKind, Arc<dyn Transport>>,
}

impl DispatchRouterBuilder {
    /// Register `transport` for `kind`, replacing any previous registration.
    #[must_use]
    pub fn route(mut self, kind: ActionKind, transport: Arc<dyn Transport>) -> Self {
        self.transports.insert(kind, transport);
        self
    }

    #[must_use]
    pub fn build(self) -> DispatchRouter {
        DispatchRouter {
            transports: Arc::new(self.transports),
        }
    }
}

impl Service<Dispatch> for DispatchRouter {
    type Response = Delivered;
    type Error = DispatchError;
    type Future = Pin<Box<dyn Future<Output = Result<Delivered, DispatchError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Transports are shared and stateless per call.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, dispatch: Dispatch) -> Self::Future {
        let kind = dispatch.ctx.kind;
        let Some(transport) = self.transports.get(&kind).cloned() else {
            return Box::pin(async move { Err(DispatchError::NoTransport { kind }) });
        };

        Box::pin(async move {
            if transport.kind() != dispatch.ctx.transport {
                return Err(DispatchError::WrongTransport {
                    kind,
                    transport: transport.kind(),
                });
            }
            transport.send(&dispatch.ctx, dispatch.envelope).await
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
