//! Action dispatch: classification, routing, and the middleware around it.
//!
//! 1. **Classification** (`classify`): `ActionEnvelope` -> `Dispatch`
//! 2. **Middleware** (`middleware`): Tower layers (timeout, metrics)
//! 3. **Routing** (`router`): Dispatch to transports by `ActionKind`
//! 4. **Entry point** (`dispatcher`): always yields an `Outcome`

pub mod classify;
pub mod config;
pub mod dispatcher;
pub mod middleware;
pub mod operation;
pub mod router;

pub use classify::ActionClassifier;
pub use config::{DispatchConfig, LogTransport};
pub use dispatcher::Dispatcher;
pub use operation::{Delivered, Dispatch, DispatchContext, DispatchError, TransportKind};
pub use router::{DispatchRouter, DispatchRouterBuilder};
