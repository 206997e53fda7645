//! Gateway handlers and the state they share.

pub mod handle;
pub mod health;
pub mod root;

pub use handle::handle_handler;
pub use health::{health_handler, liveness_handler, readiness_handler};
pub use root::root_handler;

use std::sync::Arc;
use std::time::Instant;

use super::{NetworkConfig, ShutdownController};
use crate::dispatch::Dispatcher;

/// State carried through axum extractors. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub shutdown: Arc<ShutdownController>,
    pub config: Arc<NetworkConfig>,
    /// Used for the uptime reported by `/health`.
    pub start_time: Instant,
}

#[cfg(test)]
pub(crate) fn test_state(dispatcher: Dispatcher) -> AppState {
    AppState {
        dispatcher,
        shutdown: Arc::new(ShutdownController::new()),
        config: Arc::new(NetworkConfig::default()),
        start_time: Instant::now(),
    }
}
