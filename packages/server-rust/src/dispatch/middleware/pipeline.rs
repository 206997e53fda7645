//! Pipeline composition: wraps the router with the dispatch middleware.

use tower::util::BoxCloneSyncService;
use tower::ServiceBuilder;

use super::metrics::MetricsLayer;
use super::timeout::TimeoutLayer;
use crate::dispatch::operation::{Delivered, Dispatch, DispatchError};
use crate::dispatch::router::DispatchRouter;

/// The type-erased, cloneable dispatch pipeline.
pub type DispatchPipeline = BoxCloneSyncService<Dispatch, Delivered, DispatchError>;

/// Build the dispatch pipeline around `router`.
///
/// Layer order (outermost to innermost):
/// 1. `MetricsLayer` -- records every outcome, timeouts included
/// 2. `TimeoutLayer` -- enforces the per-dispatch deadline
#[must_use]
pub fn build_dispatch_pipeline(router: DispatchRouter) -> DispatchPipeline {
    BoxCloneSyncService::new(
        ServiceBuilder::new()
            .layer(MetricsLayer)
            .layer(TimeoutLayer)
            .service(router),
    )
}
