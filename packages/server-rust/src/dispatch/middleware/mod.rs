//! Tower middleware layers for the dispatch pipeline.
//!
//! - [`timeout`]: Per-dispatch deadline enforcement
//! - [`metrics`]: Dispatch timing and counting
//! - [`pipeline`]: Composes the layers into a single service stack

pub mod metrics;
pub mod pipeline;
pub mod timeout;

pub use metrics::MetricsLayer;
pub use pipeline::{build_dispatch_pipeline, DispatchPipeline};
pub use timeout::TimeoutLayer;
