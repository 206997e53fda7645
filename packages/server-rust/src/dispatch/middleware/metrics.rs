//! Metrics middleware for dispatches.
//!
//! Wraps each dispatch in a `dispatch` tracing span and records
//! `relay_dispatch_total` and `relay_dispatch_duration_seconds` through the
//! `metrics` facade. Without an installed recorder the facade is a no-op.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::dispatch::operation::{Delivered, Dispatch, DispatchError};

pub const DISPATCH_TOTAL: &str = "relay_dispatch_total";
pub const DISPATCH_DURATION: &str = "relay_dispatch_duration_seconds";

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

/// Service wrapper that records dispatch duration and outcome.
#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

impl<S> Service<Dispatch> for MetricsService<S>
where
    S: Service<Dispatch, Response = Delivered, Error = DispatchError> + Send,
    S::Future: Send + 'static,
{
    type Response = Delivered;
    type Error = DispatchError;
    type Future = Pin<Box<dyn Future<Output = Result<Delivered, DispatchError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, dispatch: Dispatch) -> Self::Future {
        let kind = dispatch.ctx.kind.as_str();
        let transport = dispatch.ctx.transport.as_str();
        let call_id = dispatch.ctx.call_id;

        let span = info_span!(
            "dispatch",
            kind = kind,
            transport = transport,
            call_id = call_id,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = self.inner.call(dispatch);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let elapsed = start.elapsed();

                let outcome = match &result {
                    Ok(_) => "ok",
                    Err(err) => failure_label(err),
                };

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = elapsed.as_millis() as u64;
                tracing::Span::current().record("duration_ms", duration_ms);
                tracing::Span::current().record("outcome", outcome);

                metrics::counter!(
                    DISPATCH_TOTAL,
                    "kind" => kind,
                    "transport" => transport,
                    "outcome" => outcome
                )
                .increment(1);
                metrics::histogram!(DISPATCH_DURATION, "kind" => kind, "transport" => transport)
                    .record(elapsed.as_secs_f64());

                match &result {
                    Ok(_) => tracing::info!(
                        kind,
                        transport,
                        call_id,
                        duration_ms,
                        outcome,
                        "dispatch complete"
                    ),
                    Err(err) => tracing::warn!(
                        kind,
                        transport,
                        call_id,
                        duration_ms,
                        outcome,
                        error = %err,
                        "dispatch failed"
                    ),
                }

                result
            }
            .instrument(span),
        )
    }
}

fn failure_label(err: &DispatchError) -> &'static str {
    match err {
        DispatchError::UnknownAction { .. } => "unknown_action",
        DispatchError::MissingPayload { .. } | DispatchError::Malformed(_) => "malformed",
        DispatchError::NoTransport { .. } | DispatchError::WrongTransport { .. } => {
            "misconfigured"
        }
        DispatchError::InvalidCredentials => "invalid_credentials",
        DispatchError::PeerUnreachable { .. } => "peer_unreachable",
        DispatchError::PeerRejected { .. } => "peer_rejected",
        DispatchError::Timeout { .. } => "timeout",
        DispatchError::Publish(_) => "publish_failed",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
