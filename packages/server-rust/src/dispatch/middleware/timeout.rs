//! Timeout middleware for dispatches.
//!
//! Rejects dispatches that exceed `ctx.timeout` with `DispatchError::Timeout`.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::{Layer, Service};

use crate::dispatch::operation::{Delivered, Dispatch, DispatchError};

// ---------------------------------------------------------------------------
// TimeoutLayer
// ---------------------------------------------------------------------------

/// Tower layer that bounds every dispatch by its own context deadline.
#[derive(Debug, Clone)]
pub struct TimeoutLayer;

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService { inner }
    }
}

// ---------------------------------------------------------------------------
// TimeoutService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TimeoutService<S> {
    inner: S,
}

impl<S> Service<Dispatch> for TimeoutService<S>
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
        let timeout = dispatch.ctx.timeout;
        let timeout_ms = dispatch.ctx.timeout_ms();
        let fut = self.inner.call(dispatch);
        Box::pin(async move {
            match tokio::time::timeout(timeout, fut).await {
                Ok(result) => result,
                Err(_elapsed) => Err(DispatchError::Timeout { timeout_ms }),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
