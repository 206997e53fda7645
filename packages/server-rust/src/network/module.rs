//! Network module with deferred startup.
//!
//! `new()` allocates shared state, `start()` binds the listener, and
//! `serve()` accepts connections until shutdown. Binding before serving lets
//! callers learn the OS-assigned port.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{
    handle_handler, health_handler, liveness_handler, readiness_handler, root_handler, AppState,
};
use super::middleware::build_http_layers;
use super::shutdown::ShutdownController;
use crate::dispatch::Dispatcher;

pub struct NetworkModule {
    config: NetworkConfig,
    dispatcher: Dispatcher,
    listener: Option<TcpListener>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    #[must_use]
    pub fn new(config: NetworkConfig, dispatcher: Dispatcher) -> Self {
        Self {
            config,
            dispatcher,
            listener: None,
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    /// Shared with background tasks that need to observe or trigger shutdown.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Routes:
    /// - `POST /handle` -- dispatch one action
    /// - `POST /` -- reachability check
    /// - `GET /health`, `/health/live`, `/health/ready`
    pub fn build_router(&self) -> Router {
        router(AppState {
            dispatcher: self.dispatcher.clone(),
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::new(self.config.clone()),
            start_time: Instant::now(),
        })
    }

    /// Binds the configured address and returns the bound port.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!(host = %self.config.host, port, "gateway listener bound");

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves until `shutdown` resolves, then drains in-flight requests for
    /// up to `drain_timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called or the server hits a
    /// fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| anyhow::anyhow!("start() must be called before serve()"))?;
        let router = self.build_router();
        let shutdown_ctrl = self.shutdown;
        let config = self.config;

        shutdown_ctrl.set_ready();

        // Readiness must flip before axum starts its own graceful drain.
        let draining = Arc::clone(&shutdown_ctrl);
        let shutdown = async move {
            shutdown.await;
            info!("shutdown requested, draining");
            draining.trigger_shutdown();
        };

        info!("serving HTTP");
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        drain(&shutdown_ctrl, &config).await;
        Ok(())
    }
}

fn router(state: AppState) -> Router {
    let layers = build_http_layers(&state.config);

    Router::new()
        .route("/handle", post(handle_handler))
        .route("/", post(root_handler))
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .layer(DefaultBodyLimit::max(state.config.body_limit))
        .layer(layers)
        .with_state(state)
}

async fn drain(shutdown_ctrl: &ShutdownController, config: &NetworkConfig) {
    if shutdown_ctrl.wait_for_drain(config.drain_timeout).await {
        info!("in-flight requests drained");
    } else {
        warn!(
            in_flight = shutdown_ctrl.in_flight_count(),
            "drain timeout expired with requests still in flight"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use relay_core::action::{ActionEnvelope, ActionKind};
    use relay_core::outcome::JsonResponse;
    use tokio::sync::{oneshot, Notify};

    use super::*;
    use crate::dispatch::{
        Delivered, DispatchConfig, DispatchContext, DispatchError, DispatchRouter, TransportKind,
    };
    use crate::network::HealthState;
    use crate::transport::Transport;

    struct Logged;

    #[async_trait]
    impl Transport for Logged {
        fn kind(&self) -> TransportKind {
            TransportKind::Rpc
        }

        async fn send(
            &self,
            _ctx: &DispatchContext,
            _envelope: ActionEnvelope,
        ) -> Result<Delivered, DispatchError> {
            Ok(Delivered::message("Processed payload via RPC: event"))
        }
    }

    fn module() -> NetworkModule {
        let config = NetworkConfig {
            host: "127.0.0.1".to_string(),
            ..NetworkConfig::default()
        };
        let router = DispatchRouter::builder()
            .route(ActionKind::Log, Arc::new(Logged))
            .build();
        NetworkModule::new(
            config,
            Dispatcher::new(router, Arc::new(DispatchConfig::default())),
        )
    }

    #[test]
    fn new_does_not_bind() {
        let module = module();
        assert!(module.listener.is_none());
        assert_eq!(module.shutdown_controller().health_state(), HealthState::Starting);
    }

    #[tokio::test]
    async fn start_binds_os_assigned_port() {
        let mut module = module();
        let port = module.start().await.unwrap();
        assert!(port > 0);
        assert!(module.listener.is_some());
    }

    #[tokio::test]
    async fn serve_without_start_is_an_error() {
        let err = module().serve(std::future::pending::<()>()).await.unwrap_err();
        assert!(err.to_string().contains("start() must be called"));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        use axum::body::Body;
        use axum::http::Request;
        use tower::ServiceExt;

        let module = module();
        module.shutdown_controller().set_ready();
        let request = Request::post("/handle")
            .header("content-length", 2 * 1024 * 1024)
            .body(Body::from(vec![b' '; 2 * 1024 * 1024]))
            .unwrap();

        let response = module.build_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), 413);
    }

    #[tokio::test]
    async fn serves_routes_and_drains_on_shutdown() {
        let mut module = module();
        let port = module.start().await.unwrap();
        let controller = module.shutdown_controller();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(module.serve(async move {
            let _ = stop_rx.await;
        }));

        let base = format!("http://127.0.0.1:{port}");
        let client = reqwest::Client::new();

        let ready = client.get(format!("{base}/health/ready")).send().await.unwrap();
        assert_eq!(ready.status(), 200);

        let root: JsonResponse = client
            .post(format!("{base}/"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(root.message, "Hit the broker");

        let handled = client
            .post(format!("{base}/handle"))
            .body(r#"{"action":"log","log":{"name":"event","data":"hello"}}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(handled.status(), 200);
        assert!(handled.headers().contains_key("x-request-id"));
        let body: JsonResponse = handled.json().await.unwrap();
        assert_eq!(body.message, "Processed payload via RPC: event");

        let unknown = client
            .post(format!("{base}/handle"))
            .body(r#"{"action":"teleport"}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(unknown.status(), 400);

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
        assert_eq!(controller.health_state(), HealthState::Stopped);
    }

    struct Held {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl Transport for Held {
        fn kind(&self) -> TransportKind {
            TransportKind::Rpc
        }

        async fn send(
            &self,
            _ctx: &DispatchContext,
            _envelope: ActionEnvelope,
        ) -> Result<Delivered, DispatchError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(Delivered::message("released"))
        }
    }

    #[tokio::test]
    async fn readiness_drops_while_requests_are_still_in_flight() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let router = DispatchRouter::builder()
            .route(
                ActionKind::Log,
                Arc::new(Held {
                    entered: Arc::clone(&entered),
                    release: Arc::clone(&release),
                }),
            )
            .build();
        let dispatch_config = DispatchConfig {
            rpc_timeout: Duration::from_secs(30),
            ..DispatchConfig::default()
        };
        let mut module = NetworkModule::new(
            NetworkConfig {
                host: "127.0.0.1".to_string(),
                ..NetworkConfig::default()
            },
            Dispatcher::new(router, Arc::new(dispatch_config)),
        );
        let port = module.start().await.unwrap();
        let controller = module.shutdown_controller();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(module.serve(async move {
            let _ = stop_rx.await;
        }));

        let request = tokio::spawn(async move {
            reqwest::Client::new()
                .post(format!("http://127.0.0.1:{port}/handle"))
                .body(r#"{"action":"log","log":{"name":"event","data":"held"}}"#)
                .send()
                .await
                .unwrap()
                .status()
        });
        entered.notified().await;
        assert_eq!(controller.in_flight_count(), 1);

        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while controller.health_state() != HealthState::Draining {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert!(!controller.accepting());
        assert_eq!(controller.in_flight_count(), 1);

        release.notify_one();
        assert_eq!(request.await.unwrap(), 200);
        server.await.unwrap().unwrap();
        assert_eq!(controller.health_state(), HealthState::Stopped);
    }
}
