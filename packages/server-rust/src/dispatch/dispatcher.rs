//! The gateway's entry point into the dispatch pipeline.

use std::sync::Arc;

use relay_core::action::{ActionEnvelope, ActionRequest};
use relay_core::outcome::Outcome;
use tower::ServiceExt;
use tracing::debug;

use super::classify::ActionClassifier;
use super::config::DispatchConfig;
use super::middleware::{build_dispatch_pipeline, DispatchPipeline};
use super::operation::DispatchError;
use super::router::DispatchRouter;

/// Classifies actions and runs them through the pipeline, always producing
/// an `Outcome`.
#[derive(Clone)]
pub struct Dispatcher {
    classifier: Arc<ActionClassifier>,
    pipeline: DispatchPipeline,
}

impl Dispatcher {
    #[must_use]
    pub fn new(router: DispatchRouter, config: Arc<DispatchConfig>) -> Self {
        Self {
            classifier: Arc::new(ActionClassifier::new(config)),
            pipeline: build_dispatch_pipeline(router),
        }
    }

    /// Dispatch a validated envelope to its transport.
    pub async fn dispatch(&self, envelope: ActionEnvelope) -> Outcome {
        let dispatch = self.classifier.classify(envelope);
        match self.pipeline.clone().oneshot(dispatch).await {
            Ok(delivered) => delivered.into(),
            Err(err) => err.into(),
        }
    }

    /// Validate a raw request, then dispatch it. Unknown kinds and missing
    /// payloads never reach a transport.
    pub async fn handle(&self, request: ActionRequest) -> Outcome {
        let action = request.action.clone();
        match self.classifier.parse(request) {
            Ok(dispatch) => match self.pipeline.clone().oneshot(dispatch).await {
                Ok(delivered) => delivered.into(),
                Err(err) => err.into(),
            },
            Err(err) => {
                debug!(action = %action, error = %err, "rejected action");
                err.into()
            }
        }
    }

    /// Decode a JSON request body, then [`handle`](Self::handle) it.
    pub async fn handle_json(&self, body: &[u8]) -> Outcome {
        match serde_json::from_slice::<ActionRequest>(body) {
            Ok(request) => self.handle(request).await,
            Err(err) => DispatchError::Malformed(err.to_string()).into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use proptest::prelude::*;
    use relay_core::action::{ActionKind, LogPayload};
    use relay_core::outcome::FailureKind;

    use super::*;
    use crate::dispatch::operation::{Delivered, DispatchContext, TransportKind};
    use crate::transport::Transport;

    /// Counts calls and keeps every envelope it was handed.
    struct Recording {
        kind: TransportKind,
        calls: AtomicUsize,
        seen: Mutex<Vec<ActionEnvelope>>,
    }

    impl Recording {
        fn new(kind: TransportKind) -> Arc<Self> {
            Arc::new(Self {
                kind,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for Recording {
        fn kind(&self) -> TransportKind {
            self.kind
        }

        async fn send(
            &self,
            _ctx: &DispatchContext,
            envelope: ActionEnvelope,
        ) -> Result<Delivered, DispatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push(envelope);
            Ok(Delivered::message("recorded"))
        }
    }

    struct Fixture {
        dispatcher: Dispatcher,
        auth: Arc<Recording>,
        log: Arc<Recording>,
        mail: Arc<Recording>,
    }

    impl Fixture {
        fn new() -> Self {
            let auth = Recording::new(TransportKind::Http);
            let log = Recording::new(TransportKind::Rpc);
            let mail = Recording::new(TransportKind::Http);
            let router = DispatchRouter::builder()
                .route(ActionKind::Auth, auth.clone())
                .route(ActionKind::Log, log.clone())
                .route(ActionKind::Mail, mail.clone())
                .build();
            Self {
                dispatcher: Dispatcher::new(router, Arc::new(DispatchConfig::default())),
                auth,
                log,
                mail,
            }
        }

        fn total_calls(&self) -> usize {
            [&self.auth, &self.log, &self.mail]
                .iter()
                .map(|t| t.calls.load(Ordering::SeqCst))
                .sum()
        }
    }

    #[tokio::test]
    async fn log_envelope_reaches_rpc_exactly_once_with_fields_intact() {
        let fixture = Fixture::new();
        let payload = LogPayload {
            name: "event".to_string(),
            data: "ünïcode \u{1F600} and \"quotes\"".to_string(),
        };

        let outcome = fixture
            .dispatcher
            .dispatch(ActionEnvelope::Log(payload.clone()))
            .await;

        assert!(outcome.ok);
        assert_eq!(fixture.log.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fixture.total_calls(), 1);
        assert_eq!(*fixture.log.seen.lock(), vec![ActionEnvelope::Log(payload)]);
    }

    #[tokio::test]
    async fn json_body_is_parsed_and_dispatched() {
        let fixture = Fixture::new();
        let body = br#"{"action":"mail","mail":{"from":"a@x.com","to":"b@x.com","subject":"hi","message":"hello"},"log":{"name":"ignored","data":""}}"#;

        let outcome = fixture.dispatcher.handle_json(body).await;

        assert!(outcome.ok);
        assert_eq!(fixture.mail.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fixture.total_calls(), 1);
    }

    #[tokio::test]
    async fn malformed_body_is_rejected_without_transport() {
        let fixture = Fixture::new();

        let outcome = fixture.dispatcher.handle_json(b"{\"action\":").await;

        assert!(!outcome.ok);
        assert_eq!(outcome.failure, Some(FailureKind::MalformedRequest));
        assert_eq!(outcome.status_code(), 400);
        assert_eq!(fixture.total_calls(), 0);
    }

    #[tokio::test]
    async fn missing_payload_is_rejected_without_transport() {
        let fixture = Fixture::new();
        let request = ActionRequest {
            action: "log".to_string(),
            ..ActionRequest::default()
        };

        let outcome = fixture.dispatcher.handle(request).await;

        assert_eq!(outcome.status_code(), 400);
        assert_eq!(outcome.message, "missing `log` payload");
        assert_eq!(fixture.total_calls(), 0);
    }

    proptest! {
        #[test]
        fn unknown_actions_never_reach_a_transport(action in "\\PC{0,24}") {
            prop_assume!(action.parse::<ActionKind>().is_err());

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            let fixture = Fixture::new();
            let request = ActionRequest {
                action,
                log: Some(LogPayload::default()),
                ..ActionRequest::default()
            };

            let outcome = runtime.block_on(fixture.dispatcher.handle(request));

            prop_assert!(!outcome.ok);
            prop_assert_eq!(outcome.message.as_str(), "unknown action");
            prop_assert_eq!(outcome.status_code(), 400);
            prop_assert_eq!(fixture.total_calls(), 0);
        }
    }
}
