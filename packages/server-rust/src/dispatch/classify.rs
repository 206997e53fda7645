//! Request classification: turns a validated envelope into a routable `Dispatch`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use relay_core::action::{ActionEnvelope, ActionRequest};

use super::config::DispatchConfig;
use super::operation::{Dispatch, DispatchContext, DispatchError};

/// Assigns call ids, transports and deadlines to incoming actions.
pub struct ActionClassifier {
    config: Arc<DispatchConfig>,
    call_id_counter: AtomicU64,
}

impl ActionClassifier {
    #[must_use]
    pub fn new(config: Arc<DispatchConfig>) -> Self {
        Self {
            config,
            call_id_counter: AtomicU64::new(1),
        }
    }

    fn next_call_id(&self) -> u64 {
        self.call_id_counter.fetch_add(1, Ordering::Relaxed)
    }

    #[must_use]
    pub fn classify(&self, envelope: ActionEnvelope) -> Dispatch {
        let kind = envelope.kind();
        let transport = self.config.transport_for(kind);
        Dispatch {
            ctx: DispatchContext {
                call_id: self.next_call_id(),
                kind,
                transport,
                timeout: self.config.deadline(transport),
            },
            envelope,
        }
    }

    /// Validate a raw request and classify it.
    ///
    /// # Errors
    ///
    /// `DispatchError::UnknownAction` or `DispatchError::MissingPayload` when
    /// the request does not form a valid envelope.
    pub fn parse(&self, request: ActionRequest) -> Result<Dispatch, DispatchError> {
        let envelope = ActionEnvelope::try_from(request)?;
        Ok(self.classify(envelope))
    }
}
