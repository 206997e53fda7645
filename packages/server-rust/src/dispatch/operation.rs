//! Types that flow through the dispatch pipeline.

use std::fmt;
use std::time::Duration;

use relay_core::action::{ActionEnvelope, ActionKind, EnvelopeError};
use relay_core::outcome::{FailureKind, Outcome};

use crate::broker::PublishError;

/// How an action reaches its peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Http,
    Rpc,
    Broker,
}

impl TransportKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TransportKind::Http => "http",
            TransportKind::Rpc => "rpc",
            TransportKind::Broker => "broker",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context carried with every dispatch through the pipeline.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub call_id: u64,
    pub kind: ActionKind,
    pub transport: TransportKind,
    /// Deadline for the whole dispatch, transport round trip included.
    pub timeout: Duration,
}

impl DispatchContext {
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

/// A classified action ready for routing.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub ctx: DispatchContext,
    pub envelope: ActionEnvelope,
}

/// Successful transport result.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivered {
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl Delivered {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Option<serde_json::Value>) -> Self {
        self.data = data;
        self
    }
}

impl From<Delivered> for Outcome {
    fn from(delivered: Delivered) -> Self {
        Outcome::success(delivered.message).with_data(delivered.data)
    }
}

/// Errors produced while dispatching an action.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown action")]
    UnknownAction { action: String },
    #[error("missing `{kind}` payload")]
    MissingPayload { kind: ActionKind },
    #[error("malformed request: {0}")]
    Malformed(String),
    #[error("no transport registered for `{kind}` actions")]
    NoTransport { kind: ActionKind },
    #[error("`{transport}` transport cannot carry `{kind}` actions")]
    WrongTransport {
        kind: ActionKind,
        transport: TransportKind,
    },
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("{peer} unreachable: {reason}")]
    PeerUnreachable { peer: &'static str, reason: String },
    #[error("{message}")]
    PeerRejected {
        peer: &'static str,
        status: Option<u16>,
        message: String,
    },
    #[error("dispatch timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl DispatchError {
    /// The failure class reported to the gateway caller.
    #[must_use]
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            DispatchError::UnknownAction { .. } => FailureKind::UnknownAction,
            DispatchError::MissingPayload { .. } | DispatchError::Malformed(_) => {
                FailureKind::MalformedRequest
            }
            DispatchError::NoTransport { .. } | DispatchError::WrongTransport { .. } => {
                FailureKind::Misconfigured
            }
            DispatchError::InvalidCredentials => FailureKind::InvalidCredentials,
            DispatchError::PeerUnreachable { .. } => FailureKind::PeerUnreachable,
            DispatchError::PeerRejected { .. } => FailureKind::PeerRejected,
            DispatchError::Timeout { .. } => FailureKind::Timeout,
            DispatchError::Publish(_) => FailureKind::BrokerUnavailable,
        }
    }
}

impl From<EnvelopeError> for DispatchError {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::UnknownAction { action } => DispatchError::UnknownAction { action },
            EnvelopeError::MissingPayload { kind } => DispatchError::MissingPayload { kind },
        }
    }
}

impl From<DispatchError> for Outcome {
    fn from(err: DispatchError) -> Self {
        Outcome::failure(err.failure_kind(), err.to_string())
    }
}
