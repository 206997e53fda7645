//! Action envelopes accepted at the gateway boundary.
//!
//! The gateway receives a loosely-typed JSON body (`ActionRequest`) whose
//! `action` field names the kind of work to perform and whose sibling fields
//! carry the payloads. Parsing turns it into an `ActionEnvelope`, a tagged
//! union that holds exactly the payload selected by the kind.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

/// The kinds of action the gateway knows how to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Credential check against the identity service.
    Auth,
    /// A named log record for the log-persistence service.
    Log,
    /// An outbound mail message.
    Mail,
}

impl ActionKind {
    /// Every known kind, in decision-table order.
    pub const ALL: [ActionKind; 3] = [ActionKind::Auth, ActionKind::Log, ActionKind::Mail];

    /// Wire name of the kind, as it appears in the `action` field.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Auth => "auth",
            ActionKind::Log => "log",
            ActionKind::Mail => "mail",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auth" => Ok(ActionKind::Auth),
            "log" => Ok(ActionKind::Log),
            "mail" => Ok(ActionKind::Mail),
            other => Err(EnvelopeError::UnknownAction {
                action: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Credentials forwarded to the identity service's `/authenticate` endpoint.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthPayload {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for AuthPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthPayload")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A named log record.
///
/// The JSON shape `{"name", "data"}` is shared by the HTTP log endpoint and
/// the broker message body, so a recipient decodes it identically whichever
/// transport delivered it. Missing fields decode as empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogPayload {
    pub name: String,
    pub data: String,
}

/// A mail message forwarded to the mail service's `/send` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MailPayload {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// ActionRequest (raw body)
// ---------------------------------------------------------------------------

/// The raw `POST /handle` body before the kind is validated.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub auth: Option<AuthPayload>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub log: Option<LogPayload>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mail: Option<MailPayload>,
}

// ---------------------------------------------------------------------------
// ActionEnvelope
// ---------------------------------------------------------------------------

/// A validated action: the kind and exactly one matching payload.
///
/// Immutable after construction; consumed by dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionEnvelope {
    Auth(AuthPayload),
    Log(LogPayload),
    Mail(MailPayload),
}

impl ActionEnvelope {
    /// The kind that selected this envelope's payload.
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionEnvelope::Auth(_) => ActionKind::Auth,
            ActionEnvelope::Log(_) => ActionKind::Log,
            ActionEnvelope::Mail(_) => ActionKind::Mail,
        }
    }
}

impl From<ActionEnvelope> for ActionRequest {
    fn from(envelope: ActionEnvelope) -> Self {
        let action = envelope.kind().as_str().to_string();
        match envelope {
            ActionEnvelope::Auth(auth) => ActionRequest {
                action,
                auth: Some(auth),
                ..ActionRequest::default()
            },
            ActionEnvelope::Log(log) => ActionRequest {
                action,
                log: Some(log),
                ..ActionRequest::default()
            },
            ActionEnvelope::Mail(mail) => ActionRequest {
                action,
                mail: Some(mail),
                ..ActionRequest::default()
            },
        }
    }
}

impl TryFrom<ActionRequest> for ActionEnvelope {
    type Error = EnvelopeError;

    /// Selects the payload named by `action`. Payloads for other kinds that
    /// happen to be present are ignored.
    fn try_from(request: ActionRequest) -> Result<Self, Self::Error> {
        let kind: ActionKind = request.action.parse()?;
        let missing = EnvelopeError::MissingPayload { kind };
        match kind {
            ActionKind::Auth => request.auth.map(ActionEnvelope::Auth).ok_or(missing),
            ActionKind::Log => request.log.map(ActionEnvelope::Log).ok_or(missing),
            ActionKind::Mail => request.mail.map(ActionEnvelope::Mail).ok_or(missing),
        }
    }
}

/// Errors from validating an `ActionRequest`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("unknown action")]
    UnknownAction { action: String },
    #[error("missing `{kind}` payload")]
    MissingPayload { kind: ActionKind },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
