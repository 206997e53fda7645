//! Normalized dispatch results and the gateway's JSON response envelope.

use serde::{Deserialize, Serialize};

/// Why a dispatch failed. Drives the HTTP status the gateway answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The request body could not be decoded or lacked the selected payload.
    MalformedRequest,
    /// The `action` field named no known kind.
    UnknownAction,
    /// The identity peer rejected the credentials.
    InvalidCredentials,
    /// The peer could not be reached (dial/connect/IO failure).
    PeerUnreachable,
    /// The peer answered with a non-success status or an error-flagged body.
    PeerRejected,
    /// The call exceeded its deadline.
    Timeout,
    /// The broker refused or failed the publish.
    BrokerUnavailable,
    /// The gateway has no transport able to carry the action.
    Misconfigured,
}

impl FailureKind {
    /// HTTP status code reported to the gateway caller.
    #[must_use]
    pub fn status_code(self) -> u16 {
        match self {
            FailureKind::MalformedRequest | FailureKind::UnknownAction => 400,
            FailureKind::InvalidCredentials => 401,
            FailureKind::PeerUnreachable
            | FailureKind::PeerRejected
            | FailureKind::Timeout
            | FailureKind::BrokerUnavailable
            | FailureKind::Misconfigured => 500,
        }
    }
}

/// The result of one dispatch, independent of the transport that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<serde_json::Value>,
    /// Set on failures only; never part of the wire shape.
    #[serde(skip)]
    pub failure: Option<FailureKind>,
}

impl Outcome {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
            data: None,
            failure: None,
        }
    }

    #[must_use]
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            data: None,
            failure: Some(kind),
        }
    }

    /// Attaches peer-provided data. `null` is treated as absent.
    #[must_use]
    pub fn with_data(mut self, data: Option<serde_json::Value>) -> Self {
        self.data = data.filter(|v| !v.is_null());
        self
    }

    /// HTTP status for this outcome: 200 on success, else per failure kind.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self.failure {
            None if self.ok => 200,
            None => 500,
            Some(kind) => kind.status_code(),
        }
    }
}

/// JSON body exchanged with every HTTP peer and returned by the gateway:
/// `{"error": bool, "message": string, "data"?: any}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonResponse {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<serde_json::Value>,
}

impl JsonResponse {
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            error: false,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
            data: None,
        }
    }
}

impl From<Outcome> for JsonResponse {
    fn from(outcome: Outcome) -> Self {
        Self {
            error: !outcome.ok,
            message: outcome.message,
            data: outcome.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn success_maps_to_200() {
        assert_eq!(Outcome::success("Logged").status_code(), 200);
    }

    #[test]
    fn failure_statuses() {
        let cases = [
            (FailureKind::UnknownAction, 400),
            (FailureKind::MalformedRequest, 400),
            (FailureKind::InvalidCredentials, 401),
            (FailureKind::PeerUnreachable, 500),
            (FailureKind::PeerRejected, 500),
            (FailureKind::Timeout, 500),
            (FailureKind::BrokerUnavailable, 500),
        ];
        for (kind, status) in cases {
            assert_eq!(Outcome::failure(kind, "x").status_code(), status, "{kind:?}");
        }
    }

    #[test]
    fn outcome_wire_shape_hides_failure_kind() {
        let outcome = Outcome::failure(FailureKind::Timeout, "call timed out after 1000ms");
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            value,
            json!({"ok": false, "message": "call timed out after 1000ms"})
        );
    }

    #[test]
    fn json_response_from_outcome() {
        let outcome =
            Outcome::success("Authenticated!").with_data(Some(json!({"id": 1, "email": "a@x.com"})));
        let response = JsonResponse::from(outcome);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"error": false, "message": "Authenticated!", "data": {"id": 1, "email": "a@x.com"}})
        );
    }

    #[test]
    fn null_data_is_dropped() {
        let outcome = Outcome::success("ok").with_data(Some(serde_json::Value::Null));
        assert!(outcome.data.is_none());
    }

    #[test]
    fn peer_body_without_fields_decodes_with_defaults() {
        let response: JsonResponse = serde_json::from_str("{}").unwrap();
        assert!(!response.error);
        assert!(response.message.is_empty());
    }
}
