//! JSON-over-HTTP adapters for the identity, mail and log peers.

use std::time::Duration;

use async_trait::async_trait;
use relay_core::action::{ActionEnvelope, LogPayload};
use relay_core::outcome::JsonResponse;
use serde::Serialize;
use tracing::debug;

use super::{wrong_transport, Transport};
use crate::dispatch::operation::{Delivered, DispatchContext, DispatchError, TransportKind};

// ---------------------------------------------------------------------------
// HttpPeer
// ---------------------------------------------------------------------------

/// A named HTTP peer reached through a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpPeer {
    name: &'static str,
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpPeer {
    /// # Errors
    ///
    /// Returns the `reqwest` error if the client cannot be built (TLS backend
    /// initialisation).
    pub fn new(
        name: &'static str,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            name,
            base_url: base_url.into(),
            client,
            timeout,
        })
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// POST `body` as JSON to `path`. `deadline` overrides the client timeout.
    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
        deadline: Option<Duration>,
    ) -> Result<reqwest::Response, DispatchError> {
        let timeout = deadline.unwrap_or(self.timeout);
        self.client
            .post(self.url(path))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|err| self.classify(&err, timeout))
    }

    fn classify(&self, err: &reqwest::Error, timeout: Duration) -> DispatchError {
        if err.is_timeout() {
            DispatchError::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else {
            DispatchError::PeerUnreachable {
                peer: self.name,
                reason: err.to_string(),
            }
        }
    }

    fn rejected(&self, status: reqwest::StatusCode, message: impl Into<String>) -> DispatchError {
        DispatchError::PeerRejected {
            peer: self.name,
            status: Some(status.as_u16()),
            message: message.into(),
        }
    }
}

/// `POST /log` on the log-persistence peer; any 2xx is success.
pub(crate) async fn post_log(
    peer: &HttpPeer,
    record: &LogPayload,
    deadline: Option<Duration>,
) -> Result<(), DispatchError> {
    let response = peer.post_json("/log", record, deadline).await?;
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(peer.rejected(status, "error calling logger service"))
    }
}

// ---------------------------------------------------------------------------
// AuthTransport
// ---------------------------------------------------------------------------

/// Forwards credentials to the identity peer's `/authenticate`.
pub struct AuthTransport {
    peer: HttpPeer,
}

impl AuthTransport {
    #[must_use]
    pub fn new(peer: HttpPeer) -> Self {
        Self { peer }
    }
}

#[async_trait]
impl Transport for AuthTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    async fn send(
        &self,
        ctx: &DispatchContext,
        envelope: ActionEnvelope,
    ) -> Result<Delivered, DispatchError> {
        let credentials = match envelope {
            ActionEnvelope::Auth(credentials) => credentials,
            other => return Err(wrong_transport(self.kind(), &other)),
        };

        let response = self
            .peer
            .post_json("/authenticate", &credentials, Some(ctx.timeout))
            .await?;

        // Any non-success status is a credential rejection, whatever the body says.
        let status = response.status();
        if !status.is_success() {
            debug!(peer = self.peer.name(), status = status.as_u16(), "identity peer refused");
            return Err(DispatchError::InvalidCredentials);
        }

        let body: JsonResponse = response.json().await.map_err(|err| {
            self.peer
                .rejected(status, format!("invalid response from {}: {err}", self.peer.name()))
        })?;
        if body.error {
            debug!(peer = self.peer.name(), message = %body.message, "identity peer flagged error");
            return Err(DispatchError::InvalidCredentials);
        }

        Ok(Delivered::message("Authenticated!").with_data(body.data))
    }
}

// ---------------------------------------------------------------------------
// MailTransport
// ---------------------------------------------------------------------------

/// Forwards messages to the mail peer's `/send`.
pub struct MailTransport {
    peer: HttpPeer,
}

impl MailTransport {
    #[must_use]
    pub fn new(peer: HttpPeer) -> Self {
        Self { peer }
    }
}

#[async_trait]
impl Transport for MailTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    async fn send(
        &self,
        ctx: &DispatchContext,
        envelope: ActionEnvelope,
    ) -> Result<Delivered, DispatchError> {
        let mail = match envelope {
            ActionEnvelope::Mail(mail) => mail,
            other => return Err(wrong_transport(self.kind(), &other)),
        };

        let response = self
            .peer
            .post_json("/send", &mail, Some(ctx.timeout))
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.peer.rejected(status, "error calling mail service"));
        }
        Ok(Delivered::message(format!("Message send to {}", mail.to)))
    }
}

// ---------------------------------------------------------------------------
// LogHttpTransport
// ---------------------------------------------------------------------------

/// Writes log records with `POST /log` on the log peer.
pub struct LogHttpTransport {
    peer: HttpPeer,
}

impl LogHttpTransport {
    #[must_use]
    pub fn new(peer: HttpPeer) -> Self {
        Self { peer }
    }
}

#[async_trait]
impl Transport for LogHttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    async fn send(
        &self,
        ctx: &DispatchContext,
        envelope: ActionEnvelope,
    ) -> Result<Delivered, DispatchError> {
        let record = match envelope {
            ActionEnvelope::Log(record) => record,
            other => return Err(wrong_transport(self.kind(), &other)),
        };
        post_log(&self.peer, &record, Some(ctx.timeout)).await?;
        Ok(Delivered::message("Logged"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
