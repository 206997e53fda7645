//! Dispatch deadlines and the choice of log transport.

use std::time::Duration;

use relay_core::action::ActionKind;

use super::operation::TransportKind;

/// Which transport carries `log` actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogTransport {
    /// `RPCServer.LogInfo` on the log service's RPC port.
    #[default]
    Rpc,
    /// Publish to `logs_topic` with routing key `log.INFO`.
    Broker,
    /// `POST /log` on the log service.
    Http,
}

impl From<LogTransport> for TransportKind {
    fn from(transport: LogTransport) -> Self {
        match transport {
            LogTransport::Rpc => TransportKind::Rpc,
            LogTransport::Broker => TransportKind::Broker,
            LogTransport::Http => TransportKind::Http,
        }
    }
}

/// Deadlines and transport selection for the dispatch pipeline.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Client timeout for HTTP peers.
    pub http_timeout: Duration,
    /// Deadline for one RPC dial + call + close.
    pub rpc_timeout: Duration,
    /// Deadline for one broker publish, confirmation included.
    pub publish_timeout: Duration,
    pub log_transport: LogTransport,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(10),
            rpc_timeout: Duration::from_secs(1),
            publish_timeout: Duration::from_secs(5),
            log_transport: LogTransport::default(),
        }
    }
}

impl DispatchConfig {
    /// The transport selected for `kind`.
    #[must_use]
    pub fn transport_for(&self, kind: ActionKind) -> TransportKind {
        match kind {
            ActionKind::Auth | ActionKind::Mail => TransportKind::Http,
            ActionKind::Log => self.log_transport.into(),
        }
    }

    /// The deadline applied to a dispatch over `transport`.
    #[must_use]
    pub fn deadline(&self, transport: TransportKind) -> Duration {
        match transport {
            TransportKind::Http => self.http_timeout,
            TransportKind::Rpc => self.rpc_timeout,
            TransportKind::Broker => self.publish_timeout,
        }
    }
}
