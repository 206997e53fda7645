//! Broker error taxonomy.
//!
//! `BrokerError` is the raw failure of a single broker interaction, classified
//! as network or non-network. The other types say which stage failed and are
//! what callers see.

/// A single failed interaction with the broker.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BrokerError {
    /// Transient transport-level failure (refused, reset, missed heartbeat).
    #[error("broker network failure: {0}")]
    Network(String),
    /// Anything else: authentication, protocol violations, invalid state.
    #[error("broker protocol failure: {0}")]
    Protocol(String),
}

impl BrokerError {
    /// Whether retrying the same operation later could succeed.
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, BrokerError::Network(_))
    }
}

impl From<lapin::Error> for BrokerError {
    fn from(err: lapin::Error) -> Self {
        match err {
            lapin::Error::IOError(_) | lapin::Error::MissingHeartbeatError => {
                BrokerError::Network(err.to_string())
            }
            other => BrokerError::Protocol(other.to_string()),
        }
    }
}

/// The connection manager gave up.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("broker still unreachable after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: BrokerError,
    },
    #[error("cannot connect to broker: {0}")]
    Fatal(#[source] BrokerError),
}

/// A publish did not reach the broker.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to open publish channel: {0}")]
    Channel(#[source] BrokerError),
    #[error("failed to declare exchange `{exchange}`: {source}")]
    Declare {
        exchange: String,
        #[source]
        source: BrokerError,
    },
    #[error("failed to publish to `{exchange}` with key `{routing_key}`: {source}")]
    Publish {
        exchange: String,
        routing_key: String,
        #[source]
        source: BrokerError,
    },
    #[error("failed to encode message body: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The consumer could not be set up or its delivery stream failed.
#[derive(Debug, thiserror::Error)]
pub enum ConsumeError {
    #[error("failed to open consumer channel: {0}")]
    Channel(#[source] BrokerError),
    #[error("failed to declare exchange `{exchange}`: {source}")]
    DeclareExchange {
        exchange: String,
        #[source]
        source: BrokerError,
    },
    #[error("failed to declare queue: {0}")]
    DeclareQueue(#[source] BrokerError),
    #[error("failed to bind queue `{queue}` to `{pattern}`: {source}")]
    Bind {
        queue: String,
        pattern: String,
        #[source]
        source: BrokerError,
    },
    #[error("failed to start consuming `{queue}`: {source}")]
    Consume {
        queue: String,
        #[source]
        source: BrokerError,
    },
    #[error("delivery stream failed: {0}")]
    Stream(#[source] BrokerError),
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn io_errors_are_network_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = BrokerError::from(lapin::Error::IOError(Arc::new(io)));
        assert!(err.is_network());
    }

    #[test]
    fn missing_heartbeat_is_a_network_error() {
        assert!(BrokerError::from(lapin::Error::MissingHeartbeatError).is_network());
    }

    #[test]
    fn protocol_errors_are_not_retried() {
        assert!(!BrokerError::from(lapin::Error::ChannelsLimitReached).is_network());
    }

    #[test]
    fn exhausted_reports_attempts() {
        let err = ConnectionError::Exhausted {
            attempts: 6,
            source: BrokerError::Network("connection refused".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "broker still unreachable after 6 attempts: broker network failure: connection refused"
        );
    }
}
