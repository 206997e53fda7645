//! Broker connection establishment with quadratic backoff.
//!
//! Every broker-dependent process calls [`ConnectionManager::connect`] once at
//! startup and passes the resulting connection to its publishers and
//! consumers. Network failures are retried, anything else aborts at once.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::error::{BrokerError, ConnectionError};

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Retry budget and delay unit for connection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Number of failed attempts tolerated before giving up. The attempt
    /// after the last retry is the final one.
    pub max_retries: u32,
    /// Delay after the n-th failure is `n² × unit`.
    pub unit: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            unit: Duration::from_secs(1),
        }
    }
}

impl BackoffPolicy {
    /// Delay slept after the given (1-based) failure.
    #[must_use]
    pub fn delay(&self, failure: u32) -> Duration {
        self.unit.saturating_mul(failure.saturating_mul(failure))
    }

    /// Iterator over every delay this policy allows, in order.
    #[must_use]
    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: *self,
            failures: 0,
        }
    }
}

/// Quadratic backoff iterator.
///
/// Yields `1² × unit, 2² × unit, …` and ends after `max_retries` items.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    failures: u32,
}

impl Backoff {
    /// Number of failures recorded so far, the exhausting one included.
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        self.failures += 1;

        if self.failures > self.policy.max_retries {
            None
        } else {
            Some(self.policy.delay(self.failures))
        }
    }
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

/// Makes a single connection attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: Send;

    /// Try to connect once. The error's classification decides whether the
    /// manager retries.
    async fn try_connect(&self) -> Result<Self::Connection, BrokerError>;

    /// Human-readable target for logs. Must not contain credentials.
    fn target(&self) -> String;
}

// ---------------------------------------------------------------------------
// ConnectionManager
// ---------------------------------------------------------------------------

/// Connects through a `Connector`, retrying network failures with backoff.
pub struct ConnectionManager<C> {
    connector: C,
    policy: BackoffPolicy,
}

impl<C: Connector> ConnectionManager<C> {
    #[must_use]
    pub fn new(connector: C, policy: BackoffPolicy) -> Self {
        Self { connector, policy }
    }

    #[must_use]
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Connect, blocking the caller for the backoff delays between attempts.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::Fatal` on the first non-network failure.
    /// - `ConnectionError::Exhausted` once a network failure occurs with the
    ///   retry budget spent, carrying the last error.
    pub async fn connect(&self) -> Result<C::Connection, ConnectionError> {
        let target = self.connector.target();
        let mut backoff = self.policy.backoff();

        loop {
            let err = match self.connector.try_connect().await {
                Ok(connection) => {
                    info!(
                        broker = %target,
                        attempts = backoff.failures() + 1,
                        "connected to broker"
                    );
                    return Ok(connection);
                }
                Err(err) => err,
            };

            if !err.is_network() {
                error!(broker = %target, error = %err, "non-network failure connecting to broker");
                return Err(ConnectionError::Fatal(err));
            }

            let Some(delay) = backoff.next() else {
                let attempts = backoff.failures();
                error!(broker = %target, attempts, error = %err, "giving up on broker");
                return Err(ConnectionError::Exhausted {
                    attempts,
                    source: err,
                });
            };

            warn!(
                broker = %target,
                attempt = backoff.failures(),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "broker not yet ready, backing off"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
