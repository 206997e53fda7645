//! Network configuration for the gateway's HTTP surface.

use std::time::Duration;

/// Largest accepted request body (1 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    pub cors_origins: Vec<String>,
    /// Upper bound for handling one HTTP request, dispatch included.
    pub request_timeout: Duration,
    pub body_limit: usize,
    /// How long shutdown waits for in-flight requests.
    pub drain_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            request_timeout: Duration::from_secs(30),
            body_limit: DEFAULT_BODY_LIMIT,
            drain_timeout: Duration::from_secs(30),
        }
    }
}
