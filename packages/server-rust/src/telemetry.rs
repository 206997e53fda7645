//! Process-wide tracing and metrics setup.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info";

/// Builds the filter from an explicit directive, falling back to `info`.
///
/// # Errors
///
/// Returns the parse error for a malformed directive.
pub fn env_filter(directive: Option<&str>) -> Result<EnvFilter, tracing_subscriber::filter::ParseError> {
    EnvFilter::try_new(directive.unwrap_or(DEFAULT_FILTER))
}

/// Installs the global subscriber: `EnvFilter` plus a human-readable or
/// JSON `fmt` layer.
///
/// # Errors
///
/// Fails on a malformed filter or when a global subscriber is already set.
pub fn init_tracing(directive: Option<&str>, json: bool) -> anyhow::Result<()> {
    let filter = env_filter(directive)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .try_init()?;
    Ok(())
}

/// Serves Prometheus metrics on `addr` and installs the global recorder.
///
/// # Errors
///
/// Fails if the listener cannot be bound or a recorder is already installed.
pub fn install_metrics(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(%addr, "prometheus exporter listening");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_parses() {
        assert!(env_filter(None).is_ok());
    }

    #[test]
    fn per_crate_directives_parse() {
        assert!(env_filter(Some("warn,relay_server=debug,lapin=error")).is_ok());
    }

    #[test]
    fn malformed_directive_is_rejected() {
        assert!(env_filter(Some("relay_server=loud")).is_err());
    }
}
