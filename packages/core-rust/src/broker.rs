//! Broker wire contract shared by publishers and consumers.
//!
//! Messages travel over a single topic exchange, `logs_topic`. Publishers tag
//! each message with a `log.<SEVERITY>` routing key; consumers bind anonymous
//! queues to one or more routing-key patterns. Bodies are UTF-8 JSON
//! `{"name", "data"}`.

use std::fmt;

use crate::action::LogPayload;

/// Name of the shared topic exchange.
pub const LOGS_EXCHANGE: &str = "logs_topic";

/// Severity tag carried in the routing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Info, Severity::Warning, Severity::Error];

    /// Routing key used when publishing at this severity.
    #[must_use]
    pub fn routing_key(self) -> &'static str {
        match self {
            Severity::Info => "log.INFO",
            Severity::Warning => "log.WARNING",
            Severity::Error => "log.ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.routing_key())
    }
}

/// The binding set the listener uses: one exact pattern per severity.
#[must_use]
pub fn default_bindings() -> Vec<String> {
    Severity::ALL
        .iter()
        .map(|s| s.routing_key().to_string())
        .collect()
}

/// Encodes a log record as a broker message body.
///
/// # Errors
///
/// Returns an error only if JSON serialization fails, which cannot happen
/// for plain string fields but is surfaced rather than hidden.
pub fn encode_log(payload: &LogPayload) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(payload)
}

/// Decodes a broker message body into a log record, never failing.
///
/// A malformed body yields the empty record together with the decode error,
/// so the caller can log it and still hand the record to its handler.
#[must_use]
pub fn decode_log_lenient(body: &[u8]) -> (LogPayload, Option<serde_json::Error>) {
    match serde_json::from_slice(body) {
        Ok(payload) => (payload, None),
        Err(err) => (LogPayload::default(), Some(err)),
    }
}

/// AMQP topic matching: words are dot-separated, `*` matches exactly one
/// word and `#` matches zero or more words.
#[must_use]
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    matches_words(&pattern, &key)
}

fn matches_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| matches_words(rest, &key[skip..])),
        Some((&word, rest)) => match key.split_first() {
            Some((&k, key_rest)) if word == "*" || word == k => matches_words(rest, key_rest),
            _ => false,
        },
    }
}
