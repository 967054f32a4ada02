//! Error types for health-snapshot
//!
//! Two layers: `GatewayError` is what a provider call can fail with and is
//! always contained at the normalizer boundary, `ComputeError` covers setup
//! work (fixtures, config, date arithmetic) that callers must handle.

use crate::types::MetricKind;
use thiserror::Error;

/// Failures reported by a health-record provider call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    #[error("Health data provider is unavailable: {0}")]
    Unavailable(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Missing entitlement: {0}")]
    MissingEntitlement(String),

    #[error("Malformed query: {0}")]
    MalformedQuery(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected payload for {kind}: expected {expected}")]
    UnexpectedPayload {
        kind: MetricKind,
        expected: &'static str,
    },
}

/// Errors that can occur outside the per-metric boundary
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    ConfigError(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid UTC offset: {0}")]
    InvalidUtcOffset(String),

    #[error("Invalid clock format: {0}")]
    InvalidClockFormat(String),

    #[error("Date parse error: {0}")]
    DateParseError(String),

    #[error("Date out of range: {0}")]
    DateOutOfRange(String),
}
