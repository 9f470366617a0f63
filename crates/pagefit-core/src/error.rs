#![forbid(unsafe_code)]

//! Error types.
//!
//! The runtime adapters themselves never fail: absent features and absent
//! collectors are normal states. Errors exist only at the edges, for loading
//! configuration and for best-effort calls into host bridges.

use thiserror::Error;

/// Failure to load or validate a [`PageFitConfig`](crate::PageFitConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {}", .0.join("; "))]
    Validation(Vec<String>),
}

/// Failure reported by a best-effort host bridge call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The bridge object exists but its entry point is not callable.
    #[error("bridge `{0}` is not callable")]
    NotCallable(&'static str),
    /// The bridge threw while handling the message.
    #[error("bridge `{bridge}` rejected message: {message}")]
    Rejected {
        bridge: &'static str,
        message: String,
    },
}
