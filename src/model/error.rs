//! Error types for the synchronization engine.
//!
//! This module defines the failure taxonomy using `thiserror` for structured error
//! handling. Nothing in this taxonomy is fatal: the engine runs inside a host page
//! whose own function must not be disrupted, so every failure is absorbed locally
//! and surfaced through status and logs.
//!
//! # Error Hierarchy
//!
//! - [`FetchError`] - Remote resource failures (transport, HTTP status, JSON parsing)
//!   - [`TransportError`] - What the HTTP transport seam reports before status/body handling
//! - [`StoreError`] - Local key-value store failures (I/O, serialization)
//! - [`SubscriberError`] - A navigation subscriber refused or failed a transition
//! - [`InitError`] - The orchestrator was started somewhere it must not run
//!
//! Route classification is total and never errors. A cache miss is a sentinel
//! (`None`), not an error. Support-index construction skips offending packages
//! and reports the skip count instead of failing.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of one remote fetch, as returned across the gateway boundary.
///
/// The gateway never panics and never retries: a failed fetch hands this value
/// back to the caller, who may re-invoke. The orchestrator records it as the
/// last error and aborts only the current page's handler.
///
/// # Examples
///
/// ```
/// use voucher_lens::model::error::FetchError;
///
/// let err = FetchError::Http { status: 502 };
/// assert_eq!(err.kind(), "http");
/// assert!(err.to_string().contains("502"));
/// ```
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The request never produced a response (DNS, TLS, connection reset, ...).
    ///
    /// **Recovery**: Logged; the page handler is aborted. A later navigation or a
    /// manual refresh issues a fresh request.
    #[error("Network error: {message}")]
    Network {
        /// Transport-level description of the failure.
        message: String,
    },

    /// The request exceeded the fixed per-request bound.
    ///
    /// This is the timeout case of a network failure; [`FetchError::kind`] reports
    /// it as `"network"`.
    #[error("Request timeout: {url}")]
    Timeout {
        /// URL that timed out.
        url: String,
    },

    /// The server answered with a non-2xx status.
    #[error("HTTP error: {status}")]
    Http {
        /// Numeric HTTP status code.
        status: u16,
    },

    /// The body of a 2xx response was not valid JSON.
    ///
    /// Valid JSON in an unexpected shape is *not* a parse error: unknown envelopes
    /// normalize to an empty list.
    #[error("JSON parse error: {message}")]
    Parse {
        /// Parser message.
        message: String,
    },
}

impl FetchError {
    /// Coarse failure class: `"network"`, `"http"` or `"parse"`.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network { .. } | FetchError::Timeout { .. } => "network",
            FetchError::Http { .. } => "http",
            FetchError::Parse { .. } => "parse",
        }
    }
}

/// Failure reported by an [`crate::gateway::HttpTransport`] implementation.
///
/// Status codes and bodies are not transport failures; they come back as a
/// response and are judged by the gateway.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The request did not complete within its timeout.
    #[error("request timed out")]
    Timeout,

    /// The request could not be sent or the response could not be read.
    #[error("request failed: {message}")]
    Connect {
        /// Transport-level description.
        message: String,
    },
}

/// Errors from the local key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("Store I/O error at {path}: {source}")]
    Io {
        /// Backing file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The stored map could not be encoded or decoded.
    #[error("Store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Error returned by a navigation subscriber.
///
/// The monitor logs it and carries on delivering the transition to the
/// remaining subscribers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Subscriber failed: {message}")]
pub struct SubscriberError {
    /// What went wrong.
    pub message: String,
}

impl SubscriberError {
    /// Build from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Reasons the orchestrator refuses to start.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InitError {
    /// The current page is not on the configured target host.
    ///
    /// The engine stays inert; nothing is installed on the page.
    #[error("Not running on the target host: {url}")]
    ForeignHost {
        /// URL observed at startup.
        url: String,
    },
}
