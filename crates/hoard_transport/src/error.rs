//! Error types for transport operations.

use std::path::PathBuf;

/// Errors that can occur while talking to a remote store.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The requested object does not exist.
    #[error("not found: {url}")]
    NotFound {
        /// The requested URL.
        url: String,
    },

    /// The server answered with an unexpected status.
    #[error("unexpected HTTP status {code} for {url}")]
    Status {
        /// The requested URL.
        url: String,
        /// The HTTP status code.
        code: u16,
    },

    /// The request could not be completed (connection, TLS, timeout).
    #[error("request to {url} failed: {reason}")]
    Http {
        /// The requested URL.
        url: String,
        /// Description of the failure.
        reason: String,
    },

    /// A filesystem operation failed.
    #[error("transport I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The URL scheme has no transport backend.
    #[error("unsupported URL scheme: {url}")]
    UnsupportedScheme {
        /// The offending URL.
        url: String,
    },

    /// The URL cannot be mapped to a location.
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl TransportError {
    /// Returns true if the error means the object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TransportError::NotFound { .. })
    }
}
