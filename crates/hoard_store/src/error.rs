//! Error types for store operations.

use hoard_model::CodecError;
use hoard_transport::TransportError;
use std::path::PathBuf;

/// Errors that can occur while reading or writing the cache.
///
/// Lookups are fail-safe: corrupt entries and remote failures become misses.
/// These errors surface from saves and from filesystem failures that leave
/// the cache in an unknown state.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A record or report could not be encoded or decoded.
    #[error("cache codec error at {location}: {source}")]
    Codec {
        /// File path or URL of the object.
        location: String,
        /// The underlying codec error.
        source: CodecError,
    },

    /// The remote store failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
