//! Error types for record encoding and decoding.

/// Errors that can occur while encoding or decoding a record.
///
/// Decoding errors are never fatal to a build: callers treat an undecodable
/// record as corrupt and fall back to a cache miss.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The JSON form could not be produced or parsed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// The binary form has an invalid or missing header.
    #[error("invalid record header: {reason}")]
    InvalidHeader {
        /// Description of the header problem.
        reason: String,
    },

    /// The binary format version does not match the current version.
    #[error("record format version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// The expected format version.
        expected: u32,
        /// The format version found in the data.
        actual: u32,
    },

    /// The stored checksum does not match the payload.
    #[error("record checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Checksum from the header.
        expected: String,
        /// Checksum computed over the payload.
        actual: String,
    },

    /// The binary payload could not be produced or parsed.
    #[error("binary codec error: {reason}")]
    Binary {
        /// Description of the failure.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_mismatch_display() {
        let err = CodecError::VersionMismatch {
            expected: 2,
            actual: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("expected 2"));
        assert!(msg.contains("got 1"));
    }

    #[test]
    fn json_error_converts() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: CodecError = json_err.into();
        assert!(err.to_string().starts_with("JSON codec error"));
    }
}
