//! Error types for the cache engine.

use std::path::PathBuf;

use hoard_common::{ProjectId, Step};
use hoard_config::ConfigError;
use hoard_model::CodecError;
use hoard_store::StoreError;
use hoard_transport::TransportError;

/// Errors raised by the cache engine.
///
/// Lookup and restore are fail-safe and turn most of these into cache
/// misses. Only [`CacheError::FailFast`], [`CacheError::Execution`] and
/// [`CacheError::ProjectBusy`] abort a project build.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing build outputs.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The local or remote store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A transport could not be created.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A record or report could not be encoded.
    #[error("cannot encode {location}: {source}")]
    Codec {
        /// What was being encoded.
        location: String,
        /// The codec failure.
        source: CodecError,
    },

    /// An output archive could not be created or extracted.
    #[error("archive error at {path}: {reason}")]
    Archive {
        /// The archive path.
        path: PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// A build step failed.
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// Fail-fast mode is on and the project was not fully restored.
    #[error("failed to restore project {project} from cache, failing build")]
    FailFast {
        /// The project that was not restored.
        project: ProjectId,
    },

    /// Another worker is already building the project.
    #[error("project {project} is already being built by another worker")]
    ProjectBusy {
        /// The contended project.
        project: ProjectId,
    },

    /// A tracked parameter could not be resolved when recording a step.
    #[error("tracked property {name} of {step} is not accessible")]
    PropertyNotAccessible {
        /// The step being recorded.
        step: String,
        /// The parameter name.
        name: String,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure of a build step reported by the step executor.
#[derive(Debug, thiserror::Error)]
#[error("step {step} failed: {reason}")]
pub struct ExecutionError {
    /// The failed step.
    pub step: String,
    /// Description of the failure.
    pub reason: String,
}

impl ExecutionError {
    /// Creates an error for `step`.
    pub fn new(step: &Step, reason: impl Into<String>) -> Self {
        Self {
            step: step.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoard_common::PluginCoords;

    #[test]
    fn fail_fast_display() {
        let err = CacheError::FailFast {
            project: ProjectId::new("org.acme", "core", "1.0"),
        };
        assert!(err.to_string().contains("org.acme:core:1.0"));
    }

    #[test]
    fn execution_error_names_step() {
        let step = Step::new(
            PluginCoords::new("org.p", "compiler-plugin", "3.1"),
            "compile",
            "default-compile",
            Some("compile"),
        );
        let err: CacheError = ExecutionError::new(&step, "exit code 1").into();
        let msg = err.to_string();
        assert!(msg.contains("compiler-plugin:compile"));
        assert!(msg.contains("exit code 1"));
    }

    #[test]
    fn store_errors_are_transparent() {
        let err: CacheError = StoreError::Io {
            path: PathBuf::from("/cache/v1"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        }
        .into();
        assert!(err.to_string().contains("/cache/v1"));
    }
}
