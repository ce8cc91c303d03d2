//! Incremental build cache engine.
//!
//! For every project of a multi-project build the engine fingerprints the
//! inputs, looks up a build cached under that fingerprint, restores its
//! artifacts and skips the steps whose recorded outcome still holds. Builds
//! that run for real are saved back to the cache afterwards.
//!
//! A build tool integrates through [`FingerprintSource`] and
//! [`StepExecutor`], opens one [`CacheSession`] per build, and drives each
//! project through [`ExecutionStrategy::execute`].

#![warn(missing_docs)]

pub mod archive;
pub mod controller;
pub mod diff;
pub mod error;
pub mod executor;
pub mod project;
mod restore;
mod save;
pub mod scm;
pub mod segment;
pub mod session;
pub mod strategy;
pub mod verifier;

pub use controller::{CacheController, ProjectGuard, ALWAYS_RUN_PLUGINS_PROPERTY};
pub use diff::{compare, write_diff_artifacts};
pub use error::{CacheError, ExecutionError};
pub use executor::{
    ExecutionLog, FingerprintSource, ParameterProvider, SkipCandidate, StepDecision,
    StepExecutor, StepParameters,
};
pub use project::{Project, ProjectArtifact};
pub use segment::Segments;
pub use session::{CacheSession, SessionSettings};
pub use strategy::{BuildOutcome, ExecutionStrategy, StrategyState};
pub use verifier::{ConsistencyVerifier, TrustFlag};
