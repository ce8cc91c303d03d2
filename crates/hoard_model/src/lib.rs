//! Persistent and in-memory data model of the Hoard build cache.
//!
//! Build records describe one completed build of a project for a given
//! fingerprint: the steps that ran with their recorded parameters, the
//! artifacts produced, and the input manifest the fingerprint was computed
//! from. Records are encoded with a [`RecordFormat`] and are never mutated
//! once written.

#![warn(missing_docs)]

pub mod codec;
pub mod diff;
pub mod error;
pub mod inputs;
pub mod record;
pub mod report;
pub mod result;

pub use codec::RecordFormat;
pub use diff::{BuildDiff, MismatchEntry};
pub use error::CodecError;
pub use inputs::{DigestItem, DigestKind, InputManifest};
pub use record::{
    ArtifactRecord, BuildRecord, CompletedStep, PropertyValue, ScmInfo, TrackedProperty,
    CACHE_IMPLEMENTATION_VERSION,
};
pub use report::{CacheReport, ProjectReport};
pub use result::{CacheContext, CacheResult, CacheSource, CacheStatus};
