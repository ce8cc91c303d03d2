//! Shared foundational types for the Hoard build cache.
//!
//! This crate provides the content hashing primitives, project and plugin
//! coordinates, step identities and lifecycle phase ordering used by every
//! other crate in the workspace.

#![warn(missing_docs)]

pub mod coords;
pub mod hash;
pub mod lifecycle;
pub mod step;

pub use coords::{DependencySpec, PluginCoords, ProjectId};
pub use hash::{ContentHash, Fingerprint, HashAlgorithm, UnknownAlgorithm};
pub use step::{Step, StepKey};

/// Version segment at the top of the local and remote cache layouts.
///
/// Bumped when the layout or record format changes incompatibly so old
/// and new entries never collide.
pub const CACHE_SCHEMA_VERSION: &str = "v1";
