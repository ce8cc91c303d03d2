//! Project, plugin and dependency coordinates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a project (module) in a multi-module build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId {
    /// Group the project belongs to.
    pub group_id: String,
    /// Artifact name of the project.
    pub artifact_id: String,
    /// Project version.
    pub version: String,
}

impl ProjectId {
    /// Creates a project identity.
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
        }
    }

    /// Key identifying the project regardless of its version.
    ///
    /// Per-project in-memory indices are keyed by this value.
    pub fn versionless_key(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)
    }
}

/// Coordinates of the plugin that owns a build step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PluginCoords {
    /// Plugin group.
    pub group_id: String,
    /// Plugin artifact name.
    pub artifact_id: String,
    /// Plugin version.
    pub version: String,
}

impl PluginCoords {
    /// Creates plugin coordinates.
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for PluginCoords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)
    }
}

/// A cross-project dependency whose cached builds may be searched for the
/// best matching candidate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencySpec {
    /// Dependency group.
    pub group_id: String,
    /// Dependency artifact name.
    pub artifact_id: String,
    /// Requested version.
    pub version: String,
}

impl DependencySpec {
    /// Creates a dependency spec.
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for DependencySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)
    }
}
