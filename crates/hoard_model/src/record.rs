//! Build records and their parts.

use chrono::{DateTime, Utc};
use hoard_common::{ContentHash, Fingerprint, ProjectId, StepKey};
use serde::{Deserialize, Serialize};

use crate::inputs::InputManifest;

/// Version tag written into every record produced by this build of the cache.
///
/// A record written by a different version is still usable, but the
/// difference is reported when the record is analyzed.
pub const CACHE_IMPLEMENTATION_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A step parameter monitored for change between the cached and current run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TrackedProperty {
    /// Parameter name.
    pub name: String,
    /// Value assumed when the record has no entry for the parameter.
    #[serde(default)]
    pub default_value: Option<String>,
    /// Current value tolerated even though it differs from the cached one.
    #[serde(default)]
    pub skip_value: Option<String>,
}

impl TrackedProperty {
    /// Creates a tracked property without default or skip value.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_value: None,
            skip_value: None,
        }
    }

    /// Sets the skip value.
    pub fn with_skip_value(mut self, value: impl Into<String>) -> Self {
        self.skip_value = Some(value.into());
        self
    }

    /// Sets the default value.
    pub fn with_default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// A recorded step parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyValue {
    /// Parameter name.
    pub name: String,
    /// Resolved value at the time the step ran.
    pub value: String,
    /// Whether the parameter is tracked for consistency checks.
    pub tracked: bool,
}

/// A step that ran as part of a recorded build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedStep {
    /// Key of the step.
    pub execution_key: StepKey,
    /// Implementation identity that ran the step.
    pub implementation: String,
    /// Recorded parameters in resolution order.
    pub properties: Vec<PropertyValue>,
}

impl CompletedStep {
    /// Looks up a recorded parameter by name.
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// A file artifact produced by a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Group of the owning project.
    pub group_id: String,
    /// Artifact name of the owning project.
    pub artifact_id: String,
    /// Project version the artifact was built with.
    pub version: String,
    /// Logical artifact type (e.g. `jar`, `tar.gz`).
    pub artifact_type: String,
    /// Classifier distinguishing attached artifacts.
    pub classifier: Option<String>,
    /// File extension.
    pub extension: String,
    /// Name of the file in the cache entry. Blank for artifacts with no file.
    pub file_name: String,
    /// Digest of the file contents.
    pub file_hash: ContentHash,
    /// File size in bytes.
    pub file_size: u64,
}

impl ArtifactRecord {
    /// Key used by the artifact digest index.
    pub fn key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.group_id,
            self.artifact_id,
            self.artifact_type,
            self.classifier.as_deref().unwrap_or("")
        )
    }

    /// Returns true if the record refers to an actual file.
    pub fn has_file(&self) -> bool {
        !self.file_name.trim().is_empty()
    }
}

/// Source-control metadata captured at save time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScmInfo {
    /// Checked-out branch, if any.
    pub branch: Option<String>,
    /// Checked-out revision, if any.
    pub revision: Option<String>,
}

impl ScmInfo {
    /// The reference used to match builds: the branch, else the revision.
    pub fn reference(&self) -> Option<&str> {
        self.branch.as_deref().or(self.revision.as_deref())
    }
}

/// Persisted description of one completed build for a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    /// Version of the cache implementation that wrote the record.
    pub cache_implementation_version: String,
    /// Fingerprint of the inputs the build ran with.
    pub fingerprint: Fingerprint,
    /// Project the record belongs to.
    pub project: ProjectId,
    /// Identifier of the hash algorithm used for digests in this record.
    pub hash_function: String,
    /// Goals/phases requested for the build.
    pub goals: Vec<String>,
    /// Latest lifecycle phase completed by the build.
    pub highest_completed_phase: Option<String>,
    /// Completed steps in sequence order.
    pub executions: Vec<CompletedStep>,
    /// Primary artifact.
    pub artifact: Option<ArtifactRecord>,
    /// Attached artifacts.
    pub attached_artifacts: Vec<ArtifactRecord>,
    /// Input manifest the fingerprint was computed from.
    pub inputs: InputManifest,
    /// Source-control metadata.
    pub scm: ScmInfo,
    /// Time the record was produced.
    pub build_time: DateTime<Utc>,
    /// Frozen baseline records stay local and are never mirrored remotely.
    #[serde(rename = "final")]
    pub is_final: bool,
}

impl BuildRecord {
    /// Finds the completed step for a key.
    pub fn find_execution(&self, key: &StepKey) -> Option<&CompletedStep> {
        self.executions.iter().find(|e| &e.execution_key == key)
    }

    /// Primary artifact followed by attached artifacts.
    pub fn all_artifacts(&self) -> impl Iterator<Item = &ArtifactRecord> {
        self.artifact.iter().chain(self.attached_artifacts.iter())
    }
}
