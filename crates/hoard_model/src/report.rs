//! Per-build cache report.

use chrono::{DateTime, Utc};
use hoard_common::Fingerprint;
use serde::{Deserialize, Serialize};

/// Summary of the cache outcome of every project in a build.
///
/// Later builds use a published report as a baseline index: it tells where
/// the record of each project can be downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheReport {
    /// Unique id of the build that produced the report.
    pub build_id: String,
    /// Time the report was produced.
    pub created: DateTime<Utc>,
    /// One entry per project that took part in caching.
    pub projects: Vec<ProjectReport>,
}

/// Cache outcome of a single project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectReport {
    /// Project group.
    pub group_id: String,
    /// Project artifact name.
    pub artifact_id: String,
    /// Fingerprint the project was looked up with.
    pub fingerprint: Fingerprint,
    /// Whether a record with this fingerprint was found.
    pub fingerprint_matched: bool,
    /// Whether the record covered the requested steps.
    pub lifecycle_matched: bool,
    /// Origin of the record (`local`, `remote` or `build`).
    pub source: String,
    /// Remote location of the record, when it is available remotely.
    pub url: Option<String>,
    /// Whether the record was mirrored to the remote store by this build.
    pub shared_to_remote: bool,
}

impl CacheReport {
    /// Finds the entry of a project by group and artifact name.
    pub fn find_project(&self, group_id: &str, artifact_id: &str) -> Option<&ProjectReport> {
        self.projects
            .iter()
            .find(|p| p.group_id == group_id && p.artifact_id == artifact_id)
    }
}
