//! On-disk layout of the local cache.

use hoard_common::{Fingerprint, ProjectId, CACHE_SCHEMA_VERSION};
use hoard_model::RecordFormat;
use std::path::{Path, PathBuf};

/// Base name of record files. The extension depends on the record format.
pub const RECORD_BASE_NAME: &str = "buildinfo";

/// Base name of cache report files.
pub const REPORT_BASE_NAME: &str = "cache-report";

/// Marker touched after a remote miss, used to throttle further lookups.
pub const LOOKUP_MARKER: &str = "lookupinfo";

/// Subdirectory holding records and artifacts produced by local builds.
pub const LOCAL_DIR: &str = "local";

/// Subdirectory a new local entry is assembled in before it replaces [`LOCAL_DIR`].
pub const STAGING_DIR: &str = "local.staging";

/// Resolves cache paths under a root directory.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
    format: RecordFormat,
}

impl CacheLayout {
    /// Creates a layout rooted at `root` for records in `format`.
    pub fn new(root: &Path, format: RecordFormat) -> Self {
        Self {
            root: root.to_path_buf(),
            format,
        }
    }

    /// The cache root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The record format.
    pub fn format(&self) -> RecordFormat {
        self.format
    }

    /// File name of records.
    pub fn record_file_name(&self) -> String {
        self.format.file_name(RECORD_BASE_NAME)
    }

    /// Directory holding every fingerprint directory of a project.
    pub fn project_dir(&self, project: &ProjectId) -> PathBuf {
        self.root
            .join(CACHE_SCHEMA_VERSION)
            .join(&project.group_id)
            .join(&project.artifact_id)
    }

    /// Directory of one fingerprint of a project.
    pub fn build_dir(&self, project: &ProjectId, fingerprint: &Fingerprint) -> PathBuf {
        self.project_dir(project).join(fingerprint.as_str())
    }

    /// Directory of locally produced entries for a fingerprint.
    pub fn local_dir(&self, project: &ProjectId, fingerprint: &Fingerprint) -> PathBuf {
        self.build_dir(project, fingerprint).join(LOCAL_DIR)
    }

    /// Directory a new local entry is written to before it is moved into place.
    pub fn staging_dir(&self, project: &ProjectId, fingerprint: &Fingerprint) -> PathBuf {
        self.build_dir(project, fingerprint).join(STAGING_DIR)
    }
}
