//! The local store.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use filetime::FileTime;
use hoard_common::{DependencySpec, ProjectId};
use hoard_model::{BuildRecord, CacheContext, CacheReport, CacheSource};
use parking_lot::Mutex;
use walkdir::WalkDir;

use crate::error::StoreError;
use crate::eviction::retain_newest;
use crate::layout::{CacheLayout, LOOKUP_MARKER, REPORT_BASE_NAME, STAGING_DIR};
use crate::remote::RemoteCache;
use crate::throttle::marker_throttled;

/// Store settings taken from the cache configuration.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Number of fingerprint directories retained per project.
    pub max_builds_cached: usize,
    /// Whether saved entries are mirrored to the remote store.
    pub save_to_remote: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            max_builds_cached: 3,
            save_to_remote: false,
        }
    }
}

/// A file to store alongside a record.
#[derive(Debug, Clone)]
pub struct ArtifactFile {
    /// Current location of the file.
    pub path: PathBuf,
    /// Name of the file in the cache entry.
    pub file_name: String,
}

type BestMatchKey = (String, DependencySpec);

/// Filesystem cache keyed by project and fingerprint, with an optional
/// remote mirror.
pub struct LocalStore {
    layout: CacheLayout,
    settings: StoreSettings,
    remote: Option<RemoteCache>,
    best_matches: Mutex<HashMap<BestMatchKey, Option<Arc<BuildRecord>>>>,
}

impl LocalStore {
    /// Creates a store. Remote lookups happen only when `remote` is set.
    pub fn new(layout: CacheLayout, settings: StoreSettings, remote: Option<RemoteCache>) -> Self {
        Self {
            layout,
            settings,
            remote,
            best_matches: Mutex::new(HashMap::new()),
        }
    }

    /// The cache layout.
    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    /// The remote mirror, if configured.
    pub fn remote(&self) -> Option<&RemoteCache> {
        self.remote.as_ref()
    }

    fn mirrors(&self, is_final: bool) -> Option<&RemoteCache> {
        self.remote
            .as_ref()
            .filter(|_| self.settings.save_to_remote && !is_final)
    }

    /// Finds a remote-sourced record: the downloaded copy if present,
    /// otherwise the remote store, subject to lookup throttling.
    ///
    /// A record found remotely is written to disk before it is returned.
    pub fn find(&self, context: &CacheContext) -> Result<Option<BuildRecord>, StoreError> {
        let dir = self.layout.build_dir(&context.project, context.fingerprint());
        let path = dir.join(self.layout.record_file_name());
        if path.exists() {
            tracing::debug!(path = %path.display(), "found downloaded record");
            return self.read_record(&path);
        }

        let Some(remote) = &self.remote else {
            return Ok(None);
        };
        let marker = dir.join(LOOKUP_MARKER);
        if marker_throttled(&marker, SystemTime::now()) {
            tracing::info!(
                project = %context.project,
                fingerprint = %context.fingerprint(),
                "remote lookup skipped, entry was recently missing"
            );
            return Ok(None);
        }

        match remote.find_record(context) {
            Ok(Some(record)) => {
                self.write_downloaded(&path, &record)?;
                Ok(Some(record))
            }
            Ok(None) => {
                touch(&marker)?;
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(project = %context.project, error = %e, "remote lookup failed");
                Ok(None)
            }
        }
    }

    /// Finds a record produced by a local build. Never consults the remote store.
    pub fn find_local(&self, context: &CacheContext) -> Result<Option<BuildRecord>, StoreError> {
        let path = self
            .layout
            .local_dir(&context.project, context.fingerprint())
            .join(self.layout.record_file_name());
        self.read_record(&path)
    }

    /// Persists a record and its artifact files for a fingerprint.
    ///
    /// The entry is assembled in a staging directory first, so artifact
    /// files may come from the entry being replaced. Older fingerprint
    /// directories of the project are evicted before the staged entry is
    /// moved into place. Mirror failures are logged; the local copy is kept.
    pub fn save(
        &self,
        context: &CacheContext,
        record: &BuildRecord,
        artifacts: &[ArtifactFile],
    ) -> Result<(), StoreError> {
        let staging = self.layout.staging_dir(&context.project, context.fingerprint());
        if let Err(e) = self.stage(&staging, record, artifacts) {
            let _ = std::fs::remove_dir_all(&staging);
            return Err(e);
        }

        self.clear(context)?;
        let dir = self.layout.local_dir(&context.project, context.fingerprint());
        std::fs::rename(&staging, &dir).map_err(|e| StoreError::io(&dir, e))?;
        tracing::debug!(dir = %dir.display(), artifacts = artifacts.len(), "saved local entry");

        if let Some(remote) = self.mirrors(record.is_final) {
            self.mirror(remote, context, record, &dir, artifacts);
        }
        Ok(())
    }

    fn stage(
        &self,
        staging: &Path,
        record: &BuildRecord,
        artifacts: &[ArtifactFile],
    ) -> Result<(), StoreError> {
        if staging.exists() {
            std::fs::remove_dir_all(staging).map_err(|e| StoreError::io(staging, e))?;
        }
        std::fs::create_dir_all(staging).map_err(|e| StoreError::io(staging, e))?;

        let path = staging.join(self.layout.record_file_name());
        let bytes = self
            .layout
            .format()
            .encode(record)
            .map_err(|source| StoreError::Codec {
                location: path.display().to_string(),
                source,
            })?;
        std::fs::write(&path, bytes).map_err(|e| StoreError::io(&path, e))?;

        for artifact in artifacts {
            let target = staging.join(&artifact.file_name);
            std::fs::copy(&artifact.path, &target).map_err(|e| StoreError::io(&artifact.path, e))?;
        }
        Ok(())
    }

    fn mirror(
        &self,
        remote: &RemoteCache,
        context: &CacheContext,
        record: &BuildRecord,
        dir: &Path,
        artifacts: &[ArtifactFile],
    ) {
        if let Err(e) = remote.save_record(context, record) {
            tracing::warn!(project = %context.project, error = %e, "cannot mirror record");
        }
        for artifact in artifacts {
            let file = dir.join(&artifact.file_name);
            if let Err(e) = remote.save_artifact(context, &file, &artifact.file_name) {
                tracing::warn!(file = %artifact.file_name, error = %e, "cannot mirror artifact");
            }
        }
    }

    /// Evicts old fingerprint directories of the project and removes the
    /// locally produced entry of the current fingerprint.
    pub fn clear(&self, context: &CacheContext) -> Result<(), StoreError> {
        let project_dir = self.layout.project_dir(&context.project);
        let keep = self.settings.max_builds_cached.saturating_sub(1);
        let current = OsStr::new(context.fingerprint().as_str());
        let removed = retain_newest(&project_dir, keep, Some(current))?;
        if removed > 0 {
            tracing::info!(project = %context.project, removed, "evicted cached builds");
        }

        let local = self.layout.local_dir(&context.project, context.fingerprint());
        if local.exists() {
            std::fs::remove_dir_all(&local).map_err(|e| StoreError::io(&local, e))?;
        }
        Ok(())
    }

    /// Resolves the local path of an artifact of a cache entry.
    ///
    /// Remote-sourced artifacts are downloaded on first access. The returned
    /// path may not exist if the artifact is unavailable.
    pub fn artifact_path(
        &self,
        context: &CacheContext,
        source: CacheSource,
        file_name: &str,
    ) -> Result<PathBuf, StoreError> {
        if source == CacheSource::Local {
            return Ok(self
                .layout
                .local_dir(&context.project, context.fingerprint())
                .join(file_name));
        }

        let dir = self.layout.build_dir(&context.project, context.fingerprint());
        let path = dir.join(file_name);
        if path.exists() {
            return Ok(path);
        }
        let Some(remote) = &self.remote else {
            return Ok(path);
        };
        match remote.artifact_content(context, file_name) {
            Ok(Some(bytes)) => {
                std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
                std::fs::write(&path, bytes).map_err(|e| StoreError::io(&path, e))?;
                tracing::debug!(path = %path.display(), "downloaded artifact");
            }
            Ok(None) => tracing::info!(file = file_name, "artifact not found remotely"),
            Err(e) => tracing::warn!(file = file_name, error = %e, "cannot download artifact"),
        }
        Ok(path)
    }

    /// Writes a build's cache report under `<report_dir>` and mirrors it
    /// next to the root project's entries when saving to remote is enabled.
    pub fn save_report(
        &self,
        report_dir: &Path,
        root_project: &ProjectId,
        report: &CacheReport,
    ) -> Result<PathBuf, StoreError> {
        let format = self.layout.format();
        let path = report_dir.join(format!(
            "{REPORT_BASE_NAME}.{}.{}",
            report.build_id,
            format.extension()
        ));
        let bytes = format.encode(report).map_err(|source| StoreError::Codec {
            location: path.display().to_string(),
            source,
        })?;
        std::fs::create_dir_all(report_dir).map_err(|e| StoreError::io(report_dir, e))?;
        std::fs::write(&path, bytes).map_err(|e| StoreError::io(&path, e))?;

        if let Some(remote) = self.mirrors(false) {
            match remote.save_report(root_project, report) {
                Ok(url) => tracing::info!(url = %url, "cache report published"),
                Err(e) => tracing::warn!(error = %e, "cannot publish cache report"),
            }
        }
        Ok(path)
    }

    /// Finds the best cached build of a cross-project dependency.
    ///
    /// Candidates matching both the version and `current_ref` win, then the
    /// version alone, then the reference alone, then any candidate; within
    /// a tier the most recently modified record is returned. Results are
    /// memoized per session and dependency.
    pub fn find_best_matching_build(
        &self,
        session_id: &str,
        dependency: &DependencySpec,
        current_ref: Option<&str>,
    ) -> Option<Arc<BuildRecord>> {
        let key = (session_id.to_string(), dependency.clone());
        if let Some(hit) = self.best_matches.lock().get(&key) {
            return hit.clone();
        }
        let best = self.scan_best_match(dependency, current_ref).map(Arc::new);
        self.best_matches.lock().entry(key).or_insert(best).clone()
    }

    fn scan_best_match(
        &self,
        dependency: &DependencySpec,
        current_ref: Option<&str>,
    ) -> Option<BuildRecord> {
        let project = ProjectId::new(
            &dependency.group_id,
            &dependency.artifact_id,
            &dependency.version,
        );
        let project_dir = self.layout.project_dir(&project);
        let record_name = self.layout.record_file_name();

        let mut candidates: Vec<(SystemTime, BuildRecord)> = Vec::new();
        for entry in WalkDir::new(&project_dir)
            .min_depth(2)
            .max_depth(3)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file() && e.file_name() == record_name.as_str())
            .filter(|e| !e.path().parent().is_some_and(|p| p.ends_with(STAGING_DIR)))
        {
            let modified = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            if let Ok(Some(record)) = self.read_record(entry.path()) {
                candidates.push((modified, record));
            }
        }

        let version_matches = |r: &BuildRecord| r.project.version == dependency.version;
        let ref_matches = |r: &BuildRecord| current_ref.is_some() && r.scm.reference() == current_ref;
        let tiers: [&dyn Fn(&BuildRecord) -> bool; 4] = [
            &|r: &BuildRecord| version_matches(r) && ref_matches(r),
            &version_matches,
            &ref_matches,
            &|_: &BuildRecord| true,
        ];
        for tier in tiers {
            let best = candidates
                .iter()
                .filter(|(_, r)| tier(r))
                .max_by_key(|(modified, _)| *modified);
            if let Some((_, record)) = best {
                tracing::debug!(dependency = %dependency, fingerprint = %record.fingerprint, "best matching build");
                return Some(record.clone());
            }
        }
        None
    }

    /// Reads a record, deleting it if it cannot be decoded.
    fn read_record(&self, path: &Path) -> Result<Option<BuildRecord>, StoreError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        match self.layout.format().decode(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupt record, deleting");
                std::fs::remove_file(path).map_err(|e| StoreError::io(path, e))?;
                Ok(None)
            }
        }
    }

    fn write_downloaded(&self, path: &Path, record: &BuildRecord) -> Result<(), StoreError> {
        let bytes = self
            .layout
            .format()
            .encode(record)
            .map_err(|source| StoreError::Codec {
                location: path.display().to_string(),
                source,
            })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path);
        match file {
            Ok(mut file) => file.write_all(&bytes).map_err(|e| StoreError::io(path, e)),
            // Another worker downloaded it first.
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}

/// Creates the marker or bumps its modification time.
fn touch(marker: &Path) -> Result<(), StoreError> {
    if marker.exists() {
        filetime::set_file_mtime(marker, FileTime::now()).map_err(|e| StoreError::io(marker, e))
    } else {
        if let Some(parent) = marker.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        std::fs::write(marker, b"").map_err(|e| StoreError::io(marker, e))
    }
}
