//! Remote mirror of the local cache.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use hoard_common::ProjectId;
use hoard_model::{BuildRecord, CacheContext, CacheReport, RecordFormat};
use hoard_transport::{resource_path, Payload, Transport};

use crate::error::StoreError;
use crate::layout::{RECORD_BASE_NAME, REPORT_BASE_NAME};

/// Where the baseline build's report is published.
struct BaselineSource {
    url: String,
    transport: Arc<dyn Transport>,
    report: OnceLock<Option<CacheReport>>,
}

/// Reads and writes records, artifacts and reports in a remote store.
pub struct RemoteCache {
    transport: Arc<dyn Transport>,
    format: RecordFormat,
    baseline: Option<BaselineSource>,
}

impl RemoteCache {
    /// Creates a remote cache over `transport`.
    pub fn new(transport: Arc<dyn Transport>, format: RecordFormat) -> Self {
        Self {
            transport,
            format,
            baseline: None,
        }
    }

    /// Enables baseline lookups through the report published at `url`.
    pub fn with_baseline(mut self, url: &str, transport: Arc<dyn Transport>) -> Self {
        self.baseline = Some(BaselineSource {
            url: url.to_string(),
            transport,
            report: OnceLock::new(),
        });
        self
    }

    fn record_file_name(&self) -> String {
        self.format.file_name(RECORD_BASE_NAME)
    }

    fn path_for(&self, context: &CacheContext, file_name: &str) -> String {
        resource_path(&context.project, context.fingerprint().as_str(), file_name)
    }

    /// Absolute URL of a file of a cache entry.
    pub fn resource_url(&self, context: &CacheContext, file_name: &str) -> String {
        self.transport.resolve(&self.path_for(context, file_name))
    }

    /// Absolute URL of the record of a cache entry.
    pub fn record_url(&self, context: &CacheContext) -> String {
        self.resource_url(context, &self.record_file_name())
    }

    /// Downloads the record of a cache entry.
    ///
    /// A missing or undecodable record is `Ok(None)`.
    pub fn find_record(&self, context: &CacheContext) -> Result<Option<BuildRecord>, StoreError> {
        let url = self.path_for(context, &self.record_file_name());
        let Some(bytes) = self.fetch(&*self.transport, &url)? else {
            return Ok(None);
        };
        match self.format.decode(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "remote record is corrupt, ignoring");
                Ok(None)
            }
        }
    }

    /// Downloads an artifact file of a cache entry.
    pub fn artifact_content(
        &self,
        context: &CacheContext,
        file_name: &str,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        self.fetch(&*self.transport, &self.path_for(context, file_name))
    }

    /// Uploads the record of a cache entry.
    pub fn save_record(&self, context: &CacheContext, record: &BuildRecord) -> Result<(), StoreError> {
        let bytes = self
            .format
            .encode(record)
            .map_err(|source| StoreError::Codec {
                location: self.record_url(context),
                source,
            })?;
        let url = self.path_for(context, &self.record_file_name());
        self.transport.put(Payload::Bytes(&bytes), &url)?;
        Ok(())
    }

    /// Uploads an artifact file of a cache entry.
    pub fn save_artifact(
        &self,
        context: &CacheContext,
        file: &Path,
        file_name: &str,
    ) -> Result<(), StoreError> {
        let url = self.path_for(context, file_name);
        self.transport.put(Payload::File(file), &url)?;
        Ok(())
    }

    /// Uploads a build's cache report next to the root project's entries.
    ///
    /// Returns the URL the report was published at.
    pub fn save_report(
        &self,
        root_project: &ProjectId,
        report: &CacheReport,
    ) -> Result<String, StoreError> {
        let path = resource_path(
            root_project,
            &report.build_id,
            &self.format.file_name(REPORT_BASE_NAME),
        );
        let url = self.transport.resolve(&path);
        let bytes = self.format.encode(report).map_err(|source| StoreError::Codec {
            location: url.clone(),
            source,
        })?;
        self.transport.put(Payload::Bytes(&bytes), &path)?;
        Ok(url)
    }

    /// Returns true if baseline lookups are configured.
    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    /// Finds the baseline build's record of a project.
    ///
    /// The baseline report is downloaded once and shared by all projects.
    /// Any failure is logged and yields `None`.
    pub fn find_baseline_record(&self, project: &ProjectId) -> Option<BuildRecord> {
        let baseline = self.baseline.as_ref()?;
        let report = baseline
            .report
            .get_or_init(|| self.download_report(baseline))
            .as_ref()?;

        let Some(entry) = report.find_project(&project.group_id, &project.artifact_id) else {
            tracing::info!(project = %project, "project not found in baseline report");
            return None;
        };

        let (transport, url) = match &entry.url {
            Some(url) => (&*baseline.transport, url.clone()),
            None => (
                &*self.transport,
                resource_path(project, entry.fingerprint.as_str(), &self.record_file_name()),
            ),
        };
        match self.fetch(transport, &url) {
            Ok(Some(bytes)) => match self.format.decode(&bytes) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "baseline record is corrupt");
                    None
                }
            },
            Ok(None) => {
                tracing::info!(url = %url, "baseline record not found");
                None
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "cannot download baseline record");
                None
            }
        }
    }

    fn download_report(&self, baseline: &BaselineSource) -> Option<CacheReport> {
        let bytes = match baseline.transport.get(&baseline.url) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(url = %baseline.url, error = %e, "cannot download baseline report");
                return None;
            }
        };
        match self.format.decode(&bytes) {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!(url = %baseline.url, error = %e, "baseline report is corrupt");
                None
            }
        }
    }

    fn fetch(&self, transport: &dyn Transport, url: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match transport.get(url) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hoard_common::Fingerprint;
    use hoard_model::{InputManifest, ProjectReport, ScmInfo, CACHE_IMPLEMENTATION_VERSION};
    use hoard_transport::FileTransport;

    fn record(project: &ProjectId, fp: &str) -> BuildRecord {
        BuildRecord {
            cache_implementation_version: CACHE_IMPLEMENTATION_VERSION.to_string(),
            fingerprint: Fingerprint::new(fp),
            project: project.clone(),
            hash_function: "XX".to_string(),
            goals: vec!["package".to_string()],
            highest_completed_phase: Some("package".to_string()),
            executions: vec![],
            artifact: None,
            attached_artifacts: vec![],
            inputs: InputManifest::new(Fingerprint::new(fp), vec![]),
            scm: ScmInfo::default(),
            build_time: Utc::now(),
            is_final: false,
        }
    }

    fn context(project: &ProjectId, fp: &str) -> CacheContext {
        CacheContext::new(
            project.clone(),
            InputManifest::new(Fingerprint::new(fp), vec![]),
            "s1",
        )
    }

    fn make_remote() -> (tempfile::TempDir, RemoteCache) {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(FileTransport::new(dir.path()));
        (dir, RemoteCache::new(transport, RecordFormat::Json))
    }

    #[test]
    fn record_roundtrip() {
        let (_dir, remote) = make_remote();
        let project = ProjectId::new("org.acme", "core", "1.0");
        let ctx = context(&project, "f1");
        assert!(remote.find_record(&ctx).unwrap().is_none());
        remote.save_record(&ctx, &record(&project, "f1")).unwrap();
        let found = remote.find_record(&ctx).unwrap().unwrap();
        assert_eq!(found.fingerprint.as_str(), "f1");
    }

    #[test]
    fn corrupt_remote_record_is_none() {
        let (dir, remote) = make_remote();
        let project = ProjectId::new("org.acme", "core", "1.0");
        let path = dir.path().join("v1/org.acme/core/f1/buildinfo.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"{not json").unwrap();
        assert!(remote.find_record(&context(&project, "f1")).unwrap().is_none());
    }

    #[test]
    fn baseline_via_report_default_location() {
        let (dir, remote) = make_remote();
        let project = ProjectId::new("org.acme", "core", "1.0");
        remote
            .save_record(&context(&project, "base"), &record(&project, "base"))
            .unwrap();
        let report = CacheReport {
            build_id: "b0".to_string(),
            created: Utc::now(),
            projects: vec![ProjectReport {
                group_id: "org.acme".to_string(),
                artifact_id: "core".to_string(),
                fingerprint: Fingerprint::new("base"),
                fingerprint_matched: false,
                lifecycle_matched: false,
                source: "build".to_string(),
                url: None,
                shared_to_remote: true,
            }],
        };
        let report_url = remote.save_report(&project, &report).unwrap();
        let transport = Arc::new(FileTransport::new(dir.path()));
        let remote = remote.with_baseline(&report_url, transport);
        let baseline = remote.find_baseline_record(&project).unwrap();
        assert_eq!(baseline.fingerprint.as_str(), "base");
        let other = ProjectId::new("org.acme", "api", "1.0");
        assert!(remote.find_baseline_record(&other).is_none());
    }

    #[test]
    fn missing_baseline_report_is_none() {
        let (dir, remote) = make_remote();
        let transport = Arc::new(FileTransport::new(dir.path()));
        let remote = remote.with_baseline("missing/report.json", transport);
        let project = ProjectId::new("org.acme", "core", "1.0");
        assert!(remote.find_baseline_record(&project).is_none());
    }
}
