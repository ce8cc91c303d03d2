//! The cache controller.
//!
//! One controller serves every project of a build session. It looks up and
//! analyzes cached builds, restores and saves project artifacts, and keeps
//! the per-project results that end up in the session's cache report.
//! Per-project state is keyed by the versionless project key and may be
//! touched by several workers at once.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use hoard_common::{ContentHash, DependencySpec, ProjectId, Step};
use hoard_config::{CacheConfig, CacheRules};
use hoard_model::{
    ArtifactRecord, BuildRecord, CacheContext, CacheReport, CacheResult, CacheSource, CacheStatus,
    DigestItem, DigestKind, ProjectReport, ScmInfo, CACHE_IMPLEMENTATION_VERSION,
};
use hoard_store::{LocalStore, RemoteCache};
use parking_lot::{Mutex, RwLock};

use crate::error::CacheError;
use crate::executor::FingerprintSource;
use crate::project::Project;
use crate::scm::read_git_info;
use crate::segment::{is_cacheable, Segments};
use crate::verifier::ConsistencyVerifier;

/// Project property listing steps that always run, as `plugin[:goal|*]`
/// entries separated by commas.
pub const ALWAYS_RUN_PLUGINS_PROPERTY: &str = "hoard.alwaysRunPlugins";

/// Orchestrates lookup, restore, save and reporting for a build session.
pub struct CacheController {
    pub(crate) session_id: String,
    pub(crate) build_root: PathBuf,
    pub(crate) root_project: ProjectId,
    pub(crate) rules: Arc<CacheRules>,
    pub(crate) verifier: ConsistencyVerifier,
    pub(crate) store: Arc<LocalStore>,
    pub(crate) baseline: Option<RemoteCache>,
    fingerprints: Arc<dyn FingerprintSource>,
    results: RwLock<HashMap<String, CacheResult>>,
    digests: RwLock<HashMap<String, DigestItem>>,
    scm: OnceLock<ScmInfo>,
    in_flight: Mutex<HashSet<String>>,
}

/// Marks a project as being built. Released on drop.
#[must_use = "the project is released as soon as the guard is dropped"]
pub struct ProjectGuard<'a> {
    controller: &'a CacheController,
    key: String,
}

impl Drop for ProjectGuard<'_> {
    fn drop(&mut self) {
        self.controller.in_flight.lock().remove(&self.key);
    }
}

impl CacheController {
    pub(crate) fn new(
        session_id: String,
        build_root: PathBuf,
        root_project: ProjectId,
        rules: Arc<CacheRules>,
        store: Arc<LocalStore>,
        baseline: Option<RemoteCache>,
        fingerprints: Arc<dyn FingerprintSource>,
    ) -> Self {
        Self {
            session_id,
            build_root,
            root_project,
            verifier: ConsistencyVerifier::new(Arc::clone(&rules)),
            rules,
            store,
            baseline,
            fingerprints,
            results: RwLock::new(HashMap::new()),
            digests: RwLock::new(HashMap::new()),
            scm: OnceLock::new(),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Identifier of the build session.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Returns true if caching is enabled for the session.
    pub fn enabled(&self) -> bool {
        self.rules.config().enabled
    }

    /// The session configuration.
    pub fn config(&self) -> &CacheConfig {
        self.rules.config()
    }

    /// The per-step rules.
    pub fn rules(&self) -> &CacheRules {
        &self.rules
    }

    /// The local store.
    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// The consistency verifier.
    pub fn verifier(&self) -> &ConsistencyVerifier {
        &self.verifier
    }

    /// Claims a project for one strategy run.
    ///
    /// Fails with [`CacheError::ProjectBusy`] while another run holds it.
    pub fn begin(&self, project: &ProjectId) -> Result<ProjectGuard<'_>, CacheError> {
        let key = project.versionless_key();
        if !self.in_flight.lock().insert(key.clone()) {
            return Err(CacheError::ProjectBusy {
                project: project.clone(),
            });
        }
        Ok(ProjectGuard {
            controller: self,
            key,
        })
    }

    /// Looks up a cached build for `project` and analyzes it against the
    /// requested `steps`.
    ///
    /// The remote-sourced record is analyzed first. A purely local record
    /// replaces it only when its analysis ranks strictly higher, or ranks
    /// equal while the remote lookup found no record. The result is
    /// remembered for the cache report.
    pub fn lookup(&self, project: &Project, steps: &[Step]) -> CacheResult {
        if !self.enabled() || !is_cacheable(steps) {
            return CacheResult::empty();
        }
        let inputs = match self.fingerprints.calculate(project) {
            Ok(inputs) => inputs,
            Err(reason) => {
                tracing::warn!(
                    project = %project.id,
                    reason = %reason,
                    "cannot calculate fingerprint, project is built without cache"
                );
                return CacheResult::empty();
            }
        };
        let context = CacheContext::new(project.id.clone(), inputs, &self.session_id);
        tracing::info!(
            project = %project.id,
            fingerprint = %context.fingerprint(),
            "looking up cached build"
        );

        let result = match self.find_cached(&context, steps) {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(project = %project.id, error = %e, "cannot read cached build, clearing entry");
                if let Err(e) = self.store.clear(&context) {
                    tracing::error!(project = %project.id, error = %e, "cannot clear cache entry");
                }
                CacheResult::empty_with(context)
            }
        };
        tracing::info!(
            project = %project.id,
            status = ?result.status,
            source = result.source.as_str(),
            "cache lookup finished"
        );
        self.results
            .write()
            .insert(project.id.versionless_key(), result.clone());
        result
    }

    fn find_cached(&self, context: &CacheContext, steps: &[Step]) -> Result<CacheResult, CacheError> {
        let remote = self.store.find(context)?;
        let mut result = self.analyze(context, remote, CacheSource::Remote, steps);
        if !result.is_success() {
            let local = self.store.find_local(context)?;
            let local_result = self.analyze(context, local, CacheSource::Local, steps);
            if local_result.outranks(&result) {
                result = local_result;
            }
        }
        Ok(result)
    }

    fn analyze(
        &self,
        context: &CacheContext,
        record: Option<BuildRecord>,
        source: CacheSource,
        steps: &[Step],
    ) -> CacheResult {
        let Some(record) = record else {
            return CacheResult::empty_with(context.clone());
        };
        if record.cache_implementation_version != CACHE_IMPLEMENTATION_VERSION {
            tracing::warn!(
                project = %context.project,
                recorded = %record.cache_implementation_version,
                current = CACHE_IMPLEMENTATION_VERSION,
                "cached build was produced by a different cache version"
            );
        }
        let record = Arc::new(record);
        let segments = Segments::split(steps, Some(&*record));

        for step in &segments.cached {
            let Some(completed) = record.find_execution(&step.key()) else {
                tracing::info!(
                    project = %context.project,
                    step = %step,
                    source = source.as_str(),
                    "cached build doesn't contain all requested steps"
                );
                return CacheResult::failure(Some(record), context.clone(), source);
            };
            let missing = self
                .rules
                .tracked_properties(step)
                .iter()
                .find(|t| completed.property(&t.name).is_none());
            if let Some(tracked) = missing {
                tracing::info!(
                    project = %context.project,
                    step = %step,
                    property = %tracked.name,
                    "cached build doesn't record a tracked property"
                );
                return CacheResult::failure(Some(record), context.clone(), source);
            }
        }

        let unsatisfied = segments
            .post
            .iter()
            .find(|s| !self.rules.can_ignore_missing(s));
        match unsatisfied {
            Some(step) => {
                tracing::info!(
                    project = %context.project,
                    step = %step,
                    phase = record.highest_completed_phase.as_deref().unwrap_or("<none>"),
                    "cached build covers only part of the requested steps"
                );
                CacheResult::partial_success(record, context.clone(), source)
            }
            None => CacheResult::success(record, context.clone(), source),
        }
    }

    /// Returns true if `step` must execute even when restored from cache.
    pub fn is_forced_step(&self, project: &Project, step: &Step) -> bool {
        if self.rules.is_run_always(step) {
            return true;
        }
        let Some(plugins) = project.property(ALWAYS_RUN_PLUGINS_PROPERTY) else {
            return false;
        };
        plugins
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .any(|entry| {
                let (plugin, goal) = entry.split_once(':').unwrap_or((entry, "*"));
                plugin == step.plugin.artifact_id && (goal == "*" || goal == step.goal)
            })
    }

    /// The latest result recorded for a project, if any.
    pub fn result_for(&self, project: &ProjectId) -> Option<CacheResult> {
        self.results.read().get(&project.versionless_key()).cloned()
    }

    pub(crate) fn record_result(&self, project: &ProjectId, result: CacheResult) {
        self.results.write().insert(project.versionless_key(), result);
    }

    /// Digest registered for a restored or saved artifact.
    ///
    /// Keys have the form `group:artifact:type:classifier`. Downstream
    /// fingerprint calculation uses these in place of hashing the files.
    pub fn artifact_digest(&self, key: &str) -> Option<DigestItem> {
        self.digests.read().get(key).cloned()
    }

    pub(crate) fn put_checksum(&self, artifact: &ArtifactRecord, fingerprint: &str) {
        let key = artifact.key();
        let item = DigestItem::new(DigestKind::Dependency, &key, ContentHash::from_hex(fingerprint));
        let mut digests = self.digests.write();
        if artifact.extension != artifact.artifact_type {
            let by_extension = format!(
                "{}:{}:{}:{}",
                artifact.group_id,
                artifact.artifact_id,
                artifact.extension,
                artifact.classifier.as_deref().unwrap_or("")
            );
            digests.insert(by_extension, item.clone());
        }
        digests.insert(key, item);
    }

    /// Source-control metadata of the build root, read once per session.
    pub fn scm_info(&self) -> ScmInfo {
        self.scm
            .get_or_init(|| match read_git_info(&self.build_root) {
                Ok(info) => info,
                Err(e) => {
                    tracing::warn!(error = %e, "cannot read source control metadata");
                    ScmInfo::default()
                }
            })
            .clone()
    }

    /// Finds the best cached build of a cross-project dependency.
    pub fn find_best_matching_build(&self, dependency: &DependencySpec) -> Option<Arc<BuildRecord>> {
        let scm = self.scm_info();
        self.store
            .find_best_matching_build(&self.session_id, dependency, scm.reference())
    }

    /// Builds the cache report of the session from the recorded results.
    pub fn build_report(&self) -> CacheReport {
        let save_to_remote = self.config().save_to_remote();
        let results = self.results.read();
        let mut keys: Vec<&String> = results.keys().collect();
        keys.sort();

        let projects = keys
            .into_iter()
            .filter_map(|key| results.get(key))
            .filter_map(|result| {
                let context = result.context.as_ref()?;
                let matched = result.status != CacheStatus::Empty;
                let record_url = || self.store.remote().map(|r| r.record_url(context));
                let (url, shared_to_remote) = match result.source {
                    CacheSource::Remote => (record_url(), false),
                    CacheSource::Build if save_to_remote => (record_url(), true),
                    _ => (None, false),
                };
                Some(ProjectReport {
                    group_id: context.project.group_id.clone(),
                    artifact_id: context.project.artifact_id.clone(),
                    fingerprint: context.fingerprint().clone(),
                    fingerprint_matched: matched,
                    lifecycle_matched: matched && result.is_success(),
                    source: result.source.as_str().to_string(),
                    url,
                    shared_to_remote,
                })
            })
            .collect();

        CacheReport {
            build_id: self.session_id.clone(),
            created: chrono::Utc::now(),
            projects,
        }
    }

    /// Writes the session's cache report under `<build root>/target/build-cache`.
    ///
    /// Failures are logged; the report is never build-fatal.
    pub fn produce_report(&self) -> Option<PathBuf> {
        let report = self.build_report();
        let dir = self.build_root.join("target").join("build-cache");
        match self.store.save_report(&dir, &self.root_project, &report) {
            Ok(path) => {
                tracing::info!(path = %path.display(), projects = report.projects.len(), "cache report saved");
                Some(path)
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot save build cache report");
                None
            }
        }
    }
}
