//! Saving a finished project build into the cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hoard_common::lifecycle::{highest_phase, phase_position, PACKAGE_PHASE};
use hoard_common::{HashAlgorithm, ProjectId, Step};
use hoard_config::OutputConfig;
use hoard_model::{
    ArtifactRecord, BuildRecord, CacheContext, CacheResult, CompletedStep, PropertyValue,
    CACHE_IMPLEMENTATION_VERSION,
};
use hoard_store::ArtifactFile;

use crate::archive::{has_files, pack_dir, snapshot_classifier, SNAPSHOT_TYPE};
use crate::controller::CacheController;
use crate::diff::{compare, write_diff_artifacts};
use crate::error::CacheError;
use crate::executor::{ExecutionLog, ParameterProvider, StepParameters};
use crate::project::{Project, ProjectArtifact};
use crate::verifier::normalize_value;

/// Where output-directory snapshots are packed, under the build directory.
const SNAPSHOT_DIR: &str = "build-cache/snapshots";

/// Where baseline diff files are written, under the build directory.
const DIFF_DIR: &str = "build-cache";

/// Returns true if a request reaches the package phase, i.e. produces artifacts.
fn reaches_package(steps: &[Step]) -> bool {
    let package = phase_position(PACKAGE_PHASE);
    steps
        .iter()
        .filter_map(|s| s.phase.as_deref().and_then(phase_position))
        .any(|p| Some(p) >= package)
}

impl CacheController {
    /// Saves the build of `project` for the fingerprint of `result`.
    ///
    /// Returns the rebuilt result, or `None` when there is nothing to save
    /// or saving failed. On failure the project's local entry is cleared so
    /// no partially written entry survives.
    pub fn save(
        &self,
        project: &mut Project,
        result: &CacheResult,
        steps: &[Step],
        log: &ExecutionLog,
    ) -> Option<CacheResult> {
        let Some(context) = result.context.as_ref() else {
            tracing::info!(project = %project.id, "cannot save project in cache, no fingerprint");
            return None;
        };
        match self.try_save(project, result, context, steps, log) {
            Ok(saved) => Some(saved),
            Err(e) => {
                tracing::error!(project = %project.id, error = %e, "failed to save project, cleaning cache");
                if let Err(e) = self.store.clear(context) {
                    tracing::error!(project = %project.id, error = %e, "cannot clean cache entry");
                }
                None
            }
        }
    }

    fn try_save(
        &self,
        project: &mut Project,
        result: &CacheResult,
        context: &CacheContext,
        steps: &[Step],
        log: &ExecutionLog,
    ) -> Result<CacheResult, CacheError> {
        let config = self.config();
        let algorithm = config.hash_algorithm();
        let packaged = reaches_package(steps);

        let mut files = Vec::new();
        let mut artifact = None;
        let mut attached_artifacts = Vec::new();
        if packaged {
            self.attach_output_dirs(project)?;
            if let Some(file) = project.artifact.file.as_deref().filter(|f| f.is_file()) {
                let record = artifact_record(&project.id, &project.artifact, file, algorithm)?;
                files.push(ArtifactFile {
                    path: file.to_path_buf(),
                    file_name: record.file_name.clone(),
                });
                artifact = Some(record);
            }
            for attached in &project.attached {
                let Some(file) = attached.file.as_deref().filter(|f| f.is_file()) else {
                    continue;
                };
                if attached
                    .file_name()
                    .is_some_and(|name| self.rules.is_excluded_output(&name))
                {
                    tracing::debug!(file = %file.display(), "excluded from cache");
                    continue;
                }
                let record = artifact_record(&project.id, attached, file, algorithm)?;
                files.push(ArtifactFile {
                    path: file.to_path_buf(),
                    file_name: record.file_name.clone(),
                });
                attached_artifacts.push(record);
            }
        }

        let executions = self.completed_steps(project, result.record.as_deref(), steps, log)?;
        let mut goals: Vec<String> = Vec::new();
        for phase in steps.iter().filter_map(|s| s.phase.as_deref()) {
            if !goals.iter().any(|g| g == phase) {
                goals.push(phase.to_string());
            }
        }
        let record = BuildRecord {
            cache_implementation_version: CACHE_IMPLEMENTATION_VERSION.to_string(),
            fingerprint: context.fingerprint().clone(),
            project: project.id.clone(),
            hash_function: algorithm.id().to_string(),
            goals,
            highest_completed_phase: highest_phase(
                steps
                    .iter()
                    .filter(|s| !s.is_clean())
                    .filter_map(|s| s.phase.as_deref()),
            )
            .map(str::to_string),
            executions,
            artifact,
            attached_artifacts,
            inputs: (*context.inputs).clone(),
            scm: self.scm_info(),
            build_time: chrono::Utc::now(),
            is_final: config.save_final,
        };

        self.store.save(context, &record, &files)?;
        let fingerprint = context.fingerprint().as_str();
        for artifact in record.all_artifacts().filter(|a| a.has_file()) {
            self.put_checksum(artifact, fingerprint);
        }
        tracing::info!(
            project = %project.id,
            fingerprint = %context.fingerprint(),
            artifacts = files.len(),
            "saved project build in cache"
        );

        if config.baseline_diff_enabled() {
            self.produce_diff_report(project, &record);
        }

        let record = Arc::new(record);
        let rebuilt = CacheResult::rebuilt(result, record);
        self.record_result(&project.id, rebuilt.clone());
        Ok(rebuilt)
    }

    /// Packs non-empty output directories and attaches them as snapshots.
    ///
    /// Candidates are the configured generated-output roots, source roots
    /// nested in the build directory outside those roots, and the configured
    /// attached directories.
    fn attach_output_dirs(&self, project: &mut Project) -> Result<(), CacheError> {
        let build_dir = project.build_dir.clone();
        let dirs = snapshot_candidates(project, &self.config().output);

        let scratch = build_dir.join(SNAPSHOT_DIR);
        for dir in dirs {
            if !dir.is_dir() || !has_files(&dir) {
                continue;
            }
            let Ok(relative) = dir.strip_prefix(&build_dir) else {
                continue;
            };
            let classifier = snapshot_classifier(relative);
            if project
                .attached
                .iter()
                .any(|a| a.classifier.as_deref() == Some(classifier.as_str()))
            {
                continue;
            }
            let archive = scratch.join(format!("{classifier}.{SNAPSHOT_TYPE}"));
            pack_dir(&dir, &archive)?;
            tracing::debug!(dir = %dir.display(), classifier = %classifier, "attached output directory");
            project.attach(ProjectArtifact::attached(SNAPSHOT_TYPE, classifier, archive));
        }
        Ok(())
    }

    /// Completed-step entries for every non-clean requested step.
    ///
    /// Steps that ran record their parameters under the recording policy.
    /// Steps that were restored keep the parameters of the previous record.
    fn completed_steps(
        &self,
        project: &Project,
        previous: Option<&BuildRecord>,
        steps: &[Step],
        log: &ExecutionLog,
    ) -> Result<Vec<CompletedStep>, CacheError> {
        let mut executions = Vec::new();
        for step in steps.iter().filter(|s| !s.is_clean()) {
            let key = step.key();
            let properties = match log.get(&key) {
                Some(parameters) => self.recorded_properties(step, parameters, &project.base_dir)?,
                None => previous
                    .and_then(|r| r.find_execution(&key))
                    .map(|e| e.properties.clone())
                    .unwrap_or_default(),
            };
            executions.push(CompletedStep {
                execution_key: key,
                implementation: step.implementation.clone(),
                properties,
            });
        }
        Ok(executions)
    }

    fn recorded_properties(
        &self,
        step: &Step,
        parameters: &StepParameters,
        base_dir: &Path,
    ) -> Result<Vec<PropertyValue>, CacheError> {
        if let Some(tracked) = self
            .rules
            .tracked_properties(step)
            .iter()
            .find(|t| parameters.resolve(&t.name).is_none())
        {
            return Err(CacheError::PropertyNotAccessible {
                step: step.to_string(),
                name: tracked.name.clone(),
            });
        }
        let policy = self.rules.recording_policy(step);
        Ok(parameters
            .parameter_names()
            .into_iter()
            .filter(|name| policy.should_record(name))
            .filter_map(|name| {
                let value = parameters.resolve(&name)?;
                Some(PropertyValue {
                    tracked: policy.is_tracked(&name),
                    value: normalize_value(&value, base_dir),
                    name,
                })
            })
            .collect())
    }

    /// Compares a saved record with the baseline build and writes the diff
    /// next to the project's build output. Failures are logged only.
    fn produce_diff_report(&self, project: &Project, record: &BuildRecord) {
        let Some(baseline) = self
            .baseline
            .as_ref()
            .and_then(|b| b.find_baseline_record(&project.id))
        else {
            tracing::info!(project = %project.id, "baseline build not available, skipping diff");
            return;
        };
        let diff = compare(record, &baseline);
        let dir = project.build_dir.join(DIFF_DIR);
        match write_diff_artifacts(&dir, self.store.layout().format(), record, &baseline, &diff) {
            Ok(_) => tracing::info!(
                project = %project.id,
                mismatches = diff.mismatches.len(),
                dir = %dir.display(),
                "baseline diff written"
            ),
            Err(e) => tracing::error!(project = %project.id, error = %e, "cannot write baseline diff"),
        }
    }
}

/// Output directories to snapshot, without duplicates.
fn snapshot_candidates(project: &Project, output: &OutputConfig) -> Vec<PathBuf> {
    let build_dir = &project.build_dir;
    let generated: Vec<PathBuf> = output
        .generated_roots
        .iter()
        .map(|r| build_dir.join(r))
        .collect();
    let mut dirs = generated.clone();
    for root in project
        .compile_source_roots
        .iter()
        .chain(&project.test_compile_source_roots)
    {
        if root.starts_with(build_dir) && !generated.iter().any(|g| root.starts_with(g)) {
            dirs.push(root.clone());
        }
    }
    dirs.extend(output.attached_dirs.iter().map(|d| build_dir.join(d)));
    dirs.sort();
    dirs.dedup();
    dirs
}

fn artifact_record(
    project: &ProjectId,
    artifact: &ProjectArtifact,
    file: &Path,
    algorithm: HashAlgorithm,
) -> Result<ArtifactRecord, CacheError> {
    let file_hash = algorithm
        .hash_file(file)
        .map_err(|e| CacheError::io(file, e))?;
    let file_size = std::fs::metadata(file)
        .map_err(|e| CacheError::io(file, e))?
        .len();
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(ArtifactRecord {
        group_id: project.group_id.clone(),
        artifact_id: project.artifact_id.clone(),
        version: project.version.clone(),
        artifact_type: artifact.artifact_type.clone(),
        classifier: artifact.classifier.clone(),
        extension: artifact.extension.clone(),
        file_name,
        file_hash,
        file_size,
    })
}
