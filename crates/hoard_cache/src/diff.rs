//! Comparison of a build record against a baseline build of the same project.
//!
//! Checks accumulate independently, in a fixed order: hash algorithm,
//! effective configuration, step executions, input files, dependencies.
//! Within the file and dependency checks a set difference is reported alone,
//! since per-item hashes are only comparable for identical sets.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use hoard_model::{
    BuildDiff, BuildRecord, CompletedStep, DigestItem, DigestKind, InputManifest, MismatchEntry,
    RecordFormat,
};
use serde::Serialize;

use crate::error::CacheError;

const PLUGIN_SET_RESOLUTION: &str = "Different set of plugins produces different build results. \
    Exclude non-critical plugins or make sure plugin sets match";

/// Compares `current` against `baseline`.
pub fn compare(current: &BuildRecord, baseline: &BuildRecord) -> BuildDiff {
    let mut mismatches = Vec::new();

    if current.hash_function != baseline.hash_function {
        mismatches.push(
            MismatchEntry::new(
                "hashFunction",
                Some(current.hash_function.clone()),
                Some(baseline.hash_function.clone()),
                "Different algorithms render caches not comparable and cached could not be reused",
            )
            .with_resolution("Ensure the same algorithm as remote"),
        );
    }
    compare_effective_config(&current.inputs, &baseline.inputs, &mut mismatches);
    compare_executions(&current.executions, &baseline.executions, &mut mismatches);
    compare_files(&current.inputs, &baseline.inputs, &mut mismatches);
    compare_dependencies(&current.inputs, &baseline.inputs, &mut mismatches);

    BuildDiff {
        current_fingerprint: current.fingerprint.clone(),
        baseline_fingerprint: baseline.fingerprint.clone(),
        mismatches,
    }
}

fn compare_effective_config(
    current: &InputManifest,
    baseline: &InputManifest,
    out: &mut Vec<MismatchEntry>,
) {
    let current_hash = current.effective_config().map(|i| i.hash.to_string());
    let baseline_hash = baseline.effective_config().map(|i| i.hash.to_string());
    if current_hash != baseline_hash {
        out.push(
            MismatchEntry::new(
                "effectivePom",
                current_hash,
                baseline_hash,
                "Difference in effective configuration suggests effectively different builds \
                 which cannot be reused",
            )
            .with_resolution(
                "Compare raw content of effective configurations and eliminate differences",
            ),
        );
    }
}

fn compare_executions(
    current: &[CompletedStep],
    baseline: &[CompletedStep],
    out: &mut Vec<MismatchEntry>,
) {
    let current_by_key: BTreeMap<_, _> = current.iter().map(|e| (&e.execution_key, e)).collect();
    let baseline_by_key: BTreeMap<_, _> = baseline.iter().map(|e| (&e.execution_key, e)).collect();

    for step in baseline {
        if !current_by_key.contains_key(&step.execution_key) {
            let key = step.execution_key.to_string();
            out.push(
                MismatchEntry::new(
                    key.clone(),
                    None,
                    None,
                    format!("Baseline build contains excessive plugin {key}"),
                )
                .with_resolution(PLUGIN_SET_RESOLUTION),
            );
        }
    }

    for step in current {
        match baseline_by_key.get(&step.execution_key) {
            Some(base) => compare_properties(step, base, out),
            None => {
                let key = step.execution_key.to_string();
                out.push(
                    MismatchEntry::new(
                        key.clone(),
                        None,
                        None,
                        format!("Cached build doesn't contain plugin {key}"),
                    )
                    .with_resolution(
                        "Different set of plugins produces different build results. \
                         Filter out non-critical plugins or make sure remote cache always \
                         runs full build with all plugins",
                    ),
                );
            }
        }
    }
}

fn compare_properties(current: &CompletedStep, baseline: &CompletedStep, out: &mut Vec<MismatchEntry>) {
    for property in current.properties.iter().filter(|p| p.tracked) {
        let base_value = baseline.property(&property.name).map(|p| p.value.clone());
        if base_value.as_deref() == Some(property.value.as_str()) {
            continue;
        }
        out.push(
            MismatchEntry::new(
                property.name.clone(),
                Some(property.value.clone()),
                base_value,
                format!(
                    "Plugin: {} has mismatch in tracked property and cannot be reused",
                    current.execution_key
                ),
            )
            .with_resolution(
                "Align properties between remote and local build or remove property from tracked \
                 list if mismatch could be tolerated. In some cases it is possible to add skip \
                 value to ignore lax mismatch",
            )
            .with_context(current.execution_key.to_string()),
        );
    }
}

fn items_by_value(manifest: &InputManifest, kind: DigestKind) -> BTreeMap<&str, &DigestItem> {
    manifest
        .items_of(kind)
        .map(|i| (i.value.as_str(), i))
        .collect()
}

/// Added and removed names, or `None` if both sets are equal.
fn set_difference(
    current: &BTreeMap<&str, &DigestItem>,
    baseline: &BTreeMap<&str, &DigestItem>,
) -> Option<(Vec<String>, Vec<String>)> {
    let current_keys: BTreeSet<_> = current.keys().copied().collect();
    let baseline_keys: BTreeSet<_> = baseline.keys().copied().collect();
    let added: Vec<String> = current_keys.difference(&baseline_keys).map(|s| s.to_string()).collect();
    let removed: Vec<String> = baseline_keys.difference(&current_keys).map(|s| s.to_string()).collect();
    (!added.is_empty() || !removed.is_empty()).then_some((added, removed))
}

fn compare_files(current: &InputManifest, baseline: &InputManifest, out: &mut Vec<MismatchEntry>) {
    let current_files = items_by_value(current, DigestKind::File);
    let baseline_files = items_by_value(baseline, DigestKind::File);

    if let Some((added, removed)) = set_difference(&current_files, &baseline_files) {
        out.push(
            MismatchEntry::new(
                "source files",
                None,
                None,
                format!(
                    "Remote and local cache contain different sets of input files. \
                     Added files: {added:?}. Removed files: {removed:?}"
                ),
            )
            .with_resolution(
                "To match remote and local caches should have identical file sets. \
                 Unnecessary and transient files must be filtered out to make file sets match",
            ),
        );
        return;
    }

    for (path, file) in &current_files {
        let Some(base) = baseline_files.get(path) else {
            continue;
        };
        if file.hash == base.hash {
            continue;
        }
        let mut reason = String::from("File content is different.");
        if let (Some(local), Some(remote)) = (&file.eol, &base.eol) {
            if local != remote {
                reason.push_str(&format!(
                    " Different line endings detected (text files relevant). \
                     Remote: {remote}, local: {local}."
                ));
            }
        }
        if let (Some(local), Some(remote)) = (&file.charset, &base.charset) {
            if local != remote {
                reason.push_str(&format!(
                    " Different charset detected (text files relevant). \
                     Remote: {remote}, local: {local}."
                ));
            }
        }
        out.push(
            MismatchEntry::new(
                *path,
                Some(file.hash.to_string()),
                Some(base.hash.to_string()),
                reason,
            )
            .with_resolution(
                "Different content manifests different build outcome. Ensure that difference \
                 is not caused by environment specifics, like line separators",
            ),
        );
    }
}

fn compare_dependencies(
    current: &InputManifest,
    baseline: &InputManifest,
    out: &mut Vec<MismatchEntry>,
) {
    let current_deps = items_by_value(current, DigestKind::Dependency);
    let baseline_deps = items_by_value(baseline, DigestKind::Dependency);

    if let Some((added, removed)) = set_difference(&current_deps, &baseline_deps) {
        out.push(
            MismatchEntry::new(
                "dependencies files",
                None,
                None,
                format!(
                    "Remote and local builds contain different sets of dependencies and cannot \
                     be matched. Added dependencies: {added:?}. Removed dependencies: {removed:?}"
                ),
            )
            .with_resolution(
                "Remote and local builds should have identical dependencies. The difference \
                 manifests changes in downstream dependencies or introduced snapshots.",
            ),
        );
        return;
    }

    for (key, dep) in &current_deps {
        let Some(base) = baseline_deps.get(key) else {
            continue;
        };
        if dep.hash != base.hash {
            out.push(
                MismatchEntry::new(
                    *key,
                    Some(dep.hash.to_string()),
                    Some(base.hash.to_string()),
                    "Downstream project or snapshot changed",
                )
                .with_resolution(
                    "Find downstream project and investigate difference in the downstream \
                     project. Enable fail fast mode and single threaded execution to simplify \
                     debugging.",
                ),
            );
        }
    }
}

/// Writes both records, their input manifests and the diff into `dir`.
///
/// File names carry the current fingerprint so several builds can be
/// inspected side by side.
pub fn write_diff_artifacts(
    dir: &Path,
    format: RecordFormat,
    current: &BuildRecord,
    baseline: &BuildRecord,
    diff: &BuildDiff,
) -> Result<Vec<PathBuf>, CacheError> {
    std::fs::create_dir_all(dir).map_err(|e| CacheError::io(dir, e))?;
    let fp = current.fingerprint.as_str();
    let mut written = Vec::with_capacity(5);
    written.push(write_encoded(dir, format, &format!("buildinfo-baseline-{fp}"), baseline)?);
    written.push(write_encoded(dir, format, &format!("buildinfo-{fp}"), current)?);
    written.push(write_encoded(dir, format, &format!("buildsdiff-{fp}"), diff)?);
    written.push(write_encoded(dir, format, &format!("inputs-{fp}"), &current.inputs)?);
    written.push(write_encoded(
        dir,
        format,
        &format!("inputs-baseline-{fp}"),
        &baseline.inputs,
    )?);
    Ok(written)
}

fn write_encoded<T: Serialize>(
    dir: &Path,
    format: RecordFormat,
    base_name: &str,
    value: &T,
) -> Result<PathBuf, CacheError> {
    let path = dir.join(format.file_name(base_name));
    let bytes = format.encode(value).map_err(|source| CacheError::Codec {
        location: path.display().to_string(),
        source,
    })?;
    std::fs::write(&path, bytes).map_err(|e| CacheError::io(&path, e))?;
    Ok(path)
}
