//! Configuration types deserialized from `cache.toml`.

use hoard_common::HashAlgorithm;
use hoard_model::{RecordFormat, TrackedProperty};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The top-level cache configuration.
///
/// Every section is optional; an empty file yields a local-only cache with
/// default retention.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CacheConfig {
    /// Master switch. When false no lookup or save happens.
    pub enabled: bool,
    /// Identifier of the hash algorithm used for artifacts (`XX` or `SHA-256`).
    pub hash_algorithm: String,
    /// Encoding of records and reports.
    pub record_format: RecordFormat,
    /// Fail the build when a project is not fully restored from cache.
    pub fail_fast: bool,
    /// Mark saved records as final: frozen baselines kept local only.
    pub save_final: bool,
    /// Rewrite embedded versions of restored archives built with another version.
    pub adjust_archive_versions: bool,
    /// Remote store settings.
    pub remote: RemoteConfig,
    /// Local store settings.
    pub local: LocalConfig,
    /// Output collection settings.
    pub output: OutputConfig,
    /// Baseline diff settings.
    pub baseline: BaselineConfig,
    /// Per-step rules.
    pub execution: ExecutionConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hash_algorithm: HashAlgorithm::default().id().to_string(),
            record_format: RecordFormat::default(),
            fail_fast: false,
            save_final: false,
            adjust_archive_versions: true,
            remote: RemoteConfig::default(),
            local: LocalConfig::default(),
            output: OutputConfig::default(),
            baseline: BaselineConfig::default(),
            execution: ExecutionConfig::default(),
        }
    }
}

impl CacheConfig {
    /// The configured hash algorithm. Falls back to the default for
    /// identifiers that were not validated.
    pub fn hash_algorithm(&self) -> HashAlgorithm {
        HashAlgorithm::from_id(&self.hash_algorithm).unwrap_or_default()
    }

    /// Returns true if remote lookups are enabled and a URL is set.
    pub fn remote_enabled(&self) -> bool {
        self.remote.enabled && self.remote.url.is_some()
    }

    /// Returns true if records produced by this build are mirrored remotely.
    pub fn save_to_remote(&self) -> bool {
        self.remote_enabled() && self.remote.save_to_remote
    }

    /// Returns true if every save is compared against a baseline build.
    pub fn baseline_diff_enabled(&self) -> bool {
        self.baseline.url.is_some()
    }
}

/// Remote store settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RemoteConfig {
    /// Whether the remote store is consulted at all.
    pub enabled: bool,
    /// Base URL: `http(s)://` or `file://`.
    pub url: Option<String>,
    /// Whether this build uploads its records and artifacts.
    pub save_to_remote: bool,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Extra headers sent with every HTTP request.
    pub headers: BTreeMap<String, String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            save_to_remote: false,
            timeout_secs: 30,
            headers: BTreeMap::new(),
        }
    }
}

/// Local store settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LocalConfig {
    /// Cache root. Defaults to the user cache directory.
    pub root: Option<PathBuf>,
    /// Number of fingerprint directories retained per project.
    pub max_builds_cached: usize,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            root: None,
            max_builds_cached: 3,
        }
    }
}

impl LocalConfig {
    /// Resolves the cache root. Relative paths are taken from `build_root`.
    pub fn resolve_root(&self, build_root: &Path) -> PathBuf {
        match &self.root {
            Some(root) if root.is_absolute() => root.clone(),
            Some(root) => build_root.join(root),
            None => dirs::cache_dir()
                .map(|d| d.join("hoard"))
                .unwrap_or_else(|| build_root.join(".hoard").join("cache")),
        }
    }
}

/// Output collection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OutputConfig {
    /// Regular expressions; artifacts whose file name matches any are not cached.
    pub exclude_patterns: Vec<String>,
    /// Generated-output roots under the build directory that are snapshotted.
    pub generated_roots: Vec<String>,
    /// Additional build-directory subdirectories that are snapshotted.
    pub attached_dirs: Vec<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            exclude_patterns: Vec::new(),
            generated_roots: vec![
                "generated-sources".to_string(),
                "generated-test-sources".to_string(),
            ],
            attached_dirs: Vec::new(),
        }
    }
}

/// Baseline diff settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BaselineConfig {
    /// URL of the baseline build's cache report. Diffing is enabled when set.
    pub url: Option<String>,
}

/// Per-step rules.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ExecutionConfig {
    /// Steps that always execute, even when restored from cache.
    pub run_always: ExecutableSet,
    /// Steps whose absence after the covered segment does not degrade a hit.
    pub ignore_missing: ExecutableSet,
    /// Parameter tracking and recording rules.
    pub reconcile: ReconcileConfig,
}

/// A set of steps selected by plugin, by execution id or by goal.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ExecutableSet {
    /// Every step of these plugins.
    pub plugins: Vec<PluginRef>,
    /// Steps of a plugin with one of the listed execution ids.
    pub executions: Vec<ExecutionRef>,
    /// Steps of a plugin running one of the listed goals.
    pub goals: Vec<GoalRef>,
}

/// Reference to a plugin. The group is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PluginRef {
    /// Plugin group. Any group matches when absent.
    #[serde(default)]
    pub group_id: Option<String>,
    /// Plugin artifact name.
    pub artifact_id: String,
}

/// Reference to executions of a plugin.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExecutionRef {
    /// Plugin group. Any group matches when absent.
    #[serde(default)]
    pub group_id: Option<String>,
    /// Plugin artifact name.
    pub artifact_id: String,
    /// Execution ids.
    pub exec_ids: Vec<String>,
}

/// Reference to goals of a plugin.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GoalRef {
    /// Plugin group. Any group matches when absent.
    #[serde(default)]
    pub group_id: Option<String>,
    /// Plugin artifact name.
    pub artifact_id: String,
    /// Goal names.
    pub goals: Vec<String>,
}

/// Parameter tracking and recording rules.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ReconcileConfig {
    /// Record every resolved parameter of steps with no explicit lists.
    pub log_all_properties: bool,
    /// Per-goal rules.
    pub goals: Vec<GoalReconciliation>,
}

/// Tracking and recording rules for one plugin goal.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GoalReconciliation {
    /// Plugin group. Any group matches when absent.
    #[serde(default)]
    pub group_id: Option<String>,
    /// Plugin artifact name.
    pub artifact_id: String,
    /// Goal name.
    pub goal: String,
    /// Overrides the global `log-all-properties` for this goal.
    #[serde(default)]
    pub log_all: Option<bool>,
    /// Tracked parameters.
    #[serde(default)]
    pub reconciles: Vec<TrackedProperty>,
    /// Parameters always recorded. When non-empty, only these are recorded.
    #[serde(default)]
    pub logs: Vec<String>,
    /// Parameters never recorded.
    #[serde(default)]
    pub nologs: Vec<String>,
}
