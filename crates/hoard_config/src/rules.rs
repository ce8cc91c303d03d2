//! Per-step rules resolved from the configuration.

use crate::error::ConfigError;
use crate::types::{CacheConfig, ExecutableSet, GoalReconciliation};
use hoard_common::Step;
use hoard_model::TrackedProperty;
use regex::Regex;

/// Compiled view of the configuration answering per-step questions.
#[derive(Debug, Clone)]
pub struct CacheRules {
    config: CacheConfig,
    exclude_patterns: Vec<Regex>,
}

/// Decides which resolved parameters of a step are recorded at save time.
#[derive(Debug, Clone, Copy)]
pub struct RecordingPolicy<'a> {
    tracked: &'a [TrackedProperty],
    logs: &'a [String],
    nologs: &'a [String],
    log_all: bool,
}

impl RecordingPolicy<'_> {
    /// Returns true if the parameter is tracked for consistency checks.
    pub fn is_tracked(&self, name: &str) -> bool {
        self.tracked.iter().any(|t| t.name == name)
    }

    /// Returns true if the parameter should be recorded.
    ///
    /// Tracked parameters are always recorded. Otherwise an explicit log list
    /// wins, then an explicit no-log list, then the log-all flag.
    pub fn should_record(&self, name: &str) -> bool {
        if self.is_tracked(name) {
            return true;
        }
        if !self.logs.is_empty() {
            return self.logs.iter().any(|l| l == name);
        }
        if !self.nologs.is_empty() {
            return !self.nologs.iter().any(|l| l == name);
        }
        self.log_all
    }
}

impl CacheRules {
    /// Compiles the rules of a configuration.
    pub fn resolve(config: &CacheConfig) -> Result<Self, ConfigError> {
        let exclude_patterns = config
            .output
            .exclude_patterns
            .iter()
            .map(|p| {
                Regex::new(&format!("^(?:{p})$")).map_err(|e| ConfigError::InvalidPattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            config: config.clone(),
            exclude_patterns,
        })
    }

    /// The configuration the rules were compiled from.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Tracked parameters of a step. Empty if the step has none.
    pub fn tracked_properties(&self, step: &Step) -> &[TrackedProperty] {
        self.reconciliation(step)
            .map(|r| r.reconciles.as_slice())
            .unwrap_or(&[])
    }

    /// Recording policy of a step.
    pub fn recording_policy(&self, step: &Step) -> RecordingPolicy<'_> {
        let global = self.config.execution.reconcile.log_all_properties;
        match self.reconciliation(step) {
            Some(r) => RecordingPolicy {
                tracked: &r.reconciles,
                logs: &r.logs,
                nologs: &r.nologs,
                log_all: r.log_all.unwrap_or(global),
            },
            None => RecordingPolicy {
                tracked: &[],
                logs: &[],
                nologs: &[],
                log_all: global,
            },
        }
    }

    /// Returns true if the configuration marks the step as always-run.
    pub fn is_run_always(&self, step: &Step) -> bool {
        matches_set(&self.config.execution.run_always, step)
    }

    /// Returns true if the step may be missing after the covered segment
    /// without degrading a cache hit.
    pub fn can_ignore_missing(&self, step: &Step) -> bool {
        matches_set(&self.config.execution.ignore_missing, step)
    }

    /// Returns true if an artifact file name fully matches an exclude pattern.
    pub fn is_excluded_output(&self, file_name: &str) -> bool {
        self.exclude_patterns.iter().any(|p| p.is_match(file_name))
    }

    fn reconciliation(&self, step: &Step) -> Option<&GoalReconciliation> {
        self.config.execution.reconcile.goals.iter().find(|r| {
            r.goal == step.goal && plugin_matches(r.group_id.as_deref(), &r.artifact_id, step)
        })
    }
}

fn plugin_matches(group_id: Option<&str>, artifact_id: &str, step: &Step) -> bool {
    artifact_id == step.plugin.artifact_id
        && group_id.map_or(true, |g| g == step.plugin.group_id)
}

fn matches_set(set: &ExecutableSet, step: &Step) -> bool {
    set.plugins
        .iter()
        .any(|p| plugin_matches(p.group_id.as_deref(), &p.artifact_id, step))
        || set.executions.iter().any(|e| {
            plugin_matches(e.group_id.as_deref(), &e.artifact_id, step)
                && e.exec_ids.iter().any(|id| *id == step.execution_id)
        })
        || set.goals.iter().any(|g| {
            plugin_matches(g.group_id.as_deref(), &g.artifact_id, step)
                && g.goals.iter().any(|goal| *goal == step.goal)
        })
}
