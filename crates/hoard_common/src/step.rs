//! Build step identities.

use crate::coords::PluginCoords;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a build-step instance within a project.
///
/// Formed from the execution id, goal, bound phase and owning plugin
/// coordinates, separated by `:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepKey(String);

impl StepKey {
    /// Wraps an already formatted key.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single step of a project's requested build sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Execution id declared for this step.
    pub execution_id: String,
    /// Goal run by the plugin.
    pub goal: String,
    /// Lifecycle phase the step is bound to. `None` for directly invoked goals.
    pub phase: Option<String>,
    /// Plugin owning the goal.
    pub plugin: PluginCoords,
    /// Identity of the implementation that runs the goal.
    pub implementation: String,
}

impl Step {
    /// Creates a step bound to `phase`.
    pub fn new(
        plugin: PluginCoords,
        goal: impl Into<String>,
        execution_id: impl Into<String>,
        phase: Option<&str>,
    ) -> Self {
        let goal = goal.into();
        let implementation = format!("{}:{}", plugin.artifact_id, goal);
        Self {
            execution_id: execution_id.into(),
            goal,
            phase: phase.map(str::to_string),
            plugin,
            implementation,
        }
    }

    /// Overrides the implementation identity.
    pub fn with_implementation(mut self, implementation: impl Into<String>) -> Self {
        self.implementation = implementation.into();
        self
    }

    /// Returns the stable key of this step.
    pub fn key(&self) -> StepKey {
        StepKey(format!(
            "{}:{}:{}:{}:{}:{}",
            self.execution_id,
            self.goal,
            self.phase.as_deref().unwrap_or(""),
            self.plugin.group_id,
            self.plugin.artifact_id,
            self.plugin.version
        ))
    }

    /// Returns true if the step is bound to a clean-lifecycle phase.
    pub fn is_clean(&self) -> bool {
        self.phase
            .as_deref()
            .is_some_and(crate::lifecycle::is_clean_phase)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} ({})",
            self.plugin.artifact_id, self.goal, self.execution_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiler() -> PluginCoords {
        PluginCoords::new("org.build.plugins", "compiler-plugin", "3.1")
    }

    #[test]
    fn key_includes_all_parts() {
        let step = Step::new(compiler(), "compile", "default-compile", Some("compile"));
        assert_eq!(
            step.key().as_str(),
            "default-compile:compile:compile:org.build.plugins:compiler-plugin:3.1"
        );
    }

    #[test]
    fn keys_differ_by_execution_id() {
        let a = Step::new(compiler(), "compile", "first", Some("compile"));
        let b = Step::new(compiler(), "compile", "second", Some("compile"));
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn clean_detection() {
        let clean = Step::new(
            PluginCoords::new("org.build.plugins", "clean-plugin", "3.0"),
            "clean",
            "default-clean",
            Some("clean"),
        );
        assert!(clean.is_clean());
        let cli = Step::new(compiler(), "compile", "default-cli", None);
        assert!(!cli.is_clean());
    }
}
