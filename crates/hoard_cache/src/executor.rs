//! Seams to the build tool: fingerprinting, parameter resolution and step
//! execution.
//!
//! Skipping a cached step that has tracked parameters is a two-phase
//! protocol. The execution strategy hands the executor a [`SkipCandidate`];
//! the executor resolves the step's parameters at the moment the step would
//! run and calls [`SkipCandidate::decide`], which answers with an explicit
//! [`StepDecision`].

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use hoard_common::{Step, StepKey};
use hoard_model::{CompletedStep, InputManifest};

use crate::error::ExecutionError;
use crate::project::Project;
use crate::verifier::{ConsistencyVerifier, TrustFlag};

/// Computes the fingerprint of a project's inputs.
pub trait FingerprintSource: Send + Sync {
    /// Digests the project inputs. The manifest carries the fingerprint.
    ///
    /// An error disables caching for this project only.
    fn calculate(&self, project: &Project) -> Result<InputManifest, String>;
}

/// Resolved parameter values of a step.
pub trait ParameterProvider {
    /// Names of all parameters the step exposes.
    fn parameter_names(&self) -> Vec<String>;

    /// Resolved value of a parameter, if it exists.
    fn resolve(&self, name: &str) -> Option<String>;
}

/// Parameter values resolved for one step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepParameters {
    values: BTreeMap<String, String>,
}

impl StepParameters {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a parameter value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StepParameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl ParameterProvider for StepParameters {
    fn parameter_names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    fn resolve(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

/// Outcome of reconciling a cached step at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDecision {
    /// The cached result stands; the step does not run.
    Skip,
    /// The cache is no longer trusted; the step and the rest of the cached
    /// segment must run.
    MustRun,
}

/// A cached step awaiting its run-time consistency decision.
pub struct SkipCandidate<'a> {
    verifier: &'a ConsistencyVerifier,
    step: &'a Step,
    completed: &'a CompletedStep,
    base_dir: &'a Path,
    trust: &'a TrustFlag,
}

impl<'a> SkipCandidate<'a> {
    pub(crate) fn new(
        verifier: &'a ConsistencyVerifier,
        step: &'a Step,
        completed: &'a CompletedStep,
        base_dir: &'a Path,
        trust: &'a TrustFlag,
    ) -> Self {
        Self {
            verifier,
            step,
            completed,
            base_dir,
            trust,
        }
    }

    /// The step being reconciled.
    pub fn step(&self) -> &Step {
        self.step
    }

    /// The recorded execution of the step.
    pub fn recorded(&self) -> &CompletedStep {
        self.completed
    }

    /// Decides whether the step may be skipped given its current parameters.
    pub fn decide(self, parameters: &dyn ParameterProvider) -> StepDecision {
        self.verifier
            .check(self.step, self.completed, parameters, self.base_dir, self.trust);
        if self.trust.is_consistent() {
            StepDecision::Skip
        } else {
            StepDecision::MustRun
        }
    }
}

/// Runs build steps on behalf of the execution strategy.
pub trait StepExecutor {
    /// Runs `step` for real and returns the parameters it resolved.
    fn execute(&mut self, project: &mut Project, step: &Step)
        -> Result<StepParameters, ExecutionError>;

    /// Resolves the parameters of a cached step without running it and
    /// returns `candidate`'s decision.
    fn reconcile(
        &mut self,
        project: &Project,
        step: &Step,
        candidate: SkipCandidate<'_>,
    ) -> Result<StepDecision, ExecutionError>;
}

/// Parameters of the steps that actually ran in a project build.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    executions: HashMap<StepKey, StepParameters>,
}

impl ExecutionLog {
    /// Records the parameters of an executed step.
    pub fn record(&mut self, step: &Step, parameters: StepParameters) {
        self.executions.insert(step.key(), parameters);
    }

    /// Parameters of an executed step.
    pub fn get(&self, key: &StepKey) -> Option<&StepParameters> {
        self.executions.get(key)
    }

    /// Forgets every execution.
    pub fn clear(&mut self) {
        self.executions.clear();
    }

    /// Number of recorded executions.
    pub fn len(&self) -> usize {
        self.executions.len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.executions.is_empty()
    }
}
