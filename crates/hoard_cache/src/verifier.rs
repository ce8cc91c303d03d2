//! Consistency verification of cached steps against the current run.
//!
//! A cached step is trusted only if every tracked parameter resolves to the
//! value recorded when the step ran, or to the parameter's configured skip
//! value. The first mismatch invalidates the [`TrustFlag`] of the project
//! build; it is never restored for the rest of that build.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hoard_common::Step;
use hoard_config::CacheRules;
use hoard_model::CompletedStep;

use crate::executor::ParameterProvider;

/// Whether the restored segment of a project build is still trusted.
#[derive(Debug)]
pub struct TrustFlag(AtomicBool);

impl TrustFlag {
    /// A flag that starts out trusted.
    pub fn new() -> Self {
        Self(AtomicBool::new(true))
    }

    /// Returns false once any mismatch has been found.
    pub fn is_consistent(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Marks the segment untrusted.
    pub fn invalidate(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for TrustFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Compares recorded step parameters with the parameters of the current run.
#[derive(Debug, Clone)]
pub struct ConsistencyVerifier {
    rules: Arc<CacheRules>,
}

impl ConsistencyVerifier {
    /// Creates a verifier applying `rules`.
    pub fn new(rules: Arc<CacheRules>) -> Self {
        Self { rules }
    }

    /// Returns true if the step has tracked parameters to verify.
    pub fn needs_check(&self, step: &Step) -> bool {
        !self.rules.tracked_properties(step).is_empty()
    }

    /// Checks the tracked parameters of `step`.
    ///
    /// Returns the verdict for this step. A mismatch that is not the skip
    /// value also invalidates `trust`.
    pub fn check(
        &self,
        step: &Step,
        completed: &CompletedStep,
        parameters: &dyn ParameterProvider,
        base_dir: &Path,
        trust: &TrustFlag,
    ) -> bool {
        for tracked in self.rules.tracked_properties(step) {
            let expected = completed
                .property(&tracked.name)
                .map(|p| p.value.clone())
                .or_else(|| tracked.default_value.clone());
            let actual = parameters
                .resolve(&tracked.name)
                .map(|v| normalize_value(&v, base_dir));

            if actual == expected {
                continue;
            }
            if actual.is_some() && actual == tracked.skip_value {
                tracing::warn!(
                    property = %tracked.name,
                    step = %step.key(),
                    "cache contains step execution with skip flag and might be incomplete"
                );
                continue;
            }
            tracing::info!(
                property = %tracked.name,
                expected = expected.as_deref().unwrap_or("<none>"),
                actual = actual.as_deref().unwrap_or("<none>"),
                "step parameter mismatch found"
            );
            trust.invalidate();
            return false;
        }
        true
    }
}

/// Makes a parameter value independent of the project location by removing
/// the project base directory from it.
pub(crate) fn normalize_value(value: &str, base_dir: &Path) -> String {
    let base = base_dir.to_string_lossy();
    let base = base.trim_end_matches(std::path::MAIN_SEPARATOR);
    if base.is_empty() {
        return value.to_string();
    }
    let prefix = format!("{base}{}", std::path::MAIN_SEPARATOR);
    value.replace(&prefix, "")
}
