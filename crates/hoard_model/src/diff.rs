//! Structured differences between two build records.

use hoard_common::Fingerprint;
use serde::{Deserialize, Serialize};

/// One difference found between a current and a baseline build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MismatchEntry {
    /// Name of the differing item.
    pub item: String,
    /// Value in the current build.
    pub current: Option<String>,
    /// Value in the baseline build.
    pub baseline: Option<String>,
    /// Why the difference matters.
    pub reason: String,
    /// Suggested way to remove the difference.
    pub resolution: Option<String>,
    /// Step or input the item belongs to.
    pub context: Option<String>,
}

impl MismatchEntry {
    /// Creates an entry with a reason and no resolution or context.
    pub fn new(
        item: impl Into<String>,
        current: Option<String>,
        baseline: Option<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            item: item.into(),
            current,
            baseline,
            reason: reason.into(),
            resolution: None,
            context: None,
        }
    }

    /// Sets the suggested resolution.
    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = Some(resolution.into());
        self
    }

    /// Sets the context.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// The full comparison of a build against its baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDiff {
    /// Fingerprint of the current build.
    pub current_fingerprint: Fingerprint,
    /// Fingerprint of the baseline build.
    pub baseline_fingerprint: Fingerprint,
    /// Differences in check order.
    pub mismatches: Vec<MismatchEntry>,
}

impl BuildDiff {
    /// Returns true if no differences were found.
    pub fn is_empty(&self) -> bool {
        self.mismatches.is_empty()
    }
}
