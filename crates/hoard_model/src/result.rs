//! Outcome of a cache lookup for one project.

use hoard_common::{Fingerprint, ProjectId};
use std::sync::Arc;

use crate::inputs::InputManifest;
use crate::record::BuildRecord;

/// Status of a cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheStatus {
    /// No usable record, or caching not attempted.
    Empty,
    /// A record exists but cannot serve the requested steps.
    Failure,
    /// A record covers a strict prefix of the requested steps.
    PartialSuccess,
    /// A record covers every requested step.
    Success,
    /// A fresh record was produced by this build.
    Rebuilt,
}

impl CacheStatus {
    /// Ordering used to pick the better of two lookups.
    fn rank(self) -> u8 {
        match self {
            CacheStatus::Success => 2,
            CacheStatus::PartialSuccess => 1,
            _ => 0,
        }
    }
}

/// Where the record of a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheSource {
    /// Saved by a previous local build.
    Local,
    /// Downloaded from, or mirrored by, the remote store.
    Remote,
    /// Produced by the current build.
    Build,
}

impl CacheSource {
    /// Lowercase name used in reports and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            CacheSource::Local => "local",
            CacheSource::Remote => "remote",
            CacheSource::Build => "build",
        }
    }
}

/// Correlates one lookup attempt for a project in a build session.
///
/// Never persisted; discarded at the end of the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheContext {
    /// Project being looked up.
    pub project: ProjectId,
    /// Digested inputs, including the fingerprint.
    pub inputs: Arc<InputManifest>,
    /// Id of the originating build session.
    pub session_id: String,
}

impl CacheContext {
    /// Creates a context.
    pub fn new(project: ProjectId, inputs: InputManifest, session_id: impl Into<String>) -> Self {
        Self {
            project,
            inputs: Arc::new(inputs),
            session_id: session_id.into(),
        }
    }

    /// The fingerprint used as cache key.
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.inputs.fingerprint
    }
}

/// Result of a cache lookup or save for one project.
#[derive(Debug, Clone)]
pub struct CacheResult {
    /// Lookup status.
    pub status: CacheStatus,
    /// Record the status refers to.
    pub record: Option<Arc<BuildRecord>>,
    /// Lookup context. `None` when the fingerprint could not be computed.
    pub context: Option<CacheContext>,
    /// Origin of the record.
    pub source: CacheSource,
    /// Whether the record is a frozen baseline.
    pub is_final: bool,
}

impl CacheResult {
    /// A result with no context at all: caching was not attempted.
    pub fn empty() -> Self {
        Self {
            status: CacheStatus::Empty,
            record: None,
            context: None,
            source: CacheSource::Build,
            is_final: false,
        }
    }

    /// A miss for a known context.
    pub fn empty_with(context: CacheContext) -> Self {
        Self {
            context: Some(context),
            ..Self::empty()
        }
    }

    /// An unusable record.
    pub fn failure(
        record: Option<Arc<BuildRecord>>,
        context: CacheContext,
        source: CacheSource,
    ) -> Self {
        Self::with_status(CacheStatus::Failure, record, context, source)
    }

    /// A record covering a strict prefix of the requested steps.
    pub fn partial_success(
        record: Arc<BuildRecord>,
        context: CacheContext,
        source: CacheSource,
    ) -> Self {
        Self::with_status(CacheStatus::PartialSuccess, Some(record), context, source)
    }

    /// A record covering every requested step.
    pub fn success(record: Arc<BuildRecord>, context: CacheContext, source: CacheSource) -> Self {
        Self::with_status(CacheStatus::Success, Some(record), context, source)
    }

    /// A fresh record produced from `original`'s context by the current build.
    pub fn rebuilt(original: &CacheResult, record: Arc<BuildRecord>) -> Self {
        Self {
            status: CacheStatus::Rebuilt,
            is_final: record.is_final,
            record: Some(record),
            context: original.context.clone(),
            source: CacheSource::Build,
        }
    }

    fn with_status(
        status: CacheStatus,
        record: Option<Arc<BuildRecord>>,
        context: CacheContext,
        source: CacheSource,
    ) -> Self {
        Self {
            status,
            is_final: record.as_ref().is_some_and(|r| r.is_final),
            record,
            context: Some(context),
            source,
        }
    }

    /// Returns true for SUCCESS.
    pub fn is_success(&self) -> bool {
        self.status == CacheStatus::Success
    }

    /// Returns true for PARTIAL_SUCCESS.
    pub fn is_partial_success(&self) -> bool {
        self.status == CacheStatus::PartialSuccess
    }

    /// Returns true when the record can be at least partially restored.
    pub fn is_restorable(&self) -> bool {
        self.is_success() || self.is_partial_success()
    }

    /// Returns true if `self` should replace `other` as the chosen lookup result.
    ///
    /// A strictly higher status wins. On equal statuses `self` wins only if
    /// it carries a record and `other` does not; otherwise `other` is kept.
    pub fn outranks(&self, other: &CacheResult) -> bool {
        match self.status.rank().cmp(&other.status.rank()) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Equal => self.record.is_some() && other.record.is_none(),
            std::cmp::Ordering::Less => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::sample_record;

    fn context() -> CacheContext {
        let record = sample_record();
        CacheContext::new(record.project.clone(), record.inputs.clone(), "session-1")
    }

    #[test]
    fn empty_has_no_context() {
        let result = CacheResult::empty();
        assert_eq!(result.status, CacheStatus::Empty);
        assert!(result.context.is_none());
        assert!(!result.is_restorable());
    }

    #[test]
    fn ranking() {
        let record = Arc::new(sample_record());
        let success = CacheResult::success(record.clone(), context(), CacheSource::Local);
        let partial = CacheResult::partial_success(record.clone(), context(), CacheSource::Remote);
        let failure = CacheResult::failure(Some(record), context(), CacheSource::Remote);
        assert!(success.outranks(&partial));
        assert!(partial.outranks(&failure));
        assert!(!partial.outranks(&partial.clone()));

        // Equal ranks: a matched record beats a miss, never the reverse.
        let miss = CacheResult::empty_with(context());
        assert!(failure.outranks(&miss));
        assert!(!miss.outranks(&failure));
        assert!(!failure.outranks(&failure.clone()));
    }

    #[test]
    fn rebuilt_keeps_context() {
        let original = CacheResult::empty_with(context());
        let rebuilt = CacheResult::rebuilt(&original, Arc::new(sample_record()));
        assert_eq!(rebuilt.status, CacheStatus::Rebuilt);
        assert_eq!(rebuilt.source, CacheSource::Build);
        assert_eq!(rebuilt.context, original.context);
    }

    #[test]
    fn context_exposes_fingerprint() {
        assert_eq!(context().fingerprint().as_str(), "f1");
    }
}
