//! Splitting a requested step sequence around what a record covers.

use hoard_common::lifecycle::{highest_phase, is_later_than_clean, phase_position};
use hoard_common::Step;
use hoard_model::BuildRecord;

/// A requested step sequence split into its clean steps, the segment a
/// record covers, and the steps after it.
#[derive(Debug, Default)]
pub struct Segments<'a> {
    /// Clean-lifecycle steps. Always run for real, before any lookup.
    pub clean: Vec<&'a Step>,
    /// Steps covered by the record.
    pub cached: Vec<&'a Step>,
    /// Steps after the covered segment. Always run for real.
    pub post: Vec<&'a Step>,
}

impl<'a> Segments<'a> {
    /// Splits `steps` against `record`. Without a record nothing is covered.
    ///
    /// The covered segment is the longest prefix of non-clean steps whose
    /// phase is not later than the record's highest completed phase.
    pub fn split(steps: &'a [Step], record: Option<&BuildRecord>) -> Self {
        let highest = record
            .and_then(|r| r.highest_completed_phase.as_deref())
            .and_then(phase_position);

        let mut segments = Segments::default();
        let mut covering = highest.is_some();
        for step in steps {
            if step.is_clean() {
                segments.clean.push(step);
                continue;
            }
            let position = step.phase.as_deref().and_then(phase_position);
            covering = covering
                && matches!((position, highest), (Some(p), Some(h)) if p <= h);
            if covering {
                segments.cached.push(step);
            } else {
                segments.post.push(step);
            }
        }
        segments
    }
}

/// Highest lifecycle phase of a request.
///
/// `None` when any step is invoked directly, outside the lifecycle; such
/// requests are never cached.
pub fn requested_phase(steps: &[Step]) -> Option<&str> {
    if steps.iter().any(|s| s.phase.is_none()) {
        return None;
    }
    highest_phase(steps.iter().filter_map(|s| s.phase.as_deref()))
}

/// Returns true if a request reaches past the clean lifecycle.
pub fn is_cacheable(steps: &[Step]) -> bool {
    requested_phase(steps).is_some_and(is_later_than_clean)
}
