//! Lifecycle phase ordering.
//!
//! Build steps are bound to named phases. The clean phases always run for
//! real and never take part in caching; the default phases are totally
//! ordered and bound the portion of a step sequence a record can cover.

/// Phases of the clean lifecycle, in order.
pub const CLEAN_PHASES: &[&str] = &["pre-clean", "clean", "post-clean"];

/// Phases of the default build lifecycle, in order.
pub const DEFAULT_PHASES: &[&str] = &[
    "validate",
    "initialize",
    "generate-sources",
    "process-sources",
    "generate-resources",
    "process-resources",
    "compile",
    "process-classes",
    "generate-test-sources",
    "process-test-sources",
    "generate-test-resources",
    "process-test-resources",
    "test-compile",
    "process-test-classes",
    "test",
    "prepare-package",
    "package",
    "pre-integration-test",
    "integration-test",
    "post-integration-test",
    "verify",
    "install",
    "deploy",
];

/// The phase at which the primary artifact is materialized.
pub const PACKAGE_PHASE: &str = "package";

/// Returns true if `phase` belongs to the clean lifecycle.
pub fn is_clean_phase(phase: &str) -> bool {
    CLEAN_PHASES.contains(&phase)
}

/// Position of `phase` in the default lifecycle, if it belongs to it.
pub fn phase_position(phase: &str) -> Option<usize> {
    DEFAULT_PHASES.iter().position(|p| *p == phase)
}

/// Returns true if `phase` comes strictly after `other` in the default lifecycle.
///
/// Phases outside the default lifecycle are never later than anything.
pub fn is_later_phase(phase: &str, other: &str) -> bool {
    match (phase_position(phase), phase_position(other)) {
        (Some(a), Some(b)) => a > b,
        _ => false,
    }
}

/// Returns true if `phase` is a default-lifecycle phase, i.e. later than clean.
pub fn is_later_than_clean(phase: &str) -> bool {
    phase_position(phase).is_some()
}

/// Returns the latest default-lifecycle phase among `phases`.
pub fn highest_phase<'a>(phases: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    phases
        .into_iter()
        .filter_map(|p| phase_position(p).map(|pos| (pos, p)))
        .max_by_key(|(pos, _)| *pos)
        .map(|(_, p)| p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_phases_are_not_default() {
        for phase in CLEAN_PHASES {
            assert!(is_clean_phase(phase));
            assert!(!is_later_than_clean(phase));
        }
    }

    #[test]
    fn ordering() {
        assert!(is_later_phase("package", "test"));
        assert!(!is_later_phase("compile", "test"));
        assert!(!is_later_phase("test", "test"));
        assert!(!is_later_phase("custom", "compile"));
    }

    #[test]
    fn highest_of_mixed() {
        assert_eq!(
            highest_phase(["compile", "clean", "test", "process-resources"]),
            Some("test")
        );
        assert_eq!(highest_phase(["clean"]), None);
    }
}
