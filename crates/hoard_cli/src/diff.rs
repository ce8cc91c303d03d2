//! `hoard diff`: compares a build record with a baseline record.

use hoard_cache::{compare, write_diff_artifacts};
use hoard_model::BuildDiff;

use crate::record::{format_for, read_record};
use crate::{DiffArgs, GlobalArgs};

/// Runs the `hoard diff` command.
///
/// Returns exit code 0 if the records match, 1 if they differ.
pub fn run(args: &DiffArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let current = read_record(&args.current)?;
    let baseline = read_record(&args.baseline)?;
    let diff = compare(&current, &baseline);

    if !global.quiet {
        print!("{}", render(&diff));
    }
    if let Some(out) = &args.out {
        let written = write_diff_artifacts(out, format_for(&args.current), &current, &baseline, &diff)?;
        if !global.quiet {
            eprintln!("   Wrote {} files to {}", written.len(), out.display());
        }
    }
    Ok(if diff.is_empty() { 0 } else { 1 })
}

fn render(diff: &BuildDiff) -> String {
    if diff.is_empty() {
        return format!(
            "{} matches baseline {}\n",
            diff.current_fingerprint, diff.baseline_fingerprint
        );
    }
    let mut out = format!(
        "{} differs from baseline {} ({} mismatches)\n",
        diff.current_fingerprint,
        diff.baseline_fingerprint,
        diff.mismatches.len()
    );
    for m in &diff.mismatches {
        out.push_str(&format!("- {}", m.item));
        if let Some(context) = &m.context {
            out.push_str(&format!(" [{context}]"));
        }
        out.push('\n');
        if m.current.is_some() || m.baseline.is_some() {
            out.push_str(&format!(
                "    current: {}  baseline: {}\n",
                m.current.as_deref().unwrap_or("-"),
                m.baseline.as_deref().unwrap_or("-")
            ));
        }
        out.push_str(&format!("    {}\n", m.reason));
        if let Some(resolution) = &m.resolution {
            out.push_str(&format!("    hint: {resolution}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoard_common::Fingerprint;
    use hoard_model::MismatchEntry;

    #[test]
    fn render_lists_mismatches() {
        let diff = BuildDiff {
            current_fingerprint: Fingerprint::new("fp-2"),
            baseline_fingerprint: Fingerprint::new("fp-1"),
            mismatches: vec![MismatchEntry::new(
                "compilerArgs",
                Some("-O".to_string()),
                Some("-g".to_string()),
                "tracked property differs",
            )
            .with_context("default-compile")],
        };
        let text = render(&diff);
        assert!(text.starts_with("fp-2 differs from baseline fp-1 (1 mismatches)"));
        assert!(text.contains("- compilerArgs [default-compile]"));
        assert!(text.contains("current: -O  baseline: -g"));
    }

    #[test]
    fn render_reports_match() {
        let diff = BuildDiff {
            current_fingerprint: Fingerprint::new("fp-1"),
            baseline_fingerprint: Fingerprint::new("fp-1"),
            mismatches: vec![],
        };
        assert_eq!(render(&diff), "fp-1 matches baseline fp-1\n");
    }
}
