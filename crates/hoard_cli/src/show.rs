//! `hoard show`: prints a build record.

use std::fmt::Write as _;

use hoard_model::BuildRecord;

use crate::record::read_record;
use crate::{GlobalArgs, ShowArgs};

/// Runs the `hoard show` command.
pub fn run(args: &ShowArgs, _global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let record = read_record(&args.record)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print!("{}", summary(&record));
    }
    Ok(0)
}

/// Human-readable summary of a record.
fn summary(record: &BuildRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "project:      {}", record.project);
    let _ = writeln!(out, "fingerprint:  {}", record.fingerprint);
    let _ = writeln!(out, "built:        {}", record.build_time.to_rfc3339());
    let _ = writeln!(out, "hash:         {}", record.hash_function);
    let _ = writeln!(
        out,
        "phase:        {}",
        record.highest_completed_phase.as_deref().unwrap_or("-")
    );
    if let Some(reference) = record.scm.reference() {
        let _ = writeln!(out, "scm:          {reference}");
    }
    if record.is_final {
        let _ = writeln!(out, "final:        yes");
    }

    let _ = writeln!(out, "executions:");
    for execution in &record.executions {
        let _ = writeln!(out, "  {}", execution.execution_key);
        for property in &execution.properties {
            let marker = if property.tracked { "*" } else { " " };
            let _ = writeln!(out, "    {marker} {} = {}", property.name, property.value);
        }
    }

    let _ = writeln!(out, "artifacts:");
    for artifact in record.all_artifacts() {
        let classifier = artifact.classifier.as_deref().unwrap_or("-");
        let _ = writeln!(
            out,
            "  {} [{}:{}] {} bytes {}",
            artifact.file_name, artifact.artifact_type, classifier, artifact.file_size, artifact.file_hash
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoard_common::{ContentHash, Fingerprint, ProjectId, StepKey};
    use hoard_model::{
        ArtifactRecord, CompletedStep, InputManifest, PropertyValue, ScmInfo,
        CACHE_IMPLEMENTATION_VERSION,
    };

    #[test]
    fn summary_lists_executions_and_artifacts() {
        let record = BuildRecord {
            cache_implementation_version: CACHE_IMPLEMENTATION_VERSION.to_string(),
            fingerprint: Fingerprint::new("fp-1"),
            project: ProjectId::new("org.acme", "core", "1.0"),
            hash_function: "XX".to_string(),
            goals: vec!["package".to_string()],
            highest_completed_phase: Some("package".to_string()),
            executions: vec![CompletedStep {
                execution_key: StepKey::new("default-compile:compile"),
                implementation: "compiler-plugin:compile".to_string(),
                properties: vec![PropertyValue {
                    name: "compilerArgs".to_string(),
                    value: "-g".to_string(),
                    tracked: true,
                }],
            }],
            artifact: Some(ArtifactRecord {
                group_id: "org.acme".to_string(),
                artifact_id: "core".to_string(),
                version: "1.0".to_string(),
                artifact_type: "jar".to_string(),
                classifier: None,
                extension: "jar".to_string(),
                file_name: "core-1.0.jar".to_string(),
                file_hash: ContentHash::from_hex("ab"),
                file_size: 3,
            }),
            attached_artifacts: vec![],
            inputs: InputManifest::new(Fingerprint::new("fp-1"), vec![]),
            scm: ScmInfo {
                branch: Some("main".to_string()),
                revision: None,
            },
            build_time: chrono::Utc::now(),
            is_final: false,
        };
        let text = summary(&record);
        assert!(text.contains("fingerprint:  fp-1"));
        assert!(text.contains("scm:          main"));
        assert!(text.contains("* compilerArgs = -g"));
        assert!(text.contains("core-1.0.jar [jar:-] 3 bytes ab"));
    }
}
