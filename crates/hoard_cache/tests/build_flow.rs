//! End-to-end project builds through the execution strategy.
//!
//! Each test runs one or more sessions against the same on-disk cache, the
//! way consecutive invocations of a build tool would.

mod common;

use common::*;
use hoard_cache::{CacheError, StrategyState};
use hoard_common::Step;
use hoard_model::{CacheReport, CacheSource, CacheStatus};
use tempfile::TempDir;

fn keys(steps: &[Step]) -> Vec<String> {
    steps.iter().map(|s| s.key().to_string()).collect()
}

fn executed_keys(outcome: &hoard_cache::BuildOutcome) -> Vec<String> {
    outcome.executed.iter().map(ToString::to_string).collect()
}

/// Builds the project once with `steps` in a fresh session and returns the
/// executor for inspection.
fn build_once(root: &std::path::Path, steps: &[Step]) -> ScriptedExecutor {
    let session = open_session(root, "", "fp-1");
    let mut executor = ScriptedExecutor::new();
    let mut project = project(root);
    session
        .strategy()
        .execute(&mut project, steps, &mut executor)
        .unwrap();
    executor
}

// ===========================================================================
// Cache hits
// ===========================================================================

#[test]
fn unchanged_project_is_restored_without_running_steps() {
    let tmp = TempDir::new().unwrap();
    let first = build_once(tmp.path(), &package());
    assert_eq!(first.executed, ["compile", "test", "jar"]);

    let session = open_session(tmp.path(), "", "fp-1");
    let mut executor = ScriptedExecutor::new();
    let mut project = project(tmp.path());
    let outcome = session
        .strategy()
        .execute(&mut project, &package(), &mut executor)
        .unwrap();

    assert_eq!(outcome.result.status, CacheStatus::Success);
    assert_eq!(outcome.result.source, CacheSource::Local);
    assert!(outcome.executed.is_empty());
    assert_eq!(outcome.skipped.len(), 3);
    assert!(outcome.restored);
    assert_eq!(
        outcome.states,
        [
            StrategyState::Init,
            StrategyState::CacheLookup,
            StrategyState::Restoring,
            StrategyState::Done,
        ]
    );
    assert_eq!(executor.reconciled, ["compile", "test"]);

    let restored = project.artifact.file.clone().unwrap();
    assert!(restored.is_file());
    assert_eq!(std::fs::read_to_string(restored).unwrap(), "jar of org.acme:core:1.0");
}

#[test]
fn clean_steps_run_before_restoring() {
    let tmp = TempDir::new().unwrap();
    build_once(tmp.path(), &clean_package());

    let session = open_session(tmp.path(), "", "fp-1");
    let mut executor = ScriptedExecutor::new();
    let mut project = project(tmp.path());
    let outcome = session
        .strategy()
        .execute(&mut project, &clean_package(), &mut executor)
        .unwrap();

    assert_eq!(outcome.result.status, CacheStatus::Success);
    assert_eq!(executor.executed, ["clean"]);
    assert!(project.artifact.file.as_deref().is_some_and(|f| f.is_file()));
}

#[test]
fn skip_value_does_not_invalidate_cached_tests() {
    let tmp = TempDir::new().unwrap();
    build_once(tmp.path(), &package());

    let session = open_session(tmp.path(), "", "fp-1");
    let mut executor = ScriptedExecutor::new().with("test", "skipTests", "true");
    let mut project = project(tmp.path());
    let outcome = session
        .strategy()
        .execute(&mut project, &package(), &mut executor)
        .unwrap();

    assert_eq!(outcome.result.status, CacheStatus::Success);
    assert!(executor.executed.is_empty());
    assert_eq!(executor.reconciled, ["compile", "test"]);
}

#[test]
fn generated_sources_are_restored_into_a_fresh_checkout() {
    let tmp = TempDir::new().unwrap();
    {
        let session = open_session(tmp.path(), "", "fp-1");
        let mut executor = ScriptedExecutor::new();
        executor.generate = true;
        let mut project = project(tmp.path());
        session
            .strategy()
            .execute(&mut project, &package(), &mut executor)
            .unwrap();
        std::fs::remove_dir_all(&project.build_dir).unwrap();
    }

    let session = open_session(tmp.path(), "", "fp-1");
    let mut executor = ScriptedExecutor::new();
    let mut project = project(tmp.path());
    let outcome = session
        .strategy()
        .execute(&mut project, &package(), &mut executor)
        .unwrap();

    assert_eq!(outcome.result.status, CacheStatus::Success);
    assert!(project.build_dir.join("generated-sources/Gen.java").is_file());
    assert!(project.attached.is_empty());
}

// ===========================================================================
// Partial hits and re-execution
// ===========================================================================

#[test]
fn partial_build_is_extended_and_saved() {
    let tmp = TempDir::new().unwrap();
    let first = build_once(tmp.path(), &up_to_test());
    assert_eq!(first.executed, ["compile", "test"]);

    let session = open_session(tmp.path(), "", "fp-1");
    let mut executor = ScriptedExecutor::new();
    let mut project = project(tmp.path());
    let outcome = session
        .strategy()
        .execute(&mut project, &package(), &mut executor)
        .unwrap();

    assert_eq!(executor.executed, ["jar"]);
    assert_eq!(outcome.skipped.len(), 2);
    assert_eq!(outcome.result.status, CacheStatus::Rebuilt);
    let record = outcome.result.record.clone().unwrap();
    assert_eq!(record.highest_completed_phase.as_deref(), Some("package"));
    let compile = record.find_execution(&compile().key()).unwrap();
    assert_eq!(compile.property("compilerArgs").unwrap().value, "-g");

    // The extended record now covers the whole request.
    let session = open_session(tmp.path(), "", "fp-1");
    let mut executor = ScriptedExecutor::new();
    let mut project = common::project(tmp.path());
    let outcome = session
        .strategy()
        .execute(&mut project, &package(), &mut executor)
        .unwrap();
    assert_eq!(outcome.result.status, CacheStatus::Success);
    assert!(executor.executed.is_empty());
}

#[test]
fn extending_local_hit_keeps_restored_artifacts() {
    let tmp = TempDir::new().unwrap();
    build_once(tmp.path(), &package());

    let session = open_session(tmp.path(), "", "fp-1");
    let mut executor = ScriptedExecutor::new();
    let mut project = project(tmp.path());
    let outcome = session
        .strategy()
        .execute(&mut project, &up_to_install(), &mut executor)
        .unwrap();

    // The jar is not rebuilt; the saved entry reuses the restored one.
    assert_eq!(executor.executed, ["install"]);
    assert_eq!(outcome.result.status, CacheStatus::Rebuilt);
    let jar = project.artifact.file.clone().unwrap();
    assert_eq!(std::fs::read_to_string(&jar).unwrap(), "jar of org.acme:core:1.0");
    let record = outcome.result.record.clone().unwrap();
    assert_eq!(record.highest_completed_phase.as_deref(), Some("install"));
    assert!(record.artifact.is_some());

    let session = open_session(tmp.path(), "", "fp-1");
    let mut executor = ScriptedExecutor::new();
    let mut project = common::project(tmp.path());
    let outcome = session
        .strategy()
        .execute(&mut project, &up_to_install(), &mut executor)
        .unwrap();
    assert_eq!(outcome.result.status, CacheStatus::Success);
    assert!(executor.executed.is_empty());
    assert!(project.artifact.file.as_deref().is_some_and(|f| f.is_file()));
}

#[test]
fn changed_tracked_parameter_reruns_cached_segment() {
    let tmp = TempDir::new().unwrap();
    build_once(tmp.path(), &package());

    let session = open_session(tmp.path(), "", "fp-1");
    let mut executor = ScriptedExecutor::new().with("compile", "compilerArgs", "-O");
    let mut project = project(tmp.path());
    let outcome = session
        .strategy()
        .execute(&mut project, &package(), &mut executor)
        .unwrap();

    assert_eq!(executor.reconciled, ["compile"]);
    assert_eq!(executed_keys(&outcome), keys(&package()));
    assert!(outcome.skipped.is_empty());
    assert_eq!(outcome.result.status, CacheStatus::Rebuilt);
    let record = outcome.result.record.clone().unwrap();
    let compile = record.find_execution(&compile().key()).unwrap();
    assert_eq!(compile.property("compilerArgs").unwrap().value, "-O");
    assert!(project
        .artifact
        .file
        .as_deref()
        .is_some_and(|f| f.starts_with(&project.build_dir)));
}

#[test]
fn missing_cached_artifact_falls_back_to_full_build() {
    let tmp = TempDir::new().unwrap();
    build_once(tmp.path(), &package());

    let session = open_session(tmp.path(), "", "fp-1");
    let entry = session
        .controller()
        .store()
        .layout()
        .local_dir(&project_id(), &hoard_common::Fingerprint::new("fp-1"));
    std::fs::remove_file(entry.join(jar_name(&project_id()))).unwrap();

    let mut executor = ScriptedExecutor::new();
    let mut project = project(tmp.path());
    let outcome = session
        .strategy()
        .execute(&mut project, &package(), &mut executor)
        .unwrap();

    assert!(!outcome.restored);
    assert_eq!(executor.executed, ["compile", "test", "jar"]);
    assert_eq!(
        outcome.states,
        [
            StrategyState::Init,
            StrategyState::CacheLookup,
            StrategyState::Restoring,
            StrategyState::ExecutingFull,
            StrategyState::Done,
        ]
    );
    assert_eq!(outcome.result.status, CacheStatus::Rebuilt);
    assert!(entry.join(jar_name(&project_id())).is_file());
}

// ===========================================================================
// Uncached runs
// ===========================================================================

#[test]
fn disabled_cache_runs_every_step() {
    let tmp = TempDir::new().unwrap();
    let session = open_session(tmp.path(), "enabled = false", "fp-1");
    let mut executor = ScriptedExecutor::new();
    let mut project = project(tmp.path());
    let outcome = session
        .strategy()
        .execute(&mut project, &clean_package(), &mut executor)
        .unwrap();

    assert_eq!(executor.executed, ["clean", "compile", "test", "jar"]);
    assert_eq!(outcome.result.status, CacheStatus::Empty);
    assert_eq!(
        outcome.states,
        [StrategyState::Init, StrategyState::ExecutingFull, StrategyState::Done]
    );
    assert!(cached_fingerprints(&session).is_empty());
    assert!(session.finish().is_none());
}

#[test]
fn directly_invoked_goal_is_not_cached() {
    let tmp = TempDir::new().unwrap();
    let session = open_session(tmp.path(), "", "fp-1");
    let direct = Step::new(
        hoard_common::PluginCoords::new("org.acme", "deploy-plugin", "1.0"),
        "upload",
        "default-cli",
        None,
    );
    let steps = vec![compile(), direct];
    let mut executor = ScriptedExecutor::new();
    let mut project = project(tmp.path());
    let outcome = session
        .strategy()
        .execute(&mut project, &steps, &mut executor)
        .unwrap();

    assert_eq!(executor.executed, ["compile", "upload"]);
    assert!(outcome.result.context.is_none());
    assert!(cached_fingerprints(&session).is_empty());
}

#[test]
fn failing_step_aborts_without_saving() {
    let tmp = TempDir::new().unwrap();
    let session = open_session(tmp.path(), "", "fp-1");
    let mut executor = ScriptedExecutor::new();
    executor.fail_on = Some("test".to_string());
    let mut project = project(tmp.path());
    let err = session
        .strategy()
        .execute(&mut project, &package(), &mut executor)
        .unwrap_err();

    assert!(matches!(err, CacheError::Execution(_)));
    assert_eq!(executor.executed, ["compile", "test"]);
    assert!(cached_fingerprints(&session).is_empty());

    // The project is released after the failure.
    assert!(session.controller().begin(&project_id()).is_ok());
}

// ===========================================================================
// Fail-fast, retention and reporting
// ===========================================================================

#[test]
fn fail_fast_rejects_projects_not_restored() {
    let tmp = TempDir::new().unwrap();
    let session = open_session(tmp.path(), "fail-fast = true", "fp-1");
    let mut executor = ScriptedExecutor::new();
    let mut project = project(tmp.path());
    let err = session
        .strategy()
        .execute(&mut project, &package(), &mut executor)
        .unwrap_err();
    assert!(matches!(err, CacheError::FailFast { .. }));
    // The build was still saved before failing.
    assert_eq!(cached_fingerprints(&session).len(), 1);

    let session = open_session(tmp.path(), "fail-fast = true", "fp-1");
    let mut executor = ScriptedExecutor::new();
    let mut project = common::project(tmp.path());
    let outcome = session
        .strategy()
        .execute(&mut project, &package(), &mut executor)
        .unwrap();
    assert_eq!(outcome.result.status, CacheStatus::Success);
}

#[test]
fn old_fingerprints_are_evicted() {
    let tmp = TempDir::new().unwrap();
    for fingerprint in ["fp-a", "fp-b", "fp-c"] {
        let cache = tmp.path().join("cache");
        let session = open_session_at(tmp.path(), &cache, "", "max-builds-cached = 2", fingerprint);
        let mut executor = ScriptedExecutor::new();
        let mut project = project(tmp.path());
        session
            .strategy()
            .execute(&mut project, &package(), &mut executor)
            .unwrap();
    }

    let session = open_session(tmp.path(), "", "fp-c");
    let remaining = cached_fingerprints(&session);
    assert_eq!(remaining.len(), 2);
    assert!(remaining.iter().any(|d| d.ends_with("fp-c")));
}

#[test]
fn finished_session_writes_report() {
    let tmp = TempDir::new().unwrap();
    let session = open_session(tmp.path(), "", "fp-1");
    let format = session.config().record_format;
    let id = session.id().to_string();
    let mut executor = ScriptedExecutor::new();
    let mut project = project(tmp.path());
    session
        .strategy()
        .execute(&mut project, &package(), &mut executor)
        .unwrap();

    let path = session.finish().unwrap();
    assert!(path.starts_with(tmp.path().join("target/build-cache")));
    let report: CacheReport = format.decode(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(report.build_id, id);
    let entry = report.find_project("org.acme", "core").unwrap();
    assert_eq!(entry.source, "build");
    assert_eq!(entry.fingerprint.as_str(), "fp-1");
    assert!(entry.url.is_none());
}
