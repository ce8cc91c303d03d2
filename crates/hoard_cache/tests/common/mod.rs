//! Shared harness for the build-flow integration tests: a scripted step
//! executor, a fixed fingerprint source and session helpers.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hoard_cache::{
    CacheSession, ExecutionError, FingerprintSource, Project, SessionSettings, SkipCandidate,
    StepDecision, StepExecutor, StepParameters,
};
use hoard_common::{Fingerprint, PluginCoords, ProjectId, Step};
use hoard_config::load_config_from_str;
use hoard_model::InputManifest;

/// Tracked parameters of the compiler and test steps.
pub const RECONCILE: &str = r#"
[[execution.reconcile.goals]]
artifact-id = "compiler-plugin"
goal = "compile"
reconciles = [{ name = "compilerArgs" }]

[[execution.reconcile.goals]]
artifact-id = "surefire-plugin"
goal = "test"
reconciles = [{ name = "skipTests", skip-value = "true" }]
"#;

// ---------------------------------------------------------------------------
// Fingerprints
// ---------------------------------------------------------------------------

/// Reports the same fingerprint for every project.
pub struct FixedFingerprint(pub String);

impl FixedFingerprint {
    pub fn new(fingerprint: &str) -> Arc<Self> {
        Arc::new(Self(fingerprint.to_string()))
    }
}

impl FingerprintSource for FixedFingerprint {
    fn calculate(&self, _: &Project) -> Result<InputManifest, String> {
        Ok(InputManifest::new(Fingerprint::new(&self.0), vec![]))
    }
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

fn plugin(artifact: &str) -> PluginCoords {
    PluginCoords::new("org.apache.plugins", artifact, "3.0")
}

pub fn clean() -> Step {
    Step::new(plugin("clean-plugin"), "clean", "default-clean", Some("clean"))
}

pub fn compile() -> Step {
    Step::new(plugin("compiler-plugin"), "compile", "default-compile", Some("compile"))
}

pub fn test() -> Step {
    Step::new(plugin("surefire-plugin"), "test", "default-test", Some("test"))
}

pub fn jar() -> Step {
    Step::new(plugin("jar-plugin"), "jar", "default-jar", Some("package"))
}

pub fn install() -> Step {
    Step::new(plugin("install-plugin"), "install", "default-install", Some("install"))
}

/// `clean package`.
pub fn clean_package() -> Vec<Step> {
    vec![clean(), compile(), test(), jar()]
}

/// `package`.
pub fn package() -> Vec<Step> {
    vec![compile(), test(), jar()]
}

/// `install`.
pub fn up_to_install() -> Vec<Step> {
    vec![compile(), test(), jar(), install()]
}

/// `test`.
pub fn up_to_test() -> Vec<Step> {
    vec![compile(), test()]
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Pretends to run steps. Packaging writes a jar into the build directory;
/// compiling with `generate` set writes a generated source.
pub struct ScriptedExecutor {
    parameters: HashMap<String, StepParameters>,
    pub executed: Vec<String>,
    pub reconciled: Vec<String>,
    pub fail_on: Option<String>,
    pub generate: bool,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        let mut parameters = HashMap::new();
        parameters.insert(
            "compile".to_string(),
            [("compilerArgs", "-g"), ("encoding", "UTF-8")].into_iter().collect(),
        );
        parameters.insert(
            "test".to_string(),
            [("skipTests", "false")].into_iter().collect(),
        );
        Self {
            parameters,
            executed: Vec::new(),
            reconciled: Vec::new(),
            fail_on: None,
            generate: false,
        }
    }

    /// Overrides a parameter of the step running `goal`.
    pub fn with(mut self, goal: &str, name: &str, value: &str) -> Self {
        self.parameters
            .entry(goal.to_string())
            .or_default()
            .set(name, value);
        self
    }

    fn parameters(&self, goal: &str) -> StepParameters {
        self.parameters.get(goal).cloned().unwrap_or_default()
    }
}

impl StepExecutor for ScriptedExecutor {
    fn execute(&mut self, project: &mut Project, step: &Step) -> Result<StepParameters, ExecutionError> {
        self.executed.push(step.goal.clone());
        if self.fail_on.as_deref() == Some(step.goal.as_str()) {
            return Err(ExecutionError::new(step, "scripted failure"));
        }
        match step.goal.as_str() {
            "clean" => {
                if project.build_dir.exists() {
                    std::fs::remove_dir_all(&project.build_dir)
                        .map_err(|e| ExecutionError::new(step, e.to_string()))?;
                }
            }
            "compile" if self.generate => {
                let generated = project.build_dir.join("generated-sources");
                std::fs::create_dir_all(&generated)
                    .and_then(|_| std::fs::write(generated.join("Gen.java"), "class Gen {}"))
                    .map_err(|e| ExecutionError::new(step, e.to_string()))?;
            }
            "jar" => {
                let file = project.build_dir.join(jar_name(&project.id));
                std::fs::create_dir_all(&project.build_dir)
                    .and_then(|_| std::fs::write(&file, format!("jar of {}", project.id)))
                    .map_err(|e| ExecutionError::new(step, e.to_string()))?;
                project.artifact.file = Some(file);
            }
            _ => {}
        }
        Ok(self.parameters(&step.goal))
    }

    fn reconcile(
        &mut self,
        _: &Project,
        step: &Step,
        candidate: SkipCandidate<'_>,
    ) -> Result<StepDecision, ExecutionError> {
        self.reconciled.push(step.goal.clone());
        Ok(candidate.decide(&self.parameters(&step.goal)))
    }
}

pub fn jar_name(id: &ProjectId) -> String {
    format!("{}-{}.jar", id.artifact_id, id.version)
}

// ---------------------------------------------------------------------------
// Sessions and projects
// ---------------------------------------------------------------------------

pub fn project_id() -> ProjectId {
    ProjectId::new("org.acme", "core", "1.0")
}

/// A fresh checkout of the project under `root`.
pub fn project(root: &Path) -> Project {
    Project::new(project_id(), root.join("core"))
}

/// Opens a session on `root` whose local cache lives in `cache`.
///
/// `extra` goes before every table, `local` into the `[local]` table.
pub fn open_session_at(
    root: &Path,
    cache: &Path,
    extra: &str,
    local: &str,
    fingerprint: &str,
) -> CacheSession {
    let content = format!(
        "{extra}\n[local]\nroot = \"{}\"\n{local}\n{RECONCILE}",
        cache.display()
    );
    let config = load_config_from_str(&content).unwrap();
    let settings = SessionSettings {
        build_root: root.to_path_buf(),
        root_project: project_id(),
        properties: BTreeMap::new(),
    };
    CacheSession::with_config(settings, config, FixedFingerprint::new(fingerprint)).unwrap()
}

/// Opens a session on `root` with the local cache at `<root>/cache`.
pub fn open_session(root: &Path, extra: &str, fingerprint: &str) -> CacheSession {
    open_session_at(root, &root.join("cache"), extra, "", fingerprint)
}

/// Fingerprint directories of the project in the local cache.
pub fn cached_fingerprints(session: &CacheSession) -> Vec<PathBuf> {
    let dir = session.controller().store().layout().project_dir(&project_id());
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect()
        })
        .unwrap_or_default();
    dirs.sort();
    dirs
}
