//! The project being built, as seen by the cache.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use hoard_common::ProjectId;

/// A file artifact of a project: the primary artifact or an attached one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectArtifact {
    /// Logical type, e.g. `jar`.
    pub artifact_type: String,
    /// Classifier of attached artifacts.
    pub classifier: Option<String>,
    /// File extension.
    pub extension: String,
    /// Materialized file, once the artifact has been built or restored.
    pub file: Option<PathBuf>,
}

impl ProjectArtifact {
    /// Creates an artifact of `artifact_type` with no file yet.
    pub fn new(artifact_type: impl Into<String>) -> Self {
        let artifact_type = artifact_type.into();
        Self {
            extension: artifact_type.clone(),
            artifact_type,
            classifier: None,
            file: None,
        }
    }

    /// Creates an attached artifact backed by `file`.
    pub fn attached(
        artifact_type: impl Into<String>,
        classifier: impl Into<String>,
        file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            classifier: Some(classifier.into()),
            file: Some(file.into()),
            ..Self::new(artifact_type)
        }
    }

    /// Name of the backing file, if any.
    pub fn file_name(&self) -> Option<String> {
        self.file
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
    }
}

/// A project (module) of a multi-module build.
#[derive(Debug, Clone)]
pub struct Project {
    /// Project coordinates.
    pub id: ProjectId,
    /// Project root directory.
    pub base_dir: PathBuf,
    /// Build output directory.
    pub build_dir: PathBuf,
    /// Main source roots. Roots inside the build directory are generated.
    pub compile_source_roots: Vec<PathBuf>,
    /// Test source roots.
    pub test_compile_source_roots: Vec<PathBuf>,
    /// Project properties.
    pub properties: BTreeMap<String, String>,
    /// Primary artifact.
    pub artifact: ProjectArtifact,
    /// Attached artifacts.
    pub attached: Vec<ProjectArtifact>,
}

impl Project {
    /// Creates a `jar` project with its build directory at `<base_dir>/target`.
    pub fn new(id: ProjectId, base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            id,
            build_dir: base_dir.join("target"),
            base_dir,
            compile_source_roots: Vec::new(),
            test_compile_source_roots: Vec::new(),
            properties: BTreeMap::new(),
            artifact: ProjectArtifact::new("jar"),
            attached: Vec::new(),
        }
    }

    /// Looks up a project property.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// Attaches an artifact to the project.
    pub fn attach(&mut self, artifact: ProjectArtifact) {
        self.attached.push(artifact);
    }

    /// Forgets the primary artifact file and all attached artifacts.
    pub fn reset_artifacts(&mut self) {
        self.artifact.file = None;
        self.attached.clear();
    }
}
