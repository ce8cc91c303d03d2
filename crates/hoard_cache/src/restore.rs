//! Restoring a cached build's artifacts into the project.

use std::path::{Path, PathBuf};

use hoard_model::{ArtifactRecord, BuildRecord, CacheContext, CacheResult, CacheSource};

use crate::archive::{adjust_version, is_snapshot, is_versioned_archive, snapshot_dir, unpack_snapshot};
use crate::controller::CacheController;
use crate::error::CacheError;
use crate::project::{Project, ProjectArtifact};

/// Scratch directory for version-adjusted archives, under the build directory.
const RESTORED_DIR: &str = "build-cache/restored";

impl CacheController {
    /// Restores the artifacts of a restorable result into `project`.
    ///
    /// Every artifact file is resolved first, downloading remote files as
    /// needed. If any is unavailable the restore is abandoned and the
    /// project is left untouched. Output-directory snapshots are unpacked
    /// into the build directory instead of being attached.
    pub fn restore_artifacts(&self, project: &mut Project, result: &CacheResult) -> bool {
        let (Some(record), Some(context)) = (result.record.as_deref(), result.context.as_ref())
        else {
            return false;
        };
        match self.try_restore(project, record, context, result.source) {
            Ok(restored) => restored,
            Err(e) => {
                tracing::error!(project = %project.id, error = %e, "cannot restore cached artifacts");
                false
            }
        }
    }

    fn try_restore(
        &self,
        project: &mut Project,
        record: &BuildRecord,
        context: &CacheContext,
        source: CacheSource,
    ) -> Result<bool, CacheError> {
        let primary = match record.artifact.as_ref().filter(|a| a.has_file()) {
            Some(artifact) => match self.resolve(context, source, artifact)? {
                Some(path) => Some((artifact, path)),
                None => return Ok(false),
            },
            None => None,
        };
        let mut attached = Vec::with_capacity(record.attached_artifacts.len());
        for artifact in record.attached_artifacts.iter().filter(|a| a.has_file()) {
            let Some(path) = self.resolve(context, source, artifact)? else {
                return Ok(false);
            };
            attached.push((artifact, path));
        }

        let scratch = project.build_dir.join(RESTORED_DIR);
        let primary = match primary {
            Some((artifact, path)) => {
                let path = self.adjusted(project, artifact, path, &scratch)?;
                Some((artifact, path))
            }
            None => None,
        };
        let mut files = Vec::with_capacity(attached.len());
        for (artifact, path) in attached {
            if is_snapshot(artifact.classifier.as_deref()) {
                let classifier = artifact.classifier.as_deref().unwrap_or_default();
                match snapshot_dir(&project.build_dir, classifier) {
                    Some(dir) => {
                        unpack_snapshot(&path, &dir)?;
                        tracing::debug!(dir = %dir.display(), "restored output directory");
                    }
                    None => tracing::warn!(classifier, "ignoring snapshot with an invalid classifier"),
                }
                continue;
            }
            let path = self.adjusted(project, artifact, path, &scratch)?;
            files.push((artifact, path));
        }

        let fingerprint = context.fingerprint().as_str();
        if let Some((artifact, path)) = primary {
            project.artifact.file = Some(path);
            self.put_checksum(artifact, fingerprint);
        }
        for (artifact, path) in files {
            project.attach(ProjectArtifact {
                artifact_type: artifact.artifact_type.clone(),
                classifier: artifact.classifier.clone(),
                extension: artifact.extension.clone(),
                file: Some(path),
            });
            self.put_checksum(artifact, fingerprint);
        }
        tracing::info!(
            project = %project.id,
            source = source.as_str(),
            "restored cached artifacts"
        );
        Ok(true)
    }

    fn resolve(
        &self,
        context: &CacheContext,
        source: CacheSource,
        artifact: &ArtifactRecord,
    ) -> Result<Option<PathBuf>, CacheError> {
        let path = self
            .store
            .artifact_path(context, source, &artifact.file_name)?;
        if path.is_file() {
            Ok(Some(path))
        } else {
            tracing::info!(
                project = %context.project,
                file = %artifact.file_name,
                "cached artifact is missing, cannot restore"
            );
            Ok(None)
        }
    }

    fn adjusted(
        &self,
        project: &Project,
        artifact: &ArtifactRecord,
        path: PathBuf,
        scratch: &Path,
    ) -> Result<PathBuf, CacheError> {
        let current = project.id.version.as_str();
        if !self.config().adjust_archive_versions
            || artifact.version == current
            || !is_versioned_archive(&artifact.file_name)
        {
            return Ok(path);
        }
        adjust_version(&path, scratch, &artifact.version, current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::FingerprintSource;
    use crate::session::{CacheSession, SessionSettings};
    use hoard_common::{ContentHash, Fingerprint, ProjectId};
    use hoard_config::load_config_from_str;
    use hoard_model::{InputManifest, ScmInfo, CACHE_IMPLEMENTATION_VERSION};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    struct Fixed;

    impl FingerprintSource for Fixed {
        fn calculate(&self, _: &Project) -> Result<InputManifest, String> {
            Ok(InputManifest::new(Fingerprint::new("fp-1"), vec![]))
        }
    }

    fn session(root: &Path) -> CacheSession {
        let config = load_config_from_str(&format!(
            "[local]\nroot = \"{}\"\n",
            root.join("cache").display()
        ))
        .unwrap();
        let settings = SessionSettings {
            build_root: root.to_path_buf(),
            root_project: ProjectId::new("org.acme", "core", "1.0"),
            properties: BTreeMap::new(),
        };
        CacheSession::with_config(settings, config, Arc::new(Fixed)).unwrap()
    }

    fn artifact(file_name: &str, classifier: Option<&str>, artifact_type: &str) -> ArtifactRecord {
        ArtifactRecord {
            group_id: "org.acme".to_string(),
            artifact_id: "core".to_string(),
            version: "1.0".to_string(),
            artifact_type: artifact_type.to_string(),
            classifier: classifier.map(str::to_string),
            extension: artifact_type.to_string(),
            file_name: file_name.to_string(),
            file_hash: ContentHash::from_hex("00"),
            file_size: 0,
        }
    }

    fn record(artifact: Option<ArtifactRecord>, attached: Vec<ArtifactRecord>) -> BuildRecord {
        BuildRecord {
            cache_implementation_version: CACHE_IMPLEMENTATION_VERSION.to_string(),
            fingerprint: Fingerprint::new("fp-1"),
            project: ProjectId::new("org.acme", "core", "1.0"),
            hash_function: "XX".to_string(),
            goals: vec!["package".to_string()],
            highest_completed_phase: Some("package".to_string()),
            executions: vec![],
            artifact,
            attached_artifacts: attached,
            inputs: InputManifest::new(Fingerprint::new("fp-1"), vec![]),
            scm: ScmInfo::default(),
            build_time: chrono::Utc::now(),
            is_final: false,
        }
    }

    fn local_result(record: BuildRecord) -> CacheResult {
        let context = CacheContext::new(record.project.clone(), record.inputs.clone(), "s");
        CacheResult::success(Arc::new(record), context, CacheSource::Local)
    }

    #[test]
    fn restores_primary_attached_and_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path());
        let controller = session.controller();
        let result = local_result(record(
            Some(artifact("core-1.0.jar", None, "jar")),
            vec![
                artifact("core-1.0-sources.jar", Some("sources"), "jar"),
                artifact("outputdir_generated-sources.tar.gz", Some("outputdir_generated-sources"), "tar.gz"),
            ],
        ));
        let context = result.context.clone().unwrap();
        let entry = controller.store().layout().local_dir(&context.project, context.fingerprint());
        std::fs::create_dir_all(&entry).unwrap();
        std::fs::write(entry.join("core-1.0.jar"), "jar").unwrap();
        std::fs::write(entry.join("core-1.0-sources.jar"), "sources").unwrap();
        let generated = dir.path().join("gen");
        std::fs::create_dir_all(&generated).unwrap();
        std::fs::write(generated.join("Gen.java"), "class Gen {}").unwrap();
        crate::archive::pack_dir(&generated, &entry.join("outputdir_generated-sources.tar.gz")).unwrap();

        let mut project = Project::new(context.project.clone(), dir.path().join("core"));
        assert!(controller.restore_artifacts(&mut project, &result));

        assert_eq!(project.artifact.file, Some(entry.join("core-1.0.jar")));
        assert_eq!(project.attached.len(), 1);
        assert_eq!(project.attached[0].classifier.as_deref(), Some("sources"));
        assert!(project.build_dir.join("generated-sources/Gen.java").is_file());
        assert!(controller.artifact_digest("org.acme:core:jar:").is_some());
    }

    #[test]
    fn missing_file_aborts_without_touching_project() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path());
        let controller = session.controller();
        let result = local_result(record(
            Some(artifact("core-1.0.jar", None, "jar")),
            vec![artifact("core-1.0-sources.jar", Some("sources"), "jar")],
        ));
        let context = result.context.clone().unwrap();
        let entry = controller.store().layout().local_dir(&context.project, context.fingerprint());
        std::fs::create_dir_all(&entry).unwrap();
        std::fs::write(entry.join("core-1.0.jar"), "jar").unwrap();

        let mut project = Project::new(context.project.clone(), dir.path().join("core"));
        assert!(!controller.restore_artifacts(&mut project, &result));
        assert!(project.artifact.file.is_none());
        assert!(project.attached.is_empty());
        assert!(controller.artifact_digest("org.acme:core:jar:").is_none());
    }

    #[test]
    fn record_without_files_restores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path());
        let result = local_result(record(Some(artifact(" ", None, "pom")), vec![]));
        let mut project = Project::new(ProjectId::new("org.acme", "core", "1.0"), dir.path());
        assert!(session.controller().restore_artifacts(&mut project, &result));
        assert!(project.artifact.file.is_none());
    }

    #[test]
    fn archives_of_other_versions_are_adjusted() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path());
        let controller = session.controller();
        let mut cached = artifact("dist-1.0.tar.gz", Some("dist"), "tar.gz");
        cached.version = "1.0".to_string();
        let result = local_result(record(None, vec![cached]));
        let context = result.context.clone().unwrap();
        let entry = controller.store().layout().local_dir(&context.project, context.fingerprint());
        std::fs::create_dir_all(&entry).unwrap();
        let content = dir.path().join("content");
        std::fs::create_dir_all(&content).unwrap();
        std::fs::write(content.join("app.properties"), "version=1.0\n").unwrap();
        crate::archive::pack_dir(&content, &entry.join("dist-1.0.tar.gz")).unwrap();

        let mut project = Project::new(ProjectId::new("org.acme", "core", "1.1"), dir.path().join("core"));
        assert!(controller.restore_artifacts(&mut project, &result));
        let restored = project.attached[0].file.clone().unwrap();
        assert!(restored.starts_with(project.build_dir.join(RESTORED_DIR)));

        let out = dir.path().join("out");
        unpack_snapshot(&restored, &out).unwrap();
        assert_eq!(std::fs::read_to_string(out.join("app.properties")).unwrap(), "version=1.1\n");
    }

    #[test]
    fn primary_jar_of_other_version_is_adjusted() {
        use std::io::{Read, Write};

        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path());
        let controller = session.controller();
        let result = local_result(record(Some(artifact("core-1.0.jar", None, "jar")), vec![]));
        let context = result.context.clone().unwrap();
        let entry = controller.store().layout().local_dir(&context.project, context.fingerprint());
        std::fs::create_dir_all(&entry).unwrap();
        let cached = entry.join("core-1.0.jar");
        let mut writer = zip::ZipWriter::new(std::fs::File::create(&cached).unwrap());
        writer
            .start_file("META-INF/MANIFEST.MF", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"Implementation-Version: 1.0\n").unwrap();
        writer.finish().unwrap();

        let mut project = Project::new(ProjectId::new("org.acme", "core", "1.1"), dir.path().join("core"));
        assert!(controller.restore_artifacts(&mut project, &result));
        let restored = project.artifact.file.clone().unwrap();
        assert_eq!(restored, project.build_dir.join(RESTORED_DIR).join("core-1.0.jar"));

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&restored).unwrap()).unwrap();
        let mut manifest = String::new();
        archive
            .by_name("META-INF/MANIFEST.MF")
            .unwrap()
            .read_to_string(&mut manifest)
            .unwrap();
        assert_eq!(manifest, "Implementation-Version: 1.1\n");
    }
}
