//! Retention of fingerprint directories.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::StoreError;

/// Deletes all but the `keep` most recently modified subdirectories of
/// `project_dir`, never touching the one named `except`.
///
/// Returns the number of directories deleted. A missing project directory
/// is not an error.
pub fn retain_newest(
    project_dir: &Path,
    keep: usize,
    except: Option<&OsStr>,
) -> Result<usize, StoreError> {
    if !project_dir.is_dir() {
        return Ok(0);
    }
    let entries =
        std::fs::read_dir(project_dir).map_err(|e| StoreError::io(project_dir, e))?;

    let mut dirs: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io(project_dir, e))?;
        let path = entry.path();
        if !path.is_dir() || except.is_some_and(|name| entry.file_name().as_os_str() == name) {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| StoreError::io(&path, e))?;
        dirs.push((modified, path));
    }

    if dirs.len() <= keep {
        return Ok(0);
    }
    // Newest first.
    dirs.sort_by(|a, b| b.0.cmp(&a.0));
    let mut removed = 0;
    for (_, path) in dirs.into_iter().skip(keep) {
        tracing::debug!(path = %path.display(), "evicting cached build");
        std::fs::remove_dir_all(&path).map_err(|e| StoreError::io(&path, e))?;
        removed += 1;
    }
    Ok(removed)
}
