//! Source-control metadata of the build root.
//!
//! Only git checkouts are recognized. The metadata is read from the `.git`
//! directory without invoking git.

use std::path::{Path, PathBuf};

use hoard_model::ScmInfo;

/// Reads the branch and revision of the git checkout containing `root`.
///
/// Returns empty metadata when `root` is not inside a git checkout.
pub fn read_git_info(root: &Path) -> std::io::Result<ScmInfo> {
    let Some(git_dir) = find_git_dir(root)? else {
        return Ok(ScmInfo::default());
    };
    let head = std::fs::read_to_string(git_dir.join("HEAD"))?;
    let head = head.trim();

    match head.strip_prefix("ref:").map(str::trim) {
        Some(reference) => {
            let branch = reference
                .strip_prefix("refs/heads/")
                .unwrap_or(reference)
                .to_string();
            Ok(ScmInfo {
                branch: Some(branch),
                revision: resolve_ref(&git_dir, reference)?,
            })
        }
        // Detached head.
        None => Ok(ScmInfo {
            branch: None,
            revision: (!head.is_empty()).then(|| head.to_string()),
        }),
    }
}

fn find_git_dir(root: &Path) -> std::io::Result<Option<PathBuf>> {
    for dir in root.ancestors() {
        let candidate = dir.join(".git");
        if candidate.is_dir() {
            return Ok(Some(candidate));
        }
        if candidate.is_file() {
            // Worktrees and submodules point at their git directory.
            let content = std::fs::read_to_string(&candidate)?;
            if let Some(target) = content.trim().strip_prefix("gitdir:") {
                let target = Path::new(target.trim());
                return Ok(Some(if target.is_absolute() {
                    target.to_path_buf()
                } else {
                    dir.join(target)
                }));
            }
        }
    }
    Ok(None)
}

fn resolve_ref(git_dir: &Path, reference: &str) -> std::io::Result<Option<String>> {
    let loose = git_dir.join(reference);
    if loose.is_file() {
        let revision = std::fs::read_to_string(loose)?;
        return Ok(Some(revision.trim().to_string()));
    }
    let packed = git_dir.join("packed-refs");
    if !packed.is_file() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(packed)?;
    Ok(content
        .lines()
        .filter(|l| !l.starts_with('#') && !l.starts_with('^'))
        .filter_map(|l| l.split_once(' '))
        .find(|(_, name)| name.trim() == reference)
        .map(|(revision, _)| revision.to_string()))
}
