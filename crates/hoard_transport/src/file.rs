//! Shared-directory backend for `file://` URLs.

use std::path::{Component, Path, PathBuf};

use crate::error::TransportError;
use crate::{Payload, Transport};

/// Transport storing objects as files under a root directory.
///
/// Uploads are written to a temporary sibling and renamed into place so
/// concurrent readers never observe a partially written object.
pub struct FileTransport {
    root: PathBuf,
    base_url: String,
}

impl FileTransport {
    /// Creates a transport rooted at `root`.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            base_url: format!("file://{}", root.display()),
        }
    }

    /// Creates a transport from a `file://` URL.
    pub fn from_url(url: &str) -> Result<Self, TransportError> {
        let path = url_to_path(url)?;
        Ok(Self::new(&path))
    }

    fn path_for(&self, url: &str) -> Result<PathBuf, TransportError> {
        if url.starts_with("file://") {
            return url_to_path(url);
        }
        let relative = Path::new(url.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(TransportError::InvalidUrl {
                url: url.to_string(),
                reason: "path must stay under the store root".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

fn url_to_path(url: &str) -> Result<PathBuf, TransportError> {
    url.strip_prefix("file://")
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| TransportError::InvalidUrl {
            url: url.to_string(),
            reason: "expected file:// URL with a path".to_string(),
        })
}

fn io_error(path: &Path, source: std::io::Error) -> TransportError {
    TransportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl Transport for FileTransport {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn exists(&self, url: &str) -> Result<bool, TransportError> {
        Ok(self.path_for(url)?.is_file())
    }

    fn get(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let path = self.path_for(url)?;
        std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TransportError::NotFound {
                    url: url.to_string(),
                }
            } else {
                io_error(&path, e)
            }
        })
    }

    fn put(&self, payload: Payload<'_>, url: &str) -> Result<(), TransportError> {
        let path = self.path_for(url)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
        let tmp = path.with_extension(format!("tmp-{}", std::process::id()));
        match payload {
            Payload::Bytes(bytes) => std::fs::write(&tmp, bytes).map_err(|e| io_error(&tmp, e))?,
            Payload::File(src) => {
                std::fs::copy(src, &tmp).map_err(|e| io_error(src, e))?;
            }
        }
        std::fs::rename(&tmp, &path).map_err(|e| io_error(&path, e))?;
        tracing::debug!(path = %path.display(), "stored");
        Ok(())
    }
}
