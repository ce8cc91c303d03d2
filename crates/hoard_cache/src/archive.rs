//! Output-directory snapshots and restored archive adjustment.
//!
//! Output directories are stored as gzipped tarballs attached to the record
//! with a classifier that encodes their path relative to the build
//! directory. Archives restored for a project version different from the
//! one they were built with get their embedded version strings rewritten in
//! a scratch copy. Both zip-family archives (`jar`, `war`, `ear`, `zip`) and
//! gzipped tarballs are adjusted.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use crate::error::CacheError;

/// Classifier prefix marking an attached artifact as an output-directory snapshot.
pub const SNAPSHOT_PREFIX: &str = "outputdir_";

/// Artifact type of output-directory snapshots.
pub const SNAPSHOT_TYPE: &str = "tar.gz";

const SEGMENT_SEPARATOR: char = '_';

fn archive_error(path: &Path, err: impl std::fmt::Display) -> CacheError {
    CacheError::Archive {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

/// Returns true if `classifier` marks an output-directory snapshot.
pub fn is_snapshot(classifier: Option<&str>) -> bool {
    classifier.is_some_and(|c| c.starts_with(SNAPSHOT_PREFIX))
}

/// Encodes a path relative to the build directory as a snapshot classifier.
///
/// Segments are joined with `_`; `%` and `_` inside segments are escaped.
pub fn snapshot_classifier(relative: &Path) -> String {
    let segments: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(escape(&s.to_string_lossy())),
            _ => None,
        })
        .collect();
    format!("{SNAPSHOT_PREFIX}{}", segments.join("_"))
}

/// Decodes a snapshot classifier into a directory under `build_dir`.
///
/// Returns `None` for classifiers that are not snapshots or would escape
/// the build directory.
pub fn snapshot_dir(build_dir: &Path, classifier: &str) -> Option<PathBuf> {
    let encoded = classifier.strip_prefix(SNAPSHOT_PREFIX)?;
    let mut dir = build_dir.to_path_buf();
    for segment in encoded.split(SEGMENT_SEPARATOR) {
        let segment = unescape(segment);
        if segment.is_empty() || segment == "." || segment == ".." || segment.contains('/') {
            return None;
        }
        dir.push(segment);
    }
    Some(dir)
}

fn escape(segment: &str) -> String {
    segment.replace('%', "%25").replace('_', "%5F")
}

fn unescape(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut rest = segment;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix("%25") {
            out.push('%');
            rest = after;
        } else if let Some(after) = tail.strip_prefix("%5F") {
            out.push('_');
            rest = after;
        } else {
            out.push('%');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

/// Returns true if `dir` contains at least one file, at any depth.
pub fn has_files(dir: &Path) -> bool {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .any(|e| e.file_type().is_file())
}

/// Packs the contents of `dir` into a gzipped tarball at `archive`.
pub fn pack_dir(dir: &Path, archive: &Path) -> Result<(), CacheError> {
    if let Some(parent) = archive.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
    }
    let file = File::create(archive).map_err(|e| CacheError::io(archive, e))?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder.follow_symlinks(false);
    builder
        .append_dir_all("", dir)
        .map_err(|e| archive_error(archive, e))?;
    builder
        .into_inner()
        .and_then(GzEncoder::finish)
        .map_err(|e| archive_error(archive, e))?;
    Ok(())
}

/// Replaces the contents of `target` with the contents of a snapshot.
pub fn unpack_snapshot(archive: &Path, target: &Path) -> Result<(), CacheError> {
    if target.exists() {
        std::fs::remove_dir_all(target).map_err(|e| CacheError::io(target, e))?;
    }
    std::fs::create_dir_all(target).map_err(|e| CacheError::io(target, e))?;
    let file = File::open(archive).map_err(|e| CacheError::io(archive, e))?;
    tar::Archive::new(GzDecoder::new(file))
        .unpack(target)
        .map_err(|e| archive_error(archive, e))
}

/// Container formats of archives that may embed the project version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// Zip-family archives: `jar`, `war`, `ear`, `zip`.
    Zip,
    /// Gzipped tarballs.
    TarGz,
}

impl ArchiveKind {
    /// Detects the archive kind from a file name.
    pub fn of(file_name: &str) -> Option<Self> {
        let lower = file_name.to_ascii_lowercase();
        if [".jar", ".war", ".ear", ".zip"].iter().any(|ext| lower.ends_with(ext)) {
            Some(ArchiveKind::Zip)
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else {
            None
        }
    }
}

/// Returns true if a file name denotes an archive whose entries can carry
/// the project version.
pub fn is_versioned_archive(file_name: &str) -> bool {
    ArchiveKind::of(file_name).is_some()
}

/// Writes a copy of `archive` into `scratch_dir` with embedded version
/// strings changed from `from` to `to`, and returns the copy's path.
///
/// Rewritten entries are manifest version headers, `version=` lines of
/// properties files and `<version>` elements of `pom.xml` descriptors.
pub fn adjust_version(
    archive: &Path,
    scratch_dir: &Path,
    from: &str,
    to: &str,
) -> Result<PathBuf, CacheError> {
    let file_name = archive
        .file_name()
        .ok_or_else(|| archive_error(archive, "archive path has no file name"))?;
    let kind = ArchiveKind::of(&file_name.to_string_lossy())
        .ok_or_else(|| archive_error(archive, "not a recognized archive"))?;
    std::fs::create_dir_all(scratch_dir).map_err(|e| CacheError::io(scratch_dir, e))?;
    let adjusted = scratch_dir.join(file_name);

    match kind {
        ArchiveKind::Zip => adjust_zip(archive, &adjusted, from, to)?,
        ArchiveKind::TarGz => adjust_tarball(archive, &adjusted, from, to)?,
    }
    tracing::debug!(archive = %archive.display(), from, to, "adjusted archive version");
    Ok(adjusted)
}

fn adjust_zip(archive: &Path, adjusted: &Path, from: &str, to: &str) -> Result<(), CacheError> {
    let input = File::open(archive).map_err(|e| CacheError::io(archive, e))?;
    let mut reader = zip::ZipArchive::new(input).map_err(|e| archive_error(archive, e))?;
    let output = File::create(adjusted).map_err(|e| CacheError::io(adjusted, e))?;
    let mut writer = zip::ZipWriter::new(output);

    for index in 0..reader.len() {
        let mut entry = reader
            .by_index(index)
            .map_err(|e| archive_error(archive, e))?;
        let name = entry.name().to_string();
        let method = match entry.compression() {
            CompressionMethod::Stored => CompressionMethod::Stored,
            _ => CompressionMethod::Deflated,
        };
        let options = SimpleFileOptions::default().compression_method(method);
        if entry.is_dir() {
            writer
                .add_directory(name, options)
                .map_err(|e| archive_error(adjusted, e))?;
            continue;
        }

        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| archive_error(archive, e))?;
        if let Some(text) = std::str::from_utf8(&data)
            .ok()
            .and_then(|text| rewrite_versions(Path::new(&name), text, from, to))
        {
            data = text.into_bytes();
        }
        writer
            .start_file(name, options)
            .map_err(|e| archive_error(adjusted, e))?;
        writer
            .write_all(&data)
            .map_err(|e| archive_error(adjusted, e))?;
    }
    writer.finish().map_err(|e| archive_error(adjusted, e))?;
    Ok(())
}

fn adjust_tarball(archive: &Path, adjusted: &Path, from: &str, to: &str) -> Result<(), CacheError> {
    let input = File::open(archive).map_err(|e| CacheError::io(archive, e))?;
    let mut reader = tar::Archive::new(GzDecoder::new(input));
    let output = File::create(adjusted).map_err(|e| CacheError::io(adjusted, e))?;
    let mut builder = tar::Builder::new(GzEncoder::new(output, Compression::default()));

    let entries = reader.entries().map_err(|e| archive_error(archive, e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| archive_error(archive, e))?;
        let path = entry
            .path()
            .map_err(|e| archive_error(archive, e))?
            .into_owned();
        if !path.components().any(|c| matches!(c, Component::Normal(_))) {
            continue;
        }
        let mut header = entry.header().clone();
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| archive_error(archive, e))?;

        if let Some(text) = std::str::from_utf8(&data)
            .ok()
            .and_then(|text| rewrite_versions(&path, text, from, to))
        {
            data = text.into_bytes();
            header.set_size(data.len() as u64);
        }
        builder
            .append_data(&mut header, &path, data.as_slice())
            .map_err(|e| archive_error(adjusted, e))?;
    }
    builder
        .into_inner()
        .and_then(GzEncoder::finish)
        .map_err(|e| archive_error(adjusted, e))?;
    Ok(())
}

fn rewrite_versions(path: &Path, text: &str, from: &str, to: &str) -> Option<String> {
    let name = path.file_name()?.to_string_lossy();
    let rewritten = if name == "MANIFEST.MF" {
        rewrite_lines(text, |line| {
            ["Implementation-Version: ", "Bundle-Version: "]
                .iter()
                .find(|key| line.strip_prefix(**key) == Some(from))
                .map(|key| format!("{key}{to}"))
        })
    } else if name.ends_with(".properties") {
        rewrite_lines(text, |line| {
            (line.strip_prefix("version=") == Some(from)).then(|| format!("version={to}"))
        })
    } else if name == "pom.xml" {
        text.replace(
            &format!("<version>{from}</version>"),
            &format!("<version>{to}</version>"),
        )
    } else {
        return None;
    };
    (rewritten != text).then_some(rewritten)
}

fn rewrite_lines(text: &str, rewrite: impl Fn(&str) -> Option<String>) -> String {
    text.split_inclusive('\n')
        .map(|line| {
            let body = line.trim_end_matches(['\r', '\n']);
            match rewrite(body) {
                Some(new) => format!("{new}{}", &line[body.len()..]),
                None => line.to_string(),
            }
        })
        .collect()
}
