//! Reading record files given on the command line.

use std::path::Path;

use hoard_model::{BuildRecord, RecordFormat};

/// Picks the codec of a file by its extension: `.bin` is binary, anything
/// else JSON.
pub fn format_for(path: &Path) -> RecordFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext == RecordFormat::Binary.extension() => RecordFormat::Binary,
        _ => RecordFormat::Json,
    }
}

/// Reads and decodes a build record.
pub fn read_record(path: &Path) -> Result<BuildRecord, Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let record = format_for(path)
        .decode(&bytes)
        .map_err(|e| format!("cannot decode {}: {e}", path.display()))?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_extension() {
        assert_eq!(format_for(Path::new("buildinfo.bin")), RecordFormat::Binary);
        assert_eq!(format_for(Path::new("buildinfo.json")), RecordFormat::Json);
        assert_eq!(format_for(Path::new("buildinfo")), RecordFormat::Json);
    }

    #[test]
    fn unreadable_record_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buildinfo.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = read_record(&path).unwrap_err();
        assert!(err.to_string().contains("buildinfo.json"));
    }
}
