//! Encoding of records and reports.
//!
//! Two interchangeable formats are supported. JSON is human readable and
//! convenient for inspection. The binary form is compact bincode prefixed
//! with a header carrying magic bytes, a format version and a payload
//! checksum, so truncated or foreign files are detected before decoding.

use hoard_common::ContentHash;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Magic bytes identifying a binary Hoard record.
const RECORD_MAGIC: [u8; 4] = *b"HORD";

/// Current binary format version. Increment on breaking changes to the
/// header or payload format.
const RECORD_FORMAT_VERSION: u32 = 1;

/// Header prepended to every binary record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordHeader {
    magic: [u8; 4],
    format_version: u32,
    checksum: ContentHash,
}

/// On-disk and on-wire encoding of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
    /// Pretty-printed JSON.
    #[default]
    Json,
    /// Bincode with a validated header.
    Binary,
}

impl RecordFormat {
    /// File extension for files in this format.
    pub fn extension(self) -> &'static str {
        match self {
            RecordFormat::Json => "json",
            RecordFormat::Binary => "bin",
        }
    }

    /// Appends the format's extension to a base file name.
    pub fn file_name(self, base: &str) -> String {
        format!("{base}.{}", self.extension())
    }

    /// Encodes a value.
    pub fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>, CodecError> {
        match self {
            RecordFormat::Json => Ok(serde_json::to_vec_pretty(value)?),
            RecordFormat::Binary => encode_binary(value),
        }
    }

    /// Decodes a value, validating the binary header where applicable.
    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T, CodecError> {
        match self {
            RecordFormat::Json => Ok(serde_json::from_slice(bytes)?),
            RecordFormat::Binary => decode_binary(bytes),
        }
    }
}

fn encode_binary<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    let payload = bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| CodecError::Binary {
            reason: e.to_string(),
        })?;
    let header = RecordHeader {
        magic: RECORD_MAGIC,
        format_version: RECORD_FORMAT_VERSION,
        checksum: ContentHash::from_bytes(&payload),
    };
    let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
        .map_err(|e| CodecError::Binary {
            reason: e.to_string(),
        })?;

    // 4-byte header length (little-endian) + header + payload
    let header_len = header_bytes.len() as u32;
    let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
    output.extend_from_slice(&header_len.to_le_bytes());
    output.extend_from_slice(&header_bytes);
    output.extend_from_slice(&payload);
    Ok(output)
}

fn decode_binary<T: DeserializeOwned>(raw: &[u8]) -> Result<T, CodecError> {
    let invalid = |reason: &str| CodecError::InvalidHeader {
        reason: reason.to_string(),
    };
    let len_bytes: [u8; 4] = raw
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| invalid("truncated header length"))?;
    let header_len = u32::from_le_bytes(len_bytes) as usize;
    let header_bytes = raw
        .get(4..4 + header_len)
        .ok_or_else(|| invalid("truncated header"))?;

    let (header, _): (RecordHeader, usize) =
        bincode::serde::decode_from_slice(header_bytes, bincode::config::standard())
            .map_err(|e| invalid(&e.to_string()))?;

    if header.magic != RECORD_MAGIC {
        return Err(invalid("missing magic bytes"));
    }
    if header.format_version != RECORD_FORMAT_VERSION {
        return Err(CodecError::VersionMismatch {
            expected: RECORD_FORMAT_VERSION,
            actual: header.format_version,
        });
    }

    let payload = &raw[4 + header_len..];
    let actual = ContentHash::from_bytes(payload);
    if actual != header.checksum {
        return Err(CodecError::ChecksumMismatch {
            expected: header.checksum.to_string(),
            actual: actual.to_string(),
        });
    }

    let (value, _) = bincode::serde::decode_from_slice(payload, bincode::config::standard())
        .map_err(|e| CodecError::Binary {
            reason: e.to_string(),
        })?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::sample_record;
    use crate::record::BuildRecord;

    #[test]
    fn json_roundtrip() {
        let record = sample_record();
        let bytes = RecordFormat::Json.encode(&record).unwrap();
        let back: BuildRecord = RecordFormat::Json.decode(&bytes).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn binary_roundtrip() {
        let record = sample_record();
        let bytes = RecordFormat::Binary.encode(&record).unwrap();
        let back: BuildRecord = RecordFormat::Binary.decode(&bytes).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn binary_garbage_is_rejected() {
        let err = RecordFormat::Binary
            .decode::<BuildRecord>(b"garbage data")
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidHeader { .. }));
    }

    #[test]
    fn binary_corrupt_payload_fails_checksum() {
        let mut bytes = RecordFormat::Binary.encode(&sample_record()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let err = RecordFormat::Binary.decode::<BuildRecord>(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::ChecksumMismatch { .. }));
    }

    #[test]
    fn binary_wrong_magic_rejected() {
        let header = RecordHeader {
            magic: *b"BAAD",
            format_version: RECORD_FORMAT_VERSION,
            checksum: ContentHash::from_bytes(b""),
        };
        let header_bytes =
            bincode::serde::encode_to_vec(&header, bincode::config::standard()).unwrap();
        let mut raw = (header_bytes.len() as u32).to_le_bytes().to_vec();
        raw.extend_from_slice(&header_bytes);
        let err = RecordFormat::Binary.decode::<BuildRecord>(&raw).unwrap_err();
        assert!(matches!(err, CodecError::InvalidHeader { .. }));
    }

    #[test]
    fn json_truncated_is_error() {
        let bytes = RecordFormat::Json.encode(&sample_record()).unwrap();
        assert!(RecordFormat::Json
            .decode::<BuildRecord>(&bytes[..bytes.len() / 2])
            .is_err());
    }

    #[test]
    fn file_names() {
        assert_eq!(RecordFormat::Json.file_name("buildinfo"), "buildinfo.json");
        assert_eq!(RecordFormat::Binary.file_name("buildinfo"), "buildinfo.bin");
    }
}
