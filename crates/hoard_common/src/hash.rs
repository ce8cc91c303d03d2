//! Content hashing for artifacts and cache keys.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Read;
use std::path::Path;

/// Size of the read buffer used when hashing files.
const READ_CHUNK: usize = 64 * 1024;

/// The hash algorithm used to digest artifacts and inputs.
///
/// The identifier of the algorithm is stored in every build record so that
/// records produced with a different algorithm are never compared hash by hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// XXH3 with a 128-bit output. Fast, non-cryptographic.
    #[default]
    #[serde(rename = "XX")]
    Xx,
    /// SHA-256.
    #[serde(rename = "SHA-256")]
    Sha256,
}

/// Error returned when a hash algorithm identifier is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown hash algorithm '{0}'")]
pub struct UnknownAlgorithm(pub String);

impl HashAlgorithm {
    /// Returns the stable identifier persisted in build records.
    pub fn id(self) -> &'static str {
        match self {
            HashAlgorithm::Xx => "XX",
            HashAlgorithm::Sha256 => "SHA-256",
        }
    }

    /// Parses an identifier, ignoring ASCII case.
    pub fn from_id(id: &str) -> Result<Self, UnknownAlgorithm> {
        if id.eq_ignore_ascii_case("XX") {
            Ok(HashAlgorithm::Xx)
        } else if id.eq_ignore_ascii_case("SHA-256") || id.eq_ignore_ascii_case("SHA256") {
            Ok(HashAlgorithm::Sha256)
        } else {
            Err(UnknownAlgorithm(id.to_string()))
        }
    }

    /// Hashes an in-memory byte slice.
    pub fn hash_bytes(self, data: &[u8]) -> ContentHash {
        match self {
            HashAlgorithm::Xx => {
                ContentHash(hex::encode(xxhash_rust::xxh3::xxh3_128(data).to_be_bytes()))
            }
            HashAlgorithm::Sha256 => ContentHash(hex::encode(Sha256::digest(data))),
        }
    }

    /// Hashes a file by streaming its contents.
    pub fn hash_file(self, path: &Path) -> std::io::Result<ContentHash> {
        let mut file = std::fs::File::open(path)?;
        let mut buf = vec![0u8; READ_CHUNK];
        match self {
            HashAlgorithm::Xx => {
                let mut hasher = xxhash_rust::xxh3::Xxh3::new();
                loop {
                    let n = file.read(&mut buf)?;
                    if n == 0 {
                        break;
                    }
                    hasher.update(&buf[..n]);
                }
                Ok(ContentHash(hex::encode(hasher.digest128().to_be_bytes())))
            }
            HashAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                loop {
                    let n = file.read(&mut buf)?;
                    if n == 0 {
                        break;
                    }
                    hasher.update(&buf[..n]);
                }
                Ok(ContentHash(hex::encode(hasher.finalize())))
            }
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A lowercase hexadecimal content digest.
///
/// Two artifacts with the same `ContentHash` (under the same algorithm) are
/// assumed to have identical content.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Wraps an already-computed hex digest.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Computes an XXH3-128 hash of a byte slice.
    pub fn from_bytes(data: &[u8]) -> Self {
        HashAlgorithm::Xx.hash_bytes(data)
    }

    /// Returns the hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.0.get(..8).unwrap_or(&self.0);
        write!(f, "ContentHash({short}..)")
    }
}

/// Opaque content hash of a project's resolved inputs.
///
/// Produced by an external fingerprint calculator and used as the cache key
/// together with the project coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Creates a fingerprint from its string form.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the fingerprint as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
