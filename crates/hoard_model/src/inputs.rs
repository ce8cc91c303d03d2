//! Input manifests produced by the fingerprint calculator.

use hoard_common::{ContentHash, Fingerprint};
use serde::{Deserialize, Serialize};

/// Category of a digested input item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestKind {
    /// A source or resource file.
    File,
    /// A resolved dependency.
    Dependency,
    /// The effective project configuration.
    Pom,
}

/// One digested input of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestItem {
    /// Item category.
    pub kind: DigestKind,
    /// Item name: a relative path for files, coordinates for dependencies.
    pub value: String,
    /// Digest of the item.
    pub hash: ContentHash,
    /// Detected line-ending style, for text files.
    pub eol: Option<String>,
    /// Detected character set, for text files.
    pub charset: Option<String>,
}

impl DigestItem {
    /// Creates an item without text metadata.
    pub fn new(kind: DigestKind, value: impl Into<String>, hash: ContentHash) -> Self {
        Self {
            kind,
            value: value.into(),
            hash,
            eol: None,
            charset: None,
        }
    }
}

/// All digested inputs of a project along with the resulting fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputManifest {
    /// Fingerprint computed over `items`.
    pub fingerprint: Fingerprint,
    /// Digested items in calculation order.
    pub items: Vec<DigestItem>,
}

impl InputManifest {
    /// Creates a manifest.
    pub fn new(fingerprint: Fingerprint, items: Vec<DigestItem>) -> Self {
        Self { fingerprint, items }
    }

    /// Items of the given kind.
    pub fn items_of(&self, kind: DigestKind) -> impl Iterator<Item = &DigestItem> {
        self.items.iter().filter(move |i| i.kind == kind)
    }

    /// The single effective-configuration item, if present.
    pub fn effective_config(&self) -> Option<&DigestItem> {
        self.items_of(DigestKind::Pom).next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_filtered_by_kind() {
        let manifest = InputManifest::new(
            Fingerprint::new("fp"),
            vec![
                DigestItem::new(DigestKind::File, "a.txt", ContentHash::from_bytes(b"a")),
                DigestItem::new(DigestKind::Dependency, "g:d:1", ContentHash::from_bytes(b"d")),
                DigestItem::new(DigestKind::Pom, "pom", ContentHash::from_bytes(b"p")),
                DigestItem::new(DigestKind::File, "b.txt", ContentHash::from_bytes(b"b")),
            ],
        );
        assert_eq!(manifest.items_of(DigestKind::File).count(), 2);
        assert_eq!(manifest.effective_config().unwrap().value, "pom");
    }
}
