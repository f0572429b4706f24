use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of a node in the exported hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    /// Leaf object carrying bitstreams. Never has children.
    Item,
    /// Sub-container holding items.
    Collection,
    /// Top-level or nested container holding communities and collections.
    Community,
}

impl NodeKind {
    pub const ALL: [Self; 3] = [Self::Item, Self::Collection, Self::Community];

    /// Decimal code used in the manifest file.
    ///
    /// These are the source repository's type constants, so manifests
    /// written by earlier exports remain readable.
    pub fn code(&self) -> u32 {
        match self {
            Self::Item => 2,
            Self::Collection => 3,
            Self::Community => 4,
        }
    }

    /// Parse a manifest kind code.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            2 => Some(Self::Item),
            3 => Some(Self::Collection),
            4 => Some(Self::Community),
            _ => None,
        }
    }

    /// Upper-case type name used when resolving upload locators.
    pub fn type_text(&self) -> &'static str {
        match self {
            Self::Item => "ITEM",
            Self::Collection => "COLLECTION",
            Self::Community => "COMMUNITY",
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Item)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Item => write!(f, "item"),
            Self::Collection => write!(f, "collection"),
            Self::Community => write!(f, "community"),
        }
    }
}

/// A node handed out by a hierarchy source.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub id: String,
}

impl Node {
    pub fn new(kind: NodeKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }

    pub fn community(id: impl Into<String>) -> Self {
        Self::new(NodeKind::Community, id)
    }

    pub fn collection(id: impl Into<String>) -> Self {
        Self::new(NodeKind::Collection, id)
    }

    pub fn item(id: impl Into<String>) -> Self {
        Self::new(NodeKind::Item, id)
    }
}

/// One line of a manifest: `depth kind identifier`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Parent hops from a root; roots are at depth 0.
    pub depth: u32,
    pub kind: NodeKind,
    /// Opaque identifier, unique within one manifest.
    pub id: String,
}

impl ManifestEntry {
    pub fn new(depth: u32, kind: NodeKind, id: impl Into<String>) -> Self {
        Self {
            depth,
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for ManifestEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.depth, self.kind.code(), self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_roundtrip() {
        for kind in NodeKind::ALL {
            assert_eq!(NodeKind::from_code(kind.code()), Some(kind));
        }
    }

    #[test]
    fn codes_match_host_constants() {
        assert_eq!(NodeKind::Item.code(), 2);
        assert_eq!(NodeKind::Collection.code(), 3);
        assert_eq!(NodeKind::Community.code(), 4);
    }

    #[test]
    fn from_code_unknown() {
        assert!(NodeKind::from_code(0).is_none());
        assert!(NodeKind::from_code(5).is_none());
    }

    #[test]
    fn only_items_are_leaves() {
        assert!(NodeKind::Item.is_leaf());
        assert!(!NodeKind::Collection.is_leaf());
        assert!(!NodeKind::Community.is_leaf());
    }

    #[test]
    fn entry_display_is_manifest_line() {
        let entry = ManifestEntry::new(2, NodeKind::Collection, "1721.1/42");
        assert_eq!(entry.to_string(), "2 3 1721.1/42");
    }
}
