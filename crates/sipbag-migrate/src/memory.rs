use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sipbag_manifest::{HierarchySource, ManifestError, ManifestResult, Node, NodeKind};

use crate::error::{MigrateError, MigrateResult};
use crate::records::{BitstreamRecord, CollectionRecord, CommunityRecord, ItemRecord};
use crate::traits::ContentSource;

/// Repository snapshot held in memory, loadable from a JSON dump.
///
/// Children are listed in insertion order, sub-communities before
/// collections. Bitstream bytes come from [`put_bitstream`](Self::put_bitstream)
/// or, failing that, from `<content_root>/<bitstream id>`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InMemoryRepository {
    #[serde(default)]
    communities: Vec<CommunityRecord>,
    #[serde(default)]
    collections: Vec<CollectionRecord>,
    #[serde(default)]
    items: Vec<ItemRecord>,
    #[serde(skip)]
    bitstreams: HashMap<String, Vec<u8>>,
    #[serde(skip)]
    content_root: Option<PathBuf>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON dump. Bitstream files are looked up next to the dump.
    pub fn from_json_file(path: &Path) -> MigrateResult<Self> {
        let mut repo: Self = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        repo.content_root = path.parent().map(Path::to_path_buf);
        tracing::info!(
            path = %path.display(),
            communities = repo.communities.len(),
            collections = repo.collections.len(),
            items = repo.items.len(),
            "repository dump loaded"
        );
        Ok(repo)
    }

    pub fn to_json(&self) -> MigrateResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_content_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.content_root = Some(root.into());
        self
    }

    pub fn content_root(&self) -> Option<&Path> {
        self.content_root.as_deref()
    }

    pub fn add_community(&mut self, record: CommunityRecord) -> &mut Self {
        self.communities.push(record);
        self
    }

    pub fn add_collection(&mut self, record: CollectionRecord) -> &mut Self {
        self.collections.push(record);
        self
    }

    pub fn add_item(&mut self, record: ItemRecord) -> &mut Self {
        self.items.push(record);
        self
    }

    pub fn put_bitstream(&mut self, id: &str, bytes: impl Into<Vec<u8>>) -> &mut Self {
        self.bitstreams.insert(id.to_string(), bytes.into());
        self
    }

    fn find_community(&self, id: &str) -> Option<&CommunityRecord> {
        self.communities.iter().find(|c| c.id == id)
    }

    fn find_collection(&self, id: &str) -> Option<&CollectionRecord> {
        self.collections.iter().find(|c| c.id == id)
    }

    fn find_item(&self, id: &str) -> Option<&ItemRecord> {
        self.items.iter().find(|i| i.id == id)
    }

    fn parent_of(&self, node: &Node) -> Option<String> {
        match node.kind {
            NodeKind::Community => self.find_community(&node.id)?.parent.clone(),
            NodeKind::Collection => Some(self.find_collection(&node.id)?.parent.clone()),
            NodeKind::Item => Some(self.find_item(&node.id)?.owning_collection.clone()),
        }
    }
}

impl HierarchySource for InMemoryRepository {
    fn roots(&self) -> ManifestResult<Vec<Node>> {
        Ok(self
            .communities
            .iter()
            .filter(|c| c.parent.is_none())
            .map(|c| Node::community(&c.id))
            .collect())
    }

    fn resolve(&self, id: &str) -> ManifestResult<Option<Node>> {
        if self.find_community(id).is_some() {
            return Ok(Some(Node::community(id)));
        }
        if self.find_collection(id).is_some() {
            return Ok(Some(Node::collection(id)));
        }
        Ok(self.find_item(id).map(|_| Node::item(id)))
    }

    fn container_children(&self, node: &Node) -> ManifestResult<Vec<Node>> {
        if node.kind != NodeKind::Community {
            return Ok(Vec::new());
        }
        let subs = self
            .communities
            .iter()
            .filter(|c| c.parent.as_deref() == Some(node.id.as_str()))
            .map(|c| Node::community(&c.id));
        let cols = self
            .collections
            .iter()
            .filter(|c| c.parent == node.id)
            .map(|c| Node::collection(&c.id));
        Ok(subs.chain(cols).collect())
    }

    fn leaf_children(&self, node: &Node) -> ManifestResult<Vec<Node>> {
        if node.kind != NodeKind::Collection {
            return Ok(Vec::new());
        }
        Ok(self
            .items
            .iter()
            .filter(|i| i.in_collection(&node.id))
            .map(|i| Node::item(&i.id))
            .collect())
    }

    fn ancestors(&self, node: &Node) -> ManifestResult<Vec<Node>> {
        let mut out = Vec::new();
        let mut cursor = self.parent_of(node);
        while let Some(id) = cursor {
            let parent = self
                .resolve(&id)?
                .ok_or_else(|| ManifestError::Source(format!("dangling parent {id} of {}", node.id)))?;
            if out.iter().any(|n: &Node| n.id == parent.id) {
                return Err(ManifestError::Source(format!("parent cycle through {id}")));
            }
            cursor = self.parent_of(&parent);
            out.push(parent);
        }
        Ok(out)
    }
}

impl ContentSource for InMemoryRepository {
    fn community(&self, id: &str) -> MigrateResult<CommunityRecord> {
        self.find_community(id)
            .cloned()
            .ok_or_else(|| MigrateError::NotFound(format!("community {id}")))
    }

    fn collection(&self, id: &str) -> MigrateResult<CollectionRecord> {
        self.find_collection(id)
            .cloned()
            .ok_or_else(|| MigrateError::NotFound(format!("collection {id}")))
    }

    fn item(&self, id: &str) -> MigrateResult<ItemRecord> {
        self.find_item(id)
            .cloned()
            .ok_or_else(|| MigrateError::NotFound(format!("item {id}")))
    }

    fn open_bitstream(&self, bitstream: &BitstreamRecord) -> MigrateResult<Box<dyn Read + '_>> {
        if let Some(bytes) = self.bitstreams.get(&bitstream.id) {
            return Ok(Box::new(Cursor::new(bytes.as_slice())));
        }
        if let Some(root) = &self.content_root {
            let path = root.join(&bitstream.id);
            if path.is_file() {
                return Ok(Box::new(BufReader::new(File::open(path)?)));
            }
        }
        Err(MigrateError::NotFound(format!("bitstream {}", bitstream.id)))
    }
}
