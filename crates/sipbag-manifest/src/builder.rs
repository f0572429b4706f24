use std::collections::HashSet;

use crate::entry::{Node, NodeKind};
use crate::error::{ManifestError, ManifestResult};
use crate::manifest::TreeManifest;
use crate::traits::HierarchySource;

/// Flattens a [`HierarchySource`] into a [`TreeManifest`] by pre-order walk.
///
/// Each `add_*` call appends one more segment to the same manifest.
pub struct ManifestBuilder<'s, S: HierarchySource + ?Sized> {
    source: &'s S,
    manifest: TreeManifest,
    seen_leaves: HashSet<String>,
}

impl<'s, S: HierarchySource + ?Sized> ManifestBuilder<'s, S> {
    pub fn new(source: &'s S) -> Self {
        Self {
            source,
            manifest: TreeManifest::new(),
            seen_leaves: HashSet::new(),
        }
    }

    /// Walk every top-level community of the source.
    pub fn add_repository(&mut self) -> ManifestResult<&mut Self> {
        let roots = self.source.roots()?;
        tracing::debug!(roots = roots.len(), "flattening whole repository");
        for root in &roots {
            self.add_node(root, 0)?;
        }
        Ok(self)
    }

    /// Walk the container `id`, preceded by its ancestor chain.
    ///
    /// Ancestors are emitted root-first from depth 0 without their other
    /// children, so replay can rebuild the parent of the requested node.
    pub fn add_subtree(&mut self, id: &str) -> ManifestResult<&mut Self> {
        let node = self
            .source
            .resolve(id)?
            .ok_or_else(|| ManifestError::NodeNotFound(id.to_string()))?;
        if node.kind.is_leaf() {
            return Err(ManifestError::NotAContainer {
                id: node.id,
                kind: node.kind,
            });
        }

        let ancestors = self.source.ancestors(&node)?;
        let mut depth = 0;
        for ancestor in ancestors.iter().rev() {
            self.emit(depth, ancestor)?;
            depth += 1;
        }
        tracing::debug!(id, ancestors = ancestors.len(), "flattening subtree");
        self.add_node(&node, depth)?;
        Ok(self)
    }

    /// Entries emitted so far.
    pub fn len(&self) -> usize {
        self.manifest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.is_empty()
    }

    pub fn finish(self) -> TreeManifest {
        tracing::info!(entries = self.manifest.len(), "manifest built");
        self.manifest
    }

    fn add_node(&mut self, node: &Node, depth: u32) -> ManifestResult<()> {
        match node.kind {
            NodeKind::Item => self.add_leaf(node, depth),
            NodeKind::Collection => {
                self.emit(depth, node)?;
                for item in self.source.leaf_children(node)? {
                    self.add_leaf(&item, depth + 1)?;
                }
                Ok(())
            }
            NodeKind::Community => {
                self.emit(depth, node)?;
                for child in self.source.container_children(node)? {
                    self.add_node(&child, depth + 1)?;
                }
                Ok(())
            }
        }
    }

    fn add_leaf(&mut self, node: &Node, depth: u32) -> ManifestResult<()> {
        if self.seen_leaves.contains(&node.id) {
            tracing::debug!(id = %node.id, "leaf already in manifest; skipping");
            return Ok(());
        }
        self.emit(depth, node)?;
        self.seen_leaves.insert(node.id.clone());
        Ok(())
    }

    fn emit(&mut self, depth: u32, node: &Node) -> ManifestResult<()> {
        if !is_valid_identifier(&node.id) {
            return Err(ManifestError::InvalidIdentifier(node.id.clone()));
        }
        self.manifest.push(depth, node.kind, node.id.clone());
        Ok(())
    }
}

/// Identifiers become file names and manifest fields: no whitespace, no
/// control characters, no backslash, and never `.` or `..`.
fn is_valid_identifier(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && !id.chars().any(|c| c.is_whitespace() || c.is_control() || c == '\\')
}
