use crate::entry::Node;
use crate::error::ManifestResult;

/// Read boundary onto the repository whose hierarchy is being exported.
///
/// Children come back in the order they should appear in the manifest.
pub trait HierarchySource {
    /// Top-level communities.
    fn roots(&self) -> ManifestResult<Vec<Node>>;

    /// Look up a node by identifier.
    fn resolve(&self, id: &str) -> ManifestResult<Option<Node>>;

    /// Container children of a container: sub-communities first, then
    /// collections. Empty for collections and items.
    fn container_children(&self, node: &Node) -> ManifestResult<Vec<Node>>;

    /// Items held by a collection. Empty for communities and items.
    fn leaf_children(&self, node: &Node) -> ManifestResult<Vec<Node>>;

    /// Ancestors of `node`, nearest first. Empty for roots.
    fn ancestors(&self, node: &Node) -> ManifestResult<Vec<Node>>;
}

impl<S: HierarchySource + ?Sized> HierarchySource for &S {
    fn roots(&self) -> ManifestResult<Vec<Node>> {
        (**self).roots()
    }

    fn resolve(&self, id: &str) -> ManifestResult<Option<Node>> {
        (**self).resolve(id)
    }

    fn container_children(&self, node: &Node) -> ManifestResult<Vec<Node>> {
        (**self).container_children(node)
    }

    fn leaf_children(&self, node: &Node) -> ManifestResult<Vec<Node>> {
        (**self).leaf_children(node)
    }

    fn ancestors(&self, node: &Node) -> ManifestResult<Vec<Node>> {
        (**self).ancestors(node)
    }
}
