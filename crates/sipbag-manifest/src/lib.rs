//! Depth-encoded export manifests.
//!
//! A repository forest (communities holding sub-communities and
//! collections, collections holding items) is flattened in pre-order into
//! `"<depth> <kind> <identifier>"` lines. The flat file is all an import
//! needs: [`TreeManifest::replay`] walks it once and rebuilds every entry's
//! parent with a stack, so packages can be uploaded under the right
//! container without keeping the source around.
//!
//! - [`ManifestBuilder`] walks a [`HierarchySource`] into a manifest
//! - [`TreeManifest`] parses, serializes, validates, and persists it
//! - [`Replay`] iterates entries with their reconstructed parents

pub mod builder;
pub mod entry;
pub mod error;
pub mod manifest;
pub mod replay;
pub mod traits;

pub use builder::ManifestBuilder;
pub use entry::{ManifestEntry, Node, NodeKind};
pub use error::{ManifestError, ManifestResult};
pub use manifest::TreeManifest;
pub use replay::{Replay, ReplayStep};
pub use traits::HierarchySource;
