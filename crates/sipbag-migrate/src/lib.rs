//! Export and import orchestration for sipbag.
//!
//! # Export
//!
//! [`Migrator::export`] flattens the requested scope of a source repository
//! into a manifest, saves it as `export.map` in the scratch directory, and
//! builds one SIP bag per manifest entry next to it.
//!
//! # Import
//!
//! [`Migrator::import_to`] reloads the manifest if needed, replays it to
//! recover each entry's parent, and uploads the bags strictly in manifest
//! order so that every container exists before its children arrive.
//!
//! Repository access and transport stay behind the [`ContentSource`],
//! [`HierarchySource`](sipbag_manifest::HierarchySource) and
//! [`UploadTarget`] traits.

pub mod config;
pub mod error;
pub mod locator;
pub mod memory;
pub mod migrator;
pub mod package;
pub mod records;
pub mod target;
pub mod traits;

pub use config::MigrateConfig;
pub use error::{MigrateError, MigrateResult};
pub use locator::{package_name, target_locator};
pub use memory::InMemoryRepository;
pub use migrator::{Delivery, ExportSummary, ImportSummary, Migrator, Scope};
pub use package::{read_metadata, PackageMaker};
pub use records::{BitstreamRecord, BundleRecord, CollectionRecord, CommunityRecord, ItemRecord, MetadataValue};
pub use target::{DirectoryTarget, RecordingTarget};
pub use traits::{ContentSource, UploadTarget};
