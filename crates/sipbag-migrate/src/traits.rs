use std::io::Read;
use std::path::Path;

use async_trait::async_trait;

use crate::error::MigrateResult;
use crate::records::{BitstreamRecord, CollectionRecord, CommunityRecord, ItemRecord};

/// Read boundary onto the content of the repository being exported.
pub trait ContentSource {
    fn community(&self, id: &str) -> MigrateResult<CommunityRecord>;

    fn collection(&self, id: &str) -> MigrateResult<CollectionRecord>;

    fn item(&self, id: &str) -> MigrateResult<ItemRecord>;

    /// Open the stored bytes of a bitstream.
    fn open_bitstream(&self, bitstream: &BitstreamRecord) -> MigrateResult<Box<dyn Read + '_>>;
}

/// Transport interface for delivering packages to the target repository.
#[async_trait]
pub trait UploadTarget: Send + Sync {
    /// Deliver the package directory `package` to `locator`.
    async fn upload(&self, package: &Path, locator: &str) -> MigrateResult<()>;
}
