use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use sipbag_bag::{Bag, BagBuilder};
use sipbag_manifest::NodeKind;
use sipbag_markup::{MarkupReader, MarkupValue, MarkupWriter};

use crate::config::MigrateConfig;
use crate::error::MigrateResult;
use crate::locator::package_name;
use crate::records::{BitstreamRecord, BundleRecord, CollectionRecord, CommunityRecord, ItemRecord};
use crate::traits::ContentSource;

/// Descriptive fields exported for a community, in output order.
pub const COMMUNITY_FIELDS: [&str; 5] = [
    "name",
    "short_description",
    "introductory_text",
    "copyright_text",
    "side_bar_text",
];

/// Descriptive fields exported for a collection, in output order.
pub const COLLECTION_FIELDS: [&str; 7] = [
    "name",
    "short_description",
    "introductory_text",
    "provenance_description",
    "license",
    "copyright_text",
    "side_bar_text",
];

pub const METADATA_FILE: &str = "metadata.xml";
pub const METADATA_STANZA: &str = "metadata";
pub const OBJECT_FILE: &str = "object";
pub const LOGO_FILE: &str = "logo";

pub const BAG_TYPE: &str = "bagType";
pub const OBJECT_TYPE: &str = "objectType";
pub const OBJECT_ID: &str = "objectId";
pub const OWNER_ID: &str = "ownerId";
pub const OTHER_IDS: &str = "otherIds";
pub const WITHDRAWN: &str = "withdrawn";

/// Builds one SIP bag per exported node under the scratch directory.
#[derive(Clone, Debug)]
pub struct PackageMaker {
    config: MigrateConfig,
}

impl PackageMaker {
    pub fn new(config: &MigrateConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Where the package for `id` lives.
    pub fn package_path(&self, id: &str) -> MigrateResult<PathBuf> {
        Ok(self.config.scratch_dir.join(package_name(id)?))
    }

    /// Build the package for a manifest entry.
    pub fn make<C: ContentSource + ?Sized>(&self, source: &C, kind: NodeKind, id: &str) -> MigrateResult<Bag> {
        match kind {
            NodeKind::Community => self.make_community(source, &source.community(id)?),
            NodeKind::Collection => self.make_collection(source, &source.collection(id)?),
            NodeKind::Item => self.make_item(source, &source.item(id)?),
        }
    }

    pub fn make_community<C: ContentSource + ?Sized>(
        &self,
        source: &C,
        record: &CommunityRecord,
    ) -> MigrateResult<Bag> {
        let mut bag = self.start(&record.id)?;
        object_properties(&mut bag, NodeKind::Community, &record.id, record.parent.as_deref())?;
        write_fields(&mut bag, &COMMUNITY_FIELDS, &record.fields)?;
        write_logo(&mut bag, source, record.logo.as_ref())?;
        self.finish(bag, &record.id)
    }

    pub fn make_collection<C: ContentSource + ?Sized>(
        &self,
        source: &C,
        record: &CollectionRecord,
    ) -> MigrateResult<Bag> {
        let mut bag = self.start(&record.id)?;
        object_properties(&mut bag, NodeKind::Collection, &record.id, Some(record.parent.as_str()))?;
        write_fields(&mut bag, &COLLECTION_FIELDS, &record.fields)?;
        write_logo(&mut bag, source, record.logo.as_ref())?;
        self.finish(bag, &record.id)
    }

    pub fn make_item<C: ContentSource + ?Sized>(&self, source: &C, record: &ItemRecord) -> MigrateResult<Bag> {
        let mut bag = self.start(&record.id)?;
        object_properties(&mut bag, NodeKind::Item, &record.id, Some(record.owning_collection.as_str()))?;
        if !record.mapped_collections.is_empty() {
            bag.property(OBJECT_FILE, OTHER_IDS, &record.mapped_collections.join(","))?;
        }
        if record.withdrawn {
            bag.property(OBJECT_FILE, WITHDRAWN, "true")?;
        }

        let mut writer = MarkupWriter::new(bag.payload_stream(METADATA_FILE)?)?;
        writer.start_stanza(METADATA_STANZA)?;
        for value in &record.metadata {
            let field = value.field();
            if self.config.skips_field(&field) {
                tracing::debug!(id = %record.id, %field, "dropping field re-created by target");
                continue;
            }
            writer.write_value(&value.to_markup())?;
        }
        writer.end_stanza()?;
        writer.close()?.close()?;

        for bundle in &record.bundles {
            if self.config.excludes_bundle(&bundle.name) {
                tracing::debug!(id = %record.id, bundle = %bundle.name, "bundle excluded");
                continue;
            }
            for bitstream in &bundle.bitstreams {
                write_bitstream(&mut bag, source, bundle, bitstream)?;
            }
        }
        self.finish(bag, &record.id)
    }

    fn start(&self, id: &str) -> MigrateResult<BagBuilder> {
        let path = self.package_path(id)?;
        if path.exists() {
            tracing::debug!(path = %path.display(), "replacing stale package");
            std::fs::remove_dir_all(&path)?;
        }
        let mut bag = BagBuilder::create(&path, self.config.digest_algorithm)?;
        bag.metadata(BAG_TYPE, "SIP");
        Ok(bag)
    }

    fn finish(&self, bag: BagBuilder, id: &str) -> MigrateResult<Bag> {
        let bag = bag.finish()?;
        tracing::info!(%id, files = bag.payload_files, bytes = bag.payload_bytes, "package built");
        Ok(bag)
    }
}

fn object_properties(bag: &mut BagBuilder, kind: NodeKind, id: &str, owner: Option<&str>) -> MigrateResult<()> {
    bag.property(OBJECT_FILE, OBJECT_TYPE, &kind.to_string())?;
    bag.property(OBJECT_FILE, OBJECT_ID, id)?;
    if let Some(owner) = owner {
        bag.property(OBJECT_FILE, OWNER_ID, owner)?;
    }
    Ok(())
}

fn write_fields(bag: &mut BagBuilder, names: &[&str], fields: &BTreeMap<String, String>) -> MigrateResult<()> {
    let mut writer = MarkupWriter::new(bag.payload_stream(METADATA_FILE)?)?;
    writer.start_stanza(METADATA_STANZA)?;
    for name in names.iter().copied() {
        writer.write_field(Some(name), fields.get(name).map(String::as_str))?;
    }
    writer.end_stanza()?;
    writer.close()?.close()?;
    Ok(())
}

fn write_logo<C: ContentSource + ?Sized>(
    bag: &mut BagBuilder,
    source: &C,
    logo: Option<&BitstreamRecord>,
) -> MigrateResult<()> {
    if let Some(logo) = logo {
        bag.payload(LOGO_FILE, source.open_bitstream(logo)?)?;
    }
    Ok(())
}

/// `<bundle>/<seq>-metadata.xml` followed by the bytes at `<bundle>/<seq>`.
fn write_bitstream<C: ContentSource + ?Sized>(
    bag: &mut BagBuilder,
    source: &C,
    bundle: &BundleRecord,
    bitstream: &BitstreamRecord,
) -> MigrateResult<()> {
    let seq = bitstream.sequence_id.to_string();
    let rel = format!("{}/{}", bundle.name, seq);

    let mut writer = MarkupWriter::new(bag.payload_stream(&format!("{rel}-metadata.xml"))?)?;
    writer.start_stanza(METADATA_STANZA)?;
    writer.write_field(Some("name"), bitstream.name.as_deref())?;
    writer.write_field(Some("source"), bitstream.source.as_deref())?;
    writer.write_field(Some("description"), bitstream.description.as_deref())?;
    writer.write_field(Some("sequence_id"), Some(seq.as_str()))?;
    if bundle.primary.as_deref() == Some(bitstream.id.as_str()) {
        writer.write_field(Some("bundle_primary"), Some("true"))?;
    }
    writer.end_stanza()?;
    writer.close()?.close()?;

    bag.payload(&rel, source.open_bitstream(bitstream)?)?;
    Ok(())
}

/// Read every value of the `metadata` stanza of a package metadata file.
pub fn read_metadata(path: &Path) -> MigrateResult<Vec<MarkupValue>> {
    let mut reader = MarkupReader::new(BufReader::new(File::open(path)?));
    if !reader.find_stanza(METADATA_STANZA)? {
        return Ok(Vec::new());
    }
    let values = reader.values()?;
    reader.close();
    Ok(values)
}
