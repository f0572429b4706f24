use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sipbag_markup::MarkupValue;

/// A community and its descriptive fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityRecord {
    pub id: String,
    /// Parent community, `None` for top-level communities.
    #[serde(default)]
    pub parent: Option<String>,
    /// Descriptive fields keyed by name (`name`, `short_description`, ...).
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub logo: Option<BitstreamRecord>,
}

/// A collection, always owned by a community.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub id: String,
    pub parent: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub logo: Option<BitstreamRecord>,
}

/// An item with its metadata and bundled bitstreams.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: String,
    pub owning_collection: String,
    /// Further collections the item is mapped into.
    #[serde(default)]
    pub mapped_collections: Vec<String>,
    #[serde(default)]
    pub withdrawn: bool,
    #[serde(default)]
    pub metadata: Vec<MetadataValue>,
    #[serde(default)]
    pub bundles: Vec<BundleRecord>,
}

impl ItemRecord {
    /// Whether the item appears in `collection`, owned or mapped.
    pub fn in_collection(&self, collection: &str) -> bool {
        self.owning_collection == collection || self.mapped_collections.iter().any(|c| c == collection)
    }
}

/// One qualified metadata value of an item.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataValue {
    pub schema: String,
    pub element: String,
    #[serde(default)]
    pub qualifier: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    pub value: String,
}

impl MetadataValue {
    pub fn new(schema: &str, element: &str, qualifier: Option<&str>, value: &str) -> Self {
        Self {
            schema: schema.to_string(),
            element: element.to_string(),
            qualifier: qualifier.map(str::to_string),
            language: None,
            value: value.to_string(),
        }
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    /// Dotted field name: `schema.element[.qualifier]`.
    pub fn field(&self) -> String {
        match &self.qualifier {
            Some(q) => format!("{}.{}.{}", self.schema, self.element, q),
            None => format!("{}.{}", self.schema, self.element),
        }
    }

    /// Render as a markup value with schema/element/qualifier/language attributes.
    pub fn to_markup(&self) -> MarkupValue {
        MarkupValue::default()
            .with_attr("schema", &self.schema)
            .with_attr("element", &self.element)
            .with_optional_attr("qualifier", self.qualifier.as_deref())
            .with_optional_attr("language", self.language.as_deref())
            .with_text(&self.value)
    }

    /// Read back a value written by [`to_markup`](Self::to_markup).
    ///
    /// Returns `None` when schema or element is missing.
    pub fn from_markup(value: &MarkupValue) -> Option<Self> {
        Some(Self {
            schema: value.attr("schema")?.to_string(),
            element: value.attr("element")?.to_string(),
            qualifier: value.attr("qualifier").map(str::to_string),
            language: value.attr("language").map(str::to_string),
            value: value.text.clone(),
        })
    }
}

/// A named group of bitstreams in an item.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleRecord {
    pub name: String,
    /// Identifier of the bundle's primary bitstream, if any.
    #[serde(default)]
    pub primary: Option<String>,
    #[serde(default)]
    pub bitstreams: Vec<BitstreamRecord>,
}

/// Descriptor of a stored file. Content is fetched through
/// [`ContentSource::open_bitstream`](crate::ContentSource::open_bitstream).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitstreamRecord {
    pub id: String,
    #[serde(default)]
    pub sequence_id: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}
