use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Attribute key that is lifted into [`MarkupValue::name`].
pub const NAME_ATTR: &str = "name";

/// Element name used for every leaf value.
pub const VALUE_ELEMENT: &str = "value";

/// One named leaf element of a stanza: attributes plus text content.
///
/// The `name` attribute is kept apart from the other attributes; the generic
/// mapping never contains the reserved `name` key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkupValue {
    pub name: Option<String>,
    pub attrs: BTreeMap<String, String>,
    pub text: String,
}

impl MarkupValue {
    /// A value with a name and text and no other attributes.
    pub fn named(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            attrs: BTreeMap::new(),
            text: text.into(),
        }
    }

    /// Add an attribute, routing the reserved `name` key to [`Self::name`].
    pub fn add_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if key == NAME_ATTR {
            self.name = Some(value.into());
        } else {
            self.attrs.insert(key, value.into());
        }
    }

    /// Builder form of [`Self::add_attr`].
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_attr(key, value);
        self
    }

    /// Builder form of [`Self::add_attr`] that skips absent values.
    pub fn with_optional_attr(self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.with_attr(key, value),
            None => self,
        }
    }

    /// Replace the text payload.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Look up a generic attribute.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }
}
