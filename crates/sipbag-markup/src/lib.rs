//! Stanza/value metadata markup for sipbag.
//!
//! A metadata document is a flat XML shape: a named stanza element holding
//! `value` leaf elements, each with a `name` attribute, optional extra
//! attributes, and text. [`MarkupWriter`] streams such documents to any
//! [`std::io::Write`] sink and [`MarkupReader`] pulls them back as
//! [`MarkupValue`]s.

pub mod error;
pub mod reader;
pub mod value;
pub mod writer;

pub use error::{MarkupError, MarkupResult};
pub use reader::MarkupReader;
pub use value::{MarkupValue, NAME_ATTR, VALUE_ELEMENT};
pub use writer::MarkupWriter;
