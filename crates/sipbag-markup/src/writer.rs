use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::MarkupResult;
use crate::value::{MarkupValue, NAME_ATTR, VALUE_ELEMENT};

/// Streaming writer for stanza/value metadata documents.
///
/// Stanza balance is the caller's responsibility: `end_stanza` with nothing
/// open is ignored, and `close` ends whatever is still open.
pub struct MarkupWriter<W: Write> {
    writer: Writer<W>,
    open: Vec<String>,
}

impl<W: Write> MarkupWriter<W> {
    /// Start a document on `sink` by writing the XML declaration.
    pub fn new(sink: W) -> MarkupResult<Self> {
        let mut writer = Writer::new(sink);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        Ok(Self {
            writer,
            open: Vec::new(),
        })
    }

    pub fn start_stanza(&mut self, name: &str) -> MarkupResult<()> {
        self.writer.write_event(Event::Start(BytesStart::new(name)))?;
        self.open.push(name.to_string());
        Ok(())
    }

    pub fn end_stanza(&mut self) -> MarkupResult<()> {
        match self.open.pop() {
            Some(name) => {
                self.writer.write_event(Event::End(BytesEnd::new(name)))?;
            }
            None => tracing::warn!("end_stanza called with no open stanza"),
        }
        Ok(())
    }

    /// Write `<value name="…">text</value>`; does nothing if either is absent.
    pub fn write_field(&mut self, name: Option<&str>, text: Option<&str>) -> MarkupResult<()> {
        let (Some(name), Some(text)) = (name, text) else {
            return Ok(());
        };
        self.write_value(&MarkupValue::named(name, text))
    }

    /// Write a value element carrying `name` plus every generic attribute.
    pub fn write_value(&mut self, value: &MarkupValue) -> MarkupResult<()> {
        let mut start = BytesStart::new(VALUE_ELEMENT);
        if let Some(name) = &value.name {
            start.push_attribute((NAME_ATTR, name.as_str()));
        }
        for (key, val) in &value.attrs {
            start.push_attribute((key.as_str(), val.as_str()));
        }
        self.writer.write_event(Event::Start(start))?;
        self.writer.write_event(Event::Text(BytesText::new(&value.text)))?;
        self.writer.write_event(Event::End(BytesEnd::new(VALUE_ELEMENT)))?;
        Ok(())
    }

    /// Number of stanzas started and not yet ended.
    pub fn open_stanzas(&self) -> usize {
        self.open.len()
    }

    /// End the document, flush, and hand the sink back to the caller.
    pub fn close(mut self) -> MarkupResult<W> {
        while !self.open.is_empty() {
            self.end_stanza()?;
        }
        self.writer.get_mut().flush()?;
        Ok(self.writer.into_inner())
    }
}
