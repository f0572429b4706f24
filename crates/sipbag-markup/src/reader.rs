use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{MarkupError, MarkupResult};
use crate::value::MarkupValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReaderState {
    Seeking,
    InStanza,
    Finished,
}

/// Pull reader over stanza/value metadata documents.
///
/// Locate a stanza with [`find_stanza`](Self::find_stanza), then call
/// [`next_value`](Self::next_value) until it returns `None`.
pub struct MarkupReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    state: ReaderState,
}

impl<R: BufRead> MarkupReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            reader: Reader::from_reader(source),
            buf: Vec::new(),
            state: ReaderState::Seeking,
        }
    }

    /// Skip ahead to the next start tag named `name`, prefix included.
    ///
    /// Returns `false` if the document ends first.
    pub fn find_stanza(&mut self, name: &str) -> MarkupResult<bool> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) if e.name().as_ref() == name.as_bytes() => {
                    self.state = ReaderState::InStanza;
                    return Ok(true);
                }
                Event::Empty(e) if e.name().as_ref() == name.as_bytes() => {
                    self.state = ReaderState::Finished;
                    return Ok(true);
                }
                Event::Eof => {
                    self.state = ReaderState::Finished;
                    return Ok(false);
                }
                _ => {}
            }
        }
    }

    /// Read the next value of the current stanza.
    ///
    /// Returns `None` once the enclosing end tag (or end of document) is
    /// reached with no value pending.
    pub fn next_value(&mut self) -> MarkupResult<Option<MarkupValue>> {
        if self.state != ReaderState::InStanza {
            return Ok(None);
        }
        let mut pending: Option<MarkupValue> = None;
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => pending = Some(value_from_start(&e)?),
                Event::Empty(e) => {
                    if pending.is_none() {
                        return Ok(Some(value_from_start(&e)?));
                    }
                }
                Event::Text(t) => {
                    if let Some(value) = pending.as_mut() {
                        let text = t
                            .unescape()
                            .map_err(|err| MarkupError::Syntax(err.to_string()))?;
                        value.text.push_str(&text);
                    }
                }
                Event::CData(c) => {
                    if let Some(value) = pending.as_mut() {
                        value.text.push_str(std::str::from_utf8(&c)?);
                    }
                }
                Event::End(_) => {
                    if pending.is_none() {
                        self.state = ReaderState::Finished;
                    }
                    return Ok(pending);
                }
                Event::Eof => {
                    self.state = ReaderState::Finished;
                    return Ok(pending);
                }
                _ => {}
            }
        }
    }

    /// Drain every remaining value of the current stanza.
    pub fn values(&mut self) -> MarkupResult<Vec<MarkupValue>> {
        let mut values = Vec::new();
        while let Some(value) = self.next_value()? {
            values.push(value);
        }
        Ok(values)
    }

    /// Release the reader and its source.
    pub fn close(self) {
        tracing::trace!("markup reader closed");
    }
}

fn value_from_start(start: &BytesStart<'_>) -> MarkupResult<MarkupValue> {
    let mut value = MarkupValue::default();
    for attr in start.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let val = attr
            .unescape_value()
            .map_err(|err| MarkupError::Syntax(err.to_string()))?;
        value.add_attr(key, val.into_owned());
    }
    Ok(value)
}
