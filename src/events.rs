//! Forward-only XML event stream
//!
//! Wraps a `quick_xml::Reader` and hands out owned start/end/text events.
//! Adapters never see the whole document: they read events one at a time and
//! buffer only the scope they are working on.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::BufRead;

use crate::error::{CoverageError, Result};

/// A start tag with its (unescaped) attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
}

impl Element {
    pub fn new(name: &str, attributes: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Looks up an attribute that must be present
    pub fn required_attribute(&self, name: &str) -> Result<&str> {
        self.attribute(name)
            .ok_or_else(|| CoverageError::missing_attribute(&self.name, name))
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            attributes.push((key, value));
        }
        Ok(Self { name, attributes })
    }
}

/// One event of the stream; element names are local names without prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    Start(Element),
    End(String),
    Text(String),
}

/// Single-pass reader over an XML document
pub struct EventStream<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    depth: usize,
    pending_end: Option<String>,
    done: bool,
}

impl<R: BufRead> EventStream<R> {
    pub fn new(source: R) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.trim_text(true);

        Self {
            reader,
            buf: Vec::new(),
            depth: 0,
            pending_end: None,
            done: false,
        }
    }

    /// Number of currently open elements
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The next event, `None` once the document is exhausted
    pub fn next_event(&mut self) -> Result<Option<XmlEvent>> {
        if let Some(name) = self.pending_end.take() {
            self.depth -= 1;
            return Ok(Some(XmlEvent::End(name)));
        }
        if self.done {
            return Ok(None);
        }

        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(e) => {
                    self.done = true;
                    return Err(e.into());
                }
            };

            match event {
                Event::Start(ref e) => {
                    let element = Element::from_start(e)?;
                    self.depth += 1;
                    return Ok(Some(XmlEvent::Start(element)));
                }
                Event::Empty(ref e) => {
                    let element = Element::from_start(e)?;
                    self.depth += 1;
                    self.pending_end = Some(element.name.clone());
                    return Ok(Some(XmlEvent::Start(element)));
                }
                Event::End(ref e) => {
                    self.depth = self.depth.saturating_sub(1);
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    return Ok(Some(XmlEvent::End(name)));
                }
                Event::Text(ref e) => {
                    let text = e.unescape()?;
                    if !text.trim().is_empty() {
                        return Ok(Some(XmlEvent::Text(text.into_owned())));
                    }
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    return Ok(Some(XmlEvent::Text(text)));
                }
                Event::Eof => {
                    self.done = true;
                    if self.depth > 0 {
                        return Err(CoverageError::MalformedStream(format!(
                            "unexpected end of document, {} element(s) still open",
                            self.depth
                        )));
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }

    /// Reads the text content of the element that was just started, up to
    /// and including its end tag
    pub fn read_text(&mut self) -> Result<String> {
        let scope = self.depth;
        let mut text = String::new();
        while let Some(event) = self.next_event()? {
            match event {
                XmlEvent::Text(t) => text.push_str(&t),
                XmlEvent::End(_) if self.depth < scope => return Ok(text),
                _ => {}
            }
        }
        Err(unclosed())
    }

    /// Skips the rest of the element that was just started
    pub fn skip_element(&mut self) -> Result<()> {
        let scope = self.depth;
        while let Some(event) = self.next_event()? {
            if matches!(event, XmlEvent::End(_)) && self.depth < scope {
                return Ok(());
            }
        }
        Err(unclosed())
    }
}

fn unclosed() -> CoverageError {
    CoverageError::MalformedStream("unexpected end of document".to_string())
}

impl<R: BufRead> Iterator for EventStream<R> {
    type Item = Result<XmlEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}
