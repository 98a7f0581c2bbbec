//! Streaming RDF/XML reader for CIM exports.
//!
//! The document root (normally `rdf:RDF`) contains one child per CIM element. The local tag name
//! of that child is the class, `rdf:ID` or `rdf:about` is the identifier. Grandchildren are
//! properties named `Class.field` holding either text or an `rdf:resource` reference.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::{Error, Result};

/// One element as it appears in the file, before any class knowledge is applied
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedElement {
    pub id: String,
    pub class: String,
    /// Property values keyed by the qualified property name, e.g. `IdentifiedObject.name`
    pub properties: HashMap<String, String>,
}

impl ParsedElement {
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

/// Parse a complete RDF/XML document into its elements, in document order
pub fn parse_rdf(bytes: &[u8]) -> Result<Vec<ParsedElement>> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut elements = vec![];
    let mut depth = 0usize;
    let mut current: Option<ParsedElement> = None;
    let mut property: Option<(String, String)> = None;

    loop {
        let position = reader.buffer_position() as u64;
        let event = match reader.read_event_into(&mut buf) {
            Ok(event) => event,
            Err(source) => {
                return Err(Error::Xml {
                    position: reader.error_position() as u64,
                    source,
                })
            }
        };

        match event {
            Event::Start(start) => {
                depth += 1;
                match depth {
                    2 => current = Some(open_element(&start, position)?),
                    3 => property = Some((local_name(&start), String::new())),
                    _ => {}
                }
            }
            Event::Empty(start) => match depth + 1 {
                2 => elements.push(open_element(&start, position)?),
                3 => {
                    if let (Some(element), Some(value)) =
                        (current.as_mut(), resource(&start, position)?)
                    {
                        element.properties.insert(local_name(&start), value);
                    }
                }
                _ => {}
            },
            Event::Text(text) if depth == 3 => {
                if let Some((_, value)) = property.as_mut() {
                    let text = text
                        .unescape()
                        .map_err(|source| Error::Xml { position, source })?;
                    value.push_str(&text);
                }
            }
            Event::CData(data) if depth == 3 => {
                if let Some((_, value)) = property.as_mut() {
                    value.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::End(_) => {
                match depth {
                    2 => elements.extend(current.take()),
                    3 => {
                        if let (Some(element), Some((name, value))) =
                            (current.as_mut(), property.take())
                        {
                            element.properties.insert(name, value);
                        }
                    }
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }

        buf.clear();
    }

    Ok(elements)
}

fn local_name(start: &BytesStart) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

fn open_element(start: &BytesStart, position: u64) -> Result<ParsedElement> {
    let class = local_name(start);
    let mut id = None;

    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| Error::Xml {
            position,
            source: e.into(),
        })?;

        match attribute.key.local_name().as_ref() {
            b"ID" | b"about" => {
                let value = attribute
                    .unescape_value()
                    .map_err(|source| Error::Xml { position, source })?;
                id = Some(value.trim_start_matches('#').to_string());
            }
            _ => {}
        }
    }

    let id = id.ok_or_else(|| Error::MissingIdentifier {
        class: class.clone(),
        position,
    })?;

    Ok(ParsedElement {
        id,
        class,
        properties: HashMap::new(),
    })
}

// references and enumeration values keep only the fragment after the last '#'
fn resource(start: &BytesStart, position: u64) -> Result<Option<String>> {
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| Error::Xml {
            position,
            source: e.into(),
        })?;

        if attribute.key.local_name().as_ref() == b"resource" {
            let value = attribute
                .unescape_value()
                .map_err(|source| Error::Xml { position, source })?;
            let fragment = value
                .rsplit_once('#')
                .map(|(_, fragment)| fragment)
                .unwrap_or(&value);

            return Ok(Some(fragment.to_string()));
        }
    }

    Ok(None)
}
