//! XML parsing into [`InvoiceDocument`].
use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

use crate::invoice::document::{Attribute, Element, InvoiceDocument};

/// Errors emitted while parsing invoice XML.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("XML parse error at byte {position}: {message}")]
    Xml { position: u64, message: String },
    #[error("invalid UTF-8 in invoice XML: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("document has no root element")]
    MissingRoot,
    #[error("unexpected content outside the root element")]
    ContentOutsideRoot,
    #[error("element <{0}> is never closed")]
    Unclosed(String),
}

/// Parse XML text into an ordered element tree.
///
/// Comments, processing instructions, the XML declaration and doctype are
/// dropped. CDATA sections become text. Line endings are normalized to `\n`.
///
/// # Examples
/// ```rust
/// use fatoora_seal::invoice::xml::parse::parse_document;
///
/// let doc = parse_document("<Invoice><ID>1</ID><!-- note --></Invoice>")?;
/// assert_eq!(doc.root().child_elements().count(), 1);
/// # Ok::<(), fatoora_seal::invoice::xml::parse::ParseError>(())
/// ```
pub fn parse_document(xml: &str) -> Result<InvoiceDocument, ParseError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader.read_event().map_err(|e| ParseError::Xml {
            position: reader.buffer_position() as u64,
            message: e.to_string(),
        })?;
        match event {
            Event::Start(start) => stack.push(element_from_start(&start, &reader)?),
            Event::Empty(start) => {
                let element = element_from_start(&start, &reader)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| ParseError::Xml {
                    position: reader.buffer_position() as u64,
                    message: "closing tag without matching start".into(),
                })?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                // Literal CRs are normalized before references are expanded,
                // so `&#xD;` survives as a carriage return.
                let raw = normalize_line_endings(std::str::from_utf8(&text)?);
                let value = unescape(&raw).map_err(|e| ParseError::Xml {
                    position: reader.buffer_position() as u64,
                    message: e.to_string(),
                })?;
                push_text(&mut stack, &value)?;
            }
            Event::CData(data) => {
                let value = std::str::from_utf8(&data)?;
                push_text(&mut stack, &normalize_line_endings(value))?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(ParseError::Unclosed(open.name().to_string()));
    }
    root.map(InvoiceDocument::new)
        .ok_or(ParseError::MissingRoot)
}

fn element_from_start(start: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Element, ParseError> {
    let qname = start.name();
    let name = std::str::from_utf8(qname.as_ref())?;
    let mut element = Element::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| ParseError::Xml {
            position: reader.buffer_position() as u64,
            message: e.to_string(),
        })?;
        let key = std::str::from_utf8(attr.key.as_ref())?;
        let value = attr.unescape_value().map_err(|e| ParseError::Xml {
            position: reader.buffer_position() as u64,
            message: e.to_string(),
        })?;
        element.push_attribute(Attribute::new(key, value.into_owned()));
    }
    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), ParseError> {
    if let Some(parent) = stack.last_mut() {
        parent.push_child(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(ParseError::ContentOutsideRoot);
    }
    *root = Some(element);
    Ok(())
}

fn push_text(stack: &mut [Element], text: &str) -> Result<(), ParseError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.push_text(text);
            Ok(())
        }
        None if is_xml_whitespace(text) => Ok(()),
        None => Err(ParseError::ContentOutsideRoot),
    }
}

pub(crate) fn is_xml_whitespace(text: &str) -> bool {
    text.chars().all(|c| matches!(c, ' ' | '\t' | '\n' | '\r'))
}

fn normalize_line_endings(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(text)
    }
}
