//! XML reading and writing for invoice documents.
pub mod constants;
pub mod parse;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use thiserror::Error;

use super::document::{Element, InvoiceDocument, Node};

/// XML serialization error.
#[derive(Debug, Error)]
pub enum InvoiceXmlError {
    #[error("failed to write invoice XML: {message}")]
    Write { message: String },
    #[error("invoice XML is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// XML formatting options.
#[derive(Debug, Clone, Copy, Default)]
pub enum XmlFormat {
    #[default]
    Compact,
    Pretty {
        indent_char: char,
        indent_size: usize,
    },
}

/// Write a document as XML with a UTF-8 declaration.
///
/// Compact output reproduces text nodes as stored, so a parsed document
/// written back keeps its original whitespace.
///
/// # Examples
/// ```rust
/// use fatoora_seal::invoice::{Element, InvoiceDocument};
/// use fatoora_seal::invoice::xml::{XmlFormat, to_xml_with_format};
///
/// let doc = InvoiceDocument::new(Element::new("Invoice").with_child(Element::new("ID").with_text("1")));
/// let xml = to_xml_with_format(&doc, XmlFormat::Compact)?;
/// assert_eq!(xml, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Invoice><ID>1</ID></Invoice>");
/// # Ok::<(), fatoora_seal::invoice::xml::InvoiceXmlError>(())
/// ```
pub fn to_xml_with_format(
    document: &InvoiceDocument,
    format: XmlFormat,
) -> Result<String, InvoiceXmlError> {
    let buffer = Vec::with_capacity(4096);
    let mut writer = match format {
        XmlFormat::Compact => Writer::new(buffer),
        XmlFormat::Pretty {
            indent_char,
            indent_size,
        } => Writer::new_with_indent(buffer, indent_char as u8, indent_size),
    };

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(write_error)?;
    if matches!(format, XmlFormat::Compact) {
        writer.get_mut().push(b'\n');
    }
    write_element(&mut writer, document.root())?;

    Ok(String::from_utf8(writer.into_inner())?)
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), InvoiceXmlError> {
    let name = element.name().to_string();
    let mut start = BytesStart::new(name.as_str());
    for attribute in element.attributes() {
        let key = attribute.name().to_string();
        start.push_attribute((key.as_str(), attribute.value()));
    }

    if element.children().is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(write_error);
    }

    writer.write_event(Event::Start(start)).map_err(write_error)?;
    for child in element.children() {
        match child {
            Node::Element(child) => write_element(writer, child)?,
            Node::Text(text) => writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(write_error)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(name.as_str())))
        .map_err(write_error)
}

fn write_error(err: impl std::fmt::Display) -> InvoiceXmlError {
    InvoiceXmlError::Write {
        message: err.to_string(),
    }
}
