//! Canonical byte rendering used as hashing and signing input.
//!
//! Rules:
//! - no XML declaration, comments or processing instructions;
//! - elements and attributes in document order, namespace declarations
//!   rendered where they were declared;
//! - whitespace-only text between sibling elements is dropped, all other text
//!   is kept verbatim (numbers are never re-formatted);
//! - empty elements are written as start/end tag pairs;
//! - text escapes `&`, `<`, `>` and CR; attribute values escape `&`, `<`,
//!   `"`, TAB, LF and CR.
//!
//! Every prefix used by an element or attribute must be bound in scope,
//! otherwise serialization fails before any byte is returned.
use thiserror::Error;

use super::document::{Element, InvoiceDocument, Node};
use super::xml::constants::{CAC_NS, EXT_NS, QR_REFERENCE_ID, XML_NS};
use super::xml::parse::is_xml_whitespace;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializationError {
    #[error("namespace prefix '{prefix}' used by <{element}> is not declared")]
    UnboundPrefix { prefix: String, element: String },
    #[error("namespace prefix '{prefix}' on <{element}> is bound to an empty URI")]
    EmptyNamespace { prefix: String, element: String },
    #[error("invalid XML name '{0}'")]
    InvalidName(String),
}

/// Canonical bytes of a document or subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Subtree left out of the canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    /// Any element with this namespace URI and local name.
    Element {
        namespace: &'static str,
        local: &'static str,
    },
    /// `cac:AdditionalDocumentReference` whose `ID` child has this text.
    DocumentReference { id: &'static str },
}

impl Exclusion {
    /// Whether `element`, whose name resolves to `namespace`, is left out.
    pub fn matches(&self, element: &Element, namespace: &str) -> bool {
        let local = element.name().local_name();
        match *self {
            Exclusion::Element {
                namespace: excluded_ns,
                local: excluded_local,
            } => namespace == excluded_ns && local == excluded_local,
            Exclusion::DocumentReference { id } => {
                namespace == CAC_NS
                    && local == "AdditionalDocumentReference"
                    && element
                        .find_child("ID")
                        .is_some_and(|child| child.text().trim() == id)
            }
        }
    }
}

/// Renders documents into canonical bytes.
///
/// # Examples
/// ```rust
/// use fatoora_seal::invoice::InvoiceDocument;
/// use fatoora_seal::invoice::canonical::CanonicalSerializer;
///
/// let pretty = InvoiceDocument::parse("<a x=\"1\">\n  <b/>\n</a>")?;
/// let compact = InvoiceDocument::parse("<a x=\"1\"><b></b></a>")?;
/// let serializer = CanonicalSerializer::new();
/// assert_eq!(serializer.serialize(&pretty)?, serializer.serialize(&compact)?);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct CanonicalSerializer {
    exclusions: Vec<Exclusion>,
}

impl CanonicalSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializer for the invoice hash: leaves out the signature extension,
    /// the `cac:Signature` element and the QR document reference.
    pub fn for_invoice_hash() -> Self {
        Self::new()
            .exclude(Exclusion::Element {
                namespace: EXT_NS,
                local: "UBLExtensions",
            })
            .exclude(Exclusion::Element {
                namespace: CAC_NS,
                local: "Signature",
            })
            .exclude(Exclusion::DocumentReference {
                id: QR_REFERENCE_ID,
            })
    }

    pub fn exclude(mut self, exclusion: Exclusion) -> Self {
        self.exclusions.push(exclusion);
        self
    }

    pub fn serialize(&self, document: &InvoiceDocument) -> Result<CanonicalBytes, SerializationError> {
        self.serialize_element(document.root())
    }

    /// Serializes `element` as a standalone tree; ancestors' namespace
    /// declarations are not visible.
    pub fn serialize_element(&self, element: &Element) -> Result<CanonicalBytes, SerializationError> {
        let mut out = String::with_capacity(4096);
        let mut scope = Scope::default();
        self.render(element, &mut scope, &mut out)?;
        Ok(CanonicalBytes(out.into_bytes()))
    }

    fn render<'a>(
        &self,
        element: &'a Element,
        scope: &mut Scope<'a>,
        out: &mut String,
    ) -> Result<(), SerializationError> {
        let frame = scope.len();
        let name = element.name();
        check_name(name.prefix(), name.local_name())?;

        for attr in element.attributes() {
            if let Some((prefix, uri)) = attr.namespace_binding() {
                if let Some(prefix) = prefix
                    && uri.is_empty()
                {
                    return Err(SerializationError::EmptyNamespace {
                        prefix: prefix.to_string(),
                        element: name.to_string(),
                    });
                }
                scope.bind(prefix, uri);
            }
        }

        let namespace = scope.resolve(name.prefix()).ok_or_else(|| {
            SerializationError::UnboundPrefix {
                prefix: name.prefix().unwrap_or_default().to_string(),
                element: name.to_string(),
            }
        })?;

        if self.is_excluded(element, namespace) {
            scope.truncate(frame);
            return Ok(());
        }

        out.push('<');
        out.push_str(&name.to_string());
        for attr in element.attributes() {
            let attr_name = attr.name();
            check_name(attr_name.prefix(), attr_name.local_name())?;
            if attr.namespace_binding().is_none()
                && let Some(prefix) = attr_name.prefix()
                && scope.resolve(Some(prefix)).is_none()
            {
                return Err(SerializationError::UnboundPrefix {
                    prefix: prefix.to_string(),
                    element: name.to_string(),
                });
            }
            out.push(' ');
            out.push_str(&attr_name.to_string());
            out.push_str("=\"");
            escape_attribute(attr.value(), out);
            out.push('"');
        }
        out.push('>');

        let element_content = element.has_element_children();
        for child in element.children() {
            match child {
                Node::Element(child) => self.render(child, scope, out)?,
                Node::Text(text) if element_content && is_xml_whitespace(text) => {}
                Node::Text(text) => escape_text(text, out),
            }
        }

        out.push_str("</");
        out.push_str(&name.to_string());
        out.push('>');
        scope.truncate(frame);
        Ok(())
    }

    fn is_excluded(&self, element: &Element, namespace: &str) -> bool {
        self.exclusions
            .iter()
            .any(|exclusion| exclusion.matches(element, namespace))
    }

    pub fn exclusions(&self) -> &[Exclusion] {
        &self.exclusions
    }
}

/// In-scope namespace bindings, innermost last.
#[derive(Default)]
struct Scope<'a> {
    bindings: Vec<(Option<&'a str>, &'a str)>,
}

impl<'a> Scope<'a> {
    fn len(&self) -> usize {
        self.bindings.len()
    }

    fn truncate(&mut self, len: usize) {
        self.bindings.truncate(len);
    }

    fn bind(&mut self, prefix: Option<&'a str>, uri: &'a str) {
        self.bindings.push((prefix, uri));
    }

    /// Namespace URI for `prefix`; unprefixed names resolve to the default
    /// namespace or the empty string.
    fn resolve(&self, prefix: Option<&str>) -> Option<&'a str> {
        if prefix == Some("xml") {
            return Some(XML_NS);
        }
        let bound = self
            .bindings
            .iter()
            .rev()
            .find(|(bound_prefix, _)| *bound_prefix == prefix)
            .map(|(_, uri)| *uri);
        match (prefix, bound) {
            (None, None) => Some(""),
            (_, bound) => bound,
        }
    }
}

fn check_name(prefix: Option<&str>, local: &str) -> Result<(), SerializationError> {
    let valid = |part: &str| {
        let mut chars = part.chars();
        match chars.next() {
            Some(first) if first.is_alphabetic() || first == '_' => chars
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.')),
            _ => false,
        }
    };
    let prefix_ok = prefix.is_none_or(valid);
    if prefix_ok && valid(local) {
        return Ok(());
    }
    Err(SerializationError::InvalidName(match prefix {
        Some(prefix) => format!("{prefix}:{local}"),
        None => local.to_string(),
    }))
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::document::Element;
    use crate::invoice::xml::constants::CBC_NS;

    fn canonical(xml: &str) -> String {
        let doc = InvoiceDocument::parse(xml).expect("parse");
        let bytes = CanonicalSerializer::new().serialize(&doc).expect("canonicalize");
        String::from_utf8(bytes.into_vec()).expect("utf-8")
    }

    #[test]
    fn drops_declaration_and_inter_element_whitespace() {
        let out = canonical("<?xml version=\"1.0\"?>\n<a>\n  <b>1.50</b>\n  <c/>\n</a>");
        assert_eq!(out, "<a><b>1.50</b><c></c></a>");
    }

    #[test]
    fn keeps_attribute_order_as_given() {
        let out = canonical("<a z=\"1\" b=\"2\" xmlns:p=\"urn:p\"><p:x/></a>");
        assert_eq!(out, "<a z=\"1\" b=\"2\" xmlns:p=\"urn:p\"><p:x></p:x></a>");
    }

    #[test]
    fn keeps_significant_text_whitespace_verbatim() {
        let out = canonical("<a><b>  padded  </b></a>");
        assert_eq!(out, "<a><b>  padded  </b></a>");
    }

    #[test]
    fn escapes_text_and_attributes() {
        let element = Element::new("a")
            .with_attribute("v", "x\"<&\t\n")
            .with_text("1 < 2 & 3 > 0\r");
        let bytes = CanonicalSerializer::new()
            .serialize_element(&element)
            .expect("canonicalize");
        assert_eq!(
            std::str::from_utf8(bytes.as_bytes()).expect("utf-8"),
            "<a v=\"x&quot;&lt;&amp;&#x9;&#xA;\">1 &lt; 2 &amp; 3 &gt; 0&#xD;</a>"
        );
    }

    #[test]
    fn parsed_carriage_return_reference_is_escaped_again() {
        assert_eq!(canonical("<a>x&#xD;y\r\nz</a>"), "<a>x&#xD;y\nz</a>");
    }

    #[test]
    fn rejects_unbound_element_prefix() {
        let doc = InvoiceDocument::new(Element::new("a").with_child(Element::new("cbc:ID")));
        let err = CanonicalSerializer::new().serialize(&doc).expect_err("unbound");
        assert_eq!(
            err,
            SerializationError::UnboundPrefix {
                prefix: "cbc".into(),
                element: "cbc:ID".into()
            }
        );
    }

    #[test]
    fn rejects_unbound_attribute_prefix() {
        let doc = InvoiceDocument::new(Element::new("a").with_attribute("xsi:type", "t"));
        assert!(matches!(
            CanonicalSerializer::new().serialize(&doc),
            Err(SerializationError::UnboundPrefix { .. })
        ));
    }

    #[test]
    fn prefix_bound_on_sibling_is_not_in_scope() {
        let doc = InvoiceDocument::new(
            Element::new("a")
                .with_child(Element::new("p:x").with_attribute("xmlns:p", "urn:p"))
                .with_child(Element::new("p:y")),
        );
        assert!(CanonicalSerializer::new().serialize(&doc).is_err());
    }

    #[test]
    fn rejects_invalid_names() {
        let doc = InvoiceDocument::new(Element::new("1bad"));
        assert_eq!(
            CanonicalSerializer::new().serialize(&doc),
            Err(SerializationError::InvalidName("1bad".into()))
        );
    }

    #[test]
    fn invoice_hash_serializer_skips_signature_parts() {
        let doc = InvoiceDocument::new(
            Element::new("Invoice")
                .with_attribute("xmlns:cac", CAC_NS)
                .with_attribute("xmlns:cbc", CBC_NS)
                .with_attribute("xmlns:ext", EXT_NS)
                .with_child(Element::new("ext:UBLExtensions").with_text("sig"))
                .with_child(Element::new("cbc:ID").with_text("1"))
                .with_child(
                    Element::new("cac:AdditionalDocumentReference")
                        .with_child(Element::new("cbc:ID").with_text(" QR ")),
                )
                .with_child(
                    Element::new("cac:AdditionalDocumentReference")
                        .with_child(Element::new("cbc:ID").with_text("PIH")),
                )
                .with_child(Element::new("cac:Signature")),
        );
        let bytes = CanonicalSerializer::for_invoice_hash()
            .serialize(&doc)
            .expect("canonicalize");
        let out = String::from_utf8(bytes.into_vec()).expect("utf-8");
        assert!(!out.contains("UBLExtensions"));
        assert!(!out.contains("cac:Signature"));
        assert!(!out.contains(">QR<") && !out.contains(" QR "));
        assert!(out.contains("<cbc:ID>PIH</cbc:ID>"));
    }

    #[test]
    fn exclusion_matches_namespace_not_prefix() {
        let doc = InvoiceDocument::new(
            Element::new("Invoice")
                .with_attribute("xmlns:x", "urn:not-ext")
                .with_child(Element::new("x:UBLExtensions")),
        );
        let bytes = CanonicalSerializer::for_invoice_hash()
            .serialize(&doc)
            .expect("canonicalize");
        assert!(
            std::str::from_utf8(bytes.as_bytes())
                .expect("utf-8")
                .contains("x:UBLExtensions")
        );
    }
}
