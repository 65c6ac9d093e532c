//! Ordered element tree for invoice documents.
//!
//! Element order, attribute order and text are kept exactly as constructed or
//! parsed; the canonical serializer depends on that.
use std::fmt;

use super::xml::constants::{CAC_NS, CBC_NS, XML_NS};
use super::xml::parse::{ParseError, parse_document};
use super::xml::{InvoiceXmlError, XmlFormat, to_xml_with_format};

/// Qualified element or attribute name (`prefix:local`).
///
/// # Examples
/// ```rust
/// use fatoora_seal::invoice::QName;
///
/// let name = QName::parse("cbc:IssueDate");
/// assert_eq!(name.prefix(), Some("cbc"));
/// assert_eq!(name.local_name(), "IssueDate");
/// assert_eq!(name.to_string(), "cbc:IssueDate");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    prefix: Option<String>,
    local: String,
}

impl QName {
    pub fn new(prefix: Option<&str>, local: impl Into<String>) -> Self {
        Self {
            prefix: prefix.map(str::to_string),
            local: local.into(),
        }
    }

    pub fn prefixed(prefix: &str, local: impl Into<String>) -> Self {
        Self::new(Some(prefix), local)
    }

    pub fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((prefix, local)) => Self::new(Some(prefix), local),
            None => Self::new(None, raw),
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn local_name(&self) -> &str {
        &self.local
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{prefix}:{}", self.local),
            None => f.write_str(&self.local),
        }
    }
}

impl From<&str> for QName {
    fn from(raw: &str) -> Self {
        QName::parse(raw)
    }
}

impl From<String> for QName {
    fn from(raw: String) -> Self {
        QName::parse(&raw)
    }
}

/// Attribute in document order. Namespace declarations are ordinary attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    name: QName,
    value: String,
}

impl Attribute {
    pub fn new(name: impl Into<QName>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &QName {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Prefix and URI bound by this attribute if it is a namespace declaration.
    /// The prefix is `None` for a default namespace (`xmlns="..."`).
    pub fn namespace_binding(&self) -> Option<(Option<&str>, &str)> {
        match (self.name.prefix(), self.name.local_name()) {
            (None, "xmlns") => Some((None, &self.value)),
            (Some("xmlns"), prefix) => Some((Some(prefix), &self.value)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// Element with ordered attributes and ordered children.
///
/// # Examples
/// ```rust
/// use fatoora_seal::invoice::Element;
///
/// let reference = Element::new("cac:AdditionalDocumentReference")
///     .with_child(Element::new("cbc:ID").with_text("ICV"))
///     .with_child(Element::new("cbc:UUID").with_text("10"));
/// assert_eq!(reference.find_child("UUID").map(|e| e.text()), Some("10".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: QName,
    attributes: Vec<Attribute>,
    children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<QName>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<QName>, value: impl Into<String>) -> Self {
        self.push_attribute(Attribute::new(name, value));
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.push_text(&text.into());
        self
    }

    pub fn name(&self) -> &QName {
        &self.name
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Attribute value by its qualified name as written (`"schemeID"`, `"xmlns:cbc"`).
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name.to_string() == name)
            .map(Attribute::value)
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    pub fn has_element_children(&self) -> bool {
        self.child_elements().next().is_some()
    }

    /// First child element with the given local name.
    pub fn find_child(&self, local: &str) -> Option<&Element> {
        self.child_elements()
            .find(|child| child.name.local_name() == local)
    }

    pub fn find_child_mut(&mut self, local: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|node| match node {
            Node::Element(element) if element.name.local_name() == local => Some(element),
            _ => None,
        })
    }

    /// Walks child elements by local name, taking the first match at each step.
    pub fn find_path(&self, path: &[&str]) -> Option<&Element> {
        path.iter()
            .try_fold(self, |current, local| current.find_child(local))
    }

    pub fn find_path_mut(&mut self, path: &[&str]) -> Option<&mut Element> {
        let mut current = self;
        for local in path {
            current = current.find_child_mut(local)?;
        }
        Some(current)
    }

    /// Concatenated direct text children, untrimmed.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) => Some(text.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Replaces all direct text children with `text`, keeping child elements.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children.retain(|node| matches!(node, Node::Element(_)));
        self.children.insert(0, Node::Text(text.into()));
    }

    pub fn push_attribute(&mut self, attribute: Attribute) {
        self.attributes.push(attribute);
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .attributes
            .iter_mut()
            .find(|attr| attr.name.to_string() == name)
        {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute::new(name, value)),
        }
    }

    pub fn push_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Appends text, merging with a trailing text node.
    pub fn push_text(&mut self, text: &str) {
        if let Some(Node::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(Node::Text(text.to_string()));
        }
    }

    pub(crate) fn insert_child(&mut self, index: usize, child: Element) {
        let index = index.min(self.children.len());
        self.children.insert(index, Node::Element(child));
    }

    pub(crate) fn replace_child(&mut self, index: usize, child: Element) {
        self.children[index] = Node::Element(child);
    }

    /// Index in `children()` of the first element matching `predicate`.
    pub(crate) fn position_of<F>(&self, mut predicate: F) -> Option<usize>
    where
        F: FnMut(&Element) -> bool,
    {
        self.children.iter().position(|node| match node {
            Node::Element(element) => predicate(element),
            Node::Text(_) => false,
        })
    }

    pub(crate) fn last_position_of<F>(&self, mut predicate: F) -> Option<usize>
    where
        F: FnMut(&Element) -> bool,
    {
        self.children.iter().rposition(|node| match node {
            Node::Element(element) => predicate(element),
            Node::Text(_) => false,
        })
    }
}

/// Invoice document: a single root element and everything under it.
///
/// # Examples
/// ```rust
/// use fatoora_seal::invoice::InvoiceDocument;
///
/// let doc = InvoiceDocument::parse(
///     r#"<Invoice xmlns:cbc="urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2"><cbc:ID>INV-1</cbc:ID></Invoice>"#,
/// )?;
/// assert_eq!(doc.root().find_child("ID").map(|e| e.text()), Some("INV-1".to_string()));
/// # Ok::<(), fatoora_seal::invoice::xml::parse::ParseError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceDocument {
    root: Element,
}

impl InvoiceDocument {
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    pub fn parse(xml: &str) -> Result<Self, ParseError> {
        parse_document(xml)
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    pub fn into_root(self) -> Element {
        self.root
    }

    pub fn to_xml(&self) -> Result<String, InvoiceXmlError> {
        to_xml_with_format(self, XmlFormat::Compact)
    }

    pub fn to_xml_pretty(&self) -> Result<String, InvoiceXmlError> {
        to_xml_with_format(
            self,
            XmlFormat::Pretty {
                indent_char: ' ',
                indent_size: 2,
            },
        )
    }

    /// Prefix the root element binds to `uri`, if any.
    pub fn namespace_prefix(&self, uri: &str) -> Option<&str> {
        self.root
            .attributes
            .iter()
            .filter_map(Attribute::namespace_binding)
            .find_map(|(prefix, bound)| if bound == uri { prefix } else { None })
    }

    /// Text of `cac:AdditionalDocumentReference[cbc:ID=id]/cac:Attachment/cbc:EmbeddedDocumentBinaryObject`.
    pub fn document_reference(&self, id: &str) -> Option<String> {
        self.root
            .child_elements()
            .find(|child| self.is_document_reference(child, id))
            .and_then(|reference| {
                reference.find_path(&["Attachment", "EmbeddedDocumentBinaryObject"])
            })
            .map(|object| object.text().trim().to_string())
    }

    /// Returns the prefix bound to `uri` on the root, declaring `preferred`
    /// (or a numbered variant of it) when the root has no binding yet.
    pub(crate) fn ensure_namespace_prefix(&mut self, uri: &str, preferred: &str) -> String {
        if let Some(prefix) = self.namespace_prefix(uri) {
            return prefix.to_string();
        }
        let taken = |candidate: &str| {
            self.root
                .attributes
                .iter()
                .filter_map(Attribute::namespace_binding)
                .any(|(prefix, _)| prefix == Some(candidate))
        };
        let mut candidate = preferred.to_string();
        let mut suffix = 1;
        while taken(&candidate) {
            candidate = format!("{preferred}{suffix}");
            suffix += 1;
        }
        self.root
            .push_attribute(Attribute::new(QName::prefixed("xmlns", candidate.as_str()), uri));
        candidate
    }

    /// Inserts or replaces the root-level document reference `id` carrying an
    /// embedded plain-text object. New references go after the last existing
    /// one, else before the supplier party, else at the end.
    pub(crate) fn set_document_reference(&mut self, id: &str, value: &str) {
        let cac = self.ensure_namespace_prefix(CAC_NS, "cac");
        let cbc = self.ensure_namespace_prefix(CBC_NS, "cbc");
        let reference = Element::new(QName::prefixed(&cac, "AdditionalDocumentReference"))
            .with_child(Element::new(QName::prefixed(&cbc, "ID")).with_text(id))
            .with_child(
                Element::new(QName::prefixed(&cac, "Attachment")).with_child(
                    Element::new(QName::prefixed(&cbc, "EmbeddedDocumentBinaryObject"))
                        .with_attribute("mimeCode", "text/plain")
                        .with_text(value),
                ),
            );

        if let Some(index) = self
            .root
            .position_of(|child| self.is_document_reference(child, id))
        {
            self.root.replace_child(index, reference);
            return;
        }
        let index = self.insertion_point_after_references();
        self.root.insert_child(index, reference);
    }

    /// Namespace URI of a root child's name, resolved through the child's own
    /// declarations and then the root's. `None` for an unbound prefix.
    pub fn child_namespace<'a>(&'a self, child: &'a Element) -> Option<&'a str> {
        resolve_prefix(
            child.name.prefix(),
            child.attributes.iter().chain(self.root.attributes.iter()),
        )
    }

    /// First root child named `local` in namespace `uri`.
    pub fn find_root_child(&self, uri: &str, local: &str) -> Option<&Element> {
        self.root.child_elements().find(|child| {
            child.name.local_name() == local && self.child_namespace(child) == Some(uri)
        })
    }

    /// Removes root children for which `predicate(child, namespace)` holds.
    /// Children with an unbound prefix are kept.
    pub(crate) fn remove_root_children<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&Element, &str) -> bool,
    {
        let Element {
            attributes,
            children,
            ..
        } = &mut self.root;
        let root_attributes = &attributes[..];
        let before = children.len();
        children.retain(|node| match node {
            Node::Element(child) => !resolve_prefix(
                child.name.prefix(),
                child.attributes.iter().chain(root_attributes.iter()),
            )
            .is_some_and(|namespace| predicate(child, namespace)),
            Node::Text(_) => true,
        });
        before - children.len()
    }

    fn is_document_reference(&self, child: &Element, id: &str) -> bool {
        child.name.local_name() == "AdditionalDocumentReference"
            && self.child_namespace(child) == Some(CAC_NS)
            && child
                .find_child("ID")
                .is_some_and(|id_element| id_element.text().trim() == id)
    }

    pub(crate) fn insertion_point_after_references(&self) -> usize {
        if let Some(last) = self
            .root
            .last_position_of(|child| child.name.local_name() == "AdditionalDocumentReference")
        {
            return last + 1;
        }
        self.root
            .position_of(|child| child.name.local_name() == "AccountingSupplierParty")
            .unwrap_or(self.root.children.len())
    }
}

/// Namespace URI `prefix` resolves to given the bindings in `attributes`,
/// innermost first. Unprefixed names without a default namespace resolve to
/// the empty string.
fn resolve_prefix<'a>(
    prefix: Option<&str>,
    attributes: impl Iterator<Item = &'a Attribute>,
) -> Option<&'a str> {
    if prefix == Some("xml") {
        return Some(XML_NS);
    }
    let bound = attributes
        .filter_map(Attribute::namespace_binding)
        .find(|(bound_prefix, _)| *bound_prefix == prefix)
        .map(|(_, uri)| uri);
    match (prefix, bound) {
        (None, None) => Some(""),
        (_, bound) => bound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InvoiceDocument {
        InvoiceDocument::new(
            Element::new("Invoice")
                .with_attribute("xmlns", "urn:oasis:names:specification:ubl:schema:xsd:Invoice-2")
                .with_attribute("xmlns:cac", CAC_NS)
                .with_attribute("xmlns:cbc", CBC_NS)
                .with_child(Element::new("cbc:ID").with_text("INV-1"))
                .with_child(
                    Element::new("cac:AdditionalDocumentReference")
                        .with_child(Element::new("cbc:ID").with_text("ICV"))
                        .with_child(Element::new("cbc:UUID").with_text("1")),
                )
                .with_child(Element::new("cac:AccountingSupplierParty")),
        )
    }

    #[test]
    fn namespace_binding_distinguishes_default_and_prefixed() {
        let default = Attribute::new("xmlns", "urn:a");
        let prefixed = Attribute::new("xmlns:cbc", "urn:b");
        let plain = Attribute::new("currencyID", "SAR");
        assert_eq!(default.namespace_binding(), Some((None, "urn:a")));
        assert_eq!(prefixed.namespace_binding(), Some((Some("cbc"), "urn:b")));
        assert_eq!(plain.namespace_binding(), None);
    }

    #[test]
    fn set_document_reference_inserts_after_last_reference() {
        let mut doc = sample();
        doc.set_document_reference("PIH", "aGFzaA==");

        let names: Vec<String> = doc
            .root()
            .child_elements()
            .map(|child| child.name().local_name().to_string())
            .collect();
        assert_eq!(
            names,
            [
                "ID",
                "AdditionalDocumentReference",
                "AdditionalDocumentReference",
                "AccountingSupplierParty"
            ]
        );
        assert_eq!(doc.document_reference("PIH").as_deref(), Some("aGFzaA=="));
    }

    #[test]
    fn set_document_reference_replaces_existing_value() {
        let mut doc = sample();
        doc.set_document_reference("PIH", "Zmlyc3Q=");
        doc.set_document_reference("PIH", "c2Vjb25k");

        let count = doc
            .root()
            .child_elements()
            .filter(|child| doc.is_document_reference(child, "PIH"))
            .count();
        assert_eq!(count, 1);
        assert_eq!(doc.document_reference("PIH").as_deref(), Some("c2Vjb25k"));
    }

    #[test]
    fn ensure_namespace_prefix_declares_missing_binding_once() {
        let mut doc = sample();
        let ext = doc.ensure_namespace_prefix("urn:ext", "ext");
        let again = doc.ensure_namespace_prefix("urn:ext", "ext");
        assert_eq!(ext, "ext");
        assert_eq!(again, "ext");
        assert_eq!(doc.root().attribute("xmlns:ext"), Some("urn:ext"));
    }

    #[test]
    fn ensure_namespace_prefix_avoids_taken_prefix() {
        let mut doc = sample();
        let prefix = doc.ensure_namespace_prefix("urn:other", "cbc");
        assert_eq!(prefix, "cbc1");
    }

    #[test]
    fn document_reference_ignores_foreign_namespace() {
        let mut doc = sample();
        doc.root_mut().insert_child(
            1,
            Element::new("x:AdditionalDocumentReference")
                .with_attribute("xmlns:x", "urn:example:other")
                .with_child(Element::new("x:ID").with_text("QR")),
        );
        assert_eq!(doc.document_reference("QR"), None);

        doc.set_document_reference("QR", "AQ==");
        assert_eq!(doc.document_reference("QR").as_deref(), Some("AQ=="));
        assert!(doc.root().find_child("AdditionalDocumentReference").is_some_and(
            |first| first.name().prefix() == Some("x")
        ));
    }

    #[test]
    fn remove_root_children_resolves_local_and_inherited_bindings() {
        let mut doc = sample();
        doc.root_mut()
            .push_child(Element::new("x:Signature").with_attribute("xmlns:x", "urn:example:other"));
        doc.root_mut().push_child(Element::new("cac:Signature"));
        let removed = doc.remove_root_children(|child, namespace| {
            namespace == CAC_NS && child.name().local_name() == "Signature"
        });
        assert_eq!(removed, 1);
        assert!(doc.find_root_child("urn:example:other", "Signature").is_some());
        assert!(doc.find_root_child(CAC_NS, "Signature").is_none());
        assert_eq!(
            doc.child_namespace(doc.root().find_child("ID").expect("id")),
            Some(CBC_NS)
        );
    }

    #[test]
    fn set_text_keeps_child_elements() {
        let mut element = Element::new("a")
            .with_text("old")
            .with_child(Element::new("b"));
        element.set_text("new");
        assert_eq!(element.text(), "new");
        assert!(element.find_child("b").is_some());
    }
}
