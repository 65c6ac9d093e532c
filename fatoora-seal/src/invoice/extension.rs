//! UBL signature extension (XAdES enveloped signature) and the signed
//! document built around it.
use base64ct::{Base64, Encoding};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sha2::{Digest, Sha256};

use super::canonical::{CanonicalSerializer, SerializationError};
use super::chain::InvoiceHash;
use super::document::{Element, InvoiceDocument, QName};
use super::xml::constants::{
    C14N11_ALGORITHM, CAC_NS, CBC_NS, DS_NS, ECDSA_SHA256_ALGORITHM, EXT_NS, EXTENSION_URI,
    HASH_EXCLUSION_XPATHS, INVOICE_REFERENCE_ID, QR_REFERENCE_ID, REFERENCED_SIGNATURE_ID,
    SAC_NS, SBC_NS, SHA256_ALGORITHM, SIG_NS, SIGNATURE_ID, SIGNATURE_INFORMATION_ID,
    SIGNATURE_PROPERTIES_TYPE, SIGNED_PROPERTIES_ID, XADES_NS, XPATH_ALGORITHM,
};
use crate::crypto::{CertificateInfo, InvoiceSignature};

const SIGNING_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Declares the namespaces the signature structure needs on the root.
/// Run before hashing: declarations added later would change the hash.
pub(crate) fn declare_signature_namespaces(document: &mut InvoiceDocument) {
    document.ensure_namespace_prefix(EXT_NS, "ext");
    document.ensure_namespace_prefix(CAC_NS, "cac");
    document.ensure_namespace_prefix(CBC_NS, "cbc");
}

/// Signing time from `IssueDate`/`IssueTime`, or the current UTC time when
/// either is missing or unparsable.
pub fn signing_time_for(document: &InvoiceDocument) -> NaiveDateTime {
    let root = document.root();
    let date = root
        .find_child("IssueDate")
        .and_then(|e| NaiveDate::parse_from_str(e.text().trim(), "%Y-%m-%d").ok());
    let time = root.find_child("IssueTime").and_then(|e| {
        let text = e.text();
        let text = text.trim();
        NaiveTime::parse_from_str(text.get(..8).unwrap_or(text), "%H:%M:%S").ok()
    });
    match (date, time) {
        (Some(date), Some(time)) => NaiveDateTime::new(date, time),
        _ => Utc::now().naive_utc(),
    }
}

/// `xades:SignedProperties` values. The element is rendered with its own
/// `xades` and `ds` declarations so it canonicalizes the same standalone and
/// inside the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedProperties {
    signing_time: NaiveDateTime,
    certificate_digest: String,
    issuer_name: String,
    serial_number: String,
}

impl SignedProperties {
    pub fn new(signing_time: NaiveDateTime, certificate: &CertificateInfo) -> Self {
        Self {
            signing_time,
            certificate_digest: certificate.digest(),
            issuer_name: certificate.issuer_name(),
            serial_number: certificate.serial_number(),
        }
    }

    pub fn signing_time(&self) -> NaiveDateTime {
        self.signing_time
    }

    pub fn certificate_digest(&self) -> &str {
        &self.certificate_digest
    }

    pub fn issuer_name(&self) -> &str {
        &self.issuer_name
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub fn to_element(&self) -> Element {
        let cert = Element::new("xades:Cert")
            .with_child(
                Element::new("xades:CertDigest")
                    .with_child(
                        Element::new("ds:DigestMethod").with_attribute("Algorithm", SHA256_ALGORITHM),
                    )
                    .with_child(Element::new("ds:DigestValue").with_text(&self.certificate_digest)),
            )
            .with_child(
                Element::new("xades:IssuerSerial")
                    .with_child(Element::new("ds:X509IssuerName").with_text(&self.issuer_name))
                    .with_child(Element::new("ds:X509SerialNumber").with_text(&self.serial_number)),
            );

        Element::new("xades:SignedProperties")
            .with_attribute("xmlns:xades", XADES_NS)
            .with_attribute("xmlns:ds", DS_NS)
            .with_attribute("Id", SIGNED_PROPERTIES_ID)
            .with_child(
                Element::new("xades:SignedSignatureProperties")
                    .with_child(
                        Element::new("xades:SigningTime")
                            .with_text(self.signing_time.format(SIGNING_TIME_FORMAT).to_string()),
                    )
                    .with_child(Element::new("xades:SigningCertificate").with_child(cert)),
            )
    }

    /// Digest referenced from `SignedInfo`.
    pub fn digest(&self) -> Result<String, SerializationError> {
        signed_properties_digest(&self.to_element())
    }
}

/// Base64 of the hex SHA-256 of a standalone-canonical `SignedProperties`.
pub(crate) fn signed_properties_digest(element: &Element) -> Result<String, SerializationError> {
    let canonical = CanonicalSerializer::new().serialize_element(element)?;
    let hash = Sha256::digest(canonical.as_bytes());
    Ok(Base64::encode_string(hex::encode(hash).as_bytes()))
}

/// Builds the signed document from a chained, unsigned document and the
/// values computed from it. The input is never modified.
///
/// Any previous signature extension, `cac:Signature` or QR reference is
/// replaced. The QR reference and `cac:Signature` follow the last document
/// reference; the extension becomes the first child of the root.
pub struct SignedDocumentBuilder<'a> {
    unsigned: &'a InvoiceDocument,
    invoice_hash: &'a InvoiceHash,
    signature: &'a InvoiceSignature,
    certificate: &'a CertificateInfo,
    signed_properties: SignedProperties,
    qr_code: Option<String>,
}

impl<'a> SignedDocumentBuilder<'a> {
    pub fn new(
        unsigned: &'a InvoiceDocument,
        invoice_hash: &'a InvoiceHash,
        signature: &'a InvoiceSignature,
        certificate: &'a CertificateInfo,
        signed_properties: SignedProperties,
    ) -> Self {
        Self {
            unsigned,
            invoice_hash,
            signature,
            certificate,
            signed_properties,
            qr_code: None,
        }
    }

    pub fn qr_code(mut self, qr_code: impl Into<String>) -> Self {
        self.qr_code = Some(qr_code.into());
        self
    }

    pub fn build(self) -> Result<InvoiceDocument, SerializationError> {
        let mut document = self.unsigned.clone();
        let ext = document.ensure_namespace_prefix(EXT_NS, "ext");
        let cac = document.ensure_namespace_prefix(CAC_NS, "cac");
        let cbc = document.ensure_namespace_prefix(CBC_NS, "cbc");

        // Only what the invoice hash leaves out may be replaced.
        let hash_serializer = CanonicalSerializer::for_invoice_hash();
        document.remove_root_children(|child, namespace| {
            hash_serializer
                .exclusions()
                .iter()
                .any(|exclusion| exclusion.matches(child, namespace))
        });

        if let Some(qr_code) = &self.qr_code {
            document.set_document_reference(QR_REFERENCE_ID, qr_code);
        }

        let signature_marker = Element::new(QName::prefixed(&cac, "Signature"))
            .with_child(Element::new(QName::prefixed(&cbc, "ID")).with_text(REFERENCED_SIGNATURE_ID))
            .with_child(
                Element::new(QName::prefixed(&cbc, "SignatureMethod")).with_text(EXTENSION_URI),
            );
        let index = document.insertion_point_after_references();
        document.root_mut().insert_child(index, signature_marker);

        let extensions = self.extensions_element(&ext, &cbc)?;
        let first = document.root().position_of(|_| true).unwrap_or(0);
        document.root_mut().insert_child(first, extensions);
        Ok(document)
    }

    fn extensions_element(&self, ext: &str, cbc: &str) -> Result<Element, SerializationError> {
        let signed_properties = self.signed_properties.to_element();
        let signed_properties_digest = signed_properties_digest(&signed_properties)?;

        let mut transforms = Element::new("ds:Transforms");
        for xpath in HASH_EXCLUSION_XPATHS {
            transforms.push_child(
                Element::new("ds:Transform")
                    .with_attribute("Algorithm", XPATH_ALGORITHM)
                    .with_child(Element::new("ds:XPath").with_text(xpath)),
            );
        }
        transforms.push_child(Element::new("ds:Transform").with_attribute("Algorithm", C14N11_ALGORITHM));

        let signed_info = Element::new("ds:SignedInfo")
            .with_child(
                Element::new("ds:CanonicalizationMethod").with_attribute("Algorithm", C14N11_ALGORITHM),
            )
            .with_child(
                Element::new("ds:SignatureMethod").with_attribute("Algorithm", ECDSA_SHA256_ALGORITHM),
            )
            .with_child(
                Element::new("ds:Reference")
                    .with_attribute("Id", INVOICE_REFERENCE_ID)
                    .with_attribute("URI", "")
                    .with_child(transforms)
                    .with_child(digest_method())
                    .with_child(Element::new("ds:DigestValue").with_text(self.invoice_hash.as_str())),
            )
            .with_child(
                Element::new("ds:Reference")
                    .with_attribute("Type", SIGNATURE_PROPERTIES_TYPE)
                    .with_attribute("URI", format!("#{SIGNED_PROPERTIES_ID}"))
                    .with_child(digest_method())
                    .with_child(Element::new("ds:DigestValue").with_text(signed_properties_digest)),
            );

        let signature = Element::new("ds:Signature")
            .with_attribute("xmlns:ds", DS_NS)
            .with_attribute("Id", SIGNATURE_ID)
            .with_child(signed_info)
            .with_child(Element::new("ds:SignatureValue").with_text(self.signature.to_base64()))
            .with_child(
                Element::new("ds:KeyInfo").with_child(
                    Element::new("ds:X509Data").with_child(
                        Element::new("ds:X509Certificate").with_text(self.certificate.der_base64()),
                    ),
                ),
            )
            .with_child(
                Element::new("ds:Object").with_child(
                    Element::new("xades:QualifyingProperties")
                        .with_attribute("xmlns:xades", XADES_NS)
                        .with_attribute("Target", SIGNATURE_ID)
                        .with_child(signed_properties),
                ),
            );

        let signature_information = Element::new("sac:SignatureInformation")
            .with_child(Element::new(QName::prefixed(cbc, "ID")).with_text(SIGNATURE_INFORMATION_ID))
            .with_child(Element::new("sbc:ReferencedSignatureID").with_text(REFERENCED_SIGNATURE_ID))
            .with_child(signature);

        Ok(Element::new(QName::prefixed(ext, "UBLExtensions")).with_child(
            Element::new(QName::prefixed(ext, "UBLExtension"))
                .with_child(Element::new(QName::prefixed(ext, "ExtensionURI")).with_text(EXTENSION_URI))
                .with_child(
                    Element::new(QName::prefixed(ext, "ExtensionContent")).with_child(
                        Element::new("sig:UBLDocumentSignatures")
                            .with_attribute("xmlns:sig", SIG_NS)
                            .with_attribute("xmlns:sac", SAC_NS)
                            .with_attribute("xmlns:sbc", SBC_NS)
                            .with_child(signature_information),
                    ),
                ),
        ))
    }
}

fn digest_method() -> Element {
    Element::new("ds:DigestMethod").with_attribute("Algorithm", SHA256_ALGORITHM)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::xml::constants::INVOICE_NS;

    fn unsigned() -> InvoiceDocument {
        InvoiceDocument::parse(&format!(
            r#"<Invoice xmlns="{INVOICE_NS}" xmlns:cac="{CAC_NS}" xmlns:cbc="{CBC_NS}">
  <cbc:ID>INV-1</cbc:ID>
  <cbc:IssueDate>2022-08-17</cbc:IssueDate>
  <cbc:IssueTime>17:41:08</cbc:IssueTime>
  <cac:AdditionalDocumentReference><cbc:ID>PIH</cbc:ID></cac:AdditionalDocumentReference>
  <cac:AccountingSupplierParty/>
</Invoice>"#
        ))
        .expect("parse")
    }

    #[test]
    fn signing_time_comes_from_issue_fields() {
        let time = signing_time_for(&unsigned());
        assert_eq!(time.format(SIGNING_TIME_FORMAT).to_string(), "2022-08-17T17:41:08");
    }

    #[test]
    fn signed_properties_canonicalize_with_own_declarations() {
        let props = SignedProperties {
            signing_time: signing_time_for(&unsigned()),
            certificate_digest: "ZGlnZXN0".into(),
            issuer_name: "CN=Test".into(),
            serial_number: "42".into(),
        };
        let canonical = CanonicalSerializer::new()
            .serialize_element(&props.to_element())
            .expect("canonicalize");
        let text = String::from_utf8(canonical.into_vec()).expect("utf-8");
        assert!(text.starts_with(&format!(
            "<xades:SignedProperties xmlns:xades=\"{XADES_NS}\" xmlns:ds=\"{DS_NS}\" Id=\"xadesSignedProperties\">"
        )));
        assert!(text.contains("<xades:SigningTime>2022-08-17T17:41:08</xades:SigningTime>"));
        assert!(text.contains("<ds:X509SerialNumber>42</ds:X509SerialNumber>"));
        assert_eq!(props.digest().expect("digest").len(), 88);
    }

    #[test]
    fn declare_signature_namespaces_adds_ext_only_once() {
        let mut document = unsigned();
        declare_signature_namespaces(&mut document);
        declare_signature_namespaces(&mut document);
        let declarations = document
            .root()
            .attributes()
            .iter()
            .filter(|attr| attr.namespace_binding().is_some())
            .count();
        assert_eq!(declarations, 4);
        assert_eq!(document.root().attribute("xmlns:ext"), Some(EXT_NS));
    }
}
