//! Verification of signed invoices.
//!
//! A document that does not match its claimed hash or its own signature is
//! reported as `Ok(false)`. Errors are reserved for input that cannot be
//! read at all: unparsable XML, a missing signature structure or an
//! unreadable certificate.
use thiserror::Error;
use tracing::{debug, warn};

use super::chain::{InvoiceHash, hash_document};
use super::document::{Element, InvoiceDocument};
use super::extension::signed_properties_digest;
use super::qr::QrPayload;
use super::xml::constants::{
    EXT_NS, INVOICE_REFERENCE_ID, QR_REFERENCE_ID, SIGNED_PROPERTIES_ID,
};
use crate::config::QrPhase;
use crate::crypto::{CertificateInfo, InvoiceSignature, verify_invoice_hash};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("signed invoice is missing {0}")]
    MissingElement(&'static str),
}

const SIGNATURE_PATH: [&str; 5] = [
    "UBLExtension",
    "ExtensionContent",
    "UBLDocumentSignatures",
    "SignatureInformation",
    "Signature",
];

/// Parses `xml` and runs [`verify_document`].
pub fn verify_signed_invoice(xml: &str, claimed_hash: &str) -> crate::Result<bool> {
    let document = InvoiceDocument::parse(xml)?;
    verify_document(&document, claimed_hash)
}

/// Recomputes the invoice hash, compares it with `claimed_hash` and with the
/// embedded digest, then checks the signature against the embedded
/// certificate, the signed-properties digest and, when present, every QR
/// tag against the document and its signature.
pub fn verify_document(document: &InvoiceDocument, claimed_hash: &str) -> crate::Result<bool> {
    let recomputed = hash_document(document)?;
    if recomputed.as_str() != claimed_hash.trim() {
        warn!(recomputed = %recomputed, "invoice hash does not match the claimed hash");
        return Ok(false);
    }

    let signature_element = document
        .find_root_child(EXT_NS, "UBLExtensions")
        .and_then(|extensions| extensions.find_path(&SIGNATURE_PATH))
        .ok_or(VerificationError::MissingElement("ds:Signature"))?;
    let signed_info = signature_element
        .find_child("SignedInfo")
        .ok_or(VerificationError::MissingElement("ds:SignedInfo"))?;

    let embedded_digest = reference_digest(signed_info, |r| r.attribute("Id") == Some(INVOICE_REFERENCE_ID))
        .ok_or(VerificationError::MissingElement("invoice digest reference"))?;
    if embedded_digest != recomputed.as_str() {
        warn!("embedded invoice digest does not match the recomputed hash");
        return Ok(false);
    }

    let certificate_text = signature_element
        .find_path(&["KeyInfo", "X509Data", "X509Certificate"])
        .ok_or(VerificationError::MissingElement("ds:X509Certificate"))?
        .text();
    let certificate = CertificateInfo::from_base64_der(&certificate_text)?;

    let signature_text = signature_element
        .find_child("SignatureValue")
        .ok_or(VerificationError::MissingElement("ds:SignatureValue"))?
        .text();
    let signature_text = signature_text.trim();
    let Ok(signature) = InvoiceSignature::from_base64(signature_text) else {
        warn!("signature value is not a DER ECDSA signature");
        return Ok(false);
    };
    if !verify_invoice_hash(recomputed.as_bytes(), &signature, certificate.public_key()) {
        warn!(invoice_hash = %recomputed, "signature does not verify against the certificate key");
        return Ok(false);
    }

    let signed_properties = signature_element
        .find_path(&["Object", "QualifyingProperties", "SignedProperties"])
        .ok_or(VerificationError::MissingElement("xades:SignedProperties"))?;
    let expected_reference = format!("#{SIGNED_PROPERTIES_ID}");
    let properties_digest = reference_digest(signed_info, |r| {
        r.attribute("URI") == Some(expected_reference.as_str())
    })
    .ok_or(VerificationError::MissingElement("signed properties reference"))?;
    if signed_properties_digest(signed_properties)? != properties_digest {
        warn!("signed properties digest does not match");
        return Ok(false);
    }
    let certificate_digest = signed_properties
        .find_path(&[
            "SignedSignatureProperties",
            "SigningCertificate",
            "Cert",
            "CertDigest",
            "DigestValue",
        ])
        .map(|e| e.text().trim().to_string());
    if certificate_digest.as_deref() != Some(certificate.digest().as_str()) {
        warn!("certificate digest does not match the embedded certificate");
        return Ok(false);
    }

    if let Some(qr_code) = document.document_reference(QR_REFERENCE_ID)
        && !qr_matches(document, &qr_code, &recomputed, &signature, &certificate)
    {
        return Ok(false);
    }

    debug!(invoice_hash = %recomputed, "signed invoice verified");
    Ok(true)
}

/// Every tag in the embedded QR must equal the value rebuilt from the
/// document and its signature; the basic tags must all be present.
fn qr_matches(
    document: &InvoiceDocument,
    qr_code: &str,
    invoice_hash: &InvoiceHash,
    signature: &InvoiceSignature,
    certificate: &CertificateInfo,
) -> bool {
    let Ok(embedded) = QrPayload::decode(qr_code) else {
        warn!("QR payload is malformed");
        return false;
    };
    let expected = match QrPayload::from_document(document) {
        Ok(payload) => payload.with_signing_parts(invoice_hash, signature, certificate),
        Err(err) => {
            warn!(error = %err, "QR fields cannot be read from the document");
            return false;
        }
    };
    if let Some(missing) = QrPhase::Basic
        .fields()
        .iter()
        .find(|field| embedded.get(**field).is_none())
    {
        warn!(tag = missing.tag(), "QR payload lacks a required tag");
        return false;
    }
    for (field, value) in embedded.entries() {
        if expected.get(field) != Some(value) {
            warn!(tag = field.tag(), "QR payload disagrees with the signed document");
            return false;
        }
    }
    true
}

fn reference_digest<F>(signed_info: &Element, predicate: F) -> Option<String>
where
    F: Fn(&Element) -> bool,
{
    signed_info
        .child_elements()
        .filter(|child| child.name().local_name() == "Reference")
        .find(|reference| predicate(reference))
        .and_then(|reference| reference.find_child("DigestValue"))
        .map(|digest| digest.text().trim().to_string())
}
