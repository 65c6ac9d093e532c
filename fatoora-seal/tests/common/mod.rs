use std::path::{Path, PathBuf};

use fatoora_seal::crypto::{CertificateInfo, PrivateKey};
use fatoora_seal::invoice::InvoiceDocument;

#[allow(dead_code)]
pub fn fixture_path(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(relative)
}

#[allow(dead_code)]
pub fn read_fixture(relative: &str) -> String {
    std::fs::read_to_string(fixture_path(relative)).expect("read fixture")
}

#[allow(dead_code)]
pub fn invoice_xml() -> String {
    read_fixture("invoices/simplified-invoice.xml")
}

#[allow(dead_code)]
pub fn invoice_document() -> InvoiceDocument {
    InvoiceDocument::parse(&invoice_xml()).expect("parse invoice fixture")
}

#[allow(dead_code)]
pub fn signing_certificate() -> CertificateInfo {
    CertificateInfo::from_pem(&read_fixture("certs/signing-cert.pem")).expect("certificate")
}

#[allow(dead_code)]
pub fn signing_key() -> PrivateKey {
    PrivateKey::from_pem(&read_fixture("keys/signing-key.pem")).expect("signing key")
}

#[allow(dead_code)]
pub fn other_key() -> PrivateKey {
    PrivateKey::from_pem(&read_fixture("keys/other-key.pem")).expect("other key")
}

/// Replaces the first occurrence of `from` in the fixture invoice.
#[allow(dead_code)]
pub fn invoice_with(from: &str, to: &str) -> InvoiceDocument {
    let xml = invoice_xml();
    assert!(xml.contains(from), "fixture does not contain {from}");
    InvoiceDocument::parse(&xml.replacen(from, to, 1)).expect("parse edited invoice")
}
