//! Signing pipeline: chain, hash, sign, embed, encode the QR payload.
use base64ct::{Base64, Encoding};
use tracing::debug;

use super::chain::{ChainLink, InvoiceHash, PredecessorHash, hash_document};
use super::document::InvoiceDocument;
use super::extension::{
    SignedDocumentBuilder, SignedProperties, declare_signature_namespaces, signing_time_for,
};
use super::qr::QrPayload;
use crate::config::Config;
use crate::crypto::{
    CertificateInfo, InvoiceSignature, PrivateKey, ensure_key_matches, sign_invoice_hash,
};

/// Signs invoices for one signing unit (one CSID certificate).
///
/// The private key is passed per call and never stored.
///
/// # Examples
/// ```rust,no_run
/// use fatoora_seal::crypto::PrivateKey;
/// use fatoora_seal::invoice::InvoiceSigner;
/// use fatoora_seal::invoice::chain::ChainLink;
///
/// let signer = InvoiceSigner::from_pem(&std::fs::read_to_string("cert.pem")?)?;
/// let key = PrivateKey::from_pem(&std::fs::read_to_string("key.pem")?)?;
/// let signed = signer.sign_xml(&std::fs::read_to_string("invoice.xml")?, &ChainLink::First, &key)?;
/// println!("{} {}", signed.invoice_hash(), signed.qr_code());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct InvoiceSigner {
    certificate: CertificateInfo,
    config: Config,
}

impl InvoiceSigner {
    pub fn new(certificate: CertificateInfo) -> Self {
        Self {
            certificate,
            config: Config::default(),
        }
    }

    pub fn from_pem(cert_pem: &str) -> crate::Result<Self> {
        Ok(Self::new(CertificateInfo::from_pem(cert_pem)?))
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn certificate(&self) -> &CertificateInfo {
        &self.certificate
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Produces a signed copy of `document`. Either every step succeeds or
    /// an error is returned; nothing partial escapes.
    ///
    /// # Errors
    /// [`SigningError::KeyMismatch`](crate::crypto::SigningError::KeyMismatch)
    /// is raised before anything is hashed or signed when `key` does not
    /// belong to the certificate.
    pub fn sign(
        &self,
        document: &InvoiceDocument,
        link: &ChainLink,
        key: &PrivateKey,
    ) -> crate::Result<SignedInvoice> {
        ensure_key_matches(key, &self.certificate)?;

        let predecessor = link.predecessor();
        let mut chained = link.apply(document)?;
        declare_signature_namespaces(&mut chained);
        debug!(predecessor = %predecessor, genesis = predecessor.is_genesis(), "invoice chained");

        let invoice_hash = hash_document(&chained)?;
        debug!(invoice_hash = %invoice_hash, "invoice hashed");

        let signature = sign_invoice_hash(invoice_hash.as_bytes(), key)?;
        let signed_properties = SignedProperties::new(signing_time_for(&chained), &self.certificate);
        debug!(invoice_hash = %invoice_hash, "invoice hash signed");

        let qr_code = QrPayload::from_document(&chained)?
            .with_signing_parts(&invoice_hash, &signature, &self.certificate)
            .encode(self.config.qr_phase(), self.config.max_qr_length())?;
        let document = SignedDocumentBuilder::new(
            &chained,
            &invoice_hash,
            &signature,
            &self.certificate,
            signed_properties,
        )
        .qr_code(qr_code.as_str())
        .build()?;
        let xml = document.to_xml()?;
        debug!(
            invoice_hash = %invoice_hash,
            phase = self.config.qr_phase().as_str(),
            qr_len = qr_code.len(),
            "invoice finalized"
        );

        Ok(SignedInvoice {
            document,
            xml,
            invoice_hash,
            signature,
            qr_code,
            predecessor,
        })
    }

    /// Parses `xml` and signs it.
    pub fn sign_xml(
        &self,
        xml: &str,
        link: &ChainLink,
        key: &PrivateKey,
    ) -> crate::Result<SignedInvoice> {
        let document = InvoiceDocument::parse(xml)?;
        self.sign(&document, link, key)
    }
}

/// Output of one signing operation. All parts agree with each other: the QR
/// payload carries `invoice_hash` and `signature`, and so does the document.
#[derive(Debug, Clone)]
pub struct SignedInvoice {
    document: InvoiceDocument,
    xml: String,
    invoice_hash: InvoiceHash,
    signature: InvoiceSignature,
    qr_code: String,
    predecessor: PredecessorHash,
}

impl SignedInvoice {
    pub fn document(&self) -> &InvoiceDocument {
        &self.document
    }

    pub fn xml(&self) -> &str {
        &self.xml
    }

    pub fn into_xml(self) -> String {
        self.xml
    }

    pub fn invoice_hash(&self) -> &InvoiceHash {
        &self.invoice_hash
    }

    pub fn signature(&self) -> &InvoiceSignature {
        &self.signature
    }

    pub fn qr_code(&self) -> &str {
        &self.qr_code
    }

    pub fn predecessor(&self) -> &PredecessorHash {
        &self.predecessor
    }

    /// Link for the next invoice of the same signing unit.
    pub fn next_link(&self) -> ChainLink {
        ChainLink::after(&self.invoice_hash)
    }

    pub fn to_xml_base64(&self) -> String {
        Base64::encode_string(self.xml.as_bytes())
    }
}
