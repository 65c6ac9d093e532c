//! QR verification payload: tag-length-value fields, base64 encoded.
use std::collections::BTreeMap;

use base64ct::{Base64, Encoding};
use thiserror::Error;

use super::chain::InvoiceHash;
use super::document::{Element, InvoiceDocument};
pub use crate::config::QrPhase;
use crate::crypto::{CertificateInfo, InvoiceSignature};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QrCodeError {
    #[error("QR field {field:?} (tag {}) is {len} bytes, the limit is 255", .field.tag())]
    FieldTooLarge { field: QrField, len: usize },
    #[error("QR field {0:?} is required but missing")]
    MissingField(QrField),
    #[error("QR payload is {len} characters once base64 encoded, the limit is {max}")]
    EncodedTooLong { len: usize, max: usize },
    #[error("malformed QR payload: {0}")]
    Malformed(String),
}

pub type QrResult<T> = std::result::Result<T, QrCodeError>;

/// QR field; the discriminant is the TLV tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QrField {
    SellerName = 1,
    VatNumber = 2,
    Timestamp = 3,
    TotalWithVat = 4,
    VatTotal = 5,
    InvoiceHash = 6,
    Signature = 7,
    PublicKey = 8,
    CertificateSignature = 9,
}

impl QrField {
    pub const ALL: [QrField; 9] = [
        QrField::SellerName,
        QrField::VatNumber,
        QrField::Timestamp,
        QrField::TotalWithVat,
        QrField::VatTotal,
        QrField::InvoiceHash,
        QrField::Signature,
        QrField::PublicKey,
        QrField::CertificateSignature,
    ];

    pub const BASIC: [QrField; 5] = [
        QrField::SellerName,
        QrField::VatNumber,
        QrField::Timestamp,
        QrField::TotalWithVat,
        QrField::VatTotal,
    ];

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|field| field.tag() == tag)
    }

    pub fn label(self) -> &'static str {
        match self {
            QrField::SellerName => "seller name",
            QrField::VatNumber => "VAT registration number",
            QrField::Timestamp => "invoice timestamp",
            QrField::TotalWithVat => "invoice total with VAT",
            QrField::VatTotal => "VAT total",
            QrField::InvoiceHash => "invoice hash",
            QrField::Signature => "ECDSA signature",
            QrField::PublicKey => "ECDSA public key",
            QrField::CertificateSignature => "certificate signature",
        }
    }
}

impl QrPhase {
    /// Fields a payload must carry in this phase, in tag order.
    pub fn fields(&self) -> &'static [QrField] {
        match self {
            QrPhase::Basic => &QrField::BASIC,
            QrPhase::Enhanced => &QrField::ALL,
        }
    }
}

/// Field values of a QR payload, kept in tag order.
///
/// # Examples
/// ```rust
/// use fatoora_seal::invoice::qr::{QrField, QrPayload, QrPhase};
///
/// let payload = QrPayload::new()
///     .with_field(QrField::SellerName, "Acme")
///     .with_field(QrField::VatNumber, "399999999900003")
///     .with_field(QrField::Timestamp, "2024-01-01T12:30:00Z")
///     .with_field(QrField::TotalWithVat, "115.00")
///     .with_field(QrField::VatTotal, "15.00");
/// let encoded = payload.encode(QrPhase::Basic, 700)?;
/// assert_eq!(QrPayload::decode(&encoded)?, payload);
/// # Ok::<(), fatoora_seal::invoice::qr::QrCodeError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QrPayload {
    fields: BTreeMap<QrField, Vec<u8>>,
}

impl QrPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, field: QrField, value: impl Into<Vec<u8>>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: QrField, value: impl Into<Vec<u8>>) {
        self.fields.insert(field, value.into());
    }

    pub fn get(&self, field: QrField) -> Option<&[u8]> {
        self.fields.get(&field).map(Vec::as_slice)
    }

    /// Field value as UTF-8 text, if present and valid.
    pub fn get_str(&self, field: QrField) -> Option<&str> {
        self.get(field).and_then(|value| std::str::from_utf8(value).ok())
    }

    pub fn entries(&self) -> impl Iterator<Item = (QrField, &[u8])> {
        self.fields
            .iter()
            .map(|(field, value)| (*field, value.as_slice()))
    }

    /// Reads the five basic fields from a UBL invoice.
    pub fn from_document(document: &InvoiceDocument) -> QrResult<Self> {
        let root = document.root();
        let supplier = root.find_path(&["AccountingSupplierParty", "Party"]);
        let seller_name = required_text(
            supplier.and_then(|party| party.find_path(&["PartyLegalEntity", "RegistrationName"])),
            QrField::SellerName,
        )?;
        let seller_vat = required_text(
            supplier.and_then(|party| party.find_path(&["PartyTaxScheme", "CompanyID"])),
            QrField::VatNumber,
        )?;
        let issue_date = required_text(root.find_child("IssueDate"), QrField::Timestamp)?;
        let issue_time = required_text(root.find_child("IssueTime"), QrField::Timestamp)?;
        let total_with_vat = required_text(
            root.find_path(&["LegalMonetaryTotal", "TaxInclusiveAmount"]),
            QrField::TotalWithVat,
        )?;
        let vat_total = required_text(
            root.find_path(&["TaxTotal", "TaxAmount"]),
            QrField::VatTotal,
        )?;

        Ok(Self::new()
            .with_field(QrField::SellerName, seller_name)
            .with_field(QrField::VatNumber, seller_vat)
            .with_field(QrField::Timestamp, qr_timestamp(&issue_date, &issue_time))
            .with_field(QrField::TotalWithVat, total_with_vat)
            .with_field(QrField::VatTotal, vat_total))
    }

    /// Adds tags 6-9: hash and signature as their base64 text, the public
    /// key as DER `SubjectPublicKeyInfo`, the certificate signature raw.
    pub fn with_signing_parts(
        self,
        invoice_hash: &InvoiceHash,
        signature: &InvoiceSignature,
        certificate: &CertificateInfo,
    ) -> Self {
        self.with_field(QrField::InvoiceHash, invoice_hash.as_str())
            .with_field(QrField::Signature, signature.to_base64())
            .with_field(QrField::PublicKey, certificate.public_key_der())
            .with_field(QrField::CertificateSignature, certificate.signature())
    }

    /// Encodes the fields `phase` requires, in tag order. Fields outside the
    /// phase are left out.
    pub fn encode(&self, phase: QrPhase, max_len: usize) -> QrResult<String> {
        let mut tlv = TlvBuilder::new();
        for &field in phase.fields() {
            let value = self.get(field).ok_or(QrCodeError::MissingField(field))?;
            tlv.push_bytes(field, value)?;
        }
        tlv.finish(max_len)
    }

    /// Parses a base64 TLV payload.
    pub fn decode(encoded: &str) -> QrResult<Self> {
        let bytes = Base64::decode_vec(encoded.trim())
            .map_err(|e| QrCodeError::Malformed(format!("invalid base64: {e}")))?;
        let mut payload = Self::new();
        let mut rest = bytes.as_slice();
        while let [tag, len, tail @ ..] = rest {
            let field = QrField::from_tag(*tag)
                .ok_or_else(|| QrCodeError::Malformed(format!("unknown tag {tag}")))?;
            let len = *len as usize;
            if tail.len() < len {
                return Err(QrCodeError::Malformed(format!(
                    "tag {tag} declares {len} bytes, {} remain",
                    tail.len()
                )));
            }
            if payload.fields.contains_key(&field) {
                return Err(QrCodeError::Malformed(format!("tag {tag} repeated")));
            }
            let (value, next) = tail.split_at(len);
            payload.set(field, value);
            rest = next;
        }
        if !rest.is_empty() {
            return Err(QrCodeError::Malformed("truncated tag header".into()));
        }
        Ok(payload)
    }
}

/// `IssueDate` + `T` + `IssueTime`, with `Z` appended when the time has no zone.
fn qr_timestamp(issue_date: &str, issue_time: &str) -> String {
    let zoned = issue_time.ends_with('Z') || issue_time.contains(['+', '-']);
    if zoned {
        format!("{issue_date}T{issue_time}")
    } else {
        format!("{issue_date}T{issue_time}Z")
    }
}

fn required_text(element: Option<&Element>, field: QrField) -> QrResult<String> {
    let value = element
        .map(|element| element.text().trim().to_string())
        .unwrap_or_default();
    if value.is_empty() {
        return Err(QrCodeError::MissingField(field));
    }
    Ok(value)
}

struct TlvBuilder {
    bytes: Vec<u8>,
}

impl TlvBuilder {
    fn new() -> Self {
        Self {
            bytes: Vec::with_capacity(512),
        }
    }

    fn push_bytes(&mut self, field: QrField, value: &[u8]) -> QrResult<()> {
        let len = u8::try_from(value.len()).map_err(|_| QrCodeError::FieldTooLarge {
            field,
            len: value.len(),
        })?;
        self.bytes.push(field.tag());
        self.bytes.push(len);
        self.bytes.extend_from_slice(value);
        Ok(())
    }

    fn finish(self, max_len: usize) -> QrResult<String> {
        let encoded = Base64::encode_string(&self.bytes);
        if encoded.len() > max_len {
            return Err(QrCodeError::EncodedTooLong {
                len: encoded.len(),
                max: max_len,
            });
        }
        Ok(encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic_payload() -> QrPayload {
        QrPayload::new()
            .with_field(QrField::SellerName, "شركة توريد")
            .with_field(QrField::VatNumber, "399999999900003")
            .with_field(QrField::Timestamp, "2022-08-17T17:41:08Z")
            .with_field(QrField::TotalWithVat, "231.15")
            .with_field(QrField::VatTotal, "30.15")
    }

    #[test]
    fn length_byte_counts_utf8_bytes() {
        let encoded = basic_payload().encode(QrPhase::Basic, 700).expect("encode");
        let raw = Base64::decode_vec(&encoded).expect("base64");
        assert_eq!(raw[0], 1);
        assert_eq!(raw[1] as usize, "شركة توريد".len());
        assert_ne!("شركة توريد".len(), "شركة توريد".chars().count());
    }

    #[test]
    fn encodes_fields_in_tag_order() {
        let payload = QrPayload::new()
            .with_field(QrField::VatTotal, "5")
            .with_field(QrField::SellerName, "A")
            .with_field(QrField::Timestamp, "T")
            .with_field(QrField::VatNumber, "V")
            .with_field(QrField::TotalWithVat, "9");
        let encoded = payload.encode(QrPhase::Basic, 700).expect("encode");
        let raw = Base64::decode_vec(&encoded).expect("base64");
        assert_eq!(
            raw,
            [1, 1, b'A', 2, 1, b'V', 3, 1, b'T', 4, 1, b'9', 5, 1, b'5']
        );
    }

    #[test]
    fn basic_phase_ignores_signing_fields() {
        let payload = basic_payload().with_field(QrField::InvoiceHash, "hash");
        let decoded =
            QrPayload::decode(&payload.encode(QrPhase::Basic, 700).expect("encode")).expect("decode");
        assert_eq!(decoded, basic_payload());
    }

    #[test]
    fn enhanced_phase_requires_signing_fields() {
        assert_eq!(
            basic_payload().encode(QrPhase::Enhanced, 700),
            Err(QrCodeError::MissingField(QrField::InvoiceHash))
        );
    }

    #[test]
    fn field_of_255_bytes_fits_and_256_does_not() {
        let fits = basic_payload().with_field(QrField::SellerName, vec![b'a'; 255]);
        assert!(fits.encode(QrPhase::Basic, 700).is_ok());

        let too_large = basic_payload().with_field(QrField::SellerName, vec![b'a'; 256]);
        assert_eq!(
            too_large.encode(QrPhase::Basic, 700),
            Err(QrCodeError::FieldTooLarge {
                field: QrField::SellerName,
                len: 256
            })
        );
    }

    #[test]
    fn encoded_ceiling_is_enforced() {
        let err = basic_payload().encode(QrPhase::Basic, 10).expect_err("too long");
        assert!(matches!(err, QrCodeError::EncodedTooLong { max: 10, .. }));
    }

    #[test]
    fn decode_rejects_truncated_and_unknown_input() {
        let truncated = Base64::encode_string(&[1, 5, b'a']);
        assert!(matches!(
            QrPayload::decode(&truncated),
            Err(QrCodeError::Malformed(_))
        ));
        let unknown = Base64::encode_string(&[10, 1, b'a']);
        assert!(matches!(
            QrPayload::decode(&unknown),
            Err(QrCodeError::Malformed(_))
        ));
        let dangling = Base64::encode_string(&[1, 1, b'a', 2]);
        assert!(matches!(
            QrPayload::decode(&dangling),
            Err(QrCodeError::Malformed(_))
        ));
    }

    #[test]
    fn timestamp_keeps_existing_zone() {
        assert_eq!(qr_timestamp("2024-01-01", "12:30:00"), "2024-01-01T12:30:00Z");
        assert_eq!(qr_timestamp("2024-01-01", "12:30:00Z"), "2024-01-01T12:30:00Z");
        assert_eq!(
            qr_timestamp("2024-01-01", "12:30:00+03:00"),
            "2024-01-01T12:30:00+03:00"
        );
    }
}
