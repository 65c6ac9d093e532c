//! Invoice documents, the signing pipeline and the UBL template layer.
pub mod amount;
pub mod canonical;
pub mod chain;
pub mod document;
pub mod extension;
pub mod qr;
pub mod sign;
pub mod template;
pub mod verify;
pub mod xml;

pub use canonical::{CanonicalBytes, CanonicalSerializer, SerializationError};
pub use chain::{ChainError, ChainLink, InvoiceHash, PredecessorHash};
pub use document::{Attribute, Element, InvoiceDocument, Node, QName};
pub use qr::{QrCodeError, QrField, QrPayload, QrPhase};
pub use sign::{InvoiceSigner, SignedInvoice};
pub use template::{InvoiceTemplate, InvoiceTemplateBuilder, TemplateError};
pub use verify::{VerificationError, verify_document, verify_signed_invoice};

use isocountry::CountryCode;
use thiserror::Error;

pub use template::InvoiceField;

/// Every problem found while building a template, not just the first.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invoice template validation failed with {} issue(s)", issues.len())]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    pub fn has(&self, field: InvoiceField, kind: ValidationKind) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.field == field && issue.kind == kind)
    }
}

/// Single validation issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: InvoiceField,
    pub kind: ValidationKind,
    pub line_item_index: Option<usize>,
}

#[non_exhaustive]
/// Classification of validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    Missing,
    Empty,
    InvalidFormat,
    OutOfRange,
}

/// Postal address. Saudi addresses need a 4-digit building number and a
/// 5-digit postal code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub street: String,
    pub additional_street: Option<String>,
    pub building_number: String,
    pub additional_number: Option<String>,
    pub district: String,
    pub city: String,
    pub postal_code: String,
    pub subdivision: Option<String>,
    pub country_code: CountryCode,
}

/// Party identifier other than the VAT number (`CRN`, `MOM`, `NAT`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyId {
    pub scheme_id: String,
    pub value: String,
}

impl PartyId {
    pub fn new(scheme_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            scheme_id: scheme_id.into(),
            value: value.into(),
        }
    }
}

/// Supplier of the invoice; always VAT registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seller {
    pub registration_name: String,
    pub vat_number: String,
    pub party_id: Option<PartyId>,
    pub address: Address,
}

/// Customer. Simplified invoices may leave every field empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buyer {
    pub registration_name: Option<String>,
    pub vat_number: Option<String>,
    pub party_id: Option<PartyId>,
    pub address: Option<Address>,
}

/// Standard (B2B) or simplified (B2C) invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceSubType {
    Standard,
    Simplified,
}

/// Invoice being corrected by a credit or debit note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteReference {
    pub original_invoice_id: String,
    pub reason: String,
}

/// Document type with the data each one requires.
///
/// # Examples
/// ```rust
/// use fatoora_seal::invoice::{InvoiceSubType, InvoiceType};
///
/// let invoice_type = InvoiceType::Tax(InvoiceSubType::Simplified);
/// assert_eq!(invoice_type.code(), "388");
/// assert_eq!(invoice_type.name_code(), "0200000");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceType {
    Tax(InvoiceSubType),
    Prepayment(InvoiceSubType),
    CreditNote(InvoiceSubType, NoteReference),
    DebitNote(InvoiceSubType, NoteReference),
}

impl InvoiceType {
    /// UN/CEFACT 1001 code for `cbc:InvoiceTypeCode`.
    pub fn code(&self) -> &'static str {
        match self {
            InvoiceType::Tax(_) => "388",
            InvoiceType::Prepayment(_) => "386",
            InvoiceType::CreditNote(..) => "381",
            InvoiceType::DebitNote(..) => "383",
        }
    }

    pub fn sub_type(&self) -> InvoiceSubType {
        match self {
            InvoiceType::Tax(sub)
            | InvoiceType::Prepayment(sub)
            | InvoiceType::CreditNote(sub, _)
            | InvoiceType::DebitNote(sub, _) => *sub,
        }
    }

    pub fn is_simplified(&self) -> bool {
        self.sub_type() == InvoiceSubType::Simplified
    }

    /// `name` attribute of `cbc:InvoiceTypeCode`: the subtype digits followed
    /// by the third-party, nominal, export, summary and self-billed flags.
    pub fn name_code(&self) -> &'static str {
        match self.sub_type() {
            InvoiceSubType::Standard => "0100000",
            InvoiceSubType::Simplified => "0200000",
        }
    }

    pub fn note_reference(&self) -> Option<&NoteReference> {
        match self {
            InvoiceType::CreditNote(_, reference) | InvoiceType::DebitNote(_, reference) => {
                Some(reference)
            }
            _ => None,
        }
    }
}

/// VAT category (UNCL5305 subset used by ZATCA).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VatCategory {
    Exempt,
    Standard,
    Zero,
    OutOfScope,
}

impl VatCategory {
    pub fn code(&self) -> &'static str {
        match self {
            VatCategory::Exempt => "E",
            VatCategory::Standard => "S",
            VatCategory::Zero => "Z",
            VatCategory::OutOfScope => "O",
        }
    }
}

/// Invoice line with every amount already computed by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub description: String,
    pub quantity: f64,
    pub unit_code: String,
    pub unit_price: f64,
    pub net_amount: f64,
    pub vat_rate: f64,
    pub vat_amount: f64,
    pub amount_with_vat: f64,
    pub vat_category: VatCategory,
}

/// One `cac:TaxSubtotal` per VAT category and rate.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxSubtotal {
    pub category: VatCategory,
    pub percent: f64,
    pub taxable_amount: f64,
    pub tax_amount: f64,
    pub exemption_reason_code: Option<String>,
    pub exemption_reason: Option<String>,
}

/// Document totals, computed by the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Totals {
    pub line_extension_amount: f64,
    pub allowance_total_amount: Option<f64>,
    pub tax_exclusive_amount: f64,
    pub tax_amount: f64,
    pub tax_inclusive_amount: f64,
    pub prepaid_amount: Option<f64>,
    pub payable_amount: f64,
    pub subtotals: Vec<TaxSubtotal>,
}
