//! Typed UBL invoice template.
//!
//! Each document section has a fixed, ordered list of fields with a presence
//! rule. [`InvoiceTemplateBuilder::build`] checks every rule and reports all
//! failures at once; [`InvoiceTemplate::to_document`] then renders UBL in
//! the order ZATCA mandates. No tax arithmetic happens here: amounts are
//! taken as given and written with [`to_fixed_no_rounding`].
use chrono::NaiveDateTime;
use iso_currency::Currency;
use isocountry::CountryCode;
use thiserror::Error;

use super::amount::to_fixed_no_rounding;
use super::document::{Element, InvoiceDocument};
use super::xml::constants::{CAC_NS, CBC_NS, EXT_NS, INVOICE_NS};
use super::{
    Address, Buyer, InvoiceType, LineItem, Seller, Totals, ValidationError, ValidationIssue,
    ValidationKind,
};

const PROFILE_ID: &str = "reporting:1.0";
const TAX_CURRENCY: &str = "SAR";
const AMOUNT_PRECISION: usize = 2;
const QUANTITY_PRECISION: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Document section, in rendering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Header,
    Seller,
    Buyer,
    Line,
    Totals,
}

impl Section {
    pub const ORDER: [Section; 5] = [
        Section::Header,
        Section::Seller,
        Section::Buyer,
        Section::Line,
        Section::Totals,
    ];

    /// Fields of this section in the order they are rendered.
    pub fn rules(self) -> &'static [FieldRule] {
        match self {
            Section::Header => HEADER_RULES,
            Section::Seller => SELLER_RULES,
            Section::Buyer => BUYER_RULES,
            Section::Line => LINE_RULES,
            Section::Totals => TOTALS_RULES,
        }
    }
}

const HEADER_RULES: &[FieldRule] = &[
    FieldRule::new(InvoiceField::Id, Presence::Required),
    FieldRule::new(InvoiceField::Uuid, Presence::Required),
    FieldRule::new(InvoiceField::IssueDateTime, Presence::Required),
    FieldRule::new(InvoiceField::Note, Presence::Optional),
    FieldRule::new(InvoiceField::Currency, Presence::Required),
    FieldRule::new(InvoiceField::BillingReference, Presence::RequiredForNotes),
    FieldRule::new(InvoiceField::InvoiceCounter, Presence::Required),
    FieldRule::new(InvoiceField::PaymentMeansCode, Presence::RequiredForNotes),
    FieldRule::new(InvoiceField::NoteReason, Presence::RequiredForNotes),
    FieldRule::new(InvoiceField::LineItems, Presence::Required),
];

const SELLER_RULES: &[FieldRule] = &[
    FieldRule::new(InvoiceField::SellerPartyId, Presence::Optional),
    FieldRule::new(InvoiceField::SellerStreet, Presence::Required),
    FieldRule::new(InvoiceField::SellerBuildingNumber, Presence::Required),
    FieldRule::new(InvoiceField::SellerDistrict, Presence::Required),
    FieldRule::new(InvoiceField::SellerCity, Presence::Required),
    FieldRule::new(InvoiceField::SellerPostalCode, Presence::Required),
    FieldRule::new(InvoiceField::SellerVatNumber, Presence::Required),
    FieldRule::new(InvoiceField::SellerName, Presence::Required),
];

const BUYER_RULES: &[FieldRule] = &[
    FieldRule::new(InvoiceField::BuyerPartyId, Presence::Optional),
    FieldRule::new(InvoiceField::BuyerAddress, Presence::RequiredForStandard),
    FieldRule::new(InvoiceField::BuyerVatNumber, Presence::Optional),
    FieldRule::new(InvoiceField::BuyerName, Presence::RequiredForStandard),
];

const LINE_RULES: &[FieldRule] = &[
    FieldRule::new(InvoiceField::LineQuantity, Presence::Required),
    FieldRule::new(InvoiceField::LineUnitCode, Presence::Required),
    FieldRule::new(InvoiceField::LineNetAmount, Presence::Required),
    FieldRule::new(InvoiceField::LineVatAmount, Presence::Required),
    FieldRule::new(InvoiceField::LineAmountWithVat, Presence::Required),
    FieldRule::new(InvoiceField::LineDescription, Presence::Required),
    FieldRule::new(InvoiceField::LineVatRate, Presence::Required),
    FieldRule::new(InvoiceField::LineUnitPrice, Presence::Required),
];

const TOTALS_RULES: &[FieldRule] = &[
    FieldRule::new(InvoiceField::TaxAmount, Presence::Required),
    FieldRule::new(InvoiceField::TaxSubtotals, Presence::Required),
    FieldRule::new(InvoiceField::LineExtensionAmount, Presence::Required),
    FieldRule::new(InvoiceField::TaxExclusiveAmount, Presence::Required),
    FieldRule::new(InvoiceField::TaxInclusiveAmount, Presence::Required),
    FieldRule::new(InvoiceField::AllowanceTotalAmount, Presence::Optional),
    FieldRule::new(InvoiceField::PrepaidAmount, Presence::Optional),
    FieldRule::new(InvoiceField::PayableAmount, Presence::Required),
];

#[non_exhaustive]
/// Template field named in validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceField {
    Id,
    Uuid,
    IssueDateTime,
    Note,
    Currency,
    BillingReference,
    InvoiceCounter,
    PaymentMeansCode,
    NoteReason,
    LineItems,
    SellerPartyId,
    SellerStreet,
    SellerBuildingNumber,
    SellerDistrict,
    SellerCity,
    SellerPostalCode,
    SellerVatNumber,
    SellerName,
    BuyerPartyId,
    BuyerAddress,
    BuyerVatNumber,
    BuyerName,
    LineQuantity,
    LineUnitCode,
    LineNetAmount,
    LineVatAmount,
    LineAmountWithVat,
    LineDescription,
    LineVatRate,
    LineUnitPrice,
    TaxAmount,
    TaxSubtotals,
    LineExtensionAmount,
    TaxExclusiveAmount,
    TaxInclusiveAmount,
    AllowanceTotalAmount,
    PrepaidAmount,
    PayableAmount,
}

/// When a field must be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
    /// Required on standard (B2B) documents.
    RequiredForStandard,
    /// Required on credit and debit notes.
    RequiredForNotes,
}

impl Presence {
    fn applies(self, invoice_type: &InvoiceType) -> bool {
        match self {
            Presence::Required => true,
            Presence::Optional => false,
            Presence::RequiredForStandard => !invoice_type.is_simplified(),
            Presence::RequiredForNotes => invoice_type.note_reference().is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub field: InvoiceField,
    pub presence: Presence,
}

impl FieldRule {
    const fn new(field: InvoiceField, presence: Presence) -> Self {
        Self { field, presence }
    }
}

enum FieldValue<'a> {
    Absent,
    Text(&'a str),
    Amount(f64),
    Count(usize),
    Present,
}

/// Validated invoice content, ready to render.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceTemplate {
    invoice_type: InvoiceType,
    id: String,
    uuid: String,
    issue_datetime: NaiveDateTime,
    currency: Currency,
    invoice_counter: u64,
    note: Option<(String, String)>,
    payment_means_code: Option<String>,
    seller: Seller,
    buyer: Buyer,
    lines: Vec<LineItem>,
    totals: Totals,
}

/// Collects template fields; nothing is checked until [`build`](Self::build).
///
/// # Examples
/// ```rust
/// use fatoora_seal::invoice::{
///     Address, InvoiceField, InvoiceSubType, InvoiceTemplate, InvoiceType, Seller,
///     TemplateError, ValidationKind,
/// };
/// use isocountry::CountryCode;
///
/// let seller = Seller {
///     registration_name: "Acme".into(),
///     vat_number: "399999999900003".into(),
///     party_id: None,
///     address: Address {
///         street: "King Fahd".into(),
///         additional_street: None,
///         building_number: "1234".into(),
///         additional_number: None,
///         district: "Olaya".into(),
///         city: "Riyadh".into(),
///         postal_code: "12222".into(),
///         subdivision: None,
///         country_code: CountryCode::SAU,
///     },
/// };
/// let err = InvoiceTemplate::builder(InvoiceType::Tax(InvoiceSubType::Simplified), seller)
///     .build()
///     .unwrap_err();
/// let TemplateError::Validation(err) = err;
/// assert!(err.has(InvoiceField::Id, ValidationKind::Missing));
/// assert!(err.has(InvoiceField::LineItems, ValidationKind::Missing));
/// ```
#[derive(Debug, Clone)]
pub struct InvoiceTemplateBuilder {
    invoice_type: InvoiceType,
    seller: Seller,
    id: Option<String>,
    uuid: Option<String>,
    issue_datetime: Option<NaiveDateTime>,
    currency: Option<Currency>,
    invoice_counter: Option<u64>,
    note: Option<(String, String)>,
    payment_means_code: Option<String>,
    buyer: Buyer,
    lines: Vec<LineItem>,
    totals: Option<Totals>,
}

impl InvoiceTemplate {
    pub fn builder(invoice_type: InvoiceType, seller: Seller) -> InvoiceTemplateBuilder {
        InvoiceTemplateBuilder {
            invoice_type,
            seller,
            id: None,
            uuid: None,
            issue_datetime: None,
            currency: None,
            invoice_counter: None,
            note: None,
            payment_means_code: None,
            buyer: Buyer::default(),
            lines: Vec::new(),
            totals: None,
        }
    }

    pub fn invoice_type(&self) -> &InvoiceType {
        &self.invoice_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn issue_datetime(&self) -> NaiveDateTime {
        self.issue_datetime
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn invoice_counter(&self) -> u64 {
        self.invoice_counter
    }

    pub fn seller(&self) -> &Seller {
        &self.seller
    }

    pub fn buyer(&self) -> &Buyer {
        &self.buyer
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    pub fn totals(&self) -> &Totals {
        &self.totals
    }

    /// Renders the unsigned UBL document. The predecessor hash, QR code and
    /// signature are added by the signing pipeline.
    pub fn to_document(&self) -> InvoiceDocument {
        let currency = self.currency.code();
        let mut root = Element::new("Invoice")
            .with_attribute("xmlns", INVOICE_NS)
            .with_attribute("xmlns:cac", CAC_NS)
            .with_attribute("xmlns:cbc", CBC_NS)
            .with_attribute("xmlns:ext", EXT_NS)
            .with_child(text("cbc:ProfileID", PROFILE_ID))
            .with_child(text("cbc:ID", &self.id))
            .with_child(text("cbc:UUID", &self.uuid))
            .with_child(text(
                "cbc:IssueDate",
                self.issue_datetime.format("%Y-%m-%d").to_string(),
            ))
            .with_child(text(
                "cbc:IssueTime",
                self.issue_datetime.format("%H:%M:%S").to_string(),
            ))
            .with_child(
                text("cbc:InvoiceTypeCode", self.invoice_type.code())
                    .with_attribute("name", self.invoice_type.name_code()),
            );
        if let Some((language, note)) = &self.note {
            root.push_child(text("cbc:Note", note).with_attribute("languageID", language));
        }
        root.push_child(text("cbc:DocumentCurrencyCode", currency));
        root.push_child(text("cbc:TaxCurrencyCode", TAX_CURRENCY));
        if let Some(reference) = self.invoice_type.note_reference() {
            root.push_child(
                Element::new("cac:BillingReference").with_child(
                    Element::new("cac:InvoiceDocumentReference")
                        .with_child(text("cbc:ID", &reference.original_invoice_id)),
                ),
            );
        }
        root.push_child(
            Element::new("cac:AdditionalDocumentReference")
                .with_child(text("cbc:ID", "ICV"))
                .with_child(text("cbc:UUID", self.invoice_counter.to_string())),
        );
        root.push_child(
            Element::new("cac:AccountingSupplierParty").with_child(self.seller_party()),
        );
        let mut customer = Element::new("cac:AccountingCustomerParty");
        if let Some(party) = self.buyer_party() {
            customer.push_child(party);
        }
        root.push_child(customer);
        if let Some(code) = &self.payment_means_code {
            let mut means = Element::new("cac:PaymentMeans").with_child(text("cbc:PaymentMeansCode", code));
            if let Some(reference) = self.invoice_type.note_reference() {
                means.push_child(text("cbc:InstructionNote", &reference.reason));
            }
            root.push_child(means);
        }

        let totals = &self.totals;
        root.push_child(
            Element::new("cac:TaxTotal").with_child(amount("cbc:TaxAmount", totals.tax_amount, TAX_CURRENCY)),
        );
        let mut tax_total =
            Element::new("cac:TaxTotal").with_child(amount("cbc:TaxAmount", totals.tax_amount, currency));
        for subtotal in &totals.subtotals {
            let mut category = Element::new("cac:TaxCategory")
                .with_child(
                    text("cbc:ID", subtotal.category.code())
                        .with_attribute("schemeID", "UN/ECE 5305")
                        .with_attribute("schemeAgencyID", "6"),
                )
                .with_child(text("cbc:Percent", to_fixed_no_rounding(subtotal.percent, AMOUNT_PRECISION)));
            if let Some(code) = &subtotal.exemption_reason_code {
                category.push_child(text("cbc:TaxExemptionReasonCode", code));
            }
            if let Some(reason) = &subtotal.exemption_reason {
                category.push_child(text("cbc:TaxExemptionReason", reason));
            }
            category.push_child(vat_scheme());
            tax_total.push_child(
                Element::new("cac:TaxSubtotal")
                    .with_child(amount("cbc:TaxableAmount", subtotal.taxable_amount, currency))
                    .with_child(amount("cbc:TaxAmount", subtotal.tax_amount, currency))
                    .with_child(category),
            );
        }
        root.push_child(tax_total);

        let mut monetary = Element::new("cac:LegalMonetaryTotal")
            .with_child(amount("cbc:LineExtensionAmount", totals.line_extension_amount, currency))
            .with_child(amount("cbc:TaxExclusiveAmount", totals.tax_exclusive_amount, currency))
            .with_child(amount("cbc:TaxInclusiveAmount", totals.tax_inclusive_amount, currency));
        if let Some(allowance) = totals.allowance_total_amount {
            monetary.push_child(amount("cbc:AllowanceTotalAmount", allowance, currency));
        }
        if let Some(prepaid) = totals.prepaid_amount {
            monetary.push_child(amount("cbc:PrepaidAmount", prepaid, currency));
        }
        monetary.push_child(amount("cbc:PayableAmount", totals.payable_amount, currency));
        root.push_child(monetary);

        for (index, line) in self.lines.iter().enumerate() {
            root.push_child(invoice_line(index + 1, line, currency));
        }
        InvoiceDocument::new(root)
    }

    fn seller_party(&self) -> Element {
        let seller = &self.seller;
        let mut party = Element::new("cac:Party");
        if let Some(id) = &seller.party_id {
            party.push_child(party_identification(&id.scheme_id, &id.value));
        }
        party
            .with_child(postal_address(&seller.address))
            .with_child(party_tax_scheme(&seller.vat_number))
            .with_child(legal_entity(&seller.registration_name))
    }

    fn buyer_party(&self) -> Option<Element> {
        let buyer = &self.buyer;
        if buyer.registration_name.is_none()
            && buyer.address.is_none()
            && buyer.vat_number.is_none()
            && buyer.party_id.is_none()
        {
            return None;
        }
        let mut party = Element::new("cac:Party");
        if let Some(id) = &buyer.party_id {
            party.push_child(party_identification(&id.scheme_id, &id.value));
        }
        if let Some(address) = &buyer.address {
            party.push_child(postal_address(address));
        }
        match &buyer.vat_number {
            Some(vat) => party.push_child(party_tax_scheme(vat)),
            None => party.push_child(
                Element::new("cac:PartyTaxScheme").with_child(vat_scheme()),
            ),
        }
        if let Some(name) = &buyer.registration_name {
            party.push_child(legal_entity(name));
        }
        Some(party)
    }
}

impl InvoiceTemplateBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    pub fn issue_datetime(mut self, issue_datetime: NaiveDateTime) -> Self {
        self.issue_datetime = Some(issue_datetime);
        self
    }

    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    /// Invoice counter value (`ICV`) of the signing unit.
    pub fn invoice_counter(mut self, counter: u64) -> Self {
        self.invoice_counter = Some(counter);
        self
    }

    pub fn note(mut self, language: impl Into<String>, text: impl Into<String>) -> Self {
        self.note = Some((language.into(), text.into()));
        self
    }

    pub fn payment_means_code(mut self, code: impl Into<String>) -> Self {
        self.payment_means_code = Some(code.into());
        self
    }

    pub fn buyer(mut self, buyer: Buyer) -> Self {
        self.buyer = buyer;
        self
    }

    pub fn line(mut self, line: LineItem) -> Self {
        self.lines.push(line);
        self
    }

    pub fn totals(mut self, totals: Totals) -> Self {
        self.totals = Some(totals);
        self
    }

    /// Checks every section's rules and returns the template or all issues.
    pub fn build(self) -> Result<InvoiceTemplate, TemplateError> {
        let issues = self.validate();
        if !issues.is_empty() {
            return Err(ValidationError::new(issues).into());
        }

        let missing = |field| {
            TemplateError::from(ValidationError::new(vec![ValidationIssue {
                field,
                kind: ValidationKind::Missing,
                line_item_index: None,
            }]))
        };
        let id = self.id.ok_or_else(|| missing(InvoiceField::Id))?;
        let uuid = self.uuid.ok_or_else(|| missing(InvoiceField::Uuid))?;
        let issue_datetime = self
            .issue_datetime
            .ok_or_else(|| missing(InvoiceField::IssueDateTime))?;
        let currency = self.currency.ok_or_else(|| missing(InvoiceField::Currency))?;
        let invoice_counter = self
            .invoice_counter
            .ok_or_else(|| missing(InvoiceField::InvoiceCounter))?;
        let totals = self.totals.ok_or_else(|| missing(InvoiceField::TaxAmount))?;

        Ok(InvoiceTemplate {
            invoice_type: self.invoice_type,
            id,
            uuid,
            issue_datetime,
            currency,
            invoice_counter,
            note: self.note,
            payment_means_code: self.payment_means_code,
            seller: self.seller,
            buyer: self.buyer,
            lines: self.lines,
            totals,
        })
    }

    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        for section in Section::ORDER {
            if section == Section::Line {
                for index in 0..self.lines.len() {
                    self.check_rules(section, Some(index), &mut issues);
                }
            } else {
                self.check_rules(section, None, &mut issues);
            }
        }
        issues
    }

    fn check_rules(&self, section: Section, line: Option<usize>, issues: &mut Vec<ValidationIssue>) {
        for rule in section.rules() {
            let required = rule.presence.applies(&self.invoice_type);
            let kind = match self.value(rule.field, line) {
                FieldValue::Absent if required => Some(ValidationKind::Missing),
                FieldValue::Absent => None,
                FieldValue::Count(0) if required => Some(ValidationKind::Missing),
                FieldValue::Text(value) if value.trim().is_empty() => Some(ValidationKind::Empty),
                FieldValue::Text(value) => check_format(rule.field, value, &self.seller.address),
                FieldValue::Amount(value) if !value.is_finite() => Some(ValidationKind::InvalidFormat),
                FieldValue::Amount(value) if value < 0.0 => Some(ValidationKind::OutOfRange),
                FieldValue::Amount(value)
                    if rule.field == InvoiceField::LineQuantity && value == 0.0 =>
                {
                    Some(ValidationKind::OutOfRange)
                }
                _ => None,
            };
            if let Some(kind) = kind {
                issues.push(ValidationIssue {
                    field: rule.field,
                    kind,
                    line_item_index: line,
                });
            }
        }
    }

    fn value(&self, field: InvoiceField, line: Option<usize>) -> FieldValue<'_> {
        use InvoiceField::*;
        let line = line.and_then(|index| self.lines.get(index));
        let totals = self.totals.as_ref();
        let seller = &self.seller;
        let note_reference = self.invoice_type.note_reference();

        match field {
            Id => text_value(self.id.as_ref()),
            Uuid => text_value(self.uuid.as_ref()),
            IssueDateTime => present(self.issue_datetime.is_some()),
            Note => text_value(self.note.as_ref().map(|(_, note)| note)),
            InvoiceField::Currency => present(self.currency.is_some()),
            BillingReference => text_value(note_reference.map(|r| &r.original_invoice_id)),
            InvoiceCounter => present(self.invoice_counter.is_some()),
            PaymentMeansCode => text_value(self.payment_means_code.as_ref()),
            NoteReason => text_value(note_reference.map(|r| &r.reason)),
            LineItems => FieldValue::Count(self.lines.len()),
            SellerPartyId => text_value(seller.party_id.as_ref().map(|id| &id.value)),
            SellerStreet => FieldValue::Text(&seller.address.street),
            SellerBuildingNumber => FieldValue::Text(&seller.address.building_number),
            SellerDistrict => FieldValue::Text(&seller.address.district),
            SellerCity => FieldValue::Text(&seller.address.city),
            SellerPostalCode => FieldValue::Text(&seller.address.postal_code),
            SellerVatNumber => FieldValue::Text(&seller.vat_number),
            SellerName => FieldValue::Text(&seller.registration_name),
            BuyerPartyId => text_value(self.buyer.party_id.as_ref().map(|id| &id.value)),
            BuyerAddress => present(self.buyer.address.is_some()),
            BuyerVatNumber => text_value(self.buyer.vat_number.as_ref()),
            BuyerName => text_value(self.buyer.registration_name.as_ref()),
            LineQuantity => amount_value(line.map(|l| l.quantity)),
            LineUnitCode => text_value(line.map(|l| &l.unit_code)),
            LineNetAmount => amount_value(line.map(|l| l.net_amount)),
            LineVatAmount => amount_value(line.map(|l| l.vat_amount)),
            LineAmountWithVat => amount_value(line.map(|l| l.amount_with_vat)),
            LineDescription => text_value(line.map(|l| &l.description)),
            LineVatRate => amount_value(line.map(|l| l.vat_rate)),
            LineUnitPrice => amount_value(line.map(|l| l.unit_price)),
            TaxAmount => amount_value(totals.map(|t| t.tax_amount)),
            TaxSubtotals => totals.map_or(FieldValue::Absent, |t| FieldValue::Count(t.subtotals.len())),
            LineExtensionAmount => amount_value(totals.map(|t| t.line_extension_amount)),
            TaxExclusiveAmount => amount_value(totals.map(|t| t.tax_exclusive_amount)),
            TaxInclusiveAmount => amount_value(totals.map(|t| t.tax_inclusive_amount)),
            AllowanceTotalAmount => amount_value(totals.and_then(|t| t.allowance_total_amount)),
            PrepaidAmount => amount_value(totals.and_then(|t| t.prepaid_amount)),
            PayableAmount => amount_value(totals.map(|t| t.payable_amount)),
        }
    }
}

fn text_value(value: Option<&String>) -> FieldValue<'_> {
    value.map_or(FieldValue::Absent, |v| FieldValue::Text(v.as_str()))
}

fn amount_value<'a>(value: Option<f64>) -> FieldValue<'a> {
    value.map_or(FieldValue::Absent, FieldValue::Amount)
}

fn present<'a>(is_present: bool) -> FieldValue<'a> {
    if is_present {
        FieldValue::Present
    } else {
        FieldValue::Absent
    }
}

/// Format rules for Saudi identifiers: VAT numbers are 15 digits starting
/// and ending with 3, building numbers 4 digits, postal codes 5 digits.
fn check_format(field: InvoiceField, value: &str, seller_address: &Address) -> Option<ValidationKind> {
    let value = value.trim();
    let digits = |len: usize| value.len() == len && value.bytes().all(|b| b.is_ascii_digit());
    let valid = match field {
        InvoiceField::SellerVatNumber | InvoiceField::BuyerVatNumber => {
            digits(15) && value.starts_with('3') && value.ends_with('3')
        }
        InvoiceField::SellerBuildingNumber if seller_address.country_code == CountryCode::SAU => {
            digits(4)
        }
        InvoiceField::SellerPostalCode if seller_address.country_code == CountryCode::SAU => {
            digits(5)
        }
        _ => true,
    };
    (!valid).then_some(ValidationKind::InvalidFormat)
}

fn text(name: &str, value: impl Into<String>) -> Element {
    Element::new(name).with_text(value)
}

fn amount(name: &str, value: f64, currency: &str) -> Element {
    text(name, to_fixed_no_rounding(value, AMOUNT_PRECISION)).with_attribute("currencyID", currency)
}

fn vat_scheme() -> Element {
    Element::new("cac:TaxScheme").with_child(text("cbc:ID", "VAT"))
}

fn party_identification(scheme_id: &str, value: &str) -> Element {
    Element::new("cac:PartyIdentification")
        .with_child(text("cbc:ID", value).with_attribute("schemeID", scheme_id))
}

fn party_tax_scheme(vat_number: &str) -> Element {
    Element::new("cac:PartyTaxScheme")
        .with_child(text("cbc:CompanyID", vat_number))
        .with_child(vat_scheme())
}

fn legal_entity(name: &str) -> Element {
    Element::new("cac:PartyLegalEntity").with_child(text("cbc:RegistrationName", name))
}

fn postal_address(address: &Address) -> Element {
    let mut element = Element::new("cac:PostalAddress").with_child(text("cbc:StreetName", &address.street));
    if let Some(additional) = &address.additional_street {
        element.push_child(text("cbc:AdditionalStreetName", additional));
    }
    element.push_child(text("cbc:BuildingNumber", &address.building_number));
    if let Some(plot) = &address.additional_number {
        element.push_child(text("cbc:PlotIdentification", plot));
    }
    element.push_child(text("cbc:CitySubdivisionName", &address.district));
    element.push_child(text("cbc:CityName", &address.city));
    element.push_child(text("cbc:PostalZone", &address.postal_code));
    if let Some(subdivision) = &address.subdivision {
        element.push_child(text("cbc:CountrySubentity", subdivision));
    }
    element.with_child(
        Element::new("cac:Country").with_child(text("cbc:IdentificationCode", address.country_code.alpha2())),
    )
}

fn invoice_line(id: usize, line: &LineItem, currency: &str) -> Element {
    Element::new("cac:InvoiceLine")
        .with_child(text("cbc:ID", id.to_string()))
        .with_child(
            text("cbc:InvoicedQuantity", to_fixed_no_rounding(line.quantity, QUANTITY_PRECISION))
                .with_attribute("unitCode", &line.unit_code),
        )
        .with_child(amount("cbc:LineExtensionAmount", line.net_amount, currency))
        .with_child(
            Element::new("cac:TaxTotal")
                .with_child(amount("cbc:TaxAmount", line.vat_amount, currency))
                .with_child(amount("cbc:RoundingAmount", line.amount_with_vat, currency)),
        )
        .with_child(
            Element::new("cac:Item")
                .with_child(text("cbc:Name", &line.description))
                .with_child(
                    Element::new("cac:ClassifiedTaxCategory")
                        .with_child(text("cbc:ID", line.vat_category.code()))
                        .with_child(text("cbc:Percent", to_fixed_no_rounding(line.vat_rate, AMOUNT_PRECISION)))
                        .with_child(vat_scheme()),
                ),
        )
        .with_child(
            Element::new("cac:Price").with_child(amount("cbc:PriceAmount", line.unit_price, currency)),
        )
}
