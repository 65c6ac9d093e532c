pub const INVOICE_NS: &str = "urn:oasis:names:specification:ubl:schema:xsd:Invoice-2";
pub const CBC_NS: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";
pub const CAC_NS: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2";
pub const EXT_NS: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:CommonExtensionComponents-2";
pub const SIG_NS: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:CommonSignatureComponents-2";
pub const SAC_NS: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:SignatureAggregateComponents-2";
pub const SBC_NS: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:SignatureBasicComponents-2";
pub const DS_NS: &str = "http://www.w3.org/2000/09/xmldsig#";
pub const XADES_NS: &str = "http://uri.etsi.org/01903/v1.3.2#";
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

pub(crate) const PIH_REFERENCE_ID: &str = "PIH";
pub(crate) const QR_REFERENCE_ID: &str = "QR";

pub(crate) const EXTENSION_URI: &str = "urn:oasis:names:specification:ubl:dsig:enveloped:xades";
pub(crate) const SIGNATURE_INFORMATION_ID: &str = "urn:oasis:names:specification:ubl:signature:1";
pub(crate) const REFERENCED_SIGNATURE_ID: &str =
    "urn:oasis:names:specification:ubl:signature:Invoice";

pub(crate) const C14N11_ALGORITHM: &str = "http://www.w3.org/2006/12/xml-c14n11";
pub(crate) const ECDSA_SHA256_ALGORITHM: &str =
    "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256";
pub(crate) const SHA256_ALGORITHM: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
pub(crate) const XPATH_ALGORITHM: &str = "http://www.w3.org/TR/1999/REC-xpath-19991116";
pub(crate) const SIGNATURE_PROPERTIES_TYPE: &str =
    "http://www.w3.org/2000/09/xmldsig#SignatureProperties";

pub(crate) const INVOICE_REFERENCE_ID: &str = "invoiceSignedData";
pub(crate) const SIGNED_PROPERTIES_ID: &str = "xadesSignedProperties";
pub(crate) const SIGNATURE_ID: &str = "signature";

/// XPath transforms listed in the invoice digest reference, mirroring the
/// elements left out of the invoice hash.
pub(crate) const HASH_EXCLUSION_XPATHS: [&str; 3] = [
    "not(//ancestor-or-self::ext:UBLExtensions)",
    "not(//ancestor-or-self::cac:Signature)",
    "not(//ancestor-or-self::cac:AdditionalDocumentReference[cbc:ID='QR'])",
];
