//! Read-only view of a signing certificate (CSID).
use base64ct::{Base64, Encoding};
use k256::ecdsa::VerifyingKey;
use sha2::{Digest, Sha256};
use thiserror::Error;
use x509_cert::Certificate;
use x509_cert::der::{Decode, DecodePem, Encode};
use x509_cert::spki::ObjectIdentifier;

const ID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const SECP256K1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.10");

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CertificateError {
    #[error("certificate parse error: {0}")]
    Parse(String),
    #[error("unsupported certificate key: {0}")]
    UnsupportedKey(String),
}

/// Key algorithm of an accepted certificate.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicKeyAlgorithm {
    /// `id-ecPublicKey` on `secp256k1`.
    EcdsaSecp256k1,
}

impl PublicKeyAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicKeyAlgorithm::EcdsaSecp256k1 => "ecdsa-secp256k1",
        }
    }
}

/// Parsed certificate with the values signing and QR encoding need.
///
/// Construction fails unless the subject key is an EC key on secp256k1.
///
/// # Examples
/// ```rust,no_run
/// use fatoora_seal::crypto::CertificateInfo;
///
/// let pem = std::fs::read_to_string("cert.pem")?;
/// let cert = CertificateInfo::from_pem(&pem)?;
/// println!("{} / {}", cert.issuer_name(), cert.serial_number());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct CertificateInfo {
    certificate: Certificate,
    der: Vec<u8>,
    public_key: VerifyingKey,
    public_key_der: Vec<u8>,
}

impl CertificateInfo {
    pub fn from_pem(pem: &str) -> Result<Self, CertificateError> {
        let certificate = Certificate::from_pem(pem.trim().as_bytes())
            .map_err(|e| CertificateError::Parse(format!("invalid PEM certificate: {e}")))?;
        Self::from_certificate(certificate)
    }

    pub fn from_der(der: &[u8]) -> Result<Self, CertificateError> {
        let certificate = Certificate::from_der(der)
            .map_err(|e| CertificateError::Parse(format!("invalid DER certificate: {e}")))?;
        Self::from_certificate(certificate)
    }

    /// Base64 DER body without PEM armour.
    pub fn from_base64_der(encoded: &str) -> Result<Self, CertificateError> {
        let der = decode_base64(encoded)?;
        Self::from_der(&der)
    }

    /// ZATCA's `binarySecurityToken`: base64 of the base64 DER text.
    pub fn from_binary_security_token(token: &str) -> Result<Self, CertificateError> {
        let inner = decode_base64(token)?;
        let inner = std::str::from_utf8(&inner).map_err(|_| {
            CertificateError::Parse("binary security token does not wrap base64 text".into())
        })?;
        Self::from_base64_der(inner)
    }

    /// Accepts any of PEM, DER, base64 DER or a binary security token.
    pub fn parse(input: &[u8]) -> Result<Self, CertificateError> {
        if input.first() == Some(&0x30) {
            return Self::from_der(input);
        }
        let text = std::str::from_utf8(input)
            .map_err(|_| CertificateError::Parse("certificate is neither DER nor text".into()))?
            .trim();
        if text.starts_with("-----BEGIN") {
            return Self::from_pem(text);
        }
        // base64 DER always starts with "MI"; anything else may be wrapped once more
        if text.starts_with("MI") {
            Self::from_base64_der(text)
        } else {
            Self::from_binary_security_token(text)
        }
    }

    fn from_certificate(certificate: Certificate) -> Result<Self, CertificateError> {
        let spki = &certificate.tbs_certificate.subject_public_key_info;
        if spki.algorithm.oid != ID_EC_PUBLIC_KEY {
            return Err(CertificateError::UnsupportedKey(format!(
                "public key algorithm {} is not id-ecPublicKey",
                spki.algorithm.oid
            )));
        }
        let curve = spki
            .algorithm
            .parameters
            .as_ref()
            .ok_or_else(|| CertificateError::UnsupportedKey("missing curve parameters".into()))?
            .decode_as::<ObjectIdentifier>()
            .map_err(|e| CertificateError::UnsupportedKey(format!("named curve expected: {e}")))?;
        if curve != SECP256K1 {
            return Err(CertificateError::UnsupportedKey(format!(
                "curve {curve} is not secp256k1"
            )));
        }

        let public_key = VerifyingKey::from_sec1_bytes(spki.subject_public_key.raw_bytes())
            .map_err(|_| {
                CertificateError::UnsupportedKey("public key is not a secp256k1 point".into())
            })?;
        let public_key_der = spki
            .to_der()
            .map_err(|e| CertificateError::Parse(format!("public key encoding: {e}")))?;
        let der = certificate
            .to_der()
            .map_err(|e| CertificateError::Parse(format!("certificate encoding: {e}")))?;

        Ok(Self {
            certificate,
            der,
            public_key,
            public_key_der,
        })
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Base64 DER, as embedded in `ds:X509Certificate`.
    pub fn der_base64(&self) -> String {
        Base64::encode_string(&self.der)
    }

    /// Raw bytes of the issuer's signature over this certificate.
    pub fn signature(&self) -> &[u8] {
        self.certificate.signature.raw_bytes()
    }

    pub fn public_key(&self) -> &VerifyingKey {
        &self.public_key
    }

    /// DER `SubjectPublicKeyInfo` of the subject key.
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_key_der
    }

    pub fn public_key_algorithm(&self) -> PublicKeyAlgorithm {
        PublicKeyAlgorithm::EcdsaSecp256k1
    }

    /// OID of the algorithm the issuer signed this certificate with.
    pub fn signature_algorithm(&self) -> ObjectIdentifier {
        self.certificate.signature_algorithm.oid
    }

    /// Issuer distinguished name, most specific RDN first, `", "` separated.
    /// Values keep their RFC 4514 escapes.
    pub fn issuer_name(&self) -> String {
        self.certificate
            .tbs_certificate
            .issuer
            .0
            .iter()
            .rev()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn serial_number(&self) -> String {
        serial_bytes_to_decimal_string(self.certificate.tbs_certificate.serial_number.as_bytes())
    }

    /// `xades:CertDigest` value: base64 of the hex SHA-256 of the base64 DER.
    pub fn digest(&self) -> String {
        let hash = Sha256::digest(self.der_base64().as_bytes());
        Base64::encode_string(hex::encode(hash).as_bytes())
    }
}

fn decode_base64(encoded: &str) -> Result<Vec<u8>, CertificateError> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Base64::decode_vec(&compact)
        .map_err(|e| CertificateError::Parse(format!("invalid base64 certificate: {e}")))
}

fn serial_bytes_to_decimal_string(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "0".to_string();
    }

    let mut digits: Vec<u8> = vec![0];
    for &byte in bytes {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            let value = (*digit as u32) * 256 + carry;
            *digit = (value % 10) as u8;
            carry = value / 10;
        }
        while carry > 0 {
            digits.push((carry % 10) as u8);
            carry /= 10;
        }
    }

    while digits.len() > 1 && matches!(digits.last(), Some(0)) {
        digits.pop();
    }

    digits.iter().rev().map(|d| (b'0' + *d) as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_bytes_to_decimal_handles_large_values() {
        assert_eq!(serial_bytes_to_decimal_string(&[0x01]), "1");
        assert_eq!(serial_bytes_to_decimal_string(&[0x01, 0x00]), "256");
        assert_eq!(serial_bytes_to_decimal_string(&[0x00, 0x01]), "1");
        assert_eq!(serial_bytes_to_decimal_string(&[0xFF, 0xFF]), "65535");
        assert_eq!(serial_bytes_to_decimal_string(&[]), "0");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            CertificateInfo::parse(b"-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----"),
            Err(CertificateError::Parse(_))
        ));
        assert!(matches!(
            CertificateInfo::parse(&[0x30, 0x03, 0x02, 0x01, 0x01]),
            Err(CertificateError::Parse(_))
        ));
        assert!(matches!(
            CertificateInfo::parse(&[0xff, 0xfe]),
            Err(CertificateError::Parse(_))
        ));
    }
}
