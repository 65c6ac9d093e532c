//! Certificate and key handling for invoice signatures.
//!
//! Everything here works on secp256k1 ECDSA with SHA-256, the only scheme
//! ZATCA accepts for invoice stamps.
pub mod certificate;
pub mod signature;

pub use certificate::{CertificateError, CertificateInfo, PublicKeyAlgorithm};
pub use signature::{
    InvoiceSignature, PrivateKey, SigningError, ensure_key_matches, sign_invoice_hash,
    verify_invoice_hash,
};
