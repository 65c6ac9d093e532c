//! Integrity layer for ZATCA Phase 2 e-invoices: canonical hashing, hash
//! chaining, ECDSA signing with the signing unit's certificate, XAdES
//! embedding and the TLV QR payload.
//!
//! # Examples
//! ```rust
//! use fatoora_seal::config::{Config, QrPhase};
//!
//! let config = Config::new(QrPhase::Enhanced);
//! assert_eq!(config.max_qr_length(), 700);
//! ```
pub mod config;
pub mod crypto;
pub mod invoice;

use thiserror::Error;

pub use config::{Config, QrPhase, QrPhaseParseError};
pub use crypto::{CertificateError, CertificateInfo, PrivateKey, SigningError};
pub use invoice::xml::InvoiceXmlError;
pub use invoice::xml::parse::ParseError;
pub use invoice::{
    ChainError, ChainLink, InvoiceHash, InvoiceSigner, PredecessorHash, QrCodeError,
    SerializationError, SignedInvoice, TemplateError, VerificationError,
};

/// Top-level error wrapper for crate operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Serialization(#[from] SerializationError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Xml(#[from] InvoiceXmlError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Certificate(#[from] CertificateError),
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error(transparent)]
    Qr(#[from] QrCodeError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error(transparent)]
    Config(#[from] QrPhaseParseError),
}

/// Coarse error classes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The invoice, predecessor hash or configuration is unusable.
    InvalidInput,
    /// Key or certificate problems, including a key/certificate mismatch.
    CryptographicMaterial,
    /// A QR field or the encoded QR payload exceeds its limit.
    EncodingLimit,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Certificate(_) | Error::Signing(_) => ErrorCategory::CryptographicMaterial,
            Error::Qr(QrCodeError::FieldTooLarge { .. } | QrCodeError::EncodedTooLong { .. }) => {
                ErrorCategory::EncodingLimit
            }
            _ => ErrorCategory::InvalidInput,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
