//! Invoice hashing and predecessor linkage.
//!
//! The predecessor hash is not mixed into the digest separately: it is
//! written into the document (`PIH` document reference) and the document is
//! hashed afterwards, so the link is part of the hashed content.
use std::fmt;

use base64ct::{Base64, Encoding};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::canonical::{CanonicalBytes, CanonicalSerializer, SerializationError};
use super::document::InvoiceDocument;
use super::xml::constants::PIH_REFERENCE_ID;

/// Predecessor hash of the first invoice issued by a signing unit:
/// base64 of the hex SHA-256 of `"0"`.
pub const GENESIS_PREDECESSOR_HASH: &str =
    "NWZlY2ViNjZmZmM4NmYzOGQ5NTI3ODZjNmQ2OTZjNzljMmRiYzIzOWRkNGU5MWI0NjcyOWQ3M2EyN2ZiNTdlOQ==";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("no predecessor hash supplied for an invoice that is not first in its sequence")]
    MissingPredecessor,
    #[error("predecessor hash is not valid base64: {0}")]
    InvalidPredecessor(String),
    #[error("first invoice in a sequence must use the genesis predecessor hash")]
    UnexpectedPredecessor,
    #[error("invoice hash must be a base64 SHA-256 digest: {0}")]
    InvalidHash(String),
    #[error("expected an <Invoice> root element, found <{0}>")]
    UnexpectedRoot(String),
}

/// Base64 hash of the previous invoice in a signing unit's sequence.
///
/// # Examples
/// ```rust
/// use fatoora_seal::invoice::chain::PredecessorHash;
///
/// let genesis = PredecessorHash::genesis();
/// assert!(genesis.is_genesis());
/// assert!(PredecessorHash::parse("not base64!").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PredecessorHash(String);

impl PredecessorHash {
    pub fn parse(value: impl AsRef<str>) -> Result<Self, ChainError> {
        let value = value.as_ref().trim();
        if value.is_empty() {
            return Err(ChainError::MissingPredecessor);
        }
        Base64::decode_vec(value)
            .map_err(|e| ChainError::InvalidPredecessor(format!("{e}")))?;
        Ok(Self(value.to_string()))
    }

    pub fn genesis() -> Self {
        Self(GENESIS_PREDECESSOR_HASH.to_string())
    }

    pub fn is_genesis(&self) -> bool {
        self.0 == GENESIS_PREDECESSOR_HASH
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PredecessorHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<InvoiceHash> for PredecessorHash {
    fn from(hash: InvoiceHash) -> Self {
        Self(hash.encoded)
    }
}

impl From<&InvoiceHash> for PredecessorHash {
    fn from(hash: &InvoiceHash) -> Self {
        Self(hash.encoded.clone())
    }
}

/// SHA-256 of an invoice's canonical bytes, with its base64 form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvoiceHash {
    digest: [u8; 32],
    encoded: String,
}

impl InvoiceHash {
    pub fn compute(canonical: &CanonicalBytes) -> Self {
        let digest: [u8; 32] = Sha256::digest(canonical.as_bytes()).into();
        Self {
            encoded: Base64::encode_string(&digest),
            digest,
        }
    }

    /// Parses a base64 digest, e.g. a hash claimed by a caller.
    pub fn from_base64(value: &str) -> Result<Self, ChainError> {
        let value = value.trim();
        let bytes =
            Base64::decode_vec(value).map_err(|e| ChainError::InvalidHash(format!("{e}")))?;
        let digest: [u8; 32] = bytes
            .try_into()
            .map_err(|bytes: Vec<u8>| ChainError::InvalidHash(format!("{} bytes", bytes.len())))?;
        Ok(Self {
            digest,
            encoded: Base64::encode_string(&digest),
        })
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.digest
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }
}

impl fmt::Display for InvoiceHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

/// Hashes `document` with the signature extension, `cac:Signature` and QR
/// reference left out.
pub fn hash_document(document: &InvoiceDocument) -> Result<InvoiceHash, SerializationError> {
    let canonical = CanonicalSerializer::for_invoice_hash().serialize(document)?;
    Ok(InvoiceHash::compute(&canonical))
}

/// Position of an invoice in its signing unit's chain.
///
/// # Examples
/// ```rust
/// use fatoora_seal::invoice::chain::{ChainError, ChainLink};
///
/// assert_eq!(ChainLink::resolve(None, true)?, ChainLink::First);
/// assert_eq!(ChainLink::resolve(None, false), Err(ChainError::MissingPredecessor));
/// # Ok::<(), ChainError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainLink {
    First,
    Following(PredecessorHash),
}

impl ChainLink {
    pub fn first() -> Self {
        ChainLink::First
    }

    pub fn after(predecessor: impl Into<PredecessorHash>) -> Self {
        ChainLink::Following(predecessor.into())
    }

    /// Builds a link from caller input. A first invoice may pass the genesis
    /// hash explicitly; any other hash is rejected for it.
    pub fn resolve(predecessor: Option<&str>, is_first: bool) -> Result<Self, ChainError> {
        match (predecessor, is_first) {
            (None, true) => Ok(ChainLink::First),
            (None, false) => Err(ChainError::MissingPredecessor),
            (Some(value), true) => {
                if PredecessorHash::parse(value)?.is_genesis() {
                    Ok(ChainLink::First)
                } else {
                    Err(ChainError::UnexpectedPredecessor)
                }
            }
            (Some(value), false) => Ok(ChainLink::Following(PredecessorHash::parse(value)?)),
        }
    }

    pub fn predecessor(&self) -> PredecessorHash {
        match self {
            ChainLink::First => PredecessorHash::genesis(),
            ChainLink::Following(hash) => hash.clone(),
        }
    }

    /// Copy of `document` carrying this link's predecessor hash.
    pub fn apply(&self, document: &InvoiceDocument) -> Result<InvoiceDocument, ChainError> {
        let root = document.root().name().local_name();
        if root != "Invoice" {
            return Err(ChainError::UnexpectedRoot(root.to_string()));
        }
        let mut chained = document.clone();
        chained.set_document_reference(PIH_REFERENCE_ID, self.predecessor().as_str());
        Ok(chained)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::document::Element;
    use crate::invoice::xml::constants::{CAC_NS, CBC_NS};

    fn invoice(id: &str) -> InvoiceDocument {
        InvoiceDocument::new(
            Element::new("Invoice")
                .with_attribute("xmlns:cac", CAC_NS)
                .with_attribute("xmlns:cbc", CBC_NS)
                .with_child(Element::new("cbc:ID").with_text(id))
                .with_child(Element::new("cac:AccountingSupplierParty")),
        )
    }

    #[test]
    fn genesis_hash_is_base64_of_hex_sha256_of_zero() {
        let hex_digest = hex::encode(Sha256::digest(b"0"));
        assert_eq!(
            Base64::encode_string(hex_digest.as_bytes()),
            GENESIS_PREDECESSOR_HASH
        );
    }

    #[test]
    fn resolve_rejects_non_genesis_hash_for_first_invoice() {
        let unrelated = Base64::encode_string(&[7u8; 32]);
        assert_eq!(
            ChainLink::resolve(Some(&unrelated), true),
            Err(ChainError::UnexpectedPredecessor)
        );
        assert_eq!(
            ChainLink::resolve(Some(GENESIS_PREDECESSOR_HASH), true),
            Ok(ChainLink::First)
        );
    }

    #[test]
    fn resolve_rejects_malformed_hash() {
        assert!(matches!(
            ChainLink::resolve(Some("%%%"), false),
            Err(ChainError::InvalidPredecessor(_))
        ));
        assert_eq!(
            ChainLink::resolve(Some("  "), false),
            Err(ChainError::MissingPredecessor)
        );
    }

    #[test]
    fn apply_embeds_predecessor_without_touching_input() {
        let doc = invoice("INV-1");
        let chained = ChainLink::First.apply(&doc).expect("chain");
        assert_eq!(doc.document_reference("PIH"), None);
        assert_eq!(
            chained.document_reference("PIH").as_deref(),
            Some(GENESIS_PREDECESSOR_HASH)
        );
    }

    #[test]
    fn predecessor_changes_the_hash() {
        let doc = invoice("INV-1");
        let first = ChainLink::First.apply(&doc).expect("chain");
        let other = ChainLink::after(
            PredecessorHash::parse(Base64::encode_string(&[1u8; 32])).expect("hash"),
        )
        .apply(&doc)
        .expect("chain");
        assert_ne!(
            hash_document(&first).expect("hash"),
            hash_document(&other).expect("hash")
        );
    }

    #[test]
    fn apply_requires_invoice_root() {
        let doc = InvoiceDocument::new(Element::new("CreditNote"));
        assert_eq!(
            ChainLink::First.apply(&doc),
            Err(ChainError::UnexpectedRoot("CreditNote".into()))
        );
    }

    #[test]
    fn invoice_hash_round_trips_through_base64() {
        let hash = hash_document(&invoice("INV-1")).expect("hash");
        let parsed = InvoiceHash::from_base64(hash.as_str()).expect("parse");
        assert_eq!(parsed, hash);
        assert!(matches!(
            InvoiceHash::from_base64("AAAA"),
            Err(ChainError::InvalidHash(_))
        ));
    }
}
