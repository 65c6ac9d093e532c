//! Signing configuration and QR phase selection.
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Upper bound ZATCA places on the base64 QR payload.
pub const DEFAULT_MAX_QR_LENGTH: usize = 700;

/// Which QR fields an invoice must carry.
/// - Basic: seller name, VAT number, timestamp, total with VAT, VAT total (tags 1-5).
///   This is what ZATCA calls "Phase 1" (generation).
/// - Enhanced: the basic fields plus invoice hash, signature, public key and
///   certificate signature (tags 1-9). Required for "Phase 2" (integration).
///
/// # Examples
/// ```rust
/// use std::str::FromStr;
/// use fatoora_seal::config::QrPhase;
///
/// let phase = QrPhase::from_str("phase1")?;
/// assert_eq!(phase, QrPhase::Basic);
/// # Ok::<(), fatoora_seal::config::QrPhaseParseError>(())
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QrPhase {
    Basic,
    #[default]
    Enhanced,
}

/// Error returned when parsing a [`QrPhase`] from a string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QrPhaseParseError {
    #[error("invalid QR phase: {input}")]
    Invalid { input: String },
}

impl FromStr for QrPhase {
    type Err = QrPhaseParseError;
    fn from_str(phase: &str) -> Result<QrPhase, QrPhaseParseError> {
        match phase.trim().to_ascii_lowercase().as_str() {
            "basic" | "phase1" => Ok(QrPhase::Basic),
            "enhanced" | "phase2" => Ok(QrPhase::Enhanced),
            _ => Err(QrPhaseParseError::Invalid {
                input: phase.to_string(),
            }),
        }
    }
}

impl QrPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            QrPhase::Basic => "basic",
            QrPhase::Enhanced => "enhanced",
        }
    }
}

/// Configuration for the signing pipeline.
///
/// # Examples
/// ```rust
/// use fatoora_seal::config::{Config, QrPhase};
///
/// let config = Config::new(QrPhase::Basic);
/// assert_eq!(config.max_qr_length(), 700);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    qr_phase: QrPhase,
    max_qr_length: usize,
}

impl Config {
    pub fn new(qr_phase: QrPhase) -> Self {
        Self {
            qr_phase,
            ..Self::default()
        }
    }

    pub fn with_max_qr_length(mut self, max_qr_length: usize) -> Self {
        self.max_qr_length = max_qr_length;
        self
    }

    pub fn qr_phase(&self) -> QrPhase {
        self.qr_phase
    }

    pub fn max_qr_length(&self) -> usize {
        self.max_qr_length
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            qr_phase: QrPhase::Enhanced,
            max_qr_length: DEFAULT_MAX_QR_LENGTH,
        }
    }
}
