use thiserror::Error;

/// Errors raised by key handling and signing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccordError {
    #[error("invalid key material: {reason}")]
    InvalidKeyMaterial { reason: String },

    #[error("signing failed: {reason}")]
    SigningFailed { reason: String },

    #[error("encoding failed: {reason}")]
    EncodingFailed { reason: String },
}
