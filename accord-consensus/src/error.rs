use accord_storage::error::StorageError;
use accord_types::error::AccordError;
use thiserror::Error;

/// Errors surfaced by the consensus engine.
#[derive(Debug, Error)]
pub enum ConsensusError {
    /// Malformed or already registered input. Nothing was persisted.
    #[error("validation failed: {reason}")]
    Validation { reason: String },

    /// Unknown sender or a signature that does not verify. Nothing was persisted.
    #[error("authentication failed: {reason}")]
    Authentication { reason: String },

    /// Lost a concurrent creation race for the same keys.
    #[error("registered concurrently: {public_key}")]
    Duplicate { public_key: String },

    /// The referenced ledger is not held by this node.
    #[error("ledger not found: {public_key}")]
    NotFound { public_key: String },

    #[error("crypto error: {0}")]
    Crypto(#[from] AccordError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ConsensusError {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        ConsensusError::Validation {
            reason: reason.into(),
        }
    }

    pub(crate) fn authentication(reason: impl Into<String>) -> Self {
        ConsensusError::Authentication {
            reason: reason.into(),
        }
    }

    /// Whether the error was caused by the caller rather than by this node.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, ConsensusError::Crypto(_) | ConsensusError::Storage(_))
    }
}
