use thiserror::Error;

/// Errors that can occur in the node.
#[derive(Debug, Error)]
#[allow(clippy::enum_variant_names)]
pub enum NodeError {
    #[error("config error: {reason}")]
    ConfigError { reason: String },

    #[error("key error: {0}")]
    KeyError(#[from] accord_types::error::AccordError),

    #[error("storage error: {0}")]
    StorageError(#[from] accord_storage::error::StorageError),

    #[error("consensus error: {0}")]
    ConsensusError(#[from] accord_consensus::error::ConsensusError),

    #[error("rpc error: {reason}")]
    RpcError { reason: String },

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}
