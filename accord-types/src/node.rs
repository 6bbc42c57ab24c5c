use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::primitives::NodeId;

/// A statically trusted peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ConsensusNode {
    /// Node identifier and RPC endpoint.
    pub url: NodeId,
    /// PEM-encoded RSA public key used to verify the node's signatures.
    pub public_key: String,
}
