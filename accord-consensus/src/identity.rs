use accord_crypto::keys::NodeKey;
use accord_types::confirmation::Attestor;
use accord_types::primitives::NodeId;

/// The local node's identifier and signing key.
#[derive(Debug, Clone)]
pub struct LocalIdentity {
    pub node: NodeId,
    pub key: NodeKey,
}

impl LocalIdentity {
    pub fn new(node: impl Into<NodeId>, key: NodeKey) -> Self {
        Self {
            node: node.into(),
            key,
        }
    }

    /// Attestor recorded on confirmations this node signs for itself.
    pub fn attestor(&self) -> Attestor {
        Attestor::Node(self.node.clone())
    }
}
