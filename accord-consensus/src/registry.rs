use std::collections::btree_map::{BTreeMap, Entry};

use accord_crypto::keys::{parse_public_key, RsaPublicKey};
use accord_types::node::ConsensusNode;

use crate::error::ConsensusError;

#[derive(Debug, Clone)]
struct Peer {
    node: ConsensusNode,
    key: RsaPublicKey,
}

/// Statically configured set of trusted peers, keyed by node identifier.
///
/// The local node is never part of the registry, so every entry is a valid
/// broadcast target.
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    peers: BTreeMap<String, Peer>,
}

impl NodeRegistry {
    /// Build a registry, dropping any entry for `local` and parsing every key up front.
    ///
    /// A peer listed twice is rejected.
    pub fn new(nodes: Vec<ConsensusNode>, local: &str) -> Result<Self, ConsensusError> {
        let mut peers = BTreeMap::new();
        for node in nodes {
            if node.url == local {
                continue;
            }
            let key = parse_public_key(&node.public_key).map_err(|e| {
                ConsensusError::validation(format!("peer {}: {}", node.url, e))
            })?;
            match peers.entry(node.url.clone()) {
                Entry::Occupied(_) => {
                    return Err(ConsensusError::validation(format!(
                        "peer {} is listed more than once",
                        node.url
                    )))
                }
                Entry::Vacant(slot) => {
                    slot.insert(Peer { node, key });
                }
            }
        }
        Ok(Self { peers })
    }

    pub fn resolve(&self, node: &str) -> Option<&ConsensusNode> {
        self.peers.get(node).map(|p| &p.node)
    }

    /// Parsed verification key of a peer.
    pub fn verifying_key(&self, node: &str) -> Option<&RsaPublicKey> {
        self.peers.get(node).map(|p| &p.key)
    }

    pub fn peers(&self) -> Vec<ConsensusNode> {
        self.peers_excluding(None)
    }

    /// All peers except `excluded`, if given.
    pub fn peers_excluding(&self, excluded: Option<&str>) -> Vec<ConsensusNode> {
        self.peers
            .values()
            .filter(|p| Some(p.node.url.as_str()) != excluded)
            .map(|p| p.node.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
