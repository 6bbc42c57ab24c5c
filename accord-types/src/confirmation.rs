use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::primitives::{key_digest, ConfirmationId, Hash, LedgerId, NodeId};

/// Protocol phase a confirmation belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Prepare,
    Commit,
}

impl Phase {
    /// Single-byte tag used in storage keys and signed payloads.
    pub fn tag(self) -> u8 {
        match self {
            Phase::Prepare => b'p',
            Phase::Commit => b'c',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Prepare => "prepare",
            Phase::Commit => "commit",
        }
    }
}

/// The entity a confirmation acknowledges.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Subject {
    Ledger(LedgerId),
    /// An account, by the digest of its public key.
    Account(Hash),
}

impl Subject {
    pub fn account(public_key: &str) -> Self {
        Subject::Account(key_digest(public_key))
    }

    /// Single-byte tag used in storage keys.
    pub fn tag(&self) -> u8 {
        match self {
            Subject::Ledger(_) => b'l',
            Subject::Account(_) => b'a',
        }
    }

    pub fn id(&self) -> &Hash {
        match self {
            Subject::Ledger(id) | Subject::Account(id) => id,
        }
    }
}

/// Who a confirmation is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Attestor {
    /// A consensus node, by identifier.
    Node(NodeId),
    /// An account, by public key. Endorsed by the node that created it.
    Account(String),
}

/// One participant's acknowledgment of a ledger or account in a given phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Confirmation {
    pub id: ConfirmationId,
    pub subject: Subject,
    pub phase: Phase,
    pub attestor: Attestor,
    /// Authenticated node whose message caused this confirmation; `None` when
    /// the entity originated locally.
    pub sender: Option<NodeId>,
    /// Base64 signature; empty when unsigned.
    pub signature: String,
}

impl Confirmation {
    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }
}

/// Signed confirmation counts for a ledger or account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationCounts {
    pub prepared: usize,
    pub committed: usize,
}

/// Consensus status of a ledger, always derived from confirmation counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerStatus {
    Pending,
    Prepared,
    Committed,
}

impl LedgerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LedgerStatus::Pending => "pending",
            LedgerStatus::Prepared => "prepared",
            LedgerStatus::Committed => "committed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn confirmation(signature: &str) -> Confirmation {
        Confirmation {
            id: 1,
            subject: Subject::Ledger([7u8; 32]),
            phase: Phase::Prepare,
            attestor: Attestor::Node("http://node-a".to_string()),
            sender: None,
            signature: signature.to_string(),
        }
    }

    #[test]
    fn test_signed_requires_signature() {
        assert!(confirmation("c2ln").is_signed());
        assert!(!confirmation("").is_signed());
    }

    #[test]
    fn test_phase_tags_differ() {
        assert_ne!(Phase::Prepare.tag(), Phase::Commit.tag());
    }

    #[test]
    fn test_subjects_of_same_key_differ() {
        let ledger = Subject::Ledger(key_digest("pem"));
        let account = Subject::account("pem");
        assert_eq!(ledger.id(), account.id());
        assert_ne!(ledger, account);
        assert_ne!(ledger.tag(), account.tag());
    }

    #[test]
    fn test_attestor_json_shape() {
        let json = serde_json::to_value(Attestor::Account("pem".to_string())).unwrap();
        assert_eq!(json["kind"], "account");
        assert_eq!(json["id"], "pem");
    }
}
