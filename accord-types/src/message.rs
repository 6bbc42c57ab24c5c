use serde::{Deserialize, Serialize};

use crate::confirmation::ConfirmationCounts;
use crate::ledger::{Account, AccountFields, Ledger, LedgerFields};
use crate::primitives::NodeId;

/// A ledger together with its primary account, as proposed for creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerProposal {
    pub ledger: LedgerFields,
    pub primary_account: AccountFields,
}

/// Proof that a message originates from a registered node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authentication {
    /// Identifier of the signing node.
    #[serde(default)]
    pub node: NodeId,
    /// Base64 signature over the canonical payload.
    #[serde(default)]
    pub signature: String,
}

/// Locally originated ledger creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub ledger: LedgerFields,
    #[serde(default)]
    pub primary_account: Option<AccountFields>,
}

/// Phase-one message: a peer proposes a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareMessage {
    pub ledger: LedgerFields,
    #[serde(default)]
    pub primary_account: AccountFields,
    #[serde(default)]
    pub authentication: Authentication,
}

impl PrepareMessage {
    pub fn new(proposal: LedgerProposal, authentication: Authentication) -> Self {
        Self {
            ledger: proposal.ledger,
            primary_account: proposal.primary_account,
            authentication,
        }
    }

    pub fn proposal(&self) -> LedgerProposal {
        LedgerProposal {
            ledger: self.ledger.clone(),
            primary_account: self.primary_account.clone(),
        }
    }
}

/// Phase-two message: a node finalizes a prepared ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMessage {
    pub ledger: LedgerFields,
    #[serde(default)]
    pub primary_account: AccountFields,
    #[serde(default)]
    pub commit: bool,
    #[serde(default)]
    pub authentication: Authentication,
}

impl CommitMessage {
    pub fn new(proposal: LedgerProposal, authentication: Authentication) -> Self {
        Self {
            ledger: proposal.ledger,
            primary_account: proposal.primary_account,
            commit: true,
            authentication,
        }
    }

    pub fn proposal(&self) -> LedgerProposal {
        LedgerProposal {
            ledger: self.ledger.clone(),
            primary_account: self.primary_account.clone(),
        }
    }
}

/// An additional account proposed under an existing ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProposal {
    /// PEM public key of the owning ledger.
    #[serde(default)]
    pub ledger: String,
    /// PEM public key of the new account.
    #[serde(default)]
    pub public_key: String,
}

/// Phase-one message for an additional account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPrepareMessage {
    pub account: AccountProposal,
    #[serde(default)]
    pub authentication: Authentication,
}

impl AccountPrepareMessage {
    pub fn new(account: AccountProposal, authentication: Authentication) -> Self {
        Self {
            account,
            authentication,
        }
    }
}

/// A prepare on its way to peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundPrepare {
    Ledger(PrepareMessage),
    Account(AccountPrepareMessage),
}

impl OutboundPrepare {
    pub fn sender(&self) -> &str {
        match self {
            OutboundPrepare::Ledger(m) => &m.authentication.node,
            OutboundPrepare::Account(m) => &m.authentication.node,
        }
    }
}

/// Outcome of a create, prepare, or commit operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReceipt {
    /// Whether this call created the ledger locally.
    pub created: bool,
    pub ledger: Ledger,
    pub primary_account: Account,
    pub counts: ConfirmationCounts,
}

/// Outcome of creating or preparing an additional account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountReceipt {
    /// Whether this call created the account locally.
    pub created: bool,
    pub account: Account,
    pub counts: ConfirmationCounts,
}
