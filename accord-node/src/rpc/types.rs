use serde::{Deserialize, Serialize};

use accord_types::ledger::{Account, Ledger};
use accord_types::message::{AccountReceipt, LedgerReceipt};

/// Information about an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// PEM public key.
    pub public_key: String,
    /// Hex MD5 of the public key.
    pub code: String,
    pub balance: i64,
    /// Owning ledger id as hex string.
    pub ledger_id: String,
}

/// Information about a ledger and its consensus evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerInfo {
    /// Ledger id (BLAKE3 of the public key) as hex string.
    pub id: String,
    pub public_key: String,
    pub name: String,
    pub url: String,
    pub primary_account: AccountInfo,
    /// Signed prepare confirmations held by this node.
    pub prepared: usize,
    /// Signed commit confirmations held by this node.
    pub committed: usize,
}

/// Result of a create, prepare, or commit call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerResponse {
    /// 201 when the call created the ledger locally, 200 otherwise.
    pub status: u16,
    pub ledger: LedgerInfo,
}

/// Result of an account create or prepare call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountResponse {
    /// 201 when the call created the account locally, 200 otherwise.
    pub status: u16,
    pub account: AccountInfo,
    /// Signed prepare confirmations of this account held by this node.
    pub prepared: usize,
}

/// Derived status of a ledger under a quorum threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerStatusInfo {
    pub public_key: String,
    /// "pending", "prepared", or "committed".
    pub status: String,
    pub prepared: usize,
    pub committed: usize,
    pub threshold: usize,
    pub cluster_size: usize,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthInfo {
    pub status: String,
    pub node: String,
    pub peers: usize,
    pub ledgers: usize,
    pub version: String,
}

impl From<&Account> for AccountInfo {
    fn from(account: &Account) -> Self {
        Self {
            public_key: account.public_key.clone(),
            code: account.code.clone(),
            balance: account.balance,
            ledger_id: hex::encode(account.ledger),
        }
    }
}

impl From<&LedgerReceipt> for LedgerInfo {
    fn from(receipt: &LedgerReceipt) -> Self {
        let ledger: &Ledger = &receipt.ledger;
        Self {
            id: hex::encode(ledger.id),
            public_key: ledger.public_key.clone(),
            name: ledger.name.clone(),
            url: ledger.url.clone(),
            primary_account: AccountInfo::from(&receipt.primary_account),
            prepared: receipt.counts.prepared,
            committed: receipt.counts.committed,
        }
    }
}

impl From<&LedgerReceipt> for LedgerResponse {
    fn from(receipt: &LedgerReceipt) -> Self {
        Self {
            status: if receipt.created { 201 } else { 200 },
            ledger: LedgerInfo::from(receipt),
        }
    }
}

impl From<&AccountReceipt> for AccountResponse {
    fn from(receipt: &AccountReceipt) -> Self {
        Self {
            status: if receipt.created { 201 } else { 200 },
            account: AccountInfo::from(&receipt.account),
            prepared: receipt.counts.prepared,
        }
    }
}
