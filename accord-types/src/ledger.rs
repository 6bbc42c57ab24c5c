use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::primitives::{Balance, LedgerId};

/// Client-supplied ledger fields.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct LedgerFields {
    /// PEM-encoded RSA public key identifying the ledger.
    #[serde(default)]
    pub public_key: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Public URL of the ledger operator.
    #[serde(default)]
    pub url: String,
}

/// Client-supplied fields of the primary account.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct AccountFields {
    /// PEM-encoded RSA public key of the account holder.
    #[serde(default)]
    pub public_key: String,
}

/// A persisted ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Ledger {
    pub id: LedgerId,
    pub public_key: String,
    pub name: String,
    pub url: String,
    /// Public key of the primary account.
    pub primary_account: String,
}

impl Ledger {
    /// The client-facing fields of this ledger.
    pub fn fields(&self) -> LedgerFields {
        LedgerFields {
            public_key: self.public_key.clone(),
            name: self.name.clone(),
            url: self.url.clone(),
        }
    }
}

/// A persisted account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Account {
    pub public_key: String,
    /// Hex MD5 of the public key, assigned at creation.
    pub code: String,
    pub balance: Balance,
    /// Owning ledger.
    pub ledger: LedgerId,
}

impl Account {
    /// The client-facing fields of this account.
    pub fn fields(&self) -> AccountFields {
        AccountFields {
            public_key: self.public_key.clone(),
        }
    }
}
