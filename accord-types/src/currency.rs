use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// A currency registered on this node. Names and public keys are unique.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct Currency {
    /// PEM-encoded RSA public key of the issuer.
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}
