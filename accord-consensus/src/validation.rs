use accord_crypto::keys::is_valid_public_key;
use accord_types::currency::Currency;
use accord_types::message::{AccountProposal, LedgerProposal};

use crate::error::ConsensusError;

fn require(field: &str, value: &str) -> Result<(), ConsensusError> {
    if value.trim().is_empty() {
        return Err(ConsensusError::validation(format!("{} is required", field)));
    }
    Ok(())
}

fn require_rsa_key(field: &str, value: &str) -> Result<(), ConsensusError> {
    require(field, value)?;
    if !is_valid_public_key(value) {
        return Err(ConsensusError::validation(format!(
            "{} is not a valid RSA public key",
            field
        )));
    }
    Ok(())
}

/// Check field presence and RSA key format of a proposal.
///
/// Uniqueness is checked separately against the store.
pub fn validate_proposal(proposal: &LedgerProposal) -> Result<(), ConsensusError> {
    let ledger = &proposal.ledger;
    require("ledger name", &ledger.name)?;
    require("ledger url", &ledger.url)?;
    require_rsa_key("ledger public_key", &ledger.public_key)?;
    require_rsa_key("primary_account public_key", &proposal.primary_account.public_key)
}

/// An additional account needs its ledger named and a well-formed key.
pub fn validate_account(proposal: &AccountProposal) -> Result<(), ConsensusError> {
    require("account ledger", &proposal.ledger)?;
    require_rsa_key("account public_key", &proposal.public_key)
}

pub fn validate_currency(currency: &Currency) -> Result<(), ConsensusError> {
    require("currency name", &currency.name)?;
    require("currency url", &currency.url)?;
    require_rsa_key("currency public_key", &currency.public_key)
}
