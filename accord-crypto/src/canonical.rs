//! Deterministic byte encodings of everything that gets signed.
//!
//! Every node must produce identical bytes for identical input, so these
//! encodings fix the field set and order explicitly instead of relying on
//! whatever shape the transport happened to deliver.

use accord_types::confirmation::Phase;
use accord_types::error::AccordError;
use accord_types::ledger::{Account, Ledger};
use accord_types::message::{AccountProposal, LedgerProposal};
use serde::Serialize;

#[derive(Serialize)]
struct CanonicalLedger<'a> {
    public_key: &'a str,
    name: &'a str,
    url: &'a str,
}

#[derive(Serialize)]
struct CanonicalAccount<'a> {
    public_key: &'a str,
}

#[derive(Serialize)]
struct CanonicalProposal<'a> {
    ledger: CanonicalLedger<'a>,
    primary_account: CanonicalAccount<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    commit: Option<bool>,
}

#[derive(Serialize)]
struct CanonicalNewAccount<'a> {
    ledger: &'a str,
    public_key: &'a str,
}

#[derive(Serialize)]
struct CanonicalAccountProposal<'a> {
    account: CanonicalNewAccount<'a>,
}

#[derive(Serialize)]
struct LedgerRecord<'a> {
    kind: &'static str,
    public_key: &'a str,
    name: &'a str,
    url: &'a str,
    primary_account: &'a str,
}

#[derive(Serialize)]
struct AccountRecord<'a> {
    kind: &'static str,
    public_key: &'a str,
    code: &'a str,
    ledger: String,
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>, AccordError> {
    serde_json::to_vec(value).map_err(|e| AccordError::EncodingFailed {
        reason: e.to_string(),
    })
}

fn proposal_view(proposal: &LedgerProposal, commit: Option<bool>) -> CanonicalProposal<'_> {
    CanonicalProposal {
        ledger: CanonicalLedger {
            public_key: &proposal.ledger.public_key,
            name: &proposal.ledger.name,
            url: &proposal.ledger.url,
        },
        primary_account: CanonicalAccount {
            public_key: &proposal.primary_account.public_key,
        },
        commit,
    }
}

/// Canonical bytes of a prepare payload (ledger and primary account, no authentication).
pub fn canonicalize(proposal: &LedgerProposal) -> Result<Vec<u8>, AccordError> {
    to_json(&proposal_view(proposal, None))
}

/// Canonical bytes of a commit payload: the prepare payload plus `"commit":true`.
pub fn canonicalize_commit(proposal: &LedgerProposal) -> Result<Vec<u8>, AccordError> {
    to_json(&proposal_view(proposal, Some(true)))
}

/// Canonical bytes of an additional-account prepare payload.
pub fn canonicalize_account(proposal: &AccountProposal) -> Result<Vec<u8>, AccordError> {
    to_json(&CanonicalAccountProposal {
        account: CanonicalNewAccount {
            ledger: &proposal.ledger,
            public_key: &proposal.public_key,
        },
    })
}

/// Canonical bytes of a stored ledger.
pub fn ledger_bytes(ledger: &Ledger) -> Result<Vec<u8>, AccordError> {
    to_json(&LedgerRecord {
        kind: "ledger",
        public_key: &ledger.public_key,
        name: &ledger.name,
        url: &ledger.url,
        primary_account: &ledger.primary_account,
    })
}

/// Canonical bytes of a stored account.
pub fn account_bytes(account: &Account) -> Result<Vec<u8>, AccordError> {
    to_json(&AccountRecord {
        kind: "account",
        public_key: &account.public_key,
        code: &account.code,
        ledger: hex::encode(account.ledger),
    })
}

/// Message signed for a confirmation: phase tag, separator, entity bytes.
pub fn confirmation_message(phase: Phase, entity: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(entity.len() + 2);
    data.push(phase.tag());
    data.push(b':');
    data.extend_from_slice(entity);
    data
}
