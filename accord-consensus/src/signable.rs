//! Capabilities shared by the entities a node can attest to.

use accord_crypto::canonical::{account_bytes, confirmation_message, ledger_bytes};
use accord_crypto::keys::{verify_with, NodeKey, RsaPublicKey};
use accord_storage::error::StorageError;
use accord_storage::ledger_store::LedgerStore;
use accord_storage::traits::BatchWriter;
use accord_types::confirmation::{Attestor, Confirmation, Phase, Subject};
use accord_types::error::AccordError;
use accord_types::ledger::{Account, Ledger};

/// An entity with a canonical byte form that can be signed for a phase.
pub trait Signable {
    fn signing_bytes(&self) -> Result<Vec<u8>, AccordError>;

    fn sign_with(&self, key: &NodeKey, phase: Phase) -> Result<String, AccordError> {
        key.sign(&confirmation_message(phase, &self.signing_bytes()?))
    }

    fn verify_signature(
        &self,
        key: &RsaPublicKey,
        phase: Phase,
        signature: &str,
    ) -> Result<bool, AccordError> {
        let message = confirmation_message(phase, &self.signing_bytes()?);
        Ok(verify_with(key, &message, signature))
    }
}

/// An entity that collects confirmations of its own.
pub trait Confirmable {
    fn subject(&self) -> Subject;

    /// Record a confirmation. `None` if `sender` already confirmed this phase.
    fn record_confirmation<S: BatchWriter>(
        &self,
        store: &LedgerStore<S>,
        phase: Phase,
        attestor: Attestor,
        sender: Option<&str>,
        signature: String,
    ) -> Result<Option<Confirmation>, StorageError> {
        store.append_confirmation(self.subject(), phase, attestor, sender, signature)
    }
}

impl Signable for Ledger {
    fn signing_bytes(&self) -> Result<Vec<u8>, AccordError> {
        ledger_bytes(self)
    }
}

impl Confirmable for Ledger {
    fn subject(&self) -> Subject {
        Subject::Ledger(self.id)
    }
}

impl Signable for Account {
    fn signing_bytes(&self) -> Result<Vec<u8>, AccordError> {
        account_bytes(self)
    }
}

impl Confirmable for Account {
    fn subject(&self) -> Subject {
        Subject::account(&self.public_key)
    }
}
