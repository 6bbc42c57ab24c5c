use accord_crypto::canonical::{canonicalize, canonicalize_account, canonicalize_commit};
use accord_crypto::hash::account_code;
use accord_crypto::keys::{verify_with, RsaPublicKey};
use accord_storage::error::StorageError;
use accord_storage::ledger_store::LedgerStore;
use accord_storage::traits::BatchWriter;
use accord_types::confirmation::{
    Attestor, Confirmation, ConfirmationCounts, LedgerStatus, Phase, Subject,
};
use accord_types::currency::Currency;
use accord_types::ledger::{Account, Ledger};
use accord_types::message::{
    AccountPrepareMessage, AccountProposal, AccountReceipt, Authentication, CommitMessage,
    CreateRequest, LedgerProposal, LedgerReceipt, OutboundPrepare, PrepareMessage,
};
use accord_types::node::ConsensusNode;
use accord_types::primitives::{key_digest, ledger_id, short_id, ConfirmationId, LedgerId};

use crate::broadcast::Broadcaster;
use crate::error::ConsensusError;
use crate::identity::LocalIdentity;
use crate::quorum::QuorumPolicy;
use crate::registry::NodeRegistry;
use crate::signable::{Confirmable, Signable};
use crate::validation::{validate_account, validate_currency, validate_proposal};

/// Outcome of re-verifying the stored confirmations of a ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfirmationAudit {
    pub verified: usize,
    /// Signed confirmations whose signature did not verify, or whose attestor is unknown.
    pub rejected: Vec<ConfirmationId>,
    /// Confirmations stored without a signature.
    pub unsigned: usize,
}

impl ConfirmationAudit {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Orchestrates ledger creation, prepare reception, and commit reception.
///
/// Each operation runs independently and may race with others for the same
/// ledger; the store's unique inserts are the only synchronization.
pub struct ConsensusEngine<S: BatchWriter, B: Broadcaster> {
    identity: LocalIdentity,
    registry: NodeRegistry,
    store: LedgerStore<S>,
    broadcaster: B,
    exclude_sender: bool,
}

impl<S: BatchWriter, B: Broadcaster> ConsensusEngine<S, B> {
    pub fn new(
        identity: LocalIdentity,
        registry: NodeRegistry,
        store: LedgerStore<S>,
        broadcaster: B,
    ) -> Self {
        Self {
            identity,
            registry,
            store,
            broadcaster,
            exclude_sender: true,
        }
    }

    /// Whether onward broadcasts skip the peer a prepare came from. On by default.
    pub fn with_exclude_sender(mut self, exclude_sender: bool) -> Self {
        self.exclude_sender = exclude_sender;
        self
    }

    pub fn node_id(&self) -> &str {
        &self.identity.node
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Number of nodes in the cluster, this one included.
    pub fn cluster_size(&self) -> usize {
        self.registry.len() + 1
    }

    /// Originate a ledger on this node and broadcast it to every peer.
    pub fn create(&self, request: CreateRequest) -> Result<LedgerReceipt, ConsensusError> {
        let primary_account = request
            .primary_account
            .ok_or_else(|| ConsensusError::validation("primary_account is required"))?;
        let proposal = LedgerProposal {
            ledger: request.ledger,
            primary_account,
        };

        validate_proposal(&proposal)?;
        self.ensure_unregistered(&proposal)?;
        let authentication = self.authenticate(&canonicalize(&proposal)?)?;

        let (ledger, account) = self.persist(&proposal)?;
        self.confirm(&ledger, Phase::Prepare, self.identity.attestor(), None)?;
        self.confirm(
            &account,
            Phase::Prepare,
            Attestor::Account(account.public_key.clone()),
            None,
        )?;

        let targets = self.registry.peers();
        tracing::info!(
            ledger = %short_id(&ledger.id),
            name = %ledger.name,
            peers = targets.len(),
            "ledger created"
        );
        self.broadcaster.broadcast(
            OutboundPrepare::Ledger(PrepareMessage::new(proposal, authentication)),
            targets,
        );

        self.receipt(true, ledger, account)
    }

    /// Accept a peer's authenticated prepare.
    ///
    /// A ledger seen for the first time is persisted and forwarded; one that is
    /// already known only gains this node's prepare confirmation, once per sender.
    pub fn prepare(&self, message: PrepareMessage) -> Result<LedgerReceipt, ConsensusError> {
        let proposal = message.proposal();
        let payload = canonicalize(&proposal)?;
        self.verify_sender(&message.authentication, &payload)?;
        let sender = message.authentication.node.as_str();

        if let Some(ledger) = self.store.load_ledger(&proposal.ledger.public_key)? {
            let account = self.primary_account_of(&ledger)?;
            ensure_consistent(&ledger, &proposal)?;
            let recorded =
                self.confirm(&ledger, Phase::Prepare, self.identity.attestor(), Some(sender))?;
            tracing::debug!(
                ledger = %short_id(&ledger.id),
                from = %sender,
                recorded,
                "prepare acknowledged for known ledger"
            );
            return self.receipt(false, ledger, account);
        }

        validate_proposal(&proposal)?;
        self.ensure_unregistered(&proposal)?;
        let (ledger, account) = self.persist(&proposal)?;
        self.confirm(&ledger, Phase::Prepare, self.identity.attestor(), Some(sender))?;

        let targets = self.forward_targets(sender);
        tracing::info!(
            ledger = %short_id(&ledger.id),
            from = %sender,
            peers = targets.len(),
            "ledger prepared from peer"
        );
        self.broadcaster
            .broadcast(OutboundPrepare::Ledger(message), targets);

        self.receipt(true, ledger, account)
    }

    /// Record a commit vote for a known ledger. Each sender votes at most once.
    ///
    /// Commits authenticated by this node itself are accepted, so a caller
    /// colocated with the node can drive the commit round.
    pub fn commit(&self, message: CommitMessage) -> Result<LedgerReceipt, ConsensusError> {
        let proposal = message.proposal();
        let payload = canonicalize_commit(&proposal)?;
        self.verify_sender(&message.authentication, &payload)?;
        if !message.commit {
            return Err(ConsensusError::validation("commit flag must be true"));
        }

        let ledger = self
            .store
            .load_ledger(&proposal.ledger.public_key)?
            .ok_or_else(|| ConsensusError::NotFound {
                public_key: proposal.ledger.public_key.clone(),
            })?;
        let account = self.primary_account_of(&ledger)?;
        ensure_consistent(&ledger, &proposal)?;
        let sender = message.authentication.node.as_str();
        if self.confirm(&ledger, Phase::Commit, self.identity.attestor(), Some(sender))? {
            tracing::info!(ledger = %short_id(&ledger.id), from = %sender, "commit recorded");
        } else {
            tracing::info!(
                ledger = %short_id(&ledger.id),
                from = %sender,
                "repeated commit ignored"
            );
        }
        self.receipt(false, ledger, account)
    }

    /// Open an additional account under a ledger this node holds and
    /// broadcast it to every peer.
    pub fn create_account(
        &self,
        proposal: AccountProposal,
    ) -> Result<AccountReceipt, ConsensusError> {
        validate_account(&proposal)?;
        let ledger = self.require_ledger(&proposal.ledger)?;
        if self.store.account_exists(&proposal.public_key)? {
            return Err(ConsensusError::validation(
                "account public_key is already registered",
            ));
        }
        let authentication = self.authenticate(&canonicalize_account(&proposal)?)?;

        let account = self.persist_account(&ledger, &proposal)?;
        self.confirm(&account, Phase::Prepare, self.identity.attestor(), None)?;

        let targets = self.registry.peers();
        tracing::info!(
            ledger = %short_id(&ledger.id),
            account = %account.code,
            peers = targets.len(),
            "account created"
        );
        self.broadcaster.broadcast(
            OutboundPrepare::Account(AccountPrepareMessage::new(proposal, authentication)),
            targets,
        );

        self.account_receipt(true, account)
    }

    /// Accept a peer's authenticated prepare for an additional account.
    ///
    /// The owning ledger must already be held here. Propagation mirrors
    /// [`prepare`](Self::prepare): first sight persists and forwards, later
    /// prepares add one confirmation per sender.
    pub fn prepare_account(
        &self,
        message: AccountPrepareMessage,
    ) -> Result<AccountReceipt, ConsensusError> {
        let payload = canonicalize_account(&message.account)?;
        self.verify_sender(&message.authentication, &payload)?;
        let sender = message.authentication.node.as_str();
        let proposal = &message.account;

        if let Some(account) = self.store.load_account(&proposal.public_key)? {
            if account.ledger != ledger_id(&proposal.ledger) {
                return Err(ConsensusError::validation(
                    "account belongs to a different ledger",
                ));
            }
            if self.is_primary(&account)? {
                return Err(ConsensusError::validation(
                    "primary accounts are confirmed with their ledger",
                ));
            }
            let recorded =
                self.confirm(&account, Phase::Prepare, self.identity.attestor(), Some(sender))?;
            tracing::debug!(
                account = %account.code,
                from = %sender,
                recorded,
                "prepare acknowledged for known account"
            );
            return self.account_receipt(false, account);
        }

        validate_account(proposal)?;
        let ledger = self.require_ledger(&proposal.ledger)?;
        let account = self.persist_account(&ledger, proposal)?;
        self.confirm(&account, Phase::Prepare, self.identity.attestor(), Some(sender))?;

        let targets = self.forward_targets(sender);
        tracing::info!(
            ledger = %short_id(&ledger.id),
            account = %account.code,
            from = %sender,
            peers = targets.len(),
            "account prepared from peer"
        );
        self.broadcaster
            .broadcast(OutboundPrepare::Account(message), targets);

        self.account_receipt(true, account)
    }

    /// Register a currency. Currencies are local to this node and never broadcast.
    pub fn create_currency(&self, currency: Currency) -> Result<Currency, ConsensusError> {
        validate_currency(&currency)?;
        if self.store.currency_exists(&currency.name)? {
            return Err(ConsensusError::validation(
                "currency name is already registered",
            ));
        }
        if self.store.currency_key_exists(&currency.public_key)? {
            return Err(ConsensusError::validation(
                "currency public_key is already registered",
            ));
        }
        claim(self.store.insert_currency(&currency), &currency.public_key)?;
        tracing::info!(name = %currency.name, "currency registered");
        Ok(currency)
    }

    pub fn currency(&self, name: &str) -> Result<Option<Currency>, ConsensusError> {
        Ok(self.store.load_currency(name)?)
    }

    pub fn currencies(&self) -> Result<Vec<Currency>, ConsensusError> {
        Ok(self.store.list_currencies()?)
    }

    /// Look up a ledger with its primary account and current counts.
    pub fn ledger(&self, public_key: &str) -> Result<Option<LedgerReceipt>, ConsensusError> {
        match self.store.load_ledger(public_key)? {
            Some(ledger) => {
                let account = self.primary_account_of(&ledger)?;
                Ok(Some(self.receipt(false, ledger, account)?))
            }
            None => Ok(None),
        }
    }

    pub fn ledgers(&self) -> Result<Vec<Ledger>, ConsensusError> {
        Ok(self.store.list_ledgers()?)
    }

    pub fn ledger_count(&self) -> Result<usize, ConsensusError> {
        Ok(self.store.ledger_count()?)
    }

    /// An account with the confirmations it holds in its own right.
    pub fn account(&self, public_key: &str) -> Result<Option<AccountReceipt>, ConsensusError> {
        match self.store.load_account(public_key)? {
            Some(account) => Ok(Some(self.account_receipt(false, account)?)),
            None => Ok(None),
        }
    }

    /// Every account of a ledger, the primary one included.
    pub fn accounts(&self, ledger_public_key: &str) -> Result<Vec<Account>, ConsensusError> {
        let ledger = self.require_ledger(ledger_public_key)?;
        Ok(self.store.ledger_accounts(&ledger.id)?)
    }

    pub fn account_by_code(&self, code: &str) -> Result<Option<Account>, ConsensusError> {
        Ok(self.store.load_account_by_code(code)?)
    }

    pub fn confirmation_counts(
        &self,
        public_key: &str,
    ) -> Result<ConfirmationCounts, ConsensusError> {
        let ledger = self.require_ledger(public_key)?;
        self.counts(&ledger)
    }

    /// Every confirmation counted for a ledger, prepares first.
    pub fn confirmations(&self, public_key: &str) -> Result<Vec<Confirmation>, ConsensusError> {
        let ledger = self.require_ledger(public_key)?;
        let primary = Subject::account(&ledger.primary_account);
        let mut all = Vec::new();
        for phase in [Phase::Prepare, Phase::Commit] {
            for subject in [ledger.subject(), primary] {
                all.extend(self.store.confirmations(&subject, phase)?);
            }
        }
        Ok(all)
    }

    /// Status of a ledger under the given quorum policy.
    pub fn status(
        &self,
        public_key: &str,
        policy: &QuorumPolicy,
    ) -> Result<LedgerStatus, ConsensusError> {
        Ok(policy.status(self.confirmation_counts(public_key)?))
    }

    /// Re-verify every stored confirmation of a ledger and its primary account.
    ///
    /// Node attestors are checked against this node or the registry; account
    /// attestors are endorsements made by this node's key.
    pub fn audit_confirmations(
        &self,
        public_key: &str,
    ) -> Result<ConfirmationAudit, ConsensusError> {
        let ledger = self.require_ledger(public_key)?;
        let account = self.primary_account_of(&ledger)?;
        let local_key = self.identity.key.public_key();

        let mut audit = ConfirmationAudit::default();
        self.audit_entity(&ledger, None, &local_key, &mut audit)?;
        self.audit_entity(&account, Some(&account.public_key), &local_key, &mut audit)?;

        if !audit.is_clean() {
            tracing::warn!(
                ledger = %short_id(&ledger.id),
                rejected = audit.rejected.len(),
                "confirmation audit found unverifiable signatures"
            );
        }
        Ok(audit)
    }

    fn audit_entity<E: Signable + Confirmable>(
        &self,
        entity: &E,
        endorsed: Option<&str>,
        local_key: &RsaPublicKey,
        audit: &mut ConfirmationAudit,
    ) -> Result<(), ConsensusError> {
        for phase in [Phase::Prepare, Phase::Commit] {
            for confirmation in self.store.confirmations(&entity.subject(), phase)? {
                if !confirmation.is_signed() {
                    audit.unsigned += 1;
                    continue;
                }
                let key = match &confirmation.attestor {
                    Attestor::Node(node) => self.node_key(node, local_key),
                    Attestor::Account(public_key) if Some(public_key.as_str()) == endorsed => {
                        Some(local_key)
                    }
                    Attestor::Account(_) => None,
                };
                let valid = match key {
                    Some(key) => entity.verify_signature(key, phase, &confirmation.signature)?,
                    None => false,
                };
                if valid {
                    audit.verified += 1;
                } else {
                    audit.rejected.push(confirmation.id);
                }
            }
        }
        Ok(())
    }

    fn node_key<'a>(&'a self, node: &str, local: &'a RsaPublicKey) -> Option<&'a RsaPublicKey> {
        if node == self.identity.node {
            Some(local)
        } else {
            self.registry.verifying_key(node)
        }
    }

    fn authenticate(&self, payload: &[u8]) -> Result<Authentication, ConsensusError> {
        Ok(Authentication {
            node: self.identity.node.clone(),
            signature: self.identity.key.sign(payload)?,
        })
    }

    fn verify_sender(
        &self,
        authentication: &Authentication,
        payload: &[u8],
    ) -> Result<(), ConsensusError> {
        let local = self.identity.key.public_key();
        let Some(key) = self.node_key(&authentication.node, &local) else {
            tracing::warn!(node = %authentication.node, "message from unknown node");
            return Err(ConsensusError::authentication(format!(
                "unknown node: {}",
                authentication.node
            )));
        };
        if !verify_with(key, payload, &authentication.signature) {
            tracing::warn!(node = %authentication.node, "signature verification failed");
            return Err(ConsensusError::authentication(
                "signature does not match sender key",
            ));
        }
        Ok(())
    }

    fn forward_targets(&self, sender: &str) -> Vec<ConsensusNode> {
        self.registry
            .peers_excluding(self.exclude_sender.then_some(sender))
    }

    fn ensure_unregistered(&self, proposal: &LedgerProposal) -> Result<(), ConsensusError> {
        if self.store.ledger_exists(&proposal.ledger.public_key)? {
            return Err(ConsensusError::validation(
                "ledger public_key is already registered",
            ));
        }
        if self.store.account_exists(&proposal.primary_account.public_key)? {
            return Err(ConsensusError::validation(
                "primary_account public_key is already registered",
            ));
        }
        Ok(())
    }

    fn persist(&self, proposal: &LedgerProposal) -> Result<(Ledger, Account), ConsensusError> {
        let id = ledger_id(&proposal.ledger.public_key);
        let account = new_account(&proposal.primary_account.public_key, id);
        let ledger = Ledger {
            id,
            public_key: proposal.ledger.public_key.clone(),
            name: proposal.ledger.name.clone(),
            url: proposal.ledger.url.clone(),
            primary_account: account.public_key.clone(),
        };
        claim(
            self.store.insert_ledger(&ledger, &account),
            &ledger.public_key,
        )?;
        Ok((ledger, account))
    }

    fn persist_account(
        &self,
        ledger: &Ledger,
        proposal: &AccountProposal,
    ) -> Result<Account, ConsensusError> {
        let account = new_account(&proposal.public_key, ledger.id);
        claim(self.store.insert_account(&account), &account.public_key)?;
        Ok(account)
    }

    /// Sign and record a confirmation. False if `sender` had already confirmed.
    fn confirm<E: Signable + Confirmable>(
        &self,
        entity: &E,
        phase: Phase,
        attestor: Attestor,
        sender: Option<&str>,
    ) -> Result<bool, ConsensusError> {
        let signature = entity.sign_with(&self.identity.key, phase)?;
        Ok(entity
            .record_confirmation(&self.store, phase, attestor, sender, signature)?
            .is_some())
    }

    fn require_ledger(&self, public_key: &str) -> Result<Ledger, ConsensusError> {
        self.store
            .load_ledger(public_key)?
            .ok_or_else(|| ConsensusError::NotFound {
                public_key: public_key.to_string(),
            })
    }

    fn primary_account_of(&self, ledger: &Ledger) -> Result<Account, ConsensusError> {
        self.store.load_account(&ledger.primary_account)?.ok_or_else(|| {
            ConsensusError::Storage(StorageError::ReadError {
                reason: format!("primary account missing for ledger {}", short_id(&ledger.id)),
            })
        })
    }

    fn is_primary(&self, account: &Account) -> Result<bool, ConsensusError> {
        Ok(self
            .store
            .load_ledger_by_id(&account.ledger)?
            .is_some_and(|ledger| ledger.primary_account == account.public_key))
    }

    /// The primary account's endorsement belongs to the ledger's prepare round.
    fn counts(&self, ledger: &Ledger) -> Result<ConfirmationCounts, ConsensusError> {
        let primary = Subject::account(&ledger.primary_account);
        Ok(ConfirmationCounts {
            prepared: self.store.count_signed(&ledger.subject(), Phase::Prepare)?
                + self.store.count_signed(&primary, Phase::Prepare)?,
            committed: self.store.count_signed(&ledger.subject(), Phase::Commit)?,
        })
    }

    fn receipt(
        &self,
        created: bool,
        ledger: Ledger,
        primary_account: Account,
    ) -> Result<LedgerReceipt, ConsensusError> {
        let counts = self.counts(&ledger)?;
        Ok(LedgerReceipt {
            created,
            ledger,
            primary_account,
            counts,
        })
    }

    fn account_receipt(
        &self,
        created: bool,
        account: Account,
    ) -> Result<AccountReceipt, ConsensusError> {
        let subject = account.subject();
        let counts = ConfirmationCounts {
            prepared: self.store.count_signed(&subject, Phase::Prepare)?,
            committed: self.store.count_signed(&subject, Phase::Commit)?,
        };
        Ok(AccountReceipt {
            created,
            account,
            counts,
        })
    }
}

fn new_account(public_key: &str, ledger: LedgerId) -> Account {
    Account {
        public_key: public_key.to_string(),
        code: account_code(public_key),
        balance: 0,
        ledger,
    }
}

/// Map a lost unique insert onto [`ConsensusError::Duplicate`].
fn claim(result: Result<(), StorageError>, public_key: &str) -> Result<(), ConsensusError> {
    match result {
        Ok(()) => Ok(()),
        Err(StorageError::KeyExists { .. }) => {
            tracing::info!(key = %short_id(&key_digest(public_key)), "lost concurrent creation race");
            Err(ConsensusError::Duplicate {
                public_key: public_key.to_string(),
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// A known ledger only accepts messages that describe it exactly.
fn ensure_consistent(ledger: &Ledger, proposal: &LedgerProposal) -> Result<(), ConsensusError> {
    if ledger.fields() != proposal.ledger
        || ledger.primary_account != proposal.primary_account.public_key
    {
        return Err(ConsensusError::validation(
            "proposal conflicts with the stored ledger",
        ));
    }
    Ok(())
}
