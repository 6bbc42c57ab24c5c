use std::sync::atomic::{AtomicU64, Ordering};

use borsh::{BorshDeserialize, BorshSerialize};

use accord_types::confirmation::{Attestor, Confirmation, Phase, Subject};
use accord_types::currency::Currency;
use accord_types::ledger::{Account, Ledger};
use accord_types::primitives::{key_digest, LedgerId};

use crate::error::StorageError;
use crate::traits::{BatchOp, BatchWriter};

const LEDGER_PREFIX: &[u8] = b"ledger:";
const ACCOUNT_PREFIX: &[u8] = b"account:";
const ACCOUNT_CODE_PREFIX: &[u8] = b"account_code:";
const LEDGER_ACCOUNT_PREFIX: &[u8] = b"ledger_account:";
const CONFIRMATION_PREFIX: &[u8] = b"confirm:";
const VOTE_PREFIX: &[u8] = b"vote:";
const CURRENCY_PREFIX: &[u8] = b"currency:";
const CURRENCY_KEY_PREFIX: &[u8] = b"currency_key:";

/// Durable records for ledgers, accounts, currencies, and confirmations.
///
/// Ledger, account, and currency rows are written with unique inserts, so two
/// concurrent creators of the same entity can never both succeed.
/// Confirmations are append-only and keyed by a store-wide sequence number.
pub struct LedgerStore<S: BatchWriter> {
    store: S,
    next_confirmation: AtomicU64,
}

fn encode<T: BorshSerialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    borsh::to_vec(value).map_err(|e| StorageError::SerializationError {
        reason: e.to_string(),
    })
}

fn decode<T: BorshDeserialize>(bytes: &[u8]) -> Result<T, StorageError> {
    T::try_from_slice(bytes).map_err(|e| StorageError::DeserializationError {
        reason: e.to_string(),
    })
}

fn decode_string(bytes: Vec<u8>) -> Result<String, StorageError> {
    String::from_utf8(bytes).map_err(|e| StorageError::DeserializationError {
        reason: e.to_string(),
    })
}

fn prefixed(prefix: &[u8], suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + suffix.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(suffix);
    key
}

fn ledger_key(id: &LedgerId) -> Vec<u8> {
    prefixed(LEDGER_PREFIX, id)
}

fn account_key(public_key: &str) -> Vec<u8> {
    prefixed(ACCOUNT_PREFIX, &key_digest(public_key))
}

fn account_code_key(code: &str) -> Vec<u8> {
    prefixed(ACCOUNT_CODE_PREFIX, code.as_bytes())
}

fn ledger_account_key(ledger: &LedgerId, public_key: &str) -> Vec<u8> {
    let mut key = prefixed(LEDGER_ACCOUNT_PREFIX, ledger);
    key.extend_from_slice(&key_digest(public_key));
    key
}

fn currency_key(name: &str) -> Vec<u8> {
    prefixed(CURRENCY_PREFIX, name.as_bytes())
}

fn currency_public_key_key(public_key: &str) -> Vec<u8> {
    prefixed(CURRENCY_KEY_PREFIX, &key_digest(public_key))
}

/// `prefix`, subject tag, subject id, phase tag.
fn subject_phase_key(prefix: &[u8], subject: &Subject, phase: Phase) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 2 + 32);
    key.extend_from_slice(prefix);
    key.push(subject.tag());
    key.extend_from_slice(subject.id());
    key.push(phase.tag());
    key
}

fn confirmation_key(subject: &Subject, phase: Phase, id: u64) -> Vec<u8> {
    let mut key = subject_phase_key(CONFIRMATION_PREFIX, subject, phase);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn vote_key(subject: &Subject, phase: Phase, sender: &str) -> Vec<u8> {
    let mut key = subject_phase_key(VOTE_PREFIX, subject, phase);
    key.extend_from_slice(&key_digest(sender));
    key
}

fn account_ops(account: &Account) -> Result<Vec<BatchOp>, StorageError> {
    Ok(vec![
        BatchOp::Insert {
            key: account_key(&account.public_key),
            value: encode(account)?,
        },
        BatchOp::Put {
            key: account_code_key(&account.code),
            value: account.public_key.as_bytes().to_vec(),
        },
        BatchOp::Put {
            key: ledger_account_key(&account.ledger, &account.public_key),
            value: account.public_key.as_bytes().to_vec(),
        },
    ])
}

impl<S: BatchWriter> LedgerStore<S> {
    /// Wrap a store, recovering the confirmation sequence from existing rows.
    pub fn new(store: S) -> Result<Self, StorageError> {
        let mut next = 1;
        for (_, value) in store.prefix_scan(CONFIRMATION_PREFIX)? {
            let confirmation: Confirmation = decode(&value)?;
            next = next.max(confirmation.id + 1);
        }
        Ok(Self {
            store,
            next_confirmation: AtomicU64::new(next),
        })
    }

    /// Atomically persist a ledger together with its primary account.
    ///
    /// Fails with [`StorageError::KeyExists`] if either public key is taken.
    pub fn insert_ledger(&self, ledger: &Ledger, account: &Account) -> Result<(), StorageError> {
        let mut ops = vec![BatchOp::Insert {
            key: ledger_key(&ledger.id),
            value: encode(ledger)?,
        }];
        ops.extend(account_ops(account)?);
        self.store.write_batch(ops)
    }

    /// Persist an additional account under an already stored ledger.
    ///
    /// Fails with [`StorageError::KeyExists`] if the public key is taken.
    pub fn insert_account(&self, account: &Account) -> Result<(), StorageError> {
        self.store.write_batch(account_ops(account)?)
    }

    pub fn load_ledger(&self, public_key: &str) -> Result<Option<Ledger>, StorageError> {
        self.load_ledger_by_id(&key_digest(public_key))
    }

    pub fn load_ledger_by_id(&self, id: &LedgerId) -> Result<Option<Ledger>, StorageError> {
        match self.store.get(&ledger_key(id))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn ledger_exists(&self, public_key: &str) -> Result<bool, StorageError> {
        self.store.exists(&ledger_key(&key_digest(public_key)))
    }

    pub fn load_account(&self, public_key: &str) -> Result<Option<Account>, StorageError> {
        match self.store.get(&account_key(public_key))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn account_exists(&self, public_key: &str) -> Result<bool, StorageError> {
        self.store.exists(&account_key(public_key))
    }

    /// Look up an account by its MD5-derived code.
    pub fn load_account_by_code(&self, code: &str) -> Result<Option<Account>, StorageError> {
        match self.store.get(&account_code_key(code))? {
            Some(bytes) => self.load_account(&decode_string(bytes)?),
            None => Ok(None),
        }
    }

    /// Every account of a ledger, the primary one included.
    pub fn ledger_accounts(&self, ledger: &LedgerId) -> Result<Vec<Account>, StorageError> {
        let mut accounts = Vec::new();
        for (_, value) in self.store.prefix_scan(&prefixed(LEDGER_ACCOUNT_PREFIX, ledger))? {
            if let Some(account) = self.load_account(&decode_string(value)?)? {
                accounts.push(account);
            }
        }
        Ok(accounts)
    }

    /// All ledgers, ordered by id.
    pub fn list_ledgers(&self) -> Result<Vec<Ledger>, StorageError> {
        self.store
            .prefix_scan(LEDGER_PREFIX)?
            .iter()
            .map(|(_, value)| decode(value))
            .collect()
    }

    pub fn ledger_count(&self) -> Result<usize, StorageError> {
        Ok(self.store.prefix_scan(LEDGER_PREFIX)?.len())
    }

    /// Persist a currency, claiming both its name and its public key.
    pub fn insert_currency(&self, currency: &Currency) -> Result<(), StorageError> {
        self.store.write_batch(vec![
            BatchOp::Insert {
                key: currency_key(&currency.name),
                value: encode(currency)?,
            },
            BatchOp::Insert {
                key: currency_public_key_key(&currency.public_key),
                value: currency.name.as_bytes().to_vec(),
            },
        ])
    }

    pub fn load_currency(&self, name: &str) -> Result<Option<Currency>, StorageError> {
        match self.store.get(&currency_key(name))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn currency_exists(&self, name: &str) -> Result<bool, StorageError> {
        self.store.exists(&currency_key(name))
    }

    pub fn currency_key_exists(&self, public_key: &str) -> Result<bool, StorageError> {
        self.store.exists(&currency_public_key_key(public_key))
    }

    /// All currencies, ordered by name.
    pub fn list_currencies(&self) -> Result<Vec<Currency>, StorageError> {
        self.store
            .prefix_scan(CURRENCY_PREFIX)?
            .iter()
            .map(|(_, value)| decode(value))
            .collect()
    }

    /// Append a confirmation row and return it with its assigned id.
    ///
    /// A confirmation caused by a remote `sender` is recorded at most once per
    /// subject and phase; a repeat returns `Ok(None)` and writes nothing.
    pub fn append_confirmation(
        &self,
        subject: Subject,
        phase: Phase,
        attestor: Attestor,
        sender: Option<&str>,
        signature: String,
    ) -> Result<Option<Confirmation>, StorageError> {
        let id = self.next_confirmation.fetch_add(1, Ordering::SeqCst);
        let confirmation = Confirmation {
            id,
            subject,
            phase,
            attestor,
            sender: sender.map(str::to_string),
            signature,
        };
        let mut ops = vec![BatchOp::Insert {
            key: confirmation_key(&subject, phase, id),
            value: encode(&confirmation)?,
        }];
        if let Some(sender) = sender {
            ops.push(BatchOp::Insert {
                key: vote_key(&subject, phase, sender),
                value: id.to_be_bytes().to_vec(),
            });
        }
        match self.store.write_batch(ops) {
            Ok(()) => Ok(Some(confirmation)),
            Err(StorageError::KeyExists { .. }) if sender.is_some() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Confirmations of one phase for a subject, in append order.
    pub fn confirmations(
        &self,
        subject: &Subject,
        phase: Phase,
    ) -> Result<Vec<Confirmation>, StorageError> {
        self.store
            .prefix_scan(&subject_phase_key(CONFIRMATION_PREFIX, subject, phase))?
            .iter()
            .map(|(_, value)| decode(value))
            .collect()
    }

    /// Number of signed confirmations of one phase for a subject.
    pub fn count_signed(&self, subject: &Subject, phase: Phase) -> Result<usize, StorageError> {
        Ok(self
            .confirmations(subject, phase)?
            .iter()
            .filter(|c| c.is_signed())
            .count())
    }
}
