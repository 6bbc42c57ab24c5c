//! Storage abstraction for the Accord protocol.
//!
//! Provides a [`KvStore`](traits::KvStore) trait with memory and SQLite
//! backends, plus the [`LedgerStore`](ledger_store::LedgerStore) that enforces
//! the ledger/account uniqueness invariants and holds confirmations.

pub mod error;
pub mod ledger_store;
pub mod memory;
pub mod sqlite;
pub mod traits;
