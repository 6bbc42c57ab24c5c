//! Consensus engine for the Accord protocol.
//!
//! Nodes agree on the creation of ledgers through a signed, gossip-style
//! two-phase exchange: the originating node persists the ledger and broadcasts
//! an authenticated prepare to its peers, every node that learns of the ledger
//! records a prepare confirmation, and commit votes are recorded as they arrive.
//! Ledger status is always derived from confirmation counts.
//!
//! Additional accounts under a known ledger propagate the same way. Currencies
//! are registered per node and are not broadcast.

pub mod broadcast;
pub mod engine;
pub mod error;
pub mod identity;
pub mod quorum;
pub mod registry;
pub mod signable;
pub mod validation;
