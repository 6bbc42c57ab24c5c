//! Shared type definitions for the Accord ledger consensus protocol.

pub mod confirmation;
pub mod currency;
pub mod error;
pub mod ledger;
pub mod message;
pub mod node;
pub mod primitives;
