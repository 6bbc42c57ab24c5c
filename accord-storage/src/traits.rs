use std::sync::Arc;

use crate::error::StorageError;

/// Result type for prefix scan operations: a list of key-value byte pairs.
pub type KvPairs = Vec<(Vec<u8>, Vec<u8>)>;

/// Batch operation for atomic writes.
#[derive(Debug, Clone)]
pub enum BatchOp {
    /// Write, replacing any existing value.
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Write a key that must not exist yet. If any insert in a batch collides,
    /// the whole batch fails with [`StorageError::KeyExists`] and nothing is written.
    Insert { key: Vec<u8>, value: Vec<u8> },
}

/// Read side of a key-value store. All writes go through [`BatchWriter`].
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;
    fn exists(&self, key: &[u8]) -> Result<bool, StorageError>;
    fn prefix_scan(&self, prefix: &[u8]) -> Result<KvPairs, StorageError>;
}

/// Atomic batch writer trait.
pub trait BatchWriter: KvStore {
    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError>;
}

/// Blanket implementation of KvStore for `Arc<S>` so that a store can be shared
/// across multiple owners (e.g. for persistence-across-restart tests).
impl<S: KvStore + ?Sized> KvStore for Arc<S> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).get(key)
    }

    fn exists(&self, key: &[u8]) -> Result<bool, StorageError> {
        (**self).exists(key)
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<KvPairs, StorageError> {
        (**self).prefix_scan(prefix)
    }
}

impl<S: BatchWriter + ?Sized> BatchWriter for Arc<S> {
    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError> {
        (**self).write_batch(ops)
    }
}
