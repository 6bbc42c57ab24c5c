use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use crate::error::{display_key, StorageError};
use crate::traits::{BatchOp, BatchWriter, KvPairs, KvStore};

/// In-memory key-value store backed by a BTreeMap.
/// Uses BTreeMap so that prefix_scan can leverage ordered iteration.
pub struct MemoryStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let data = self.data.read().map_err(|e| StorageError::ReadError {
            reason: e.to_string(),
        })?;
        Ok(data.get(key).cloned())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, StorageError> {
        let data = self.data.read().map_err(|e| StorageError::ReadError {
            reason: e.to_string(),
        })?;
        Ok(data.contains_key(key))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<KvPairs, StorageError> {
        let data = self.data.read().map_err(|e| StorageError::ReadError {
            reason: e.to_string(),
        })?;
        let results: KvPairs = data
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(results)
    }
}

impl BatchWriter for MemoryStore {
    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError> {
        let mut data = self.data.write().map_err(|e| StorageError::BatchError {
            reason: e.to_string(),
        })?;

        // Uniqueness is checked under the same write lock that applies the batch.
        let mut inserted = BTreeSet::new();
        for op in &ops {
            if let BatchOp::Insert { key, .. } = op {
                if data.contains_key(key) || !inserted.insert(key.as_slice()) {
                    return Err(StorageError::KeyExists {
                        key: display_key(key),
                    });
                }
            }
        }

        for op in ops {
            let (BatchOp::Put { key, value } | BatchOp::Insert { key, value }) = op;
            data.insert(key, value);
        }
        Ok(())
    }
}
