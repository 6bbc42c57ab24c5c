use std::sync::Mutex;

use rusqlite::{params, Connection, ErrorCode};

use crate::error::{display_key, StorageError};
use crate::traits::{BatchOp, BatchWriter, KvPairs, KvStore};

/// SQLite-backed key-value store.
/// Uses a single `kv` table with BLOB key and BLOB value columns. The primary
/// key constraint on `key` backs [`BatchOp::Insert`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new SQLite store at the given path.
    /// Use `:memory:` for an in-memory database (useful for tests).
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (key BLOB PRIMARY KEY, value BLOB NOT NULL)",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

impl KvStore for SqliteStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let conn = self.conn.lock().map_err(|e| StorageError::ReadError {
            reason: e.to_string(),
        })?;
        let mut stmt = conn.prepare_cached("SELECT value FROM kv WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => {
                let value: Vec<u8> = row.get(0)?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn exists(&self, key: &[u8]) -> Result<bool, StorageError> {
        let conn = self.conn.lock().map_err(|e| StorageError::ReadError {
            reason: e.to_string(),
        })?;
        let mut stmt = conn.prepare_cached("SELECT 1 FROM kv WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        Ok(rows.next()?.is_some())
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<KvPairs, StorageError> {
        let conn = self.conn.lock().map_err(|e| StorageError::ReadError {
            reason: e.to_string(),
        })?;

        let mut results = Vec::new();
        match increment_prefix(prefix) {
            Some(ref ub) => {
                let mut stmt = conn.prepare_cached(
                    "SELECT key, value FROM kv WHERE key >= ?1 AND key < ?2 ORDER BY key",
                )?;
                let mut rows = stmt.query(params![prefix, ub])?;
                while let Some(row) = rows.next()? {
                    let k: Vec<u8> = row.get(0)?;
                    let v: Vec<u8> = row.get(1)?;
                    results.push((k, v));
                }
            }
            None => {
                let mut stmt =
                    conn.prepare_cached("SELECT key, value FROM kv WHERE key >= ?1 ORDER BY key")?;
                let mut rows = stmt.query(params![prefix])?;
                while let Some(row) = rows.next()? {
                    let k: Vec<u8> = row.get(0)?;
                    if !k.starts_with(prefix) {
                        break;
                    }
                    let v: Vec<u8> = row.get(1)?;
                    results.push((k, v));
                }
            }
        }

        Ok(results)
    }
}

impl BatchWriter for SqliteStore {
    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError> {
        let conn = self.conn.lock().map_err(|e| StorageError::BatchError {
            reason: e.to_string(),
        })?;
        // Dropping the transaction without commit rolls the whole batch back.
        let tx = conn.unchecked_transaction()?;
        for op in ops {
            match op {
                BatchOp::Put { key, value } => {
                    tx.execute(
                        "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                        params![key, value],
                    )?;
                }
                BatchOp::Insert { key, value } => {
                    if let Err(e) = tx.execute(
                        "INSERT INTO kv (key, value) VALUES (?1, ?2)",
                        params![key, value],
                    ) {
                        if is_constraint_violation(&e) {
                            return Err(StorageError::KeyExists {
                                key: display_key(&key),
                            });
                        }
                        return Err(e.into());
                    }
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}

/// Increment a byte prefix to compute an exclusive upper bound.
/// Returns None if the prefix is all 0xFF bytes (no upper bound).
fn increment_prefix(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut result = prefix.to_vec();
    for i in (0..result.len()).rev() {
        if result[i] < 0xFF {
            result[i] += 1;
            result.truncate(i + 1);
            return Some(result);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> SqliteStore {
        SqliteStore::new(":memory:").unwrap()
    }

    fn put(key: &[u8], value: &[u8]) -> BatchOp {
        BatchOp::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        }
    }

    fn insert(key: &[u8], value: &[u8]) -> BatchOp {
        BatchOp::Insert {
            key: key.to_vec(),
            value: value.to_vec(),
        }
    }

    #[test]
    fn test_put_and_get() {
        let store = make_store();
        store.write_batch(vec![put(b"code:x", b"old")]).unwrap();
        store.write_batch(vec![put(b"code:x", b"new")]).unwrap();
        assert_eq!(store.get(b"code:x").unwrap(), Some(b"new".to_vec()));
        assert!(store.exists(b"code:x").unwrap());
        assert_eq!(store.get(b"code:y").unwrap(), None);
    }

    #[test]
    fn test_prefix_scan() {
        let store = make_store();
        store
            .write_batch(vec![
                insert(b"confirm:b", b"2"),
                insert(b"confirm:a", b"1"),
                put(b"account:d", b"4"),
            ])
            .unwrap();

        let results = store.prefix_scan(b"confirm:").unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, b"confirm:a".to_vec());
        assert_eq!(results[1].0, b"confirm:b".to_vec());
    }

    #[test]
    fn test_prefix_scan_without_upper_bound() {
        let store = make_store();
        store
            .write_batch(vec![insert(&[0xFF, 0x01], b"hi"), insert(&[0xFE], b"lo")])
            .unwrap();
        let results = store.prefix_scan(&[0xFF]).unwrap();
        assert_eq!(results, vec![(vec![0xFF, 0x01], b"hi".to_vec())]);
    }

    #[test]
    fn test_insert_collision_rolls_back_batch() {
        let store = make_store();
        store.write_batch(vec![put(b"taken", b"old")]).unwrap();

        let err = store
            .write_batch(vec![
                insert(b"fresh", b"new"),
                put(b"side", b"effect"),
                insert(b"taken", b"new"),
            ])
            .unwrap_err();

        assert!(matches!(err, StorageError::KeyExists { .. }));
        assert!(!store.exists(b"fresh").unwrap());
        assert!(!store.exists(b"side").unwrap());
        assert_eq!(store.get(b"taken").unwrap(), Some(b"old".to_vec()));
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accord.db");
        let path = path.to_str().unwrap();
        {
            let store = SqliteStore::new(path).unwrap();
            store.write_batch(vec![insert(b"durable", b"yes")]).unwrap();
        }
        let store = SqliteStore::new(path).unwrap();
        assert_eq!(store.get(b"durable").unwrap(), Some(b"yes".to_vec()));
        assert!(store.write_batch(vec![insert(b"durable", b"again")]).is_err());
    }

    #[test]
    fn test_increment_prefix() {
        assert_eq!(increment_prefix(b"ab"), Some(b"ac".to_vec()));
        assert_eq!(increment_prefix(&[0x01, 0xFF]), Some(vec![0x02]));
        assert_eq!(increment_prefix(&[0xFF, 0xFF]), None);
    }
}
