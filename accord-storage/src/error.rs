use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Key already exists: {key}")]
    KeyExists { key: String },

    #[error("Read error: {reason}")]
    ReadError { reason: String },

    #[error("SQLite error: {reason}")]
    SqliteError { reason: String },

    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },

    #[error("Deserialization error: {reason}")]
    DeserializationError { reason: String },

    #[error("Batch error: {reason}")]
    BatchError { reason: String },
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::SqliteError {
            reason: err.to_string(),
        }
    }
}

/// Printable form of a binary key for error messages.
pub(crate) fn display_key(key: &[u8]) -> String {
    key.iter()
        .map(|b| {
            if b.is_ascii_graphic() {
                (*b as char).to_string()
            } else {
                format!("\\x{:02x}", b)
            }
        })
        .collect()
}
