/// 32-byte BLAKE3 hash.
pub type Hash = [u8; 32];

/// Identifier of a ledger: BLAKE3 of its PEM-encoded public key.
pub type LedgerId = Hash;

/// Identifier of a consensus node (its URL).
pub type NodeId = String;

/// Account balance in the ledger's smallest unit.
pub type Balance = i64;

/// Store-assigned sequence number of a confirmation row.
pub type ConfirmationId = u64;

/// BLAKE3 digest of a PEM public key, used as a fixed-size storage key.
pub fn key_digest(public_key: &str) -> Hash {
    *blake3::hash(public_key.as_bytes()).as_bytes()
}

/// Derive the ledger identifier from its public key.
pub fn ledger_id(public_key: &str) -> LedgerId {
    key_digest(public_key)
}

/// Short hex prefix of an id, for log fields.
pub fn short_id(id: &Hash) -> String {
    id[..6].iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_id_deterministic() {
        assert_eq!(ledger_id("key-a"), ledger_id("key-a"));
        assert_ne!(ledger_id("key-a"), ledger_id("key-b"));
    }

    #[test]
    fn test_short_id_is_twelve_hex_chars() {
        let id = ledger_id("key-a");
        let short = short_id(&id);
        assert_eq!(short.len(), 12);
        assert!(short.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
