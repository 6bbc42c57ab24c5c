use md5::{Digest, Md5};

/// Derive an account code: lowercase hex of the MD5 digest of the public key.
///
/// Identity derivation only; MD5 provides no security here.
pub fn account_code(public_key: &str) -> String {
    hex::encode(Md5::digest(public_key.as_bytes()))
}
