use std::fmt;

use accord_types::error::AccordError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
pub use rsa::RsaPublicKey;
use sha2::Sha256;

/// Modulus size used for freshly generated node keys.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// An RSA private key held by a node. Signs with RSASSA-PKCS1-v1_5 over SHA-256.
#[derive(Clone)]
pub struct NodeKey {
    inner: RsaPrivateKey,
}

impl NodeKey {
    /// Generate a new random key with the given modulus size.
    pub fn generate(bits: usize) -> Result<Self, AccordError> {
        let mut rng = rand::thread_rng();
        let inner =
            RsaPrivateKey::new(&mut rng, bits).map_err(|e| AccordError::InvalidKeyMaterial {
                reason: e.to_string(),
            })?;
        Ok(Self { inner })
    }

    /// Load a key from PKCS#8 (`BEGIN PRIVATE KEY`) or PKCS#1 (`BEGIN RSA PRIVATE KEY`) PEM.
    pub fn from_pem(pem: &str) -> Result<Self, AccordError> {
        let pem = pem.trim();
        let inner = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| AccordError::InvalidKeyMaterial {
                reason: e.to_string(),
            })?;
        Ok(Self { inner })
    }

    /// Export the private key as PKCS#8 PEM.
    pub fn to_pem(&self) -> Result<String, AccordError> {
        let pem = self
            .inner
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| AccordError::EncodingFailed {
                reason: e.to_string(),
            })?;
        Ok((*pem).clone())
    }

    pub fn public_key(&self) -> RsaPublicKey {
        self.inner.to_public_key()
    }

    /// The public half as SPKI PEM (`BEGIN PUBLIC KEY`).
    pub fn public_key_pem(&self) -> Result<String, AccordError> {
        self.inner
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| AccordError::EncodingFailed {
                reason: e.to_string(),
            })
    }

    /// Sign a message, returning the base64-encoded signature.
    pub fn sign(&self, message: &[u8]) -> Result<String, AccordError> {
        let signing_key = SigningKey::<Sha256>::new(self.inner.clone());
        let signature = signing_key
            .try_sign(message)
            .map_err(|e| AccordError::SigningFailed {
                reason: e.to_string(),
            })?;
        Ok(STANDARD.encode(signature.to_bytes()))
    }
}

impl fmt::Debug for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeKey")
            .field("bits", &(self.inner.size() * 8))
            .finish_non_exhaustive()
    }
}

/// Parse a PEM-encoded RSA public key in SPKI or PKCS#1 form.
pub fn parse_public_key(pem: &str) -> Result<RsaPublicKey, AccordError> {
    let pem = pem.trim();
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| AccordError::InvalidKeyMaterial {
            reason: e.to_string(),
        })
}

/// Whether the string is a structurally valid RSA public key.
pub fn is_valid_public_key(pem: &str) -> bool {
    parse_public_key(pem).is_ok()
}

/// Verify a base64 signature against a PEM public key.
///
/// Returns `false` for any malformed input instead of failing.
pub fn verify(message: &[u8], signature: &str, public_key_pem: &str) -> bool {
    match parse_public_key(public_key_pem) {
        Ok(public_key) => verify_with(&public_key, message, signature),
        Err(_) => false,
    }
}

/// Verify a base64 signature against an already parsed public key.
pub fn verify_with(public_key: &RsaPublicKey, message: &[u8], signature: &str) -> bool {
    let Ok(bytes) = STANDARD.decode(signature) else {
        return false;
    };
    let Ok(signature) = Signature::try_from(bytes.as_slice()) else {
        return false;
    };
    VerifyingKey::<Sha256>::new(public_key.clone())
        .verify(message, &signature)
        .is_ok()
}
