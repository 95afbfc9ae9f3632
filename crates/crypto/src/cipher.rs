//! Cipher trait for swappable authenticated encryption backends.

use crate::error::CryptoError;

/// Authenticated encryption with associated data.
///
/// Each implementation carries a unique version tag that [`crate::envelope`]
/// writes as the first byte of every stored payload, so payloads stay
/// decryptable after the default cipher changes.
pub trait Cipher: Send + Sync {
    /// Identifier written as the first byte of the envelope.
    fn version_tag(&self) -> u8;

    /// Encrypt `plaintext` under `key`, binding `aad`.
    ///
    /// Must draw a fresh nonce on every call and return everything
    /// [`decrypt`](Self::decrypt) needs (nonce, ciphertext, tag) in one buffer.
    fn encrypt(&self, key: &[u8; 32], plaintext: &[u8], aad: &[u8])
    -> Result<Vec<u8>, CryptoError>;

    /// Decrypt a blob produced by [`encrypt`](Self::encrypt).
    ///
    /// Fails if any byte of the blob or the `aad` differs.
    fn decrypt(&self, key: &[u8; 32], blob: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError>;
}
