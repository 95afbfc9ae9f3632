//! Versioned text envelope around a [`Cipher`] blob.
//!
//! `base64(version_tag || blob)`. The version byte is never `{`, so an
//! envelope can not be mistaken for base64-encoded JSON.

use {
    base64::{Engine, engine::general_purpose::STANDARD},
    zeroize::Zeroizing,
};

use crate::{cipher::Cipher, error::CryptoError, key::EncryptionKey};

/// Encrypt `plaintext` and wrap it in a versioned base64 envelope.
pub fn seal<C: Cipher + ?Sized>(
    cipher: &C,
    key: &EncryptionKey,
    plaintext: &[u8],
    aad: &[u8],
) -> Result<String, CryptoError> {
    let blob = cipher.encrypt(key.as_bytes(), plaintext, aad)?;

    let mut framed = Vec::with_capacity(1 + blob.len());
    framed.push(cipher.version_tag());
    framed.extend_from_slice(&blob);

    Ok(STANDARD.encode(framed))
}

/// Unwrap an envelope produced by [`seal`] and decrypt it.
pub fn open<C: Cipher + ?Sized>(
    cipher: &C,
    key: &EncryptionKey,
    envelope: &str,
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let framed = STANDARD.decode(envelope.trim())?;
    let (&version, blob) = framed.split_first().ok_or(CryptoError::EmptyEnvelope)?;
    if version != cipher.version_tag() {
        return Err(CryptoError::UnsupportedVersion(version));
    }

    Ok(Zeroizing::new(cipher.decrypt(key.as_bytes(), blob, aad)?))
}
