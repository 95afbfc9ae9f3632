//! AES-256-GCM implementation of the [`Cipher`] trait.

#[allow(deprecated)] // upstream generic-array 0.x deprecation
use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use rand::RngCore;

use crate::{cipher::Cipher, error::CryptoError};

/// Version tag for AES-256-GCM envelopes.
pub const VERSION_TAG: u8 = 0x02;

/// GCM nonce size (96 bits).
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag size.
pub const TAG_LEN: usize = 16;

/// AES-256-GCM AEAD cipher.
///
/// Blob layout: `[nonce: 12 bytes][ciphertext: N bytes][tag: 16 bytes]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Aes256GcmCipher;

impl Cipher for Aes256GcmCipher {
    fn version_tag(&self) -> u8 {
        VERSION_TAG
    }

    #[allow(deprecated)]
    fn encrypt(
        &self,
        key: &[u8; 32],
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let cipher = Aes256Gcm::new(key.into());

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let sealed = cipher
            .encrypt(nonce, Payload {
                msg: plaintext,
                aad,
            })
            .map_err(|e| CryptoError::Cipher(format!("AES-256-GCM encryption failed: {e}")))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + sealed.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&sealed);
        Ok(blob)
    }

    #[allow(deprecated)]
    fn decrypt(&self, key: &[u8; 32], blob: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::Cipher("ciphertext too short".to_string()));
        }

        let (nonce_bytes, sealed) = blob.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let cipher = Aes256Gcm::new(key.into());

        cipher
            .decrypt(nonce, Payload { msg: sealed, aad })
            .map_err(|_| {
                CryptoError::Cipher(
                    "AES-256-GCM decryption failed: wrong key or corrupted data".to_string(),
                )
            })
    }
}
