//! Key material: raw 256-bit keys and Argon2id passphrase derivation.

use {
    argon2::Argon2,
    base64::{Engine, engine::general_purpose::STANDARD},
    rand::RngCore,
    zeroize::Zeroizing,
};

use crate::error::CryptoError;

/// Key length for AES-256.
pub const KEY_LEN: usize = 32;

/// Minimum salt length accepted for passphrase derivation.
pub const MIN_SALT_LEN: usize = 16;

/// Argon2id cost parameters.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub m_cost: u32,
    /// Number of iterations.
    pub t_cost: u32,
    /// Degree of parallelism.
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: 65536, // 64 MiB
            t_cost: 3,
            p_cost: 1,
        }
    }
}

/// A 256-bit symmetric key, wiped from memory on drop.
pub struct EncryptionKey(Zeroizing<[u8; KEY_LEN]>);

impl EncryptionKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Generate a key from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        rand::rng().fill_bytes(key.as_mut());
        Self(key)
    }

    /// Parse a base64-encoded 32-byte key.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let decoded = Zeroizing::new(STANDARD.decode(encoded.trim())?);
        let bytes: [u8; KEY_LEN] = decoded.as_slice().try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "expected {KEY_LEN} bytes, got {}",
                decoded.len()
            ))
        })?;
        Ok(Self::from_bytes(bytes))
    }

    /// Derive a key from a passphrase and salt with Argon2id.
    pub fn derive(passphrase: &[u8], salt: &[u8], params: &KdfParams) -> Result<Self, CryptoError> {
        if passphrase.is_empty() {
            return Err(CryptoError::Kdf("passphrase is empty".to_string()));
        }
        if salt.len() < MIN_SALT_LEN {
            return Err(CryptoError::Kdf(format!(
                "salt must be at least {MIN_SALT_LEN} bytes"
            )));
        }

        let argon2_params =
            argon2::Params::new(params.m_cost, params.t_cost, params.p_cost, Some(KEY_LEN))
                .map_err(|e| CryptoError::Kdf(format!("invalid KDF params: {e}")))?;
        let argon2 = Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            argon2_params,
        );

        let mut output = Zeroizing::new([0u8; KEY_LEN]);
        argon2
            .hash_password_into(passphrase, salt, output.as_mut())
            .map_err(|e| CryptoError::Kdf(e.to_string()))?;
        Ok(Self(output))
    }

    /// Base64 form, for printing a freshly generated key exactly once.
    pub fn to_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(STANDARD.encode(&self.0[..]))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey([REDACTED])")
    }
}

/// Generate a random 16-byte salt, base64-encoded.
pub fn generate_salt() -> String {
    let mut salt = [0u8; MIN_SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    STANDARD.encode(salt)
}

/// Decode a base64-encoded salt.
pub fn decode_salt(encoded: &str) -> Result<Vec<u8>, CryptoError> {
    Ok(STANDARD.decode(encoded.trim())?)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> KdfParams {
        KdfParams {
            m_cost: 256,
            t_cost: 1,
            p_cost: 1,
        }
    }

    #[test]
    fn base64_round_trip() {
        let key = EncryptionKey::generate();
        let parsed = EncryptionKey::from_base64(&key.to_base64()).unwrap();
        assert_eq!(key.as_bytes(), parsed.as_bytes());
    }

    #[test]
    fn short_key_rejected() {
        let result = EncryptionKey::from_base64(&STANDARD.encode([1u8; 16]));
        assert!(matches!(result, Err(CryptoError::InvalidKey(_))));
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = EncryptionKey::derive(b"hunter2", b"test-salt-16byte", &cheap()).unwrap();
        let b = EncryptionKey::derive(b"hunter2", b"test-salt-16byte", &cheap()).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn different_salts_different_keys() {
        let a = EncryptionKey::derive(b"hunter2", b"salt-aaaaaaaaaaaa", &cheap()).unwrap();
        let b = EncryptionKey::derive(b"hunter2", b"salt-bbbbbbbbbbbb", &cheap()).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn short_salt_rejected() {
        let result = EncryptionKey::derive(b"hunter2", b"short", &cheap());
        assert!(matches!(result, Err(CryptoError::Kdf(_))));
    }

    #[test]
    fn generated_salt_decodes_to_16_bytes() {
        assert_eq!(decode_salt(&generate_salt()).unwrap().len(), MIN_SALT_LEN);
    }

    #[test]
    fn debug_is_redacted() {
        let key = EncryptionKey::from_bytes([7u8; KEY_LEN]);
        assert_eq!(format!("{key:?}"), "EncryptionKey([REDACTED])");
    }
}
