//! Crypto error types.

/// Errors produced by ciphers, envelopes and key handling.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// AEAD encryption or decryption failed (tampered data, wrong key).
    #[error("cipher error: {0}")]
    Cipher(String),

    /// Key material has the wrong shape.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Argon2id derivation failed or was given bad parameters.
    #[error("key derivation failed: {0}")]
    Kdf(String),

    /// The envelope was not valid base64.
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Plaintext was not a JSON object.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The envelope names a cipher this build does not know.
    #[error("unsupported cipher version: {0:#04x}")]
    UnsupportedVersion(u8),

    /// The envelope decoded to zero bytes.
    #[error("empty envelope")]
    EmptyEnvelope,

    /// Decryption succeeded but produced no fields.
    #[error("decrypted payload is empty")]
    EmptyPlaintext,
}
