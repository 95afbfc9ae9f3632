//! Authenticated encryption for integration credentials.
//!
//! A [`Cipher`] turns plaintext into an AEAD blob; [`envelope`] wraps that
//! blob with a version tag and base64 so it can live in a text column.
//! Key material is held in [`EncryptionKey`] and never leaves this crate in
//! printable form.

pub mod aes256gcm;
pub mod cipher;
pub mod credentials;
pub mod envelope;
pub mod error;
pub mod key;

pub use {
    aes256gcm::Aes256GcmCipher,
    cipher::Cipher,
    credentials::Credentials,
    error::CryptoError,
    key::{EncryptionKey, KdfParams},
};
