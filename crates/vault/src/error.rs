//! Vault error types.

use {strongbox_crypto::CryptoError, strongbox_store::StoreError};

/// Errors produced by vault and encryption boundary operations.
///
/// Messages carry identifiers and causes only, never plaintext secrets.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// Malformed caller input (empty label, nothing to update, ...).
    #[error("invalid input: {0}")]
    Validation(String),

    /// The boundary was asked to encrypt an empty mapping.
    #[error("credentials must contain at least one field")]
    EmptyCredentials,

    /// Encryption failed or produced nothing.
    #[error("failed to encrypt credentials: {0}")]
    Encryption(#[source] CryptoError),

    /// Integrity check failed, payload malformed, or decrypted to nothing.
    #[error("failed to decrypt credentials: {0}")]
    Decryption(#[source] CryptoError),

    /// The record does not exist or belongs to another principal.
    #[error("credential not found or access denied")]
    NotFoundOrAccessDenied,

    /// Upgrading a legacy record failed; the stored row is unchanged.
    #[error("failed to migrate legacy credential {id}: {source}")]
    Migration {
        id: String,
        #[source]
        source: Box<VaultError>,
    },

    /// The record store rejected the operation.
    #[error("credential store error: {0}")]
    Persistence(#[from] StoreError),
}

impl VaultError {
    /// Short machine-readable name, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::EmptyCredentials => "empty_credentials",
            Self::Encryption(_) => "encryption",
            Self::Decryption(_) => "decryption",
            Self::NotFoundOrAccessDenied => "not_found_or_access_denied",
            Self::Migration { .. } => "migration",
            Self::Persistence(_) => "persistence",
        }
    }
}
