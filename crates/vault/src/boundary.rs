//! The encryption boundary: the only holder of the key and the only writer of
//! ciphertext.
//!
//! Everything that produces an `encrypted_payload` goes through
//! [`EncryptionBoundary::store`] or [`EncryptionBoundary::update`], so a
//! caller can never persist a payload it encrypted (or forged) elsewhere.

use {
    async_trait::async_trait,
    strongbox_crypto::{
        Aes256GcmCipher, Cipher, CryptoError, Credentials, EncryptionKey, envelope,
    },
    strongbox_store::{
        CredentialRecord, IntegrationType, NewRecord, OwnerFilter, RecordPatch, RecordStore,
    },
    tracing::debug,
    zeroize::Zeroizing,
};

use crate::{
    error::VaultError,
    validator::{ConnectionValidator, HttpConnectionValidator, ValidationOutcome},
};

/// Associated data bound to every credential envelope.
pub const CREDENTIALS_AAD: &[u8] = b"strongbox:credentials:v1";

/// A new credential, still in plaintext.
#[derive(Debug, Clone)]
pub struct StoreRequest {
    pub owner_id: String,
    pub integration_type: IntegrationType,
    pub label: String,
    pub credentials: Credentials,
    pub expires_at: Option<i64>,
}

/// Fields to overwrite on an existing credential.
#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    pub label: Option<String>,
    /// Re-encrypted with a fresh nonce when present.
    pub credentials: Option<Credentials>,
    /// Only write while the stored payload still equals this value.
    pub expected_payload: Option<String>,
}

/// Operations exposed by the trusted context that holds the encryption key.
#[async_trait]
pub trait EncryptionBoundary: Send + Sync {
    /// Encrypt a non-empty mapping into an opaque payload.
    async fn encrypt(&self, credentials: &Credentials) -> Result<String, VaultError>;

    /// Decrypt a payload back into exactly the mapping that was encrypted.
    ///
    /// Must fail with [`VaultError::Decryption`] rather than return an empty
    /// mapping.
    async fn decrypt(&self, payload: &str) -> Result<Credentials, VaultError>;

    /// Decrypt `id` and run its integration's connectivity test.
    async fn validate(&self, id: &str, owner_id: &str) -> Result<ValidationOutcome, VaultError>;

    /// Encrypt and insert a new credential.
    async fn store(&self, request: StoreRequest) -> Result<CredentialRecord, VaultError>;

    /// Patch `id` where owned by `owner_id`. Returns the number of rows matched.
    async fn update(
        &self,
        id: &str,
        owner_id: &str,
        request: UpdateRequest,
    ) -> Result<u64, VaultError>;
}

/// In-process [`EncryptionBoundary`].
///
/// Generic over the cipher so a different AEAD can be dropped in; defaults to
/// AES-256-GCM.
pub struct LocalBoundary<
    S: RecordStore,
    V: ConnectionValidator = HttpConnectionValidator,
    C: Cipher = Aes256GcmCipher,
> {
    key: EncryptionKey,
    cipher: C,
    store: S,
    validator: V,
}

impl<S: RecordStore, V: ConnectionValidator> LocalBoundary<S, V, Aes256GcmCipher> {
    pub fn new(key: EncryptionKey, store: S, validator: V) -> Self {
        Self::with_cipher(key, Aes256GcmCipher, store, validator)
    }
}

impl<S: RecordStore, V: ConnectionValidator, C: Cipher> LocalBoundary<S, V, C> {
    pub fn with_cipher(key: EncryptionKey, cipher: C, store: S, validator: V) -> Self {
        Self {
            key,
            cipher,
            store,
            validator,
        }
    }
}

impl<S, V, C> std::fmt::Debug for LocalBoundary<S, V, C>
where
    S: RecordStore,
    V: ConnectionValidator,
    C: Cipher,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBoundary")
            .field("key", &"[REDACTED]")
            .field("cipher_version", &self.cipher.version_tag())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<S, V, C> EncryptionBoundary for LocalBoundary<S, V, C>
where
    S: RecordStore,
    V: ConnectionValidator,
    C: Cipher,
{
    async fn encrypt(&self, credentials: &Credentials) -> Result<String, VaultError> {
        if credentials.is_empty() {
            return Err(VaultError::EmptyCredentials);
        }

        let plaintext = Zeroizing::new(
            serde_json::to_vec(credentials)
                .map_err(|e| VaultError::Encryption(CryptoError::from(e)))?,
        );
        let payload = envelope::seal(&self.cipher, &self.key, &plaintext, CREDENTIALS_AAD)
            .map_err(VaultError::Encryption)?;
        if payload.is_empty() {
            return Err(VaultError::Encryption(CryptoError::EmptyEnvelope));
        }

        debug!(fields = credentials.len(), "credentials encrypted");
        Ok(payload)
    }

    async fn decrypt(&self, payload: &str) -> Result<Credentials, VaultError> {
        let plaintext = envelope::open(&self.cipher, &self.key, payload, CREDENTIALS_AAD)
            .map_err(VaultError::Decryption)?;
        let credentials: Credentials = serde_json::from_slice(&plaintext)
            .map_err(|e| VaultError::Decryption(CryptoError::from(e)))?;
        if credentials.is_empty() {
            return Err(VaultError::Decryption(CryptoError::EmptyPlaintext));
        }
        Ok(credentials)
    }

    async fn validate(&self, id: &str, owner_id: &str) -> Result<ValidationOutcome, VaultError> {
        let record = self
            .store
            .select(&OwnerFilter::record(id, owner_id))
            .await?
            .into_iter()
            .next()
            .ok_or(VaultError::NotFoundOrAccessDenied)?;

        let credentials = self.decrypt(&record.encrypted_payload).await?;
        let outcome = self
            .validator
            .validate(record.integration_type, &credentials)
            .await;

        if let Some(error) = &outcome.error {
            debug!(
                credential_id = %id,
                integration = %record.integration_type,
                error = %error,
                "connection check rejected credentials"
            );
        }
        Ok(outcome)
    }

    async fn store(&self, request: StoreRequest) -> Result<CredentialRecord, VaultError> {
        let encrypted_payload = self.encrypt(&request.credentials).await?;
        let record = self
            .store
            .insert(NewRecord {
                owner_id: request.owner_id,
                integration_type: request.integration_type,
                label: request.label,
                encrypted_payload,
                expires_at: request.expires_at,
            })
            .await?;
        Ok(record)
    }

    async fn update(
        &self,
        id: &str,
        owner_id: &str,
        request: UpdateRequest,
    ) -> Result<u64, VaultError> {
        let encrypted_payload = match &request.credentials {
            Some(credentials) => Some(self.encrypt(credentials).await?),
            None => None,
        };
        let patch = RecordPatch {
            label: request.label,
            encrypted_payload,
            expected_payload: request.expected_payload,
        };
        Ok(self
            .store
            .update(&OwnerFilter::record(id, owner_id), patch)
            .await?)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        base64::{Engine, engine::general_purpose::STANDARD},
        sqlx::sqlite::SqlitePoolOptions,
        strongbox_store::SqliteRecordStore,
    };

    struct AlwaysValid;

    #[async_trait]
    impl ConnectionValidator for AlwaysValid {
        async fn validate(&self, _: IntegrationType, _: &Credentials) -> ValidationOutcome {
            ValidationOutcome::valid()
        }
    }

    async fn boundary() -> LocalBoundary<SqliteRecordStore, AlwaysValid> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        strongbox_store::run_migrations(&pool).await.unwrap();
        LocalBoundary::new(
            EncryptionKey::generate(),
            SqliteRecordStore::new(pool),
            AlwaysValid,
        )
    }

    fn creds() -> Credentials {
        Credentials::new()
            .with("token", "xoxb-1")
            .with("nested", serde_json::json!({"scopes": ["chat:write"], "n": 3}))
    }

    #[tokio::test]
    async fn round_trip_preserves_mapping() {
        let b = boundary().await;
        let payload = b.encrypt(&creds()).await.unwrap();
        assert_eq!(b.decrypt(&payload).await.unwrap(), creds());
    }

    #[tokio::test]
    async fn identical_plaintext_encrypts_differently() {
        let b = boundary().await;
        let a = b.encrypt(&creds()).await.unwrap();
        let c = b.encrypt(&creds()).await.unwrap();
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn empty_mapping_rejected() {
        let b = boundary().await;
        let result = b.encrypt(&Credentials::new()).await;
        assert!(matches!(result, Err(VaultError::EmptyCredentials)));
    }

    #[tokio::test]
    async fn any_flipped_byte_fails_decrypt() {
        let b = boundary().await;
        let payload = b.encrypt(&creds()).await.unwrap();
        let raw = STANDARD.decode(&payload).unwrap();
        for i in 0..raw.len() {
            let mut tampered = raw.clone();
            tampered[i] ^= 0x80;
            let result = b.decrypt(&STANDARD.encode(&tampered)).await;
            assert!(
                matches!(result, Err(VaultError::Decryption(_))),
                "flip at byte {i} was not detected"
            );
        }
    }

    #[tokio::test]
    async fn foreign_key_cannot_decrypt() {
        let a = boundary().await;
        let b = boundary().await;
        let payload = a.encrypt(&creds()).await.unwrap();
        assert!(matches!(
            b.decrypt(&payload).await,
            Err(VaultError::Decryption(_))
        ));
    }

    #[tokio::test]
    async fn empty_plaintext_object_is_a_decryption_error() {
        let b = boundary().await;
        let payload =
            envelope::seal(&Aes256GcmCipher, &b.key, b"{}", CREDENTIALS_AAD).unwrap();
        assert!(matches!(
            b.decrypt(&payload).await,
            Err(VaultError::Decryption(CryptoError::EmptyPlaintext))
        ));
    }

    #[tokio::test]
    async fn store_then_validate_checks_owner() {
        let b = boundary().await;
        let record = b
            .store(StoreRequest {
                owner_id: "u1".into(),
                integration_type: IntegrationType::Slack,
                label: "Team".into(),
                credentials: creds(),
                expires_at: None,
            })
            .await
            .unwrap();
        assert!(!record.encrypted_payload.contains("xoxb-1"));

        assert!(b.validate(&record.id, "u1").await.unwrap().valid);
        assert!(matches!(
            b.validate(&record.id, "u2").await,
            Err(VaultError::NotFoundOrAccessDenied)
        ));
    }

    #[tokio::test]
    async fn debug_never_prints_key() {
        let b = boundary().await;
        assert!(format!("{b:?}").contains("[REDACTED]"));
    }
}
