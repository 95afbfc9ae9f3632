//! The credential vault service.
//!
//! Every operation takes the calling principal's id explicitly. Reads and
//! deletes go straight to the record store with an owner filter; every write
//! of ciphertext goes through the [`EncryptionBoundary`].
//!
//! Concurrent user writes to the same credential race at the store and the
//! last writer wins. A legacy migration only writes while the row still holds
//! the legacy payload it read, so it never overwrites a newer update.

#[cfg(feature = "metrics")]
use strongbox_metrics::{counter, labels, vault as vault_metrics};
use {
    strongbox_crypto::{Credentials, EncryptionKey},
    strongbox_store::{Credential, CredentialRecord, IntegrationType, OwnerFilter, RecordStore},
    tracing::{debug, info, warn},
};

use crate::{
    boundary::{EncryptionBoundary, LocalBoundary, StoreRequest, UpdateRequest},
    error::VaultError,
    legacy,
    validator::ConnectionValidator,
};

/// Input for [`CredentialVault::create_credential`].
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub integration_type: IntegrationType,
    pub label: String,
    pub credentials: Credentials,
    /// Unix seconds. Stored for display, not enforced.
    pub expires_at: Option<i64>,
}

impl NewCredential {
    pub fn new(
        integration_type: IntegrationType,
        label: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            integration_type,
            label: label.into(),
            credentials,
            expires_at: None,
        }
    }

    #[must_use]
    pub fn expires_at(mut self, unix_secs: i64) -> Self {
        self.expires_at = Some(unix_secs);
        self
    }
}

/// Input for [`CredentialVault::update_credential`]. At least one field must be set.
#[derive(Debug, Clone, Default)]
pub struct CredentialUpdate {
    pub label: Option<String>,
    pub credentials: Option<Credentials>,
}

impl CredentialUpdate {
    pub fn label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            credentials: None,
        }
    }

    pub fn credentials(credentials: Credentials) -> Self {
        Self {
            label: None,
            credentials: Some(credentials),
        }
    }
}

/// Owner-scoped CRUD over encrypted integration credentials.
pub struct CredentialVault<B: EncryptionBoundary, S: RecordStore> {
    boundary: B,
    store: S,
}

impl<S, V> CredentialVault<LocalBoundary<S, V>, S>
where
    S: RecordStore + Clone,
    V: ConnectionValidator,
{
    /// Wire a vault to an in-process boundary sharing the same store.
    pub fn local(key: EncryptionKey, store: S, validator: V) -> Self {
        let boundary = LocalBoundary::new(key, store.clone(), validator);
        Self::new(boundary, store)
    }
}

fn require_owner(owner_id: &str) -> Result<(), VaultError> {
    if owner_id.trim().is_empty() {
        return Err(VaultError::Validation("owner id is required".into()));
    }
    Ok(())
}

fn normalize_label(label: &str) -> Result<String, VaultError> {
    let label = label.trim();
    if label.is_empty() {
        return Err(VaultError::Validation("label must not be empty".into()));
    }
    Ok(label.to_string())
}

fn require_credentials(credentials: &Credentials) -> Result<(), VaultError> {
    if credentials.is_empty() {
        return Err(VaultError::Validation(
            "credentials must contain at least one field".into(),
        ));
    }
    Ok(())
}

impl<B: EncryptionBoundary, S: RecordStore> CredentialVault<B, S> {
    pub fn new(boundary: B, store: S) -> Self {
        Self { boundary, store }
    }

    /// All credentials owned by `owner_id`, newest first. Metadata only.
    pub async fn list_credentials(&self, owner_id: &str) -> Result<Vec<Credential>, VaultError> {
        require_owner(owner_id)?;
        let records = self
            .store
            .select(&OwnerFilter::owner(owner_id))
            .await
            .inspect_err(|e| {
                warn!(owner_id, operation = "list", error = %e, "listing credentials failed")
            })?;
        Ok(records
            .into_iter()
            .map(CredentialRecord::into_metadata)
            .collect())
    }

    /// Metadata for one credential.
    pub async fn get_credential(&self, id: &str, owner_id: &str) -> Result<Credential, VaultError> {
        require_owner(owner_id)?;
        Ok(self.fetch(id, owner_id, "get").await?.into_metadata())
    }

    /// Encrypt and persist a new credential owned by `owner_id`.
    pub async fn create_credential(
        &self,
        owner_id: &str,
        new: NewCredential,
    ) -> Result<Credential, VaultError> {
        require_owner(owner_id)?;
        let label = normalize_label(&new.label)?;
        require_credentials(&new.credentials)?;

        let record = self
            .boundary
            .store(StoreRequest {
                owner_id: owner_id.to_string(),
                integration_type: new.integration_type,
                label,
                credentials: new.credentials,
                expires_at: new.expires_at,
            })
            .await
            .inspect_err(|e| {
                warn!(
                    owner_id,
                    integration = %new.integration_type,
                    operation = "create",
                    error = %e,
                    kind = e.kind(),
                    "credential create failed"
                )
            })?;

        #[cfg(feature = "metrics")]
        counter!(
            vault_metrics::CREDENTIALS_CREATED_TOTAL,
            labels::INTEGRATION => record.integration_type.as_str()
        )
        .increment(1);

        info!(
            credential_id = %record.id,
            owner_id,
            integration = %record.integration_type,
            "credential created"
        );
        Ok(record.into_metadata())
    }

    /// Change the label and/or re-encrypt new credentials.
    ///
    /// Returns `None` when nothing matched, which is also what happens when
    /// `owner_id` does not own `id`.
    pub async fn update_credential(
        &self,
        id: &str,
        owner_id: &str,
        update: CredentialUpdate,
    ) -> Result<Option<Credential>, VaultError> {
        require_owner(owner_id)?;
        if update.label.is_none() && update.credentials.is_none() {
            return Err(VaultError::Validation(
                "update needs a label or credentials".into(),
            ));
        }
        let label = update.label.as_deref().map(normalize_label).transpose()?;
        if let Some(credentials) = &update.credentials {
            require_credentials(credentials)?;
        }
        let reencrypt = update.credentials.is_some();

        let affected = self
            .boundary
            .update(id, owner_id, UpdateRequest {
                label,
                credentials: update.credentials,
                expected_payload: None,
            })
            .await
            .inspect_err(|e| {
                warn!(
                    credential_id = %id,
                    owner_id,
                    operation = "update",
                    error = %e,
                    kind = e.kind(),
                    "credential update failed"
                )
            })?;

        if affected == 0 {
            debug!(credential_id = %id, owner_id, "update matched no credential");
            return Ok(None);
        }

        info!(credential_id = %id, owner_id, reencrypt, "credential updated");
        let record = self.fetch(id, owner_id, "update").await?;
        Ok(Some(record.into_metadata()))
    }

    /// Delete `id` if owned by `owner_id`. Returns whether a row was removed.
    pub async fn delete_credential(&self, id: &str, owner_id: &str) -> Result<bool, VaultError> {
        require_owner(owner_id)?;
        let affected = self
            .store
            .delete(&OwnerFilter::record(id, owner_id))
            .await
            .inspect_err(|e| {
                warn!(
                    credential_id = %id,
                    owner_id,
                    operation = "delete",
                    error = %e,
                    "credential delete failed"
                )
            })?;

        if affected == 0 {
            debug!(credential_id = %id, owner_id, "delete matched no credential");
        } else {
            info!(credential_id = %id, owner_id, "credential deleted");
        }
        Ok(affected > 0)
    }

    /// Decrypt a credential, upgrading a legacy record first if needed.
    ///
    /// The only operation that returns plaintext. An empty mapping is
    /// rejected by the boundary as a decryption failure.
    pub async fn get_decrypted_credentials(
        &self,
        id: &str,
        owner_id: &str,
    ) -> Result<Credentials, VaultError> {
        require_owner(owner_id)?;

        #[cfg(feature = "metrics")]
        counter!(vault_metrics::DECRYPT_REQUESTS_TOTAL).increment(1);

        let record = self.current_record(id, owner_id, "decrypt").await?;
        match self.boundary.decrypt(&record.encrypted_payload).await {
            Ok(credentials) => {
                debug!(credential_id = %id, owner_id, "credential decrypted");
                Ok(credentials)
            },
            Err(e) => {
                #[cfg(feature = "metrics")]
                counter!(vault_metrics::DECRYPT_FAILURES_TOTAL).increment(1);

                warn!(
                    credential_id = %id,
                    owner_id,
                    operation = "decrypt",
                    error = %e,
                    kind = e.kind(),
                    "credential decrypt failed"
                );
                Err(e)
            },
        }
    }

    /// Run the integration's connectivity test.
    ///
    /// A failed test is an expected outcome and yields `Ok(false)`. Access
    /// and infrastructure failures are still errors.
    pub async fn validate_credential(&self, id: &str, owner_id: &str) -> Result<bool, VaultError> {
        require_owner(owner_id)?;
        self.current_record(id, owner_id, "validate").await?;

        let outcome = self
            .boundary
            .validate(id, owner_id)
            .await
            .inspect_err(|e| {
                warn!(
                    credential_id = %id,
                    owner_id,
                    operation = "validate",
                    error = %e,
                    kind = e.kind(),
                    "credential validation errored"
                )
            })?;

        #[cfg(feature = "metrics")]
        {
            let valid = if outcome.valid { "true" } else { "false" };
            counter!(vault_metrics::VALIDATIONS_TOTAL, labels::VALID => valid).increment(1);
        }

        if outcome.valid {
            info!(credential_id = %id, owner_id, "credential validated");
        } else {
            warn!(
                credential_id = %id,
                owner_id,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "credential failed validation"
            );
        }
        Ok(outcome.valid)
    }

    /// Upgrade every legacy record owned by `owner_id`.
    ///
    /// Best effort: a failing record is logged and skipped. Returns how many
    /// were migrated.
    pub async fn migrate_all_legacy_credentials(
        &self,
        owner_id: &str,
    ) -> Result<usize, VaultError> {
        require_owner(owner_id)?;
        let records = self
            .store
            .select(&OwnerFilter::owner(owner_id))
            .await
            .inspect_err(|e| {
                warn!(
                    owner_id,
                    operation = "migrate_all",
                    error = %e,
                    "listing credentials failed"
                )
            })?;

        let mut migrated = 0;
        let mut failed = 0;
        for record in records
            .iter()
            .filter(|r| legacy::is_legacy_base64(&r.encrypted_payload))
        {
            match self.migrate_record(record).await {
                Ok(true) => migrated += 1,
                Ok(false) => {},
                Err(e) => {
                    failed += 1;
                    warn!(
                        credential_id = %record.id,
                        owner_id,
                        operation = "migrate_all",
                        error = %e,
                        kind = e.kind(),
                        "skipping credential that failed to migrate"
                    );
                },
            }
        }

        info!(owner_id, migrated, failed, "bulk legacy migration finished");
        Ok(migrated)
    }

    /// Fetch one owned record or fail without revealing whether it exists.
    async fn fetch(
        &self,
        id: &str,
        owner_id: &str,
        operation: &'static str,
    ) -> Result<CredentialRecord, VaultError> {
        let record = self
            .store
            .select(&OwnerFilter::record(id, owner_id))
            .await
            .inspect_err(|e| {
                warn!(
                    credential_id = %id,
                    owner_id,
                    operation,
                    error = %e,
                    "credential lookup failed"
                )
            })?
            .into_iter()
            .next();

        record.ok_or_else(|| {
            debug!(credential_id = %id, owner_id, operation, "credential not found or not owned");
            VaultError::NotFoundOrAccessDenied
        })
    }

    /// Fetch a record, migrating it first if it is still in legacy format.
    async fn current_record(
        &self,
        id: &str,
        owner_id: &str,
        operation: &'static str,
    ) -> Result<CredentialRecord, VaultError> {
        let record = self.fetch(id, owner_id, operation).await?;
        if !legacy::is_legacy_base64(&record.encrypted_payload) {
            return Ok(record);
        }

        self.migrate_record(&record).await.inspect_err(|e| {
            warn!(
                credential_id = %id,
                owner_id,
                operation,
                error = %e,
                kind = e.kind(),
                "lazy legacy migration failed"
            )
        })?;
        self.fetch(id, owner_id, operation).await
    }

    /// Re-encrypt one legacy record in place. On failure the row is untouched.
    ///
    /// The write only applies while the row still holds the legacy payload
    /// that was read. Returns `false` when the row changed or vanished in
    /// between, so a concurrent update is never overwritten with stale data.
    async fn migrate_record(&self, record: &CredentialRecord) -> Result<bool, VaultError> {
        let wrap = |source: VaultError| VaultError::Migration {
            id: record.id.clone(),
            source: Box::new(source),
        };

        let result = async {
            let credentials = legacy::decode_legacy(&record.encrypted_payload)
                .map_err(VaultError::Decryption)?;
            let affected = self
                .boundary
                .update(&record.id, &record.owner_id, UpdateRequest {
                    label: None,
                    credentials: Some(credentials),
                    expected_payload: Some(record.encrypted_payload.clone()),
                })
                .await?;
            Ok::<_, VaultError>(affected > 0)
        }
        .await
        .map_err(wrap);

        #[cfg(feature = "metrics")]
        {
            let status = match &result {
                Ok(true) => "success",
                Ok(false) => "skipped",
                Err(_) => "failure",
            };
            counter!(vault_metrics::LEGACY_MIGRATIONS_TOTAL, labels::STATUS => status).increment(1);
        }

        match result {
            Ok(true) => info!(
                credential_id = %record.id,
                owner_id = %record.owner_id,
                "migrated legacy credential to encrypted format"
            ),
            Ok(false) => debug!(
                credential_id = %record.id,
                owner_id = %record.owner_id,
                "legacy credential changed before migration, skipped"
            ),
            Err(_) => {},
        }
        result
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::validator::ValidationOutcome,
        async_trait::async_trait,
        sqlx::sqlite::SqlitePoolOptions,
        strongbox_store::{NewRecord, SqliteRecordStore},
    };

    struct FixedOutcome(bool);

    #[async_trait]
    impl ConnectionValidator for FixedOutcome {
        async fn validate(&self, _: IntegrationType, _: &Credentials) -> ValidationOutcome {
            if self.0 {
                ValidationOutcome::valid()
            } else {
                ValidationOutcome::invalid("rejected by test")
            }
        }
    }

    type TestVault =
        CredentialVault<LocalBoundary<SqliteRecordStore, FixedOutcome>, SqliteRecordStore>;

    async fn vault(valid: bool) -> TestVault {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        strongbox_store::run_migrations(&pool).await.unwrap();
        CredentialVault::local(
            EncryptionKey::generate(),
            SqliteRecordStore::new(pool),
            FixedOutcome(valid),
        )
    }

    fn slack() -> NewCredential {
        NewCredential::new(
            IntegrationType::Slack,
            "Team",
            Credentials::new().with("token", "xoxb-1"),
        )
    }

    #[tokio::test]
    async fn label_is_trimmed() {
        let v = vault(true).await;
        let mut new = slack();
        new.label = "  Team  ".into();
        let c = v.create_credential("u1", new).await.unwrap();
        assert_eq!(c.label, "Team");
    }

    #[tokio::test]
    async fn whitespace_label_rejected() {
        let v = vault(true).await;
        let mut new = slack();
        new.label = "   ".into();
        assert!(matches!(
            v.create_credential("u1", new).await,
            Err(VaultError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn blank_owner_rejected() {
        let v = vault(true).await;
        assert!(matches!(
            v.create_credential(" ", slack()).await,
            Err(VaultError::Validation(_))
        ));
        assert!(matches!(
            v.list_credentials("").await,
            Err(VaultError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn empty_update_rejected() {
        let v = vault(true).await;
        let c = v.create_credential("u1", slack()).await.unwrap();
        for update in [
            CredentialUpdate::default(),
            CredentialUpdate::label(""),
            CredentialUpdate::credentials(Credentials::new()),
        ] {
            assert!(matches!(
                v.update_credential(&c.id, "u1", update).await,
                Err(VaultError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn label_update_keeps_payload() {
        let v = vault(true).await;
        let c = v.create_credential("u1", slack()).await.unwrap();
        let before = v.fetch(&c.id, "u1", "test").await.unwrap();

        let updated = v
            .update_credential(&c.id, "u1", CredentialUpdate::label("Renamed"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.label, "Renamed");

        let after = v.fetch(&c.id, "u1", "test").await.unwrap();
        assert_eq!(before.encrypted_payload, after.encrypted_payload);
    }

    #[tokio::test]
    async fn credential_update_reencrypts() {
        let v = vault(true).await;
        let c = v.create_credential("u1", slack()).await.unwrap();
        let before = v.fetch(&c.id, "u1", "test").await.unwrap();

        let fresh = Credentials::new().with("token", "xoxb-2");
        v.update_credential(&c.id, "u1", CredentialUpdate::credentials(fresh.clone()))
            .await
            .unwrap()
            .unwrap();

        let after = v.fetch(&c.id, "u1", "test").await.unwrap();
        assert_ne!(before.encrypted_payload, after.encrypted_payload);
        assert_eq!(v.get_decrypted_credentials(&c.id, "u1").await.unwrap(), fresh);
    }

    #[tokio::test]
    async fn delete_is_owner_scoped() {
        let v = vault(true).await;
        let c = v.create_credential("u1", slack()).await.unwrap();
        assert!(!v.delete_credential(&c.id, "u2").await.unwrap());
        assert_eq!(v.list_credentials("u1").await.unwrap().len(), 1);
        assert!(v.delete_credential(&c.id, "u1").await.unwrap());
        assert!(v.list_credentials("u1").await.unwrap().is_empty());
        assert!(matches!(
            v.get_credential(&c.id, "u1").await,
            Err(VaultError::NotFoundOrAccessDenied)
        ));
    }

    #[tokio::test]
    async fn failed_check_is_false_not_error() {
        let v = vault(false).await;
        let c = v.create_credential("u1", slack()).await.unwrap();
        assert!(!v.validate_credential(&c.id, "u1").await.unwrap());
    }

    #[tokio::test]
    async fn validate_foreign_credential_is_an_error() {
        let v = vault(true).await;
        let c = v.create_credential("u1", slack()).await.unwrap();
        assert!(v.validate_credential(&c.id, "u1").await.unwrap());
        assert!(matches!(
            v.validate_credential(&c.id, "u2").await,
            Err(VaultError::NotFoundOrAccessDenied)
        ));
    }

    #[tokio::test]
    async fn validate_migrates_legacy_first() {
        use base64::{Engine, engine::general_purpose::STANDARD};

        let v = vault(true).await;
        let rec = v
            .store
            .insert(NewRecord {
                owner_id: "u1".into(),
                integration_type: IntegrationType::Custom,
                label: "old".into(),
                encrypted_payload: STANDARD.encode(r#"{"apiKey":"legacy"}"#),
                expires_at: None,
            })
            .await
            .unwrap();

        assert!(v.validate_credential(&rec.id, "u1").await.unwrap());
        let after = v.fetch(&rec.id, "u1", "test").await.unwrap();
        assert!(!legacy::is_legacy_base64(&after.encrypted_payload));
    }

    #[tokio::test]
    async fn migration_never_overwrites_a_newer_write() {
        use base64::{Engine, engine::general_purpose::STANDARD};

        let v = vault(true).await;
        let stale = v
            .store
            .insert(NewRecord {
                owner_id: "u1".into(),
                integration_type: IntegrationType::N8n,
                label: "old".into(),
                encrypted_payload: STANDARD.encode(r#"{"apiKey":"stale"}"#),
                expires_at: None,
            })
            .await
            .unwrap();

        // The owner rotates the secret after the migration read the row.
        let fresh = Credentials::new().with("apiKey", "fresh");
        v.update_credential(&stale.id, "u1", CredentialUpdate::credentials(fresh.clone()))
            .await
            .unwrap()
            .unwrap();

        assert!(!v.migrate_record(&stale).await.unwrap());
        assert_eq!(v.get_decrypted_credentials(&stale.id, "u1").await.unwrap(), fresh);
    }

    #[tokio::test]
    async fn expiry_is_stored_as_metadata() {
        let v = vault(true).await;
        let c = v
            .create_credential("u1", slack().expires_at(1_900_000_000))
            .await
            .unwrap();
        assert_eq!(c.expires_at, Some(1_900_000_000));
        assert_eq!(v.get_credential(&c.id, "u1").await.unwrap(), c);
    }
}
