#![cfg(feature = "metrics")]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;

use {
    async_trait::async_trait,
    base64::{Engine, engine::general_purpose::STANDARD},
    metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter},
    sqlx::sqlite::SqlitePoolOptions,
    strongbox_crypto::{Credentials, EncryptionKey},
    strongbox_store::{IntegrationType, NewRecord, RecordStore, SqliteRecordStore},
    strongbox_vault::{
        ConnectionValidator, CredentialVault, NewCredential, ValidationOutcome, VaultError,
    },
};

struct AlwaysValid;

#[async_trait]
impl ConnectionValidator for AlwaysValid {
    async fn validate(&self, _: IntegrationType, _: &Credentials) -> ValidationOutcome {
        ValidationOutcome::valid()
    }
}

/// Counter values keyed by `name{label=value,...}`.
fn counters(snapshotter: &Snapshotter) -> HashMap<String, u64> {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter_map(|(key, _, _, value)| {
            let DebugValue::Counter(count) = value else {
                return None;
            };
            let key = key.key();
            let labels: Vec<String> = key
                .labels()
                .map(|l| format!("{}={}", l.key(), l.value()))
                .collect();
            Some((format!("{}{{{}}}", key.name(), labels.join(",")), count))
        })
        .collect()
}

async fn insert_raw(store: &SqliteRecordStore, payload: String) -> String {
    store
        .insert(NewRecord {
            owner_id: "u1".into(),
            integration_type: IntegrationType::Custom,
            label: "raw".into(),
            encrypted_payload: payload,
            expires_at: None,
        })
        .await
        .unwrap()
        .id
}

#[test]
fn vault_operations_record_counters() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    metrics::with_local_recorder(&recorder, || {
        rt.block_on(async {
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await
                .unwrap();
            strongbox_store::run_migrations(&pool).await.unwrap();
            let store = SqliteRecordStore::new(pool);
            let vault =
                CredentialVault::local(EncryptionKey::generate(), store.clone(), AlwaysValid);

            let created = vault
                .create_credential(
                    "u1",
                    NewCredential::new(
                        IntegrationType::Custom,
                        "Webhook",
                        Credentials::new().with("apiKey", "k-1"),
                    ),
                )
                .await
                .unwrap();
            vault.get_decrypted_credentials(&created.id, "u1").await.unwrap();

            // Not legacy JSON and too short to be a sealed blob.
            let corrupt = insert_raw(&store, "AgAAAA==".into()).await;
            assert!(matches!(
                vault.get_decrypted_credentials(&corrupt, "u1").await,
                Err(VaultError::Decryption(_))
            ));

            let legacy = insert_raw(&store, STANDARD.encode(r#"{"apiKey":"old"}"#)).await;
            assert!(vault.validate_credential(&legacy, "u1").await.unwrap());
        });
    });

    let counters = counters(&snapshotter);
    assert_eq!(
        counters.get("strongbox_credentials_created_total{integration=custom}"),
        Some(&1)
    );
    assert_eq!(counters.get("strongbox_decrypt_requests_total{}"), Some(&2));
    assert_eq!(counters.get("strongbox_decrypt_failures_total{}"), Some(&1));
    assert_eq!(
        counters.get("strongbox_legacy_migrations_total{status=success}"),
        Some(&1)
    );
    assert_eq!(counters.get("strongbox_validations_total{valid=true}"), Some(&1));
    assert_eq!(counters.get("strongbox_validations_total{valid=false}"), None);
}
