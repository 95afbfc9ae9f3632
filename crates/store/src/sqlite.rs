//! SQLite-backed [`RecordStore`].

use std::{str::FromStr, time::Duration};

use {
    async_trait::async_trait,
    sqlx::{
        SqlitePool,
        sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    },
    tracing::debug,
};

use crate::{
    error::StoreError,
    store::RecordStore,
    types::{CredentialRecord, IntegrationType, NewRecord, OwnerFilter, RecordPatch},
};

const COLUMNS: &str = "id, owner_id, integration_type, label, encrypted_payload, expires_at, \
                       created_at, updated_at";

type Row = (
    String,
    String,
    String,
    String,
    String,
    Option<i64>,
    String,
    String,
);

/// Open a connection pool, creating the database file if needed.
pub async fn open_pool(
    url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(acquire_timeout)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Credential rows in the `integration_credentials` table.
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn decode(row: Row) -> Result<CredentialRecord, StoreError> {
    let (
        id,
        owner_id,
        integration_type,
        label,
        encrypted_payload,
        expires_at,
        created_at,
        updated_at,
    ) = row;
    let integration_type = IntegrationType::from_str(&integration_type)
        .map_err(|e| StoreError::Decode(format!("credential {id}: {e}")))?;
    Ok(CredentialRecord {
        id,
        owner_id,
        integration_type,
        label,
        encrypted_payload,
        expires_at,
        created_at,
        updated_at,
    })
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert(&self, record: NewRecord) -> Result<CredentialRecord, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let sql = format!(
            "INSERT INTO integration_credentials
                 (id, owner_id, integration_type, label, encrypted_payload, expires_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {COLUMNS}"
        );
        let row: Row = sqlx::query_as(&sql)
            .bind(&id)
            .bind(&record.owner_id)
            .bind(record.integration_type.as_str())
            .bind(&record.label)
            .bind(&record.encrypted_payload)
            .bind(record.expires_at)
            .fetch_one(&self.pool)
            .await?;

        debug!(credential_id = %id, owner_id = %record.owner_id, "credential row inserted");
        decode(row)
    }

    async fn select(&self, filter: &OwnerFilter) -> Result<Vec<CredentialRecord>, StoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM integration_credentials
             WHERE owner_id = ?1 AND (?2 IS NULL OR id = ?2)
             ORDER BY created_at DESC, rowid DESC"
        );
        let rows: Vec<Row> = sqlx::query_as(&sql)
            .bind(&filter.owner_id)
            .bind(filter.id.as_deref())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(decode).collect()
    }

    async fn update(&self, filter: &OwnerFilter, patch: RecordPatch) -> Result<u64, StoreError> {
        let id = filter.id.as_deref().ok_or(StoreError::MissingId)?;
        let result = sqlx::query(
            "UPDATE integration_credentials
             SET label             = COALESCE(?1, label),
                 encrypted_payload = COALESCE(?2, encrypted_payload),
                 updated_at        = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE id = ?3 AND owner_id = ?4
               AND (?5 IS NULL OR encrypted_payload = ?5)",
        )
        .bind(patch.label.as_deref())
        .bind(patch.encrypted_payload.as_deref())
        .bind(id)
        .bind(&filter.owner_id)
        .bind(patch.expected_payload.as_deref())
        .execute(&self.pool)
        .await?;

        let affected = result.rows_affected();
        debug!(credential_id = %id, affected, "credential row update");
        Ok(affected)
    }

    async fn delete(&self, filter: &OwnerFilter) -> Result<u64, StoreError> {
        let id = filter.id.as_deref().ok_or(StoreError::MissingId)?;
        let result =
            sqlx::query("DELETE FROM integration_credentials WHERE id = ? AND owner_id = ?")
                .bind(id)
                .bind(&filter.owner_id)
                .execute(&self.pool)
                .await?;

        let affected = result.rows_affected();
        debug!(credential_id = %id, affected, "credential row delete");
        Ok(affected)
    }
}
