//! Persistent, owner-scoped storage for encrypted integration credentials.
//!
//! Every read and write is filtered by the owning principal. A row that
//! belongs to someone else is indistinguishable from a row that does not
//! exist.

pub mod error;
pub mod sqlite;
pub mod store;
pub mod types;

pub use {
    error::StoreError,
    sqlite::SqliteRecordStore,
    store::RecordStore,
    types::{Credential, CredentialRecord, IntegrationType, NewRecord, OwnerFilter, RecordPatch},
};

/// Apply the credential schema migrations.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
