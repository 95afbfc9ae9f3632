//! Record store error types.

/// Errors produced by record store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error (constraint violation, connectivity, I/O).
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// A stored row could not be mapped back into a record.
    #[error("corrupt row: {0}")]
    Decode(String),

    /// A mutation was attempted without a credential id.
    #[error("update and delete require a credential id")]
    MissingId,
}
