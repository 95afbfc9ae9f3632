//! The record store seam.

use async_trait::async_trait;

use crate::{
    error::StoreError,
    types::{CredentialRecord, NewRecord, OwnerFilter, RecordPatch},
};

/// Keyed persistence for credential rows with row-level ownership.
///
/// Implementations must apply `owner_id` (and `id`, when present) to every
/// statement. `update` and `delete` report how many rows matched; a filter
/// naming another principal's row matches zero rows and is not an error.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert(&self, record: NewRecord) -> Result<CredentialRecord, StoreError>;

    /// Matching rows, newest first.
    async fn select(&self, filter: &OwnerFilter) -> Result<Vec<CredentialRecord>, StoreError>;

    async fn update(&self, filter: &OwnerFilter, patch: RecordPatch) -> Result<u64, StoreError>;

    async fn delete(&self, filter: &OwnerFilter) -> Result<u64, StoreError>;
}
