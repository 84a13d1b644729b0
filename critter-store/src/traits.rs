//! The `RecordStore` trait.

use async_trait::async_trait;

use critter_core::{CritterId, PrincipalId};

use crate::rows::{GrantRow, MountRow, PetRow};

/// Error types for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store rejected or failed a write
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// The store could not be read
    #[error("Read failed: {0}")]
    ReadFailed(String),

    /// A row could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(String),

    /// The store is unavailable
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Asynchronous keyed persistence for critter records.
///
/// Writes are last-writer-wins; callers treat them as fire-and-observe and
/// keep the in-memory index authoritative for the session. `load_*` is only
/// called during hydration, `find_pet` whenever a pet may not be resident.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or replace a mount row.
    async fn save_mount(&self, row: MountRow) -> Result<()>;

    /// Delete a mount row. Deleting an absent row is a no-op.
    async fn delete_mount(&self, id: CritterId) -> Result<()>;

    /// Insert or replace a pet row.
    async fn save_pet(&self, row: PetRow) -> Result<()>;

    /// Delete a pet row. Deleting an absent row is a no-op.
    async fn delete_pet(&self, id: CritterId) -> Result<()>;

    /// Look up a single pet row by entity id.
    async fn find_pet(&self, id: CritterId) -> Result<Option<PetRow>>;

    /// Insert or replace the grant row for (mount, principal).
    async fn save_grant(&self, row: GrantRow) -> Result<()>;

    /// Delete the grant row for (mount, principal). Absent rows are a no-op.
    async fn delete_grant(&self, mount: CritterId, principal: PrincipalId) -> Result<()>;

    /// All mount rows.
    async fn load_mounts(&self) -> Result<Vec<MountRow>>;

    /// All pet rows.
    async fn load_pets(&self) -> Result<Vec<PetRow>>;

    /// All grant rows.
    async fn load_grants(&self) -> Result<Vec<GrantRow>>;
}
