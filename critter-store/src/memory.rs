//! In-memory record store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use critter_core::{CritterId, PrincipalId};

use crate::rows::{GrantRow, MountRow, PetRow};
use crate::traits::{RecordStore, Result, StoreError};

/// In-memory store.
///
/// Rows are held JSON-encoded so every save and load passes through the
/// durable schema. Write failures can be injected for tests, and operation
/// counters expose how often the runtime persisted.
pub struct MemoryStore {
    mounts: RwLock<HashMap<CritterId, String>>,
    pets: RwLock<HashMap<CritterId, String>>,
    grants: RwLock<HashMap<(CritterId, PrincipalId), String>>,
    fail_writes: AtomicBool,
    save_count: AtomicU32,
    delete_count: AtomicU32,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            mounts: RwLock::new(HashMap::new()),
            pets: RwLock::new(HashMap::new()),
            grants: RwLock::new(HashMap::new()),
            fail_writes: AtomicBool::new(false),
            save_count: AtomicU32::new(0),
            delete_count: AtomicU32::new(0),
        }
    }

    /// Make every subsequent write fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of saves attempted.
    pub fn save_count(&self) -> u32 {
        self.save_count.load(Ordering::SeqCst)
    }

    /// Number of deletes attempted.
    pub fn delete_count(&self) -> u32 {
        self.delete_count.load(Ordering::SeqCst)
    }

    /// Number of grant rows currently stored.
    pub async fn grant_rows(&self) -> usize {
        self.grants.read().await.len()
    }

    fn check_write(&self, count: &AtomicU32) -> Result<()> {
        count.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::WriteFailed("injected failure".to_string()));
        }
        Ok(())
    }

    fn encode<T: serde::Serialize>(value: &T) -> Result<String> {
        serde_json::to_string(value).map_err(|e| StoreError::Codec(e.to_string()))
    }

    fn decode<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T> {
        serde_json::from_str(raw).map_err(|e| StoreError::Codec(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn save_mount(&self, row: MountRow) -> Result<()> {
        self.check_write(&self.save_count)?;
        debug!(id = %row.id, "Saving mount row");
        let encoded = Self::encode(&row)?;
        self.mounts.write().await.insert(row.id, encoded);
        Ok(())
    }

    async fn delete_mount(&self, id: CritterId) -> Result<()> {
        self.check_write(&self.delete_count)?;
        self.mounts.write().await.remove(&id);
        Ok(())
    }

    async fn save_pet(&self, row: PetRow) -> Result<()> {
        self.check_write(&self.save_count)?;
        debug!(id = %row.id, "Saving pet row");
        let encoded = Self::encode(&row)?;
        self.pets.write().await.insert(row.id, encoded);
        Ok(())
    }

    async fn delete_pet(&self, id: CritterId) -> Result<()> {
        self.check_write(&self.delete_count)?;
        self.pets.write().await.remove(&id);
        Ok(())
    }

    async fn find_pet(&self, id: CritterId) -> Result<Option<PetRow>> {
        let pets = self.pets.read().await;
        pets.get(&id).map(|raw| Self::decode(raw)).transpose()
    }

    async fn save_grant(&self, row: GrantRow) -> Result<()> {
        self.check_write(&self.save_count)?;
        let encoded = Self::encode(&row)?;
        self.grants
            .write()
            .await
            .insert((row.mount, row.principal), encoded);
        Ok(())
    }

    async fn delete_grant(&self, mount: CritterId, principal: PrincipalId) -> Result<()> {
        self.check_write(&self.delete_count)?;
        self.grants.write().await.remove(&(mount, principal));
        Ok(())
    }

    async fn load_mounts(&self) -> Result<Vec<MountRow>> {
        let mounts = self.mounts.read().await;
        mounts.values().map(|raw| Self::decode(raw)).collect()
    }

    async fn load_pets(&self) -> Result<Vec<PetRow>> {
        let pets = self.pets.read().await;
        pets.values().map(|raw| Self::decode(raw)).collect()
    }

    async fn load_grants(&self) -> Result<Vec<GrantRow>> {
        let grants = self.grants.read().await;
        grants.values().map(|raw| Self::decode(raw)).collect()
    }
}
