//! The in-memory index: the authoritative cache of records, grants, and
//! per-player metadata for the life of the process.
//!
//! The index is an explicitly constructed, injected object. It starts empty
//! or hydrated from the record store, and the store only becomes the
//! tie-breaker again after a restart.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use critter_core::{
    AccessGrant, AccessTier, CritterId, CritterRecord, MountRecord, PetRecord, PrincipalId,
};
use critter_store::{GrantRow, MountRow, PetRow, RecordStore};

use crate::types::Result;

/// Per-player metadata, created lazily on first sight.
#[derive(Debug, Clone, PartialEq)]
pub struct PrincipalMeta {
    /// Principal identifier
    pub id: PrincipalId,
    /// Owned critters in index order; position + 1 is each record's index
    pub owned: Vec<CritterId>,
    /// Grants held by this principal, keyed by mount
    pub grants: HashMap<CritterId, AccessTier>,
    /// Whether owner notifications are delivered to this principal
    pub notifications_enabled: bool,
}

impl PrincipalMeta {
    fn new(id: PrincipalId, notifications_enabled: bool) -> Self {
        Self {
            id,
            owned: Vec::new(),
            grants: HashMap::new(),
            notifications_enabled,
        }
    }
}

/// What `remove_animal` took out of the index, for persistence cleanup.
#[derive(Debug, Clone)]
pub enum RemovedAnimal {
    Mount {
        record: MountRecord,
        grants: Vec<AccessGrant>,
    },
    Pet {
        record: PetRecord,
    },
}

/// Counts reported by a hydrate pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HydrateReport {
    pub mounts: usize,
    pub pets: usize,
    pub grants: usize,
    /// Grant rows that referenced unknown mounts and were deleted
    pub orphaned_grants: usize,
}

#[derive(Default)]
struct IndexState {
    mounts: HashMap<CritterId, MountRecord>,
    pets: HashMap<CritterId, PetRecord>,
    players: HashMap<PrincipalId, PrincipalMeta>,
}

impl IndexState {
    fn meta_mut(&mut self, principal: PrincipalId, default_notifications: bool) -> &mut PrincipalMeta {
        self.players
            .entry(principal)
            .or_insert_with(|| PrincipalMeta::new(principal, default_notifications))
    }

    /// Drop `id` from the owner's list and renumber the survivors 1..N.
    fn detach_from_owner(&mut self, owner: PrincipalId, id: CritterId) {
        let owned = match self.players.get_mut(&owner) {
            Some(meta) => {
                meta.owned.retain(|c| *c != id);
                meta.owned.clone()
            }
            None => return,
        };
        for (position, critter) in owned.iter().enumerate() {
            let index = (position + 1) as u32;
            if let Some(mount) = self.mounts.get_mut(critter) {
                mount.animal.index = index;
            } else if let Some(pet) = self.pets.get_mut(critter) {
                pet.animal.index = index;
            }
        }
    }
}

/// The process-wide critter index.
pub struct CritterIndex {
    state: RwLock<IndexState>,
    default_notifications: bool,
}

impl CritterIndex {
    /// Create an empty index.
    pub fn new(default_notifications: bool) -> Self {
        Self {
            state: RwLock::new(IndexState::default()),
            default_notifications,
        }
    }

    /// Load every persisted record into the index.
    ///
    /// Mounts, grants, and pets are fetched concurrently. Grants whose mount
    /// no longer exists are deleted from the store rather than kept around.
    pub async fn hydrate(&self, store: &dyn RecordStore) -> Result<HydrateReport> {
        let (mount_rows, grant_rows, pet_rows) = futures::try_join!(
            store.load_mounts(),
            store.load_grants(),
            store.load_pets(),
        )?;

        let mut report = HydrateReport::default();
        let mut orphans: Vec<GrantRow> = Vec::new();

        {
            let mut state = self.state.write().await;
            for row in mount_rows {
                let record = MountRecord::from(row);
                self.attach_mount(&mut state, record);
                report.mounts += 1;
            }
            info!(count = report.mounts, "Loaded saved mounts");

            for row in grant_rows {
                if state.mounts.contains_key(&row.mount) {
                    let grant = AccessGrant::from(row);
                    let meta = state.meta_mut(grant.principal, self.default_notifications);
                    meta.grants.insert(grant.mount, grant.tier);
                    if let Some(mount) = state.mounts.get_mut(&grant.mount) {
                        mount.insert_grant(grant);
                    }
                    report.grants += 1;
                } else {
                    orphans.push(row);
                }
            }
            info!(count = report.grants, "Loaded saved mount accesses");

            for row in pet_rows {
                let record = PetRecord::from(row);
                self.attach_pet(&mut state, record);
                report.pets += 1;
            }
            info!(count = report.pets, "Loaded saved pets");
        }

        for orphan in &orphans {
            warn!(mount = %orphan.mount, principal = %orphan.principal, "Deleting orphaned grant");
            if let Err(e) = store.delete_grant(orphan.mount, orphan.principal).await {
                error!(error = %e, "Failed to delete orphaned grant");
            }
        }
        report.orphaned_grants = orphans.len();

        Ok(report)
    }

    fn attach_mount(&self, state: &mut IndexState, mut record: MountRecord) -> MountRecord {
        let owner = record.animal.owner;
        let meta = state.meta_mut(owner, self.default_notifications);
        record.animal.index = (meta.owned.len() + 1) as u32;
        meta.owned.push(record.animal.id);
        state.mounts.insert(record.animal.id, record.clone());
        record
    }

    fn attach_pet(&self, state: &mut IndexState, mut record: PetRecord) -> PetRecord {
        let owner = record.animal.owner;
        let meta = state.meta_mut(owner, self.default_notifications);
        record.animal.index = (meta.owned.len() + 1) as u32;
        meta.owned.push(record.animal.id);
        state.pets.insert(record.animal.id, record.clone());
        record
    }

    /// Create metadata for a principal if the index has not seen them.
    pub async fn ensure_player(&self, principal: PrincipalId) {
        let mut state = self.state.write().await;
        state.meta_mut(principal, self.default_notifications);
    }

    /// Snapshot of a principal's metadata.
    pub async fn player(&self, principal: PrincipalId) -> Option<PrincipalMeta> {
        self.state.read().await.players.get(&principal).cloned()
    }

    /// Snapshot of a mount record.
    pub async fn mount(&self, id: CritterId) -> Option<MountRecord> {
        self.state.read().await.mounts.get(&id).cloned()
    }

    /// Snapshot of a resident pet record.
    pub async fn pet(&self, id: CritterId) -> Option<PetRecord> {
        self.state.read().await.pets.get(&id).cloned()
    }

    /// Whether the id belongs to a resident pet.
    pub async fn is_pet(&self, id: CritterId) -> bool {
        self.state.read().await.pets.contains_key(&id)
    }

    /// Snapshot of either record variant.
    pub async fn critter(&self, id: CritterId) -> Option<CritterRecord> {
        let state = self.state.read().await;
        if let Some(mount) = state.mounts.get(&id) {
            return Some(CritterRecord::Mount(mount.clone()));
        }
        state.pets.get(&id).map(|pet| CritterRecord::Pet(pet.clone()))
    }

    /// A principal's owned records in index order.
    pub async fn owned_by(&self, principal: PrincipalId) -> Vec<CritterRecord> {
        let state = self.state.read().await;
        let Some(meta) = state.players.get(&principal) else {
            return Vec::new();
        };
        meta.owned
            .iter()
            .filter_map(|id| {
                state
                    .mounts
                    .get(id)
                    .cloned()
                    .map(CritterRecord::Mount)
                    .or_else(|| state.pets.get(id).cloned().map(CritterRecord::Pet))
            })
            .collect()
    }

    /// Register a newly tamed mount: assign its index, append it to the
    /// owner's list, and insert it. Returns the stored record.
    pub async fn register_mount(&self, record: MountRecord) -> MountRecord {
        let mut state = self.state.write().await;
        let stored = self.attach_mount(&mut state, record);
        debug!(id = %stored.animal.id, "Registered mount");
        stored
    }

    /// Register a newly tamed pet.
    pub async fn register_pet(&self, record: PetRecord) -> PetRecord {
        let mut state = self.state.write().await;
        let stored = self.attach_pet(&mut state, record);
        debug!(id = %stored.animal.id, "Registered pet");
        stored
    }

    /// Remove a record: detach it from its owner's list (renumbering the
    /// rest), drop it, and drop all of its grants from both sides.
    pub async fn remove_animal(&self, id: CritterId) -> Option<RemovedAnimal> {
        let mut state = self.state.write().await;
        if let Some(mut record) = state.mounts.remove(&id) {
            let grants: Vec<AccessGrant> = record.access.drain().map(|(_, g)| g).collect();
            for grant in &grants {
                if let Some(meta) = state.players.get_mut(&grant.principal) {
                    meta.grants.remove(&id);
                }
            }
            state.detach_from_owner(record.animal.owner, id);
            return Some(RemovedAnimal::Mount { record, grants });
        }
        if let Some(record) = state.pets.remove(&id) {
            state.detach_from_owner(record.animal.owner, id);
            return Some(RemovedAnimal::Pet { record });
        }
        None
    }

    /// Insert a grant, keeping the mount-side and principal-side views in
    /// lockstep. Returns the grant it replaced, if any; `None` as the outer
    /// option means the mount is unknown.
    pub async fn insert_grant(&self, grant: AccessGrant) -> Option<Option<AccessGrant>> {
        let mut state = self.state.write().await;
        let mount_id = grant.mount;
        let principal = grant.principal;
        let tier = grant.tier;
        let mount = state.mounts.get_mut(&mount_id)?;
        let replaced = mount.access.insert(principal, grant);
        state
            .meta_mut(principal, self.default_notifications)
            .grants
            .insert(mount_id, tier);
        Some(replaced)
    }

    /// Remove the grant for (mount, principal) from both sides.
    pub async fn remove_grant(
        &self,
        mount: CritterId,
        principal: PrincipalId,
    ) -> Option<AccessGrant> {
        let mut state = self.state.write().await;
        if let Some(meta) = state.players.get_mut(&principal) {
            meta.grants.remove(&mount);
        }
        state.mounts.get_mut(&mount)?.remove_grant(principal)
    }

    /// Rename a critter, but only for its owner. Returns the updated record.
    pub async fn rename(
        &self,
        principal: PrincipalId,
        id: CritterId,
        name: impl Into<String>,
    ) -> Option<CritterRecord> {
        let mut state = self.state.write().await;
        if let Some(mount) = state.mounts.get_mut(&id) {
            if !mount.is_owner(principal) {
                return None;
            }
            mount.animal.name = Some(name.into());
            return Some(CritterRecord::Mount(mount.clone()));
        }
        if let Some(pet) = state.pets.get_mut(&id) {
            if !pet.is_owner(principal) {
                return None;
            }
            pet.animal.name = Some(name.into());
            return Some(CritterRecord::Pet(pet.clone()));
        }
        None
    }

    /// Refresh a record's last known location. Returns the updated record.
    pub async fn set_location(
        &self,
        id: CritterId,
        location: critter_core::Location,
    ) -> Option<CritterRecord> {
        let mut state = self.state.write().await;
        if let Some(mount) = state.mounts.get_mut(&id) {
            mount.animal.last_location = Some(location);
            return Some(CritterRecord::Mount(mount.clone()));
        }
        if let Some(pet) = state.pets.get_mut(&id) {
            pet.animal.last_location = Some(location);
            return Some(CritterRecord::Pet(pet.clone()));
        }
        None
    }

    /// Whether owner notifications are enabled for a principal.
    pub async fn notifications_enabled(&self, principal: PrincipalId) -> bool {
        self.state
            .read()
            .await
            .players
            .get(&principal)
            .map(|m| m.notifications_enabled)
            .unwrap_or(self.default_notifications)
    }

    /// Set a principal's notification preference.
    pub async fn set_notifications(&self, principal: PrincipalId, enabled: bool) {
        let mut state = self.state.write().await;
        state
            .meta_mut(principal, self.default_notifications)
            .notifications_enabled = enabled;
    }
}

/// Fire-and-observe persistence.
///
/// Saves and deletes are spawned so the core never waits on the store; a
/// failed write is logged and dropped, and the in-memory index stays
/// authoritative for the session. `flush` drains every in-flight task at
/// teardown.
pub struct Persister {
    store: Arc<dyn RecordStore>,
    tasks: Mutex<JoinSet<()>>,
}

impl Persister {
    /// Create a persister over a store.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Persist a mount record.
    pub async fn save_mount(&self, record: &MountRecord) {
        let store = Arc::clone(&self.store);
        let row = MountRow::from(record);
        self.tasks.lock().await.spawn(async move {
            if let Err(e) = store.save_mount(row).await {
                error!(error = %e, "Failed to persist mount");
            }
        });
    }

    /// Delete a mount record.
    pub async fn delete_mount(&self, id: CritterId) {
        let store = Arc::clone(&self.store);
        self.tasks.lock().await.spawn(async move {
            if let Err(e) = store.delete_mount(id).await {
                error!(error = %e, "Failed to delete mount");
            }
        });
    }

    /// Persist a pet record.
    pub async fn save_pet(&self, record: &PetRecord) {
        let store = Arc::clone(&self.store);
        let row = PetRow::from(record);
        self.tasks.lock().await.spawn(async move {
            if let Err(e) = store.save_pet(row).await {
                error!(error = %e, "Failed to persist pet");
            }
        });
    }

    /// Delete a pet record.
    pub async fn delete_pet(&self, id: CritterId) {
        let store = Arc::clone(&self.store);
        self.tasks.lock().await.spawn(async move {
            if let Err(e) = store.delete_pet(id).await {
                error!(error = %e, "Failed to delete pet");
            }
        });
    }

    /// Persist a grant.
    pub async fn save_grant(&self, grant: &AccessGrant) {
        let store = Arc::clone(&self.store);
        let row = GrantRow::from(grant);
        self.tasks.lock().await.spawn(async move {
            if let Err(e) = store.save_grant(row).await {
                error!(error = %e, "Failed to persist grant");
            }
        });
    }

    /// Delete a grant.
    pub async fn delete_grant(&self, mount: CritterId, principal: PrincipalId) {
        let store = Arc::clone(&self.store);
        self.tasks.lock().await.spawn(async move {
            if let Err(e) = store.delete_grant(mount, principal).await {
                error!(error = %e, "Failed to delete grant");
            }
        });
    }

    /// Await every in-flight persistence task.
    pub async fn flush(&self) {
        let mut tasks = self.tasks.lock().await;
        while tasks.join_next().await.is_some() {}
    }
}
