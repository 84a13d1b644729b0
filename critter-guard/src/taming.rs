//! Taming: record creation, re-homing, death handling, and untaming.

use std::sync::Arc;
use tracing::{error, info};

use critter_core::{
    permission, CritterId, CritterKind, MountRecord, PetRecord, PrincipalId, UntameCapabilities,
};

use crate::index::{CritterIndex, Persister, RemovedAnimal};
use crate::notify::{MessageKind, Notifier};
use crate::types::CritterSighting;
use crate::world::WorldLink;

/// Creates, removes, and re-homes animal records.
pub struct TamingService {
    index: Arc<CritterIndex>,
    persister: Arc<Persister>,
    world: Arc<dyn WorldLink>,
    notifier: Arc<dyn Notifier>,
}

impl TamingService {
    /// Create a taming service.
    pub fn new(
        index: Arc<CritterIndex>,
        persister: Arc<Persister>,
        world: Arc<dyn WorldLink>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            index,
            persister,
            world,
            notifier,
        }
    }

    /// Register the sighted animal as tamed by `tamer`.
    ///
    /// Builds the kind-appropriate record, assigns it the next index in the
    /// tamer's owned list, inserts it, persists it, and marks the engine-side
    /// tame flag. Untameable kinds are ignored.
    pub async fn handle_tame(&self, tamer: PrincipalId, sighting: &CritterSighting) {
        if sighting.kind.is_mount() {
            let mut record = match sighting.kind {
                CritterKind::Horse => MountRecord::horse(
                    sighting.id,
                    tamer,
                    sighting.color.clone().unwrap_or_default(),
                    sighting.style.clone().unwrap_or_default(),
                ),
                CritterKind::Llama => MountRecord::llama(
                    sighting.id,
                    tamer,
                    sighting.color.clone().unwrap_or_default(),
                ),
                kind => MountRecord::plain(sighting.id, tamer, kind),
            };
            record.animal.name = sighting.name.clone();
            record.animal.last_location = sighting.location.clone();

            let stored = self.index.register_mount(record).await;
            self.persister.save_mount(&stored).await;
            self.world.set_tamed(sighting.id, true).await;
            info!(id = %sighting.id, owner = %tamer, kind = ?sighting.kind, "Registered mount");
            self.notifier.notify(tamer, MessageKind::TamedForSelf).await;
        } else if sighting.kind.is_pet() {
            let mut record = match sighting.kind {
                CritterKind::Wolf => PetRecord::wolf(
                    sighting.id,
                    tamer,
                    sighting.variant.clone().unwrap_or_default(),
                    sighting.sound_variant.clone().unwrap_or_default(),
                ),
                CritterKind::Cat => PetRecord::cat(
                    sighting.id,
                    tamer,
                    sighting.variant.clone().unwrap_or_default(),
                ),
                _ => PetRecord::parrot(
                    sighting.id,
                    tamer,
                    sighting.variant.clone().unwrap_or_default(),
                ),
            };
            record.animal.name = sighting.name.clone();
            record.animal.last_location = sighting.location.clone();

            let stored = self.index.register_pet(record).await;
            self.persister.save_pet(&stored).await;
            self.world.set_tamed(sighting.id, true).await;
            info!(id = %sighting.id, owner = %tamer, kind = ?sighting.kind, "Registered pet");
            self.notifier.notify(tamer, MessageKind::TamedForSelf).await;
        }
    }

    /// Remove a record from the index and delete its durable copies,
    /// including every grant of a removed mount.
    pub async fn unregister(&self, id: CritterId) -> Option<RemovedAnimal> {
        let removed = self.index.remove_animal(id).await?;
        match &removed {
            RemovedAnimal::Mount { grants, .. } => {
                self.persister.delete_mount(id).await;
                for grant in grants {
                    self.persister.delete_grant(grant.mount, grant.principal).await;
                }
            }
            RemovedAnimal::Pet { .. } => {
                self.persister.delete_pet(id).await;
            }
        }
        Some(removed)
    }

    /// Handle the death of a tracked animal.
    ///
    /// Mounts are resident and unregister synchronously. Pets may not be
    /// fully resident, so they go through the store lookup before the
    /// removal runs back on the core.
    pub async fn process_death(&self, id: CritterId) {
        if self.index.mount(id).await.is_some() {
            self.unregister(id).await;
            info!(id = %id, "Removed saved mount after death");
            return;
        }
        match self.persister.store().find_pet(id).await {
            Ok(Some(_)) => {
                self.index.remove_animal(id).await;
                self.persister.delete_pet(id).await;
                info!(id = %id, "Removed saved pet after death");
            }
            Ok(None) => {}
            Err(e) => error!(id = %id, error = %e, "Pet death lookup failed"),
        }
    }

    /// Untame the selected critter, if the caller's capabilities allow it.
    ///
    /// Clears the engine-side tame flag and, for mounts, strips equipped
    /// riding gear so a leftover saddle cannot block re-taming.
    pub async fn untame(
        &self,
        principal: PrincipalId,
        caps: &UntameCapabilities,
        target: &CritterSighting,
    ) {
        let id = target.id;
        if let Some(mount) = self.index.mount(id).await {
            if permission::can_untame(principal, mount.animal.owner, caps) {
                self.world.set_tamed(id, false).await;
                self.world.strip_riding_gear(id).await;
                self.unregister(id).await;
                self.notifier.notify(principal, MessageKind::Untamed).await;
            } else {
                self.notifier
                    .notify(principal, MessageKind::NotYourCritter)
                    .await;
            }
            return;
        }
        if let Some(pet) = self.index.pet(id).await {
            if permission::can_untame(principal, pet.animal.owner, caps) {
                self.world.set_tamed(id, false).await;
                self.unregister(id).await;
                self.notifier.notify(principal, MessageKind::Untamed).await;
            } else {
                self.notifier
                    .notify(principal, MessageKind::NotYourCritter)
                    .await;
            }
            return;
        }
        self.notifier.notify(principal, MessageKind::NotTamed).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::world::FakeWorld;
    use critter_core::{AccessGrant, AccessTier};
    use critter_store::{MemoryStore, RecordStore};
    use uuid::Uuid;

    struct Rig {
        index: Arc<CritterIndex>,
        persister: Arc<Persister>,
        store: Arc<MemoryStore>,
        world: Arc<FakeWorld>,
        notifier: Arc<RecordingNotifier>,
        taming: TamingService,
    }

    fn rig() -> Rig {
        let store = Arc::new(MemoryStore::new());
        let persister = Arc::new(Persister::new(store.clone() as Arc<dyn RecordStore>));
        let index = Arc::new(CritterIndex::new(true));
        let world = Arc::new(FakeWorld::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let taming = TamingService::new(
            index.clone(),
            persister.clone(),
            world.clone(),
            notifier.clone(),
        );
        Rig {
            index,
            persister,
            store,
            world,
            notifier,
            taming,
        }
    }

    #[tokio::test]
    async fn test_tame_white_horse() {
        let rig = rig();
        let owner = Uuid::new_v4();
        let sighting = CritterSighting::new(Uuid::new_v4(), CritterKind::Horse)
            .with_color("white")
            .with_style("none");

        rig.taming.handle_tame(owner, &sighting).await;
        rig.persister.flush().await;

        let mount = rig.index.mount(sighting.id).await.unwrap();
        assert_eq!(mount.animal.index, 1);
        assert_eq!(mount.animal.owner, owner);
        assert_eq!(mount.color.as_deref(), Some("white"));
        assert!(mount.access.is_empty());
        assert!(rig.world.is_tamed(sighting.id).await);
        assert_eq!(rig.store.load_mounts().await.unwrap().len(), 1);
        assert_eq!(
            rig.notifier.messages_for(owner).await,
            vec![MessageKind::TamedForSelf]
        );
    }

    #[tokio::test]
    async fn test_mount_death_cascades_grants() {
        let rig = rig();
        let owner = Uuid::new_v4();
        let friend = Uuid::new_v4();
        let sighting = CritterSighting::new(Uuid::new_v4(), CritterKind::Camel);

        rig.taming.handle_tame(owner, &sighting).await;
        rig.index
            .insert_grant(AccessGrant::new(sighting.id, friend, AccessTier::Full))
            .await;
        let grant = rig
            .index
            .mount(sighting.id)
            .await
            .unwrap()
            .grant_for(friend)
            .cloned()
            .unwrap();
        rig.store
            .save_grant((&grant).into())
            .await
            .unwrap();

        rig.taming.process_death(sighting.id).await;
        rig.persister.flush().await;

        assert!(rig.index.mount(sighting.id).await.is_none());
        assert!(rig.store.load_mounts().await.unwrap().is_empty());
        assert_eq!(rig.store.grant_rows().await, 0);
        assert!(rig.index.player(friend).await.unwrap().grants.is_empty());
    }

    #[tokio::test]
    async fn test_pet_death_resolves_through_store() {
        let rig = rig();
        let owner = Uuid::new_v4();
        let sighting = CritterSighting::new(Uuid::new_v4(), CritterKind::Cat).with_variant("tabby");

        rig.taming.handle_tame(owner, &sighting).await;
        rig.persister.flush().await;
        assert_eq!(rig.store.load_pets().await.unwrap().len(), 1);

        rig.taming.process_death(sighting.id).await;
        rig.persister.flush().await;

        assert!(rig.index.pet(sighting.id).await.is_none());
        assert!(rig.store.load_pets().await.unwrap().is_empty());
        assert!(rig.index.owned_by(owner).await.is_empty());
    }

    #[tokio::test]
    async fn test_untame_requires_capability() {
        let rig = rig();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let sighting = CritterSighting::new(Uuid::new_v4(), CritterKind::Horse);

        rig.taming.handle_tame(owner, &sighting).await;

        let own_only = UntameCapabilities {
            untame_own: true,
            untame_others: false,
        };
        rig.taming.untame(stranger, &own_only, &sighting).await;
        assert!(rig.index.mount(sighting.id).await.is_some());
        assert_eq!(
            rig.notifier.messages_for(stranger).await,
            vec![MessageKind::NotYourCritter]
        );

        rig.taming.untame(owner, &own_only, &sighting).await;
        rig.persister.flush().await;
        assert!(rig.index.mount(sighting.id).await.is_none());
        assert!(!rig.world.is_tamed(sighting.id).await);
        assert!(rig.world.gear_stripped(sighting.id).await);
        assert!(rig
            .notifier
            .messages_for(owner)
            .await
            .contains(&MessageKind::Untamed));
    }

    #[tokio::test]
    async fn test_untame_unknown_target() {
        let rig = rig();
        let caller = Uuid::new_v4();
        let sighting = CritterSighting::new(Uuid::new_v4(), CritterKind::Horse);

        rig.taming
            .untame(caller, &UntameCapabilities::default(), &sighting)
            .await;

        assert_eq!(
            rig.notifier.messages_for(caller).await,
            vec![MessageKind::NotTamed]
        );
    }
}
