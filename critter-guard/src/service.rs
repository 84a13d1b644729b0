//! The `CritterGuard` service: the facade the world-event adapter calls.
//!
//! One method per world notification, synchronous on the core; slow lookups
//! (display names, non-resident pets) are awaited through their async
//! boundaries and their continuations run back here before touching the
//! index.

use std::sync::Arc;
use tracing::{debug, info};

use critter_core::{
    permission, AccessTier, CritterId, CritterKind, CritterRecord, Location, MountRecord,
    PrincipalId, UntameCapabilities,
};
use critter_store::RecordStore;

use crate::config::GuardConfig;
use crate::directory::PrincipalDirectory;
use crate::index::{CritterIndex, HydrateReport, Persister};
use crate::notify::{MessageKind, Notifier};
use crate::pending::{PendingAction, PendingRegistry};
use crate::seating::SeatManager;
use crate::taming::TamingService;
use crate::types::{CritterSighting, InteractContext, Result, Verdict};
use crate::world::{EntityRef, NoOverlay, OverlayProvider, WorldLink};

/// The critter-guard runtime.
///
/// Owns the index and every component, and translates world notifications
/// into permission checks, pending-action transitions, seating changes, and
/// record mutations.
pub struct CritterGuard {
    pub(crate) config: GuardConfig,
    pub(crate) index: Arc<CritterIndex>,
    pub(crate) persister: Arc<Persister>,
    pub(crate) registry: PendingRegistry,
    pub(crate) seats: SeatManager,
    pub(crate) taming: TamingService,
    pub(crate) world: Arc<dyn WorldLink>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) overlay: Arc<dyn OverlayProvider>,
    pub(crate) directory: Arc<dyn PrincipalDirectory>,
}

impl CritterGuard {
    /// Create a runtime with no cosmetic overlay collaborator.
    pub fn new(
        config: GuardConfig,
        store: Arc<dyn RecordStore>,
        world: Arc<dyn WorldLink>,
        notifier: Arc<dyn Notifier>,
        directory: Arc<dyn PrincipalDirectory>,
    ) -> Self {
        Self::with_overlay_provider(config, store, world, notifier, directory, Arc::new(NoOverlay))
    }

    /// Create a runtime with a cosmetic overlay collaborator.
    pub fn with_overlay_provider(
        config: GuardConfig,
        store: Arc<dyn RecordStore>,
        world: Arc<dyn WorldLink>,
        notifier: Arc<dyn Notifier>,
        directory: Arc<dyn PrincipalDirectory>,
        overlay: Arc<dyn OverlayProvider>,
    ) -> Self {
        let index = Arc::new(CritterIndex::new(config.notifications.default_enabled));
        let persister = Arc::new(Persister::new(store));
        let registry = PendingRegistry::new(config.pending.timeout(), notifier.clone());
        let seats = SeatManager::new(
            config.seating.clone(),
            world.clone(),
            overlay.clone(),
            notifier.clone(),
            directory.clone(),
        );
        let taming = TamingService::new(
            index.clone(),
            persister.clone(),
            world.clone(),
            notifier.clone(),
        );
        Self {
            config,
            index,
            persister,
            registry,
            seats,
            taming,
            world,
            notifier,
            overlay,
            directory,
        }
    }

    /// The authoritative index.
    pub fn index(&self) -> &Arc<CritterIndex> {
        &self.index
    }

    /// The pending-action registry.
    pub fn pending(&self) -> &PendingRegistry {
        &self.registry
    }

    /// Load all persisted records into the index.
    pub async fn hydrate(&self) -> Result<HydrateReport> {
        self.index.hydrate(self.persister.store().as_ref()).await
    }

    /// Flush in-flight persistence before shutdown.
    pub async fn shutdown(&self) {
        self.persister.flush().await;
        info!("Critter guard shut down");
    }

    // -------- world notifications

    /// A principal joined the world.
    pub async fn on_principal_join(&self, principal: PrincipalId) {
        self.index.ensure_player(principal).await;
    }

    /// A principal left the world. Riding a mount they do not own empties
    /// the mount so it is not stranded under an absent rider.
    pub async fn on_principal_leave(&self, principal: PrincipalId) {
        if let Some(EntityRef::Critter(vehicle)) = self.world.vehicle_of(principal).await {
            if let Some(mount) = self.index.mount(vehicle).await {
                if !mount.is_owner(principal) {
                    self.world.eject(EntityRef::Critter(vehicle)).await;
                }
            }
        }
    }

    /// A principal tamed an animal through world mechanics.
    pub async fn on_tame_attempt(&self, tamer: PrincipalId, sighting: &CritterSighting) {
        self.taming.handle_tame(tamer, sighting).await;
    }

    /// A tracked animal died.
    pub async fn on_death(&self, sighting: &CritterSighting) {
        if !sighting.kind.is_tameable() {
            return;
        }
        if let Some(mount) = self.index.mount(sighting.id).await {
            let riders = self.world.riders(sighting.id).await;
            if let Some(driver) = riders.first().copied() {
                if mount.has_full_access(driver) && !mount.is_owner(driver) {
                    self.notify_owner(&mount, driver, |rider_name, mount_label| {
                        MessageKind::OwnerDeathNotice {
                            rider_name,
                            mount_label,
                        }
                    })
                    .await;
                }
            }
        }
        self.taming.process_death(sighting.id).await;
    }

    /// A principal right-clicked a critter. A pending action consumes the
    /// interaction; otherwise the permission engine decides.
    pub async fn on_interact(
        &self,
        principal: PrincipalId,
        sighting: &CritterSighting,
        ctx: InteractContext,
    ) -> Verdict {
        if !sighting.kind.is_tameable() {
            return Verdict::Allow;
        }

        if let Some(action) = self.registry.take(principal) {
            self.dispatch(principal, action, sighting).await;
            return Verdict::Deny;
        }

        match self.index.mount(sighting.id).await {
            Some(mount) => {
                let level = permission::tier_of(principal, &mount);
                if level.can_interact() {
                    return Verdict::Allow;
                }
                if self.config.taming.breed_locked_animals
                    && ctx.is_adult
                    && ctx.holding_breed_item
                {
                    return Verdict::Allow;
                }
                let owner_name = self.display_name(mount.animal.owner).await;
                self.notifier
                    .notify(principal, MessageKind::InteractDenied { owner_name })
                    .await;
                Verdict::Deny
            }
            // Unknown critters are unowned: interaction is free
            None => Verdict::Allow,
        }
    }

    /// A critter was renamed. Only the owner's rename sticks.
    pub async fn on_rename(&self, principal: PrincipalId, id: CritterId, name: &str) {
        match self.index.rename(principal, id, name).await {
            Some(CritterRecord::Mount(mount)) => self.persister.save_mount(&mount).await,
            Some(CritterRecord::Pet(pet)) => self.persister.save_pet(&pet).await,
            None => {
                // A pet can be renamed while not resident; patch the row
                let store = self.persister.store();
                if let Ok(Some(mut row)) = store.find_pet(id).await {
                    if row.owner == principal {
                        row.name = Some(name.to_string());
                        if let Err(e) = store.save_pet(row).await {
                            tracing::error!(id = %id, error = %e, "Failed to persist rename");
                        }
                    }
                }
            }
        }
    }

    /// A principal tried to leash a critter.
    pub async fn on_leash_attempt(
        &self,
        principal: PrincipalId,
        sighting: &CritterSighting,
    ) -> Verdict {
        if let Some(mount) = self.index.mount(sighting.id).await {
            if mount.is_owner(principal) || mount.has_full_access(principal) {
                return Verdict::Allow;
            }
            return Verdict::Deny;
        }
        if let Some(pet) = self.index.pet(sighting.id).await {
            if pet.is_owner(principal) {
                return Verdict::Allow;
            }
            return Verdict::Deny;
        }
        // Leashing an unowned llama claims it
        if sighting.kind == CritterKind::Llama && self.config.taming.tame_on_leash {
            self.taming.handle_tame(principal, sighting).await;
        }
        Verdict::Allow
    }

    /// A principal tried to mount a critter.
    pub async fn on_mount_attempt(
        &self,
        principal: PrincipalId,
        sighting: &CritterSighting,
    ) -> Verdict {
        let Some(mount) = self.index.mount(sighting.id).await else {
            // Mounting an unowned camel, ghast, or strider claims it
            if matches!(
                sighting.kind,
                CritterKind::Camel | CritterKind::HappyGhast | CritterKind::Strider
            ) && self.config.taming.tame_on_mount
            {
                self.taming.handle_tame(principal, sighting).await;
            }
            return Verdict::Allow;
        };

        let level = permission::tier_of(principal, &mount);
        let riders = self.world.riders(sighting.id).await;

        if !riders.is_empty() {
            if level.can_ride() {
                if !self.overlay.is_active(sighting.id).await {
                    return Verdict::Allow;
                }
                // The native event never proceeds against a hidden mount;
                // the stack join seats the rider instead when a seat is free
                let outcome = self.seats.handle_stacked_join(&mount, principal).await;
                debug!(mount = %sighting.id, principal = %principal, ?outcome, "Stacked join");
                return Verdict::Deny;
            }
        } else if level.can_control() {
            if level == permission::AccessLevel::Full {
                self.notify_owner(&mount, principal, |rider_name, mount_label| {
                    MessageKind::OwnerRideNotice {
                        rider_name,
                        mount_label,
                    }
                })
                .await;
                info!(mount = %sighting.id, rider = %principal, "Borrowed mount ride started");
            }
            self.overlay.apply(sighting.id, sighting.kind).await;
            return Verdict::Allow;
        }

        if !self.overlay.is_active(sighting.id).await {
            let owner_name = self.display_name(mount.animal.owner).await;
            self.notifier
                .notify(principal, MessageKind::MountDenied { owner_name })
                .await;
        }
        Verdict::Deny
    }

    /// A rider is leaving a mount. Drivers trigger succession; the last
    /// rider out drops the cosmetic overlay.
    pub async fn on_dismount(&self, principal: PrincipalId, sighting: &CritterSighting) {
        let Some(mount) = self.index.mount(sighting.id).await else {
            return;
        };
        let strategy = self.seats.strategy_for(sighting.id).await;
        let riders = self
            .seats
            .riders(sighting.id, sighting.kind, strategy)
            .await;
        let was_driver = SeatManager::is_driver(principal, &riders);

        if sighting.kind.seat_capacity() > 1 {
            self.seats.handle_dismount_request(&mount, principal).await;
        } else {
            self.world.dismount(principal).await;
        }

        if was_driver && mount.has_full_access(principal) && !mount.is_owner(principal) {
            self.notify_owner(&mount, principal, |rider_name, mount_label| {
                MessageKind::OwnerDismountNotice {
                    rider_name,
                    mount_label,
                }
            })
            .await;
            info!(mount = %sighting.id, rider = %principal, "Borrowed mount ride ended");
        }

        let remaining = self
            .seats
            .riders(sighting.id, sighting.kind, strategy)
            .await;
        if remaining.is_empty() {
            self.overlay.remove(sighting.id).await;
        }
    }

    /// A tracked animal took damage.
    pub async fn on_damage(
        &self,
        sighting: &CritterSighting,
        damager: Option<PrincipalId>,
    ) -> Verdict {
        if sighting.kind.is_mount() {
            if self.index.mount(sighting.id).await.is_some() {
                let riders = self.world.riders(sighting.id).await;
                if riders.is_empty() {
                    return Verdict::Deny;
                }
                if damager.is_some() {
                    return Verdict::Deny;
                }
            }
            return Verdict::Allow;
        }
        if sighting.kind.is_pet() {
            if let Some(pet) = self.index.pet(sighting.id).await {
                return match damager {
                    Some(d) if d == pet.animal.owner => Verdict::Allow,
                    // environmental damage and strangers are both blocked
                    _ => Verdict::Deny,
                };
            }
        }
        Verdict::Allow
    }

    /// A chunk of entities unloaded; refresh last known locations.
    pub async fn on_unload(&self, world: &str, sightings: &[CritterSighting]) {
        for sighting in sightings {
            if !sighting.kind.is_tameable() {
                continue;
            }
            let Some(seen_at) = &sighting.location else {
                continue;
            };
            let location = Location::new(world, seen_at.x, seen_at.y, seen_at.z);
            match self.index.set_location(sighting.id, location).await {
                Some(CritterRecord::Mount(mount)) => self.persister.save_mount(&mount).await,
                Some(CritterRecord::Pet(pet)) => self.persister.save_pet(&pet).await,
                None => {}
            }
        }
    }

    // -------- command entry points

    /// Begin a grant/revoke access command against a named principal.
    pub async fn request_access_change(
        &self,
        principal: PrincipalId,
        target_name: &str,
        grant: bool,
        tier: AccessTier,
    ) {
        let Some(profile) = self.directory.lookup_name(target_name).await else {
            self.notifier
                .notify(
                    principal,
                    MessageKind::UnknownPrincipal {
                        name: target_name.to_string(),
                    },
                )
                .await;
            return;
        };
        self.register_or_execute(
            principal,
            PendingAction::Access {
                target: profile.id,
                target_name: profile.name,
                grant,
                tier,
            },
        )
        .await;
    }

    /// Begin an info query.
    pub async fn request_info(&self, principal: PrincipalId) {
        self.register_or_execute(principal, PendingAction::Info).await;
    }

    /// Begin a force-tame command for a named principal.
    pub async fn request_force_tame(&self, principal: PrincipalId, target_name: &str) {
        let Some(profile) = self.directory.lookup_name(target_name).await else {
            self.notifier
                .notify(
                    principal,
                    MessageKind::UnknownPrincipal {
                        name: target_name.to_string(),
                    },
                )
                .await;
            return;
        };
        self.register_or_execute(
            principal,
            PendingAction::TameFor {
                target: profile.id,
                target_name: profile.name,
            },
        )
        .await;
    }

    /// Begin an untame command.
    pub async fn request_untame(&self, principal: PrincipalId, caps: UntameCapabilities) {
        self.register_or_execute(principal, PendingAction::Untame { caps })
            .await;
    }

    /// Toggle owner notifications for a principal.
    pub async fn toggle_notifications(&self, principal: PrincipalId, enabled: bool) {
        self.index.set_notifications(principal, enabled).await;
        let message = if enabled {
            MessageKind::NotificationsOn
        } else {
            MessageKind::NotificationsOff
        };
        self.notifier.notify(principal, message).await;
    }

    /// Register a pending action, or execute it at once against the
    /// requester's current tracked vehicle.
    async fn register_or_execute(&self, principal: PrincipalId, action: PendingAction) {
        if let Some(EntityRef::Critter(vehicle)) = self.world.vehicle_of(principal).await {
            if let Some(record) = self.index.critter(vehicle).await {
                let sighting = match &record {
                    CritterRecord::Mount(m) => CritterSighting::from_mount(m),
                    CritterRecord::Pet(p) => CritterSighting::from_pet(p),
                };
                self.dispatch(principal, action, &sighting).await;
                return;
            }
        }
        self.notifier
            .notify(
                principal,
                MessageKind::SelectTarget {
                    action: action.kind(),
                },
            )
            .await;
        self.registry.register(principal, action);
    }

    // -------- shared helpers

    /// Resolve a display name, falling back to the raw id.
    pub(crate) async fn display_name(&self, principal: PrincipalId) -> String {
        match self.directory.lookup_id(principal).await {
            Some(profile) => profile.name,
            None => principal.to_string(),
        }
    }

    /// Send a rider notice to a mount's owner, honoring their preference.
    pub(crate) async fn notify_owner<F>(&self, mount: &MountRecord, rider: PrincipalId, build: F)
    where
        F: FnOnce(String, String) -> MessageKind,
    {
        let owner = mount.animal.owner;
        if !self.index.notifications_enabled(owner).await {
            return;
        }
        let online = self
            .directory
            .lookup_id(owner)
            .await
            .map(|p| p.online)
            .unwrap_or(false);
        if !online {
            return;
        }
        let rider_name = self.display_name(rider).await;
        let mount_label = mount
            .animal
            .name
            .clone()
            .unwrap_or_else(|| mount.animal.id.to_string());
        self.notifier
            .notify(owner, build(rider_name, mount_label))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaticDirectory;
    use crate::notify::RecordingNotifier;
    use crate::world::{FakeOverlay, FakeWorld};
    use critter_store::MemoryStore;
    use std::time::Duration;
    use uuid::Uuid;

    struct Rig {
        guard: CritterGuard,
        store: Arc<MemoryStore>,
        world: Arc<FakeWorld>,
        notifier: Arc<RecordingNotifier>,
        directory: Arc<StaticDirectory>,
        overlay: Arc<FakeOverlay>,
    }

    fn rig() -> Rig {
        let store = Arc::new(MemoryStore::new());
        let world = Arc::new(FakeWorld::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let directory = Arc::new(StaticDirectory::new());
        let overlay = Arc::new(FakeOverlay::new());
        let guard = CritterGuard::with_overlay_provider(
            GuardConfig::default(),
            store.clone() as Arc<dyn RecordStore>,
            world.clone(),
            notifier.clone(),
            directory.clone(),
            overlay.clone(),
        );
        Rig {
            guard,
            store,
            world,
            notifier,
            directory,
            overlay,
        }
    }

    async fn tame(rig: &Rig, owner: PrincipalId, kind: CritterKind) -> CritterSighting {
        let sighting = CritterSighting::new(Uuid::new_v4(), kind);
        rig.guard.on_tame_attempt(owner, &sighting).await;
        sighting
    }

    async fn grant(
        rig: &Rig,
        owner: PrincipalId,
        target: &CritterSighting,
        name: &str,
        tier: AccessTier,
    ) {
        rig.guard
            .request_access_change(owner, name, true, tier)
            .await;
        rig.guard
            .on_interact(owner, target, InteractContext::default())
            .await;
    }

    #[tokio::test]
    async fn test_two_seat_passenger_scenario() {
        // A tames a two-seat camel, grants B passenger access, both ride,
        // then A dismounts: B holds passenger tier only and must be evicted
        // rather than promoted.
        let rig = rig();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        rig.directory.insert(alice, "alice", true).await;
        rig.directory.insert(bob, "bob", true).await;

        let camel = tame(&rig, alice, CritterKind::Camel).await;
        assert_eq!(
            rig.guard.index().mount(camel.id).await.unwrap().animal.index,
            1
        );
        grant(&rig, alice, &camel, "bob", AccessTier::Passenger).await;

        // A mounts the empty camel and drives
        assert!(rig.guard.on_mount_attempt(alice, &camel).await.is_allowed());
        rig.world.seat(EntityRef::Critter(camel.id), alice).await;

        // B may join as second rider while A drives
        assert!(rig.guard.on_mount_attempt(bob, &camel).await.is_allowed());
        rig.world.seat(EntityRef::Critter(camel.id), bob).await;
        assert_eq!(rig.world.riders(camel.id).await, vec![alice, bob]);

        // A leaves; no remaining rider can control, so the camel empties
        rig.guard.on_dismount(alice, &camel).await;
        assert!(rig.world.riders(camel.id).await.is_empty());
        assert!(rig
            .notifier
            .messages_for(bob)
            .await
            .contains(&MessageKind::SeatEvicted));
    }

    #[tokio::test]
    async fn test_full_access_rider_succeeds_driver() {
        let rig = rig();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        rig.directory.insert(alice, "alice", true).await;
        rig.directory.insert(bob, "bob", true).await;

        let camel = tame(&rig, alice, CritterKind::Camel).await;
        grant(&rig, alice, &camel, "bob", AccessTier::Full).await;

        rig.world.seat(EntityRef::Critter(camel.id), alice).await;
        rig.world.seat(EntityRef::Critter(camel.id), bob).await;

        rig.guard.on_dismount(alice, &camel).await;
        assert_eq!(rig.world.riders(camel.id).await, vec![bob]);
        assert!(rig
            .notifier
            .messages_for(bob)
            .await
            .contains(&MessageKind::SeatTransfer {
                driver_name: "bob".into()
            }));
    }

    #[tokio::test]
    async fn test_interact_denied_names_owner() {
        let rig = rig();
        let alice = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        rig.directory.insert(alice, "alice", true).await;

        let camel = tame(&rig, alice, CritterKind::Camel).await;
        let verdict = rig
            .guard
            .on_interact(stranger, &camel, InteractContext::default())
            .await;

        assert!(!verdict.is_allowed());
        assert_eq!(
            rig.notifier.messages_for(stranger).await,
            vec![MessageKind::InteractDenied {
                owner_name: "alice".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_breeding_exception() {
        let rig = rig();
        let alice = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let camel = tame(&rig, alice, CritterKind::Camel).await;

        let breeding = InteractContext {
            is_adult: true,
            holding_breed_item: true,
        };
        assert!(rig
            .guard
            .on_interact(stranger, &camel, breeding)
            .await
            .is_allowed());

        // a foal, or empty hands, still gets rejected
        let foal = InteractContext {
            is_adult: false,
            holding_breed_item: true,
        };
        assert!(!rig
            .guard
            .on_interact(stranger, &camel, foal)
            .await
            .is_allowed());
    }

    #[tokio::test]
    async fn test_unknown_critter_interaction_is_free() {
        let rig = rig();
        let anyone = Uuid::new_v4();
        let wild = CritterSighting::new(Uuid::new_v4(), CritterKind::Horse);
        assert!(rig
            .guard
            .on_interact(anyone, &wild, InteractContext::default())
            .await
            .is_allowed());
    }

    #[tokio::test]
    async fn test_mount_attempt_verdicts() {
        let rig = rig();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        rig.directory.insert(alice, "alice", true).await;
        rig.directory.insert(bob, "bob", true).await;

        let camel = tame(&rig, alice, CritterKind::Camel).await;
        grant(&rig, alice, &camel, "bob", AccessTier::Passenger).await;

        // passenger tier cannot take the driver's seat of an empty mount
        assert!(!rig.guard.on_mount_attempt(bob, &camel).await.is_allowed());
        // strangers are told who owns it
        assert!(!rig
            .guard
            .on_mount_attempt(stranger, &camel)
            .await
            .is_allowed());
        assert!(rig
            .notifier
            .messages_for(stranger)
            .await
            .contains(&MessageKind::MountDenied {
                owner_name: "alice".into()
            }));
        // the owner may always drive
        assert!(rig.guard.on_mount_attempt(alice, &camel).await.is_allowed());
    }

    #[tokio::test]
    async fn test_full_access_ride_notifies_owner() {
        let rig = rig();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        rig.directory.insert(alice, "alice", true).await;
        rig.directory.insert(bob, "bob", true).await;

        let camel = tame(&rig, alice, CritterKind::Camel).await;
        rig.guard.on_rename(alice, camel.id, "Humps").await;
        grant(&rig, alice, &camel, "bob", AccessTier::Full).await;
        rig.notifier.clear().await;

        assert!(rig.guard.on_mount_attempt(bob, &camel).await.is_allowed());
        assert_eq!(
            rig.notifier.messages_for(alice).await,
            vec![MessageKind::OwnerRideNotice {
                rider_name: "bob".into(),
                mount_label: "Humps".into()
            }]
        );

        // with notifications off the owner hears nothing
        rig.guard.toggle_notifications(alice, false).await;
        rig.notifier.clear().await;
        assert!(rig.guard.on_mount_attempt(bob, &camel).await.is_allowed());
        assert!(rig.notifier.messages_for(alice).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stacked_join_while_overlaid() {
        let rig = rig();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        rig.directory.insert(alice, "alice", true).await;
        rig.directory.insert(bob, "bob", true).await;

        let camel = tame(&rig, alice, CritterKind::Camel).await;
        grant(&rig, alice, &camel, "bob", AccessTier::Passenger).await;
        rig.overlay.arm(camel.id).await;

        // the owner mounts; the overlay collaborator hides the camel
        assert!(rig.guard.on_mount_attempt(alice, &camel).await.is_allowed());
        assert!(rig.overlay.is_active(camel.id).await);
        rig.world.seat(EntityRef::Critter(camel.id), alice).await;

        // B's native mount is cancelled, the stack join seats them instead
        assert!(!rig.guard.on_mount_attempt(bob, &camel).await.is_allowed());
        assert_eq!(rig.world.chain(camel.id).await, vec![alice, bob]);

        // everyone off drops the overlay
        rig.guard.on_dismount(bob, &camel).await;
        rig.guard.on_dismount(alice, &camel).await;
        assert!(!rig.overlay.is_active(camel.id).await);
    }

    #[tokio::test]
    async fn test_damage_verdicts() {
        let rig = rig();
        let alice = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        let camel = tame(&rig, alice, CritterKind::Camel).await;
        // unoccupied tracked mounts are invulnerable
        assert!(!rig.guard.on_damage(&camel, None).await.is_allowed());
        assert!(!rig
            .guard
            .on_damage(&camel, Some(stranger))
            .await
            .is_allowed());

        // occupied: environment may hurt it, players may not
        rig.world.seat(EntityRef::Critter(camel.id), alice).await;
        assert!(rig.guard.on_damage(&camel, None).await.is_allowed());
        assert!(!rig
            .guard
            .on_damage(&camel, Some(stranger))
            .await
            .is_allowed());

        // pets: owner only, and never the environment
        let cat = tame(&rig, alice, CritterKind::Cat).await;
        assert!(!rig.guard.on_damage(&cat, None).await.is_allowed());
        assert!(!rig.guard.on_damage(&cat, Some(stranger)).await.is_allowed());
        assert!(rig.guard.on_damage(&cat, Some(alice)).await.is_allowed());

        // untracked animals are fair game
        let wild = CritterSighting::new(Uuid::new_v4(), CritterKind::Camel);
        assert!(rig
            .guard
            .on_damage(&wild, Some(stranger))
            .await
            .is_allowed());
    }

    #[tokio::test]
    async fn test_leash_verdicts_and_llama_claim() {
        let rig = rig();
        let alice = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        let camel = tame(&rig, alice, CritterKind::Camel).await;
        assert!(rig.guard.on_leash_attempt(alice, &camel).await.is_allowed());
        assert!(!rig
            .guard
            .on_leash_attempt(stranger, &camel)
            .await
            .is_allowed());

        let cat = tame(&rig, alice, CritterKind::Cat).await;
        assert!(!rig.guard.on_leash_attempt(stranger, &cat).await.is_allowed());

        // leashing a wild llama claims it
        let llama = CritterSighting::new(Uuid::new_v4(), CritterKind::Llama).with_color("creamy");
        assert!(rig.guard.on_leash_attempt(alice, &llama).await.is_allowed());
        let record = rig.guard.index().mount(llama.id).await.unwrap();
        assert_eq!(record.animal.owner, alice);
        assert_eq!(record.color.as_deref(), Some("creamy"));
    }

    #[tokio::test]
    async fn test_mounting_wild_camel_claims_it() {
        let rig = rig();
        let alice = Uuid::new_v4();
        let wild = CritterSighting::new(Uuid::new_v4(), CritterKind::Camel);

        assert!(rig.guard.on_mount_attempt(alice, &wild).await.is_allowed());
        assert_eq!(
            rig.guard.index().mount(wild.id).await.unwrap().animal.owner,
            alice
        );
    }

    #[tokio::test]
    async fn test_death_notifies_owner_and_unregisters() {
        let rig = rig();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        rig.directory.insert(alice, "alice", true).await;
        rig.directory.insert(bob, "bob", true).await;

        let camel = tame(&rig, alice, CritterKind::Camel).await;
        grant(&rig, alice, &camel, "bob", AccessTier::Full).await;
        rig.world.seat(EntityRef::Critter(camel.id), bob).await;
        rig.notifier.clear().await;

        rig.guard.on_death(&camel).await;

        assert!(rig.guard.index().mount(camel.id).await.is_none());
        assert_eq!(
            rig.notifier
                .count_where(|m| matches!(m, MessageKind::OwnerDeathNotice { .. }))
                .await,
            1
        );
        rig.guard.shutdown().await;
        assert!(rig.store.load_mounts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unload_refreshes_location() {
        let rig = rig();
        let alice = Uuid::new_v4();
        let camel = tame(&rig, alice, CritterKind::Camel).await;

        let seen = camel
            .clone()
            .with_location(Location::new("overworld", 12.0, 70.0, -8.0));
        rig.guard.on_unload("overworld", &[seen]).await;
        rig.guard.shutdown().await;

        let record = rig.guard.index().mount(camel.id).await.unwrap();
        let location = record.animal.last_location.unwrap();
        assert_eq!(location.world, "overworld");
        assert_eq!(location.x, 12.0);

        let rows = rig.store.load_mounts().await.unwrap();
        assert_eq!(rows[0].last_location.as_ref().unwrap().world, "overworld");
    }

    #[tokio::test]
    async fn test_principal_leave_ejects_borrowed_mount() {
        let rig = rig();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        rig.directory.insert(bob, "bob", true).await;

        let camel = tame(&rig, alice, CritterKind::Camel).await;
        grant(&rig, alice, &camel, "bob", AccessTier::Full).await;
        rig.world.seat(EntityRef::Critter(camel.id), bob).await;

        rig.guard.on_principal_leave(bob).await;
        assert!(rig.world.riders(camel.id).await.is_empty());

        // the owner logging out stays seated
        rig.world.seat(EntityRef::Critter(camel.id), alice).await;
        rig.guard.on_principal_leave(alice).await;
        assert_eq!(rig.world.riders(camel.id).await, vec![alice]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_times_out_through_service() {
        let rig = rig();
        let alice = Uuid::new_v4();
        rig.directory.insert(Uuid::new_v4(), "bob", true).await;

        rig.guard
            .request_access_change(alice, "bob", true, AccessTier::Full)
            .await;
        assert!(rig.guard.pending().is_pending(alice));

        tokio::time::sleep(Duration::from_secs(16)).await;

        assert!(!rig.guard.pending().is_pending(alice));
        assert_eq!(rig.guard.pending().expired_count(), 1);
        assert!(rig
            .notifier
            .messages_for(alice)
            .await
            .contains(&MessageKind::PendingTimeout));
    }

    #[tokio::test]
    async fn test_hydrate_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let camel_id;

        {
            let directory = Arc::new(StaticDirectory::new());
            directory.insert(bob, "bob", true).await;
            let guard = CritterGuard::new(
                GuardConfig::default(),
                store.clone() as Arc<dyn RecordStore>,
                Arc::new(FakeWorld::new()),
                Arc::new(RecordingNotifier::new()),
                directory,
            );
            let camel = CritterSighting::new(Uuid::new_v4(), CritterKind::Camel);
            camel_id = camel.id;
            guard.on_tame_attempt(alice, &camel).await;
            guard
                .request_access_change(alice, "bob", true, AccessTier::Full)
                .await;
            guard
                .on_interact(alice, &camel, InteractContext::default())
                .await;
            guard.shutdown().await;
        }

        // a fresh process hydrates the same records
        let guard = CritterGuard::new(
            GuardConfig::default(),
            store.clone() as Arc<dyn RecordStore>,
            Arc::new(FakeWorld::new()),
            Arc::new(RecordingNotifier::new()),
            Arc::new(StaticDirectory::new()),
        );
        let report = guard.hydrate().await.unwrap();
        assert_eq!(report.mounts, 1);
        assert_eq!(report.grants, 1);

        let mount = guard.index().mount(camel_id).await.unwrap();
        assert_eq!(mount.animal.owner, alice);
        assert!(mount.has_full_access(bob));
        assert_eq!(mount.animal.index, 1);
    }
}
