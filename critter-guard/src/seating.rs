//! Seating on multi-seat mounts: rider order, driver succession, eviction.
//!
//! Two strategies sit behind one interface. `Native` trusts the engine's
//! real passenger chain. `Stacked` emulates seating with a vertical tower of
//! riders while a cosmetic overlay hides the mount's true form, because the
//! real chain is unusable then. Reorder and eviction logic is shared; the
//! strategies differ only in how rider lists are read and re-attached.

use std::sync::Arc;
use tracing::{debug, info};

use critter_core::{permission, CritterId, CritterKind, MountRecord, PrincipalId};

use crate::config::SeatingConfig;
use crate::directory::PrincipalDirectory;
use crate::notify::{MessageKind, Notifier};
use crate::world::{EntityRef, OverlayProvider, WorldLink};

/// How a mount's riders are represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatingStrategy {
    /// The engine's real passenger chain
    Native,
    /// Emulated vertical stack while an overlay is active
    Stacked,
}

/// Outcome of a mount-while-occupied request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Requester was appended to the top of the stack
    Joined,
    /// Requester is already the top of the stack
    AlreadyTop,
    /// No seat left
    Rejected,
}

/// Maintains seating order on multi-seat mounts.
pub struct SeatManager {
    config: SeatingConfig,
    world: Arc<dyn WorldLink>,
    overlay: Arc<dyn OverlayProvider>,
    notifier: Arc<dyn Notifier>,
    directory: Arc<dyn PrincipalDirectory>,
}

impl SeatManager {
    /// Create a seat manager.
    pub fn new(
        config: SeatingConfig,
        world: Arc<dyn WorldLink>,
        overlay: Arc<dyn OverlayProvider>,
        notifier: Arc<dyn Notifier>,
        directory: Arc<dyn PrincipalDirectory>,
    ) -> Self {
        Self {
            config,
            world,
            overlay,
            notifier,
            directory,
        }
    }

    /// Which strategy applies to the mount right now.
    pub async fn strategy_for(&self, mount: CritterId) -> SeatingStrategy {
        if self.overlay.is_active(mount).await {
            SeatingStrategy::Stacked
        } else {
            SeatingStrategy::Native
        }
    }

    /// Current riders in seat order, driver first.
    pub async fn riders(
        &self,
        mount: CritterId,
        kind: CritterKind,
        strategy: SeatingStrategy,
    ) -> Vec<PrincipalId> {
        match strategy {
            SeatingStrategy::Native => self.world.riders(mount).await,
            SeatingStrategy::Stacked => {
                let mut stack = Vec::new();
                let mut current = EntityRef::Critter(mount);
                for _ in 0..kind.seat_capacity() {
                    match self.world.first_rider(current).await {
                        Some(rider) => {
                            stack.push(rider);
                            current = EntityRef::Principal(rider);
                        }
                        None => break,
                    }
                }
                stack
            }
        }
    }

    /// Whether the principal controls the mount given the rider order.
    pub fn is_driver(principal: PrincipalId, riders: &[PrincipalId]) -> bool {
        riders.len() <= 1 || riders.first() == Some(&principal)
    }

    /// The first rider in order who may control the mount.
    pub fn find_successor(riders: &[PrincipalId], record: &MountRecord) -> Option<PrincipalId> {
        riders
            .iter()
            .copied()
            .find(|rider| permission::can_control(*rider, record))
    }

    /// Handle a rider asking to leave the mount.
    ///
    /// A departing non-driver only needs the stack spliced back together
    /// (stacked strategy) or nothing at all. A departing driver triggers
    /// succession: the earliest remaining rider with control access becomes
    /// driver, or everyone is dismounted when no such rider exists.
    pub async fn handle_dismount_request(&self, record: &MountRecord, principal: PrincipalId) {
        let mount = record.animal.id;
        let kind = record.animal.kind;
        let strategy = self.strategy_for(mount).await;
        let mut riders = self.riders(mount, kind, strategy).await;

        if !Self::is_driver(principal, &riders) {
            if strategy == SeatingStrategy::Stacked {
                self.repair_stack(mount, principal).await;
            }
            return;
        }

        riders.retain(|r| *r != principal);
        if strategy == SeatingStrategy::Native {
            self.world.dismount(principal).await;
        } else {
            self.repair_stack(mount, principal).await;
        }

        match Self::find_successor(&riders, record) {
            Some(successor) => {
                self.transfer_control(mount, riders, successor, strategy).await;
            }
            None if !riders.is_empty() => {
                self.evict_all(mount, &riders).await;
            }
            None => {}
        }
    }

    /// Reorder so the successor drives, keeping the rest in relative order,
    /// then rebuild the physical seating in one pass.
    async fn transfer_control(
        &self,
        mount: CritterId,
        riders: Vec<PrincipalId>,
        successor: PrincipalId,
        strategy: SeatingStrategy,
    ) {
        // The complete new order is fixed before any world call; reattach
        // never runs against a half-updated seat assignment.
        let mut order = Vec::with_capacity(riders.len());
        order.push(successor);
        order.extend(riders.into_iter().filter(|r| *r != successor));

        info!(mount = %mount, driver = %successor, "Transferring mount control");
        match strategy {
            SeatingStrategy::Native => self.rebuild_native(mount, &order).await,
            SeatingStrategy::Stacked => self.rebuild_stacked(mount, &order).await,
        }

        let driver_name = match self.directory.lookup_id(successor).await {
            Some(profile) => profile.name,
            None => successor.to_string(),
        };
        for rider in &order {
            self.notifier
                .notify(
                    *rider,
                    MessageKind::SeatTransfer {
                        driver_name: driver_name.clone(),
                    },
                )
                .await;
        }
    }

    async fn rebuild_native(&self, mount: CritterId, order: &[PrincipalId]) {
        self.world.eject(EntityRef::Critter(mount)).await;
        for rider in order {
            self.world.attach(EntityRef::Critter(mount), *rider).await;
        }
    }

    /// Rebuild the stack bottom-up. The engine rejects re-parenting calls
    /// issued back to back, so each attach waits out the configured delay;
    /// the end state matches the native rebuild's order exactly.
    async fn rebuild_stacked(&self, mount: CritterId, order: &[PrincipalId]) {
        for rider in order {
            self.world.dismount(*rider).await;
        }
        let mut carrier = EntityRef::Critter(mount);
        for rider in order {
            tokio::time::sleep(self.config.attach_delay()).await;
            self.world.attach(carrier, *rider).await;
            carrier = EntityRef::Principal(*rider);
        }
    }

    /// Dismount every remaining rider; nobody aboard may control the mount.
    async fn evict_all(&self, mount: CritterId, riders: &[PrincipalId]) {
        debug!(mount = %mount, count = riders.len(), "Evicting riders without a controller");
        // Top-down so nobody is left riding a rider that already left
        for rider in riders.iter().rev() {
            self.world.dismount(*rider).await;
            self.notifier.notify(*rider, MessageKind::SeatEvicted).await;
        }
    }

    /// Splice the stack back together around a departing middle rider.
    pub async fn repair_stack(&self, mount: CritterId, leaver: PrincipalId) {
        let below = self.world.vehicle_of(leaver).await;
        let above = self.world.first_rider(EntityRef::Principal(leaver)).await;
        self.world.dismount(leaver).await;
        if let Some(above) = above {
            self.world.dismount(above).await;
            match below {
                Some(EntityRef::Principal(p)) => {
                    self.world.attach(EntityRef::Principal(p), above).await
                }
                _ => self.world.attach(EntityRef::Critter(mount), above).await,
            }
        }
    }

    /// Handle a mount request while the mount is already occupied and its
    /// true form is hidden: append to the top of the stack if a seat is
    /// free. Permission is the caller's concern.
    pub async fn handle_stacked_join(
        &self,
        record: &MountRecord,
        requester: PrincipalId,
    ) -> JoinOutcome {
        let mount = record.animal.id;
        let kind = record.animal.kind;
        let stack = self.riders(mount, kind, SeatingStrategy::Stacked).await;

        if stack.len() >= kind.seat_capacity() {
            return JoinOutcome::Rejected;
        }
        if stack.last() == Some(&requester) {
            return JoinOutcome::AlreadyTop;
        }
        match stack.last() {
            Some(top) => {
                self.world
                    .attach(EntityRef::Principal(*top), requester)
                    .await
            }
            None => self.world.attach(EntityRef::Critter(mount), requester).await,
        }
        JoinOutcome::Joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeatingConfig;
    use crate::directory::StaticDirectory;
    use crate::notify::RecordingNotifier;
    use crate::world::{FakeOverlay, FakeWorld};
    use critter_core::{AccessGrant, AccessTier};
    use uuid::Uuid;

    struct Rig {
        world: Arc<FakeWorld>,
        overlay: Arc<FakeOverlay>,
        notifier: Arc<RecordingNotifier>,
        seats: SeatManager,
    }

    fn rig() -> Rig {
        let world = Arc::new(FakeWorld::new());
        let overlay = Arc::new(FakeOverlay::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let directory = Arc::new(StaticDirectory::new());
        let seats = SeatManager::new(
            SeatingConfig::default(),
            world.clone(),
            overlay.clone(),
            notifier.clone(),
            directory,
        );
        Rig {
            world,
            overlay,
            notifier,
            seats,
        }
    }

    fn ghast_with(grants: &[(PrincipalId, AccessTier)], owner: PrincipalId) -> MountRecord {
        let id = Uuid::new_v4();
        let mut record = MountRecord::plain(id, owner, CritterKind::HappyGhast);
        for (principal, tier) in grants {
            record.insert_grant(AccessGrant::new(id, *principal, *tier));
        }
        record
    }

    #[test]
    fn test_driver_detection() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(SeatManager::is_driver(a, &[]));
        assert!(SeatManager::is_driver(a, &[a]));
        assert!(SeatManager::is_driver(a, &[b]));
        assert!(SeatManager::is_driver(a, &[a, b]));
        assert!(!SeatManager::is_driver(b, &[a, b]));
    }

    #[test]
    fn test_successor_is_earliest_controller() {
        let owner = Uuid::new_v4();
        let passenger = Uuid::new_v4();
        let full = Uuid::new_v4();
        let record = ghast_with(
            &[(passenger, AccessTier::Passenger), (full, AccessTier::Full)],
            owner,
        );

        assert_eq!(
            SeatManager::find_successor(&[passenger, full, owner], &record),
            Some(full)
        );
        assert_eq!(SeatManager::find_successor(&[passenger], &record), None);
    }

    #[tokio::test]
    async fn test_native_succession_reorders() {
        let rig = rig();
        let owner = Uuid::new_v4();
        let passenger = Uuid::new_v4();
        let full = Uuid::new_v4();
        let record = ghast_with(
            &[(passenger, AccessTier::Passenger), (full, AccessTier::Full)],
            owner,
        );
        let mount = record.animal.id;

        for rider in [owner, passenger, full] {
            rig.world.seat(EntityRef::Critter(mount), rider).await;
        }

        rig.seats.handle_dismount_request(&record, owner).await;

        // full-access rider drives, passenger keeps their relative spot
        assert_eq!(rig.world.riders(mount).await, vec![full, passenger]);
        let transfers = rig
            .notifier
            .count_where(|m| matches!(m, MessageKind::SeatTransfer { .. }))
            .await;
        assert_eq!(transfers, 2);
    }

    #[tokio::test]
    async fn test_passenger_only_riders_are_evicted() {
        let rig = rig();
        let owner = Uuid::new_v4();
        let passenger = Uuid::new_v4();
        let record = ghast_with(&[(passenger, AccessTier::Passenger)], owner);
        let mount = record.animal.id;

        rig.world.seat(EntityRef::Critter(mount), owner).await;
        rig.world.seat(EntityRef::Critter(mount), passenger).await;

        rig.seats.handle_dismount_request(&record, owner).await;

        // passenger tier cannot drive, so the mount empties out
        assert!(rig.world.riders(mount).await.is_empty());
        assert_eq!(
            rig.notifier.messages_for(passenger).await,
            vec![MessageKind::SeatEvicted]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stacked_succession_matches_native_order() {
        let rig = rig();
        let owner = Uuid::new_v4();
        let full_a = Uuid::new_v4();
        let full_b = Uuid::new_v4();
        let record = ghast_with(
            &[(full_a, AccessTier::Full), (full_b, AccessTier::Full)],
            owner,
        );
        let mount = record.animal.id;
        rig.overlay.set_active(mount, true).await;

        rig.world.seat(EntityRef::Critter(mount), owner).await;
        rig.world.seat(EntityRef::Principal(owner), full_a).await;
        rig.world.seat(EntityRef::Principal(full_a), full_b).await;

        rig.seats.handle_dismount_request(&record, owner).await;

        // same end state the native strategy would produce
        assert_eq!(rig.world.chain(mount).await, vec![full_a, full_b]);
    }

    #[tokio::test]
    async fn test_non_driver_stack_leave_splices() {
        let rig = rig();
        let owner = Uuid::new_v4();
        let middle = Uuid::new_v4();
        let top = Uuid::new_v4();
        let record = ghast_with(
            &[(middle, AccessTier::Passenger), (top, AccessTier::Passenger)],
            owner,
        );
        let mount = record.animal.id;
        rig.overlay.set_active(mount, true).await;

        rig.world.seat(EntityRef::Critter(mount), owner).await;
        rig.world.seat(EntityRef::Principal(owner), middle).await;
        rig.world.seat(EntityRef::Principal(middle), top).await;

        rig.seats.handle_dismount_request(&record, middle).await;

        assert_eq!(rig.world.chain(mount).await, vec![owner, top]);
    }

    #[tokio::test]
    async fn test_stacked_join_respects_capacity() {
        let rig = rig();
        let owner = Uuid::new_v4();
        let riders: Vec<PrincipalId> = (0..3).map(|_| Uuid::new_v4()).collect();
        let joiner = Uuid::new_v4();
        let grants: Vec<(PrincipalId, AccessTier)> = riders
            .iter()
            .chain(std::iter::once(&joiner))
            .map(|p| (*p, AccessTier::Passenger))
            .collect();
        let record = ghast_with(&grants, owner);
        let mount = record.animal.id;
        rig.overlay.set_active(mount, true).await;

        // owner + three passengers fill all four ghast seats
        rig.world.seat(EntityRef::Critter(mount), owner).await;
        let mut below = owner;
        for rider in &riders {
            rig.world.seat(EntityRef::Principal(below), *rider).await;
            below = *rider;
        }

        assert_eq!(
            rig.seats.handle_stacked_join(&record, joiner).await,
            JoinOutcome::Rejected
        );

        // with a free seat the joiner lands on top
        rig.world.dismount(riders[2]).await;
        assert_eq!(
            rig.seats.handle_stacked_join(&record, joiner).await,
            JoinOutcome::Joined
        );
        assert_eq!(
            rig.world.chain(mount).await,
            vec![owner, riders[0], riders[1], joiner]
        );
    }
}
