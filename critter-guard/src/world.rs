//! The world boundary: passenger chains, tame flags, and cosmetic overlays.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::RwLock;

use critter_core::{CritterId, CritterKind, PrincipalId};

use crate::types::CritterStats;

/// Something a rider can sit on: a critter, or another rider when an
/// emulated stack is in play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Critter(CritterId),
    Principal(PrincipalId),
}

/// Read and mutate world state the runtime cannot own.
///
/// Continuations that combine these calls with index state run on the core;
/// implementations marshal the underlying engine calls however the host
/// requires.
#[async_trait]
pub trait WorldLink: Send + Sync {
    /// The direct passenger list of a mount, in seat order.
    async fn riders(&self, mount: CritterId) -> Vec<PrincipalId>;

    /// The first passenger of a carrier. Walking this from a mount yields
    /// the emulated stack bottom-up.
    async fn first_rider(&self, carrier: EntityRef) -> Option<PrincipalId>;

    /// What the rider is currently sitting on.
    async fn vehicle_of(&self, rider: PrincipalId) -> Option<EntityRef>;

    /// Seat a rider on a carrier.
    async fn attach(&self, carrier: EntityRef, rider: PrincipalId);

    /// Remove every passenger from a carrier.
    async fn eject(&self, carrier: EntityRef);

    /// Remove a rider from whatever carries them.
    async fn dismount(&self, rider: PrincipalId);

    /// Set or clear the engine-side tame flag.
    async fn set_tamed(&self, critter: CritterId, tamed: bool);

    /// Remove equipped riding gear so the animal can be tamed again.
    async fn strip_riding_gear(&self, critter: CritterId);

    /// World-side attributes, where the entity exposes them.
    async fn critter_stats(&self, critter: CritterId) -> Option<CritterStats>;

    /// Play the confirmation cue for a completed target selection.
    async fn confirm_cue(&self, principal: PrincipalId, critter: CritterId);

    /// Play the rejection cue for a failed target selection.
    async fn reject_cue(&self, principal: PrincipalId, critter: CritterId);
}

/// Applies and removes the cosmetic overlay that hides a mount's true form.
///
/// When no disguise collaborator is present, [`NoOverlay`] makes every call
/// a no-op and no mount ever reports an active overlay.
#[async_trait]
pub trait OverlayProvider: Send + Sync {
    /// Whether the mount currently has an overlay applied.
    async fn is_active(&self, mount: CritterId) -> bool;

    /// Apply the overlay for the given kind.
    async fn apply(&self, mount: CritterId, kind: CritterKind);

    /// Remove the overlay.
    async fn remove(&self, mount: CritterId);
}

/// Overlay provider used when the disguise collaborator is absent.
pub struct NoOverlay;

#[async_trait]
impl OverlayProvider for NoOverlay {
    async fn is_active(&self, _mount: CritterId) -> bool {
        false
    }

    async fn apply(&self, _mount: CritterId, _kind: CritterKind) {}

    async fn remove(&self, _mount: CritterId) {}
}

/// Overlay provider backed by sets, for tests.
///
/// A mount only takes an overlay once it is armed, the way the real
/// collaborator only disguises mounts carrying a disguise saddle.
#[derive(Default)]
pub struct FakeOverlay {
    armed: RwLock<HashSet<CritterId>>,
    active: RwLock<HashSet<CritterId>>,
}

impl FakeOverlay {
    /// Create with no overlays armed or active.
    pub fn new() -> Self {
        Self::default()
    }

    /// Give the mount a disguise, so `apply` takes effect.
    pub async fn arm(&self, mount: CritterId) {
        self.armed.write().await.insert(mount);
    }

    /// Force the overlay state of a mount.
    pub async fn set_active(&self, mount: CritterId, active: bool) {
        let mut set = self.active.write().await;
        if active {
            set.insert(mount);
        } else {
            set.remove(&mount);
        }
    }
}

#[async_trait]
impl OverlayProvider for FakeOverlay {
    async fn is_active(&self, mount: CritterId) -> bool {
        self.active.read().await.contains(&mount)
    }

    async fn apply(&self, mount: CritterId, _kind: CritterKind) {
        if self.armed.read().await.contains(&mount) {
            self.active.write().await.insert(mount);
        }
    }

    async fn remove(&self, mount: CritterId) {
        self.active.write().await.remove(&mount);
    }
}

/// In-memory world for tests.
///
/// Tracks passenger lists per carrier, rider vehicles, tame flags, and the
/// feedback cues played, in the spirit of a recording mock.
#[derive(Default)]
pub struct FakeWorld {
    passengers: RwLock<HashMap<EntityRef, Vec<PrincipalId>>>,
    vehicles: RwLock<HashMap<PrincipalId, EntityRef>>,
    tamed: RwLock<HashSet<CritterId>>,
    stripped: RwLock<HashSet<CritterId>>,
    stats: RwLock<HashMap<CritterId, CritterStats>>,
    confirm_cues: AtomicU32,
    reject_cues: AtomicU32,
}

impl FakeWorld {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seat a rider directly (test setup shorthand).
    pub async fn seat(&self, carrier: EntityRef, rider: PrincipalId) {
        self.attach(carrier, rider).await;
    }

    /// Pre-mark a critter as tamed.
    pub async fn mark_tamed(&self, critter: CritterId) {
        self.tamed.write().await.insert(critter);
    }

    /// Whether the engine-side tame flag is set.
    pub async fn is_tamed(&self, critter: CritterId) -> bool {
        self.tamed.read().await.contains(&critter)
    }

    /// Whether riding gear was stripped from the critter.
    pub async fn gear_stripped(&self, critter: CritterId) -> bool {
        self.stripped.read().await.contains(&critter)
    }

    /// Publish stats for a critter.
    pub async fn set_stats(&self, critter: CritterId, stats: CritterStats) {
        self.stats.write().await.insert(critter, stats);
    }

    /// The emulated stack above a mount, bottom-up.
    pub async fn chain(&self, mount: CritterId) -> Vec<PrincipalId> {
        let mut out = Vec::new();
        let mut current = EntityRef::Critter(mount);
        loop {
            match self.first_rider(current).await {
                Some(rider) => {
                    out.push(rider);
                    current = EntityRef::Principal(rider);
                }
                None => break,
            }
        }
        out
    }

    /// Number of confirmation cues played.
    pub fn confirm_cues(&self) -> u32 {
        self.confirm_cues.load(Ordering::SeqCst)
    }

    /// Number of rejection cues played.
    pub fn reject_cues(&self) -> u32 {
        self.reject_cues.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorldLink for FakeWorld {
    async fn riders(&self, mount: CritterId) -> Vec<PrincipalId> {
        let passengers = self.passengers.read().await;
        passengers
            .get(&EntityRef::Critter(mount))
            .cloned()
            .unwrap_or_default()
    }

    async fn first_rider(&self, carrier: EntityRef) -> Option<PrincipalId> {
        let passengers = self.passengers.read().await;
        passengers.get(&carrier).and_then(|list| list.first().copied())
    }

    async fn vehicle_of(&self, rider: PrincipalId) -> Option<EntityRef> {
        self.vehicles.read().await.get(&rider).copied()
    }

    async fn attach(&self, carrier: EntityRef, rider: PrincipalId) {
        let mut passengers = self.passengers.write().await;
        passengers.entry(carrier).or_default().push(rider);
        self.vehicles.write().await.insert(rider, carrier);
    }

    async fn eject(&self, carrier: EntityRef) {
        let mut passengers = self.passengers.write().await;
        let mut vehicles = self.vehicles.write().await;
        for rider in passengers.remove(&carrier).unwrap_or_default() {
            vehicles.remove(&rider);
        }
    }

    async fn dismount(&self, rider: PrincipalId) {
        let mut passengers = self.passengers.write().await;
        let mut vehicles = self.vehicles.write().await;
        if let Some(carrier) = vehicles.remove(&rider) {
            if let Some(list) = passengers.get_mut(&carrier) {
                list.retain(|r| *r != rider);
            }
        }
    }

    async fn set_tamed(&self, critter: CritterId, tamed: bool) {
        let mut set = self.tamed.write().await;
        if tamed {
            set.insert(critter);
        } else {
            set.remove(&critter);
        }
    }

    async fn strip_riding_gear(&self, critter: CritterId) {
        self.stripped.write().await.insert(critter);
    }

    async fn critter_stats(&self, critter: CritterId) -> Option<CritterStats> {
        self.stats.read().await.get(&critter).cloned()
    }

    async fn confirm_cue(&self, _principal: PrincipalId, _critter: CritterId) {
        self.confirm_cues.fetch_add(1, Ordering::SeqCst);
    }

    async fn reject_cue(&self, _principal: PrincipalId, _critter: CritterId) {
        self.reject_cues.fetch_add(1, Ordering::SeqCst);
    }
}
