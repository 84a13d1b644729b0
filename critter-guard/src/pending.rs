//! Pending two-step commands: issue, then select a target.
//!
//! Each principal has at most one slot. Registering while a slot exists
//! replaces it and cancels its timer. The race between an explicit consume
//! and the expiry timer is settled by a single map removal: whichever side
//! removes the slot first wins, and the loser observes it already gone.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use critter_core::{AccessTier, PrincipalId, UntameCapabilities};

use crate::notify::{MessageKind, Notifier};

/// A registered, not-yet-executed command awaiting a target selection.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingAction {
    /// Grant or revoke access for a named principal
    Access {
        target: PrincipalId,
        target_name: String,
        grant: bool,
        tier: AccessTier,
    },
    /// Report ownership and attributes of the selected critter
    Info,
    /// Tame the selected critter to a named principal
    TameFor {
        target: PrincipalId,
        target_name: String,
    },
    /// Untame the selected critter
    Untame { caps: UntameCapabilities },
}

impl PendingAction {
    /// The action's kind tag, used in target-selection prompts.
    pub fn kind(&self) -> PendingKind {
        match self {
            Self::Access { grant: true, tier, .. } => PendingKind::Grant(*tier),
            Self::Access { grant: false, .. } => PendingKind::Revoke,
            Self::Info => PendingKind::Info,
            Self::TameFor { .. } => PendingKind::Tame,
            Self::Untame { .. } => PendingKind::Untame,
        }
    }
}

/// Kind tag of a pending action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    Grant(AccessTier),
    Revoke,
    Info,
    Tame,
    Untame,
}

struct PendingSlot {
    action: PendingAction,
    serial: u64,
    timer: JoinHandle<()>,
}

/// One-slot-per-principal registry of pending actions.
pub struct PendingRegistry {
    slots: Arc<DashMap<PrincipalId, PendingSlot>>,
    serial: AtomicU64,
    timeout: Duration,
    notifier: Arc<dyn Notifier>,
    expired: Arc<AtomicU32>,
}

impl PendingRegistry {
    /// Create a registry with the given expiry timeout.
    pub fn new(timeout: Duration, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            serial: AtomicU64::new(0),
            timeout,
            notifier,
            expired: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Register an action for a principal, replacing (and disarming) any
    /// action already pending for them.
    pub fn register(&self, principal: PrincipalId, action: PendingAction) {
        let serial = self.serial.fetch_add(1, Ordering::SeqCst) + 1;
        let timer = self.arm_timer(principal, serial);
        let slot = PendingSlot {
            action,
            serial,
            timer,
        };
        debug!(principal = %principal, serial, "Registered pending action");
        if let Some(previous) = self.slots.insert(principal, slot) {
            previous.timer.abort();
            debug!(principal = %principal, "Replaced prior pending action");
        }
    }

    /// Claim the pending action for a principal, disarming its timer.
    /// Returns `None` when nothing is pending (or expiry won the race).
    pub fn take(&self, principal: PrincipalId) -> Option<PendingAction> {
        let (_, slot) = self.slots.remove(&principal)?;
        slot.timer.abort();
        Some(slot.action)
    }

    /// Whether a principal has an action pending.
    pub fn is_pending(&self, principal: PrincipalId) -> bool {
        self.slots.contains_key(&principal)
    }

    /// How many actions have expired since construction.
    pub fn expired_count(&self) -> u32 {
        self.expired.load(Ordering::SeqCst)
    }

    fn arm_timer(&self, principal: PrincipalId, serial: u64) -> JoinHandle<()> {
        let slots = Arc::clone(&self.slots);
        let notifier = Arc::clone(&self.notifier);
        let expired = Arc::clone(&self.expired);
        let timeout = self.timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            // The removal is the single authoritative claim: if consume got
            // here first, or the slot was re-registered under a newer
            // serial, this is a no-op.
            let claimed = slots
                .remove_if(&principal, |_, slot| slot.serial == serial)
                .is_some();
            if claimed {
                debug!(principal = %principal, serial, "Pending action expired");
                expired.fetch_add(1, Ordering::SeqCst);
                notifier.notify(principal, MessageKind::PendingTimeout).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use uuid::Uuid;

    fn registry(notifier: Arc<RecordingNotifier>) -> PendingRegistry {
        PendingRegistry::new(Duration::from_secs(15), notifier)
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_then_take() {
        let notifier = Arc::new(RecordingNotifier::new());
        let registry = registry(notifier.clone());
        let principal = Uuid::new_v4();

        registry.register(principal, PendingAction::Info);
        assert!(registry.is_pending(principal));

        let action = registry.take(principal).unwrap();
        assert_eq!(action, PendingAction::Info);
        assert!(!registry.is_pending(principal));
        // nothing pending now
        assert!(registry.take(principal).is_none());

        // long after the first deadline, the cancelled timer stays quiet
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(registry.expired_count(), 0);
        assert!(notifier.messages().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_fires_exactly_once() {
        let notifier = Arc::new(RecordingNotifier::new());
        let registry = registry(notifier.clone());
        let principal = Uuid::new_v4();

        registry.register(principal, PendingAction::Info);
        tokio::time::sleep(Duration::from_secs(16)).await;

        assert!(!registry.is_pending(principal));
        assert_eq!(registry.expired_count(), 1);
        assert_eq!(
            notifier.messages_for(principal).await,
            vec![MessageKind::PendingTimeout]
        );

        // expired, not executed: the slot is gone
        assert!(registry.take(principal).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reregister_cancels_prior_timer() {
        let notifier = Arc::new(RecordingNotifier::new());
        let registry = registry(notifier.clone());
        let principal = Uuid::new_v4();

        registry.register(principal, PendingAction::Info);
        tokio::time::sleep(Duration::from_secs(10)).await;
        registry.register(
            principal,
            PendingAction::Untame {
                caps: UntameCapabilities::default(),
            },
        );

        // the first deadline passes; only the second registration may expire
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(registry.is_pending(principal));
        assert_eq!(registry.expired_count(), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(registry.expired_count(), 1);
        assert_eq!(
            notifier.count_where(|m| *m == MessageKind::PendingTimeout).await,
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slots_are_per_principal() {
        let notifier = Arc::new(RecordingNotifier::new());
        let registry = registry(notifier.clone());
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        registry.register(a, PendingAction::Info);
        registry.register(
            b,
            PendingAction::Untame {
                caps: UntameCapabilities::default(),
            },
        );

        assert_eq!(registry.take(a), Some(PendingAction::Info));
        assert!(registry.is_pending(b));
    }
}
