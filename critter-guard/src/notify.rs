//! Outbound player messaging.
//!
//! The runtime reports outcomes as typed [`MessageKind`] values; rendering
//! them into chat text is the host's concern.

use async_trait::async_trait;
use tokio::sync::Mutex;

use critter_core::{AccessTier, PrincipalId};

use crate::pending::PendingKind;
use crate::types::InfoReport;

/// A message addressed to a principal.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageKind {
    /// The critter was tamed to the caller
    TamedForSelf,
    /// The critter was tamed to someone else on the caller's behalf
    TamedFor { target_name: String },
    /// The selected critter is already tracked and cannot be re-tamed
    AlreadyTamed,
    /// The critter was untamed
    Untamed,
    /// The caller may not untame this critter
    NotYourCritter,
    /// The selected critter is not tamed
    NotTamed,

    /// Prompt: select a target critter for the registered action
    SelectTarget { action: PendingKind },
    /// The registered action expired without a target selection
    PendingTimeout,

    /// Named principal has never been seen by the world
    UnknownPrincipal { name: String },
    /// The target already holds the requested access
    AlreadyHasAccess,
    /// The target already holds no access
    AlreadyHasNoAccess,
    /// This mount kind has no passenger seats
    PassengersUnsupported,
    /// Caller granted access to the target
    GrantIssued { target_name: String, tier: AccessTier },
    /// Caller was granted access by the owner
    AccessGranted { by: String, tier: AccessTier },
    /// Caller revoked the target's access
    AccessRevokedFor { target_name: String },
    /// Caller's access was revoked
    AccessRevoked,

    /// Interaction denied; names the owner
    InteractDenied { owner_name: String },
    /// Mounting denied; names the owner
    MountDenied { owner_name: String },

    /// Owner notice: someone started riding their mount
    OwnerRideNotice { rider_name: String, mount_label: String },
    /// Owner notice: someone stopped riding their mount
    OwnerDismountNotice { rider_name: String, mount_label: String },
    /// Owner notice: their mount died while someone was riding it
    OwnerDeathNotice { rider_name: String, mount_label: String },

    /// Control of the mount passed to the named rider
    SeatTransfer { driver_name: String },
    /// No eligible driver remained; the rider was dismounted
    SeatEvicted,

    /// Owner notifications toggled on
    NotificationsOn,
    /// Owner notifications toggled off
    NotificationsOff,

    /// Answer to an info query
    Info(Box<InfoReport>),
}

/// Delivers messages to principals.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a message. Delivery to offline principals is a no-op.
    async fn notify(&self, principal: PrincipalId, message: MessageKind);
}

/// Notifier that drops everything.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, _principal: PrincipalId, _message: MessageKind) {}
}

/// Notifier that records every message for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(PrincipalId, MessageKind)>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded messages in delivery order.
    pub async fn messages(&self) -> Vec<(PrincipalId, MessageKind)> {
        self.messages.lock().await.clone()
    }

    /// Messages delivered to one principal.
    pub async fn messages_for(&self, principal: PrincipalId) -> Vec<MessageKind> {
        self.messages
            .lock()
            .await
            .iter()
            .filter(|(p, _)| *p == principal)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Count of messages matching a predicate.
    pub async fn count_where(&self, predicate: impl Fn(&MessageKind) -> bool) -> usize {
        self.messages
            .lock()
            .await
            .iter()
            .filter(|(_, m)| predicate(m))
            .count()
    }

    /// Drop all recorded messages.
    pub async fn clear(&self) {
        self.messages.lock().await.clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, principal: PrincipalId, message: MessageKind) {
        self.messages.lock().await.push((principal, message));
    }
}
