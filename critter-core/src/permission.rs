//! The permission engine: who may do what to a tracked critter.
//!
//! Every function here is a total, side-effect-free evaluation over a record.
//! Callers that cannot find a record in the index must treat the target as
//! unowned and allow free interaction; that fallback lives at the call site,
//! not here.

use crate::record::{AccessTier, MountRecord, PetRecord};
use crate::types::{CritterKind, PrincipalId};

/// A principal's effective standing on a mount, highest wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AccessLevel {
    None,
    Passenger,
    Full,
    Owner,
}

impl AccessLevel {
    /// Whether this level allows controlling (driving) the mount.
    pub fn can_control(&self) -> bool {
        matches!(self, Self::Owner | Self::Full)
    }

    /// Whether this level allows riding at all.
    pub fn can_ride(&self) -> bool {
        *self >= Self::Passenger
    }

    /// Whether this level allows general interaction.
    ///
    /// Interaction and riding gate identically; the breeding exception is
    /// evaluated by the caller on top of this.
    pub fn can_interact(&self) -> bool {
        self.can_ride()
    }
}

/// Capabilities the surrounding permission system has given a principal
/// for untaming. These come from the host's own node configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UntameCapabilities {
    /// May untame critters they own
    pub untame_own: bool,
    /// May untame anyone's critters
    pub untame_others: bool,
}

/// Evaluate a principal's standing on a mount.
pub fn tier_of(principal: PrincipalId, mount: &MountRecord) -> AccessLevel {
    if mount.is_owner(principal) {
        return AccessLevel::Owner;
    }
    match mount.grant_for(principal).map(|g| g.tier) {
        Some(AccessTier::Full) => AccessLevel::Full,
        Some(AccessTier::Passenger) => AccessLevel::Passenger,
        None => AccessLevel::None,
    }
}

/// Whether the principal may control (drive) the mount.
pub fn can_control(principal: PrincipalId, mount: &MountRecord) -> bool {
    tier_of(principal, mount).can_control()
}

/// Whether the principal may ride the mount.
pub fn can_ride(principal: PrincipalId, mount: &MountRecord) -> bool {
    tier_of(principal, mount).can_ride()
}

/// Whether the principal may interact with the mount.
pub fn can_interact(principal: PrincipalId, mount: &MountRecord) -> bool {
    tier_of(principal, mount).can_interact()
}

/// Whether the principal may untame the animal owned by `owner`.
pub fn can_untame(
    principal: PrincipalId,
    owner: PrincipalId,
    caps: &UntameCapabilities,
) -> bool {
    (caps.untame_own && owner == principal) || caps.untame_others
}

/// Whether a grant of the given tier may be placed on the given kind.
///
/// Passenger tier only applies to multi-seat mounts; full access applies to
/// every mount kind.
pub fn tier_applies_to(tier: AccessTier, kind: CritterKind) -> bool {
    match tier {
        AccessTier::Full => kind.is_mount(),
        AccessTier::Passenger => kind.supports_passengers(),
    }
}

/// Whether the principal may interact with a pet. Pets are owner-only.
pub fn pet_interaction_allowed(principal: PrincipalId, pet: &PetRecord) -> bool {
    pet.is_owner(principal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AccessGrant;
    use uuid::Uuid;

    fn mount_with(tier: Option<AccessTier>, principal: PrincipalId) -> MountRecord {
        let mount_id = Uuid::new_v4();
        let mut mount = MountRecord::plain(mount_id, Uuid::new_v4(), CritterKind::Camel);
        if let Some(tier) = tier {
            mount.insert_grant(AccessGrant::new(mount_id, principal, tier));
        }
        mount
    }

    #[test]
    fn test_tier_evaluation() {
        let principal = Uuid::new_v4();
        assert_eq!(tier_of(principal, &mount_with(None, principal)), AccessLevel::None);
        assert_eq!(
            tier_of(principal, &mount_with(Some(AccessTier::Passenger), principal)),
            AccessLevel::Passenger
        );
        assert_eq!(
            tier_of(principal, &mount_with(Some(AccessTier::Full), principal)),
            AccessLevel::Full
        );

        let owner = Uuid::new_v4();
        let mount = MountRecord::plain(Uuid::new_v4(), owner, CritterKind::Horse);
        assert_eq!(tier_of(owner, &mount), AccessLevel::Owner);
    }

    #[test]
    fn test_tier_monotonicity() {
        // can_control implies can_ride implies can_interact, at every level
        for level in [
            AccessLevel::None,
            AccessLevel::Passenger,
            AccessLevel::Full,
            AccessLevel::Owner,
        ] {
            if level.can_control() {
                assert!(level.can_ride());
            }
            if level.can_ride() {
                assert!(level.can_interact());
            }
        }
    }

    #[test]
    fn test_passenger_cannot_control() {
        let principal = Uuid::new_v4();
        let mount = mount_with(Some(AccessTier::Passenger), principal);
        assert!(can_ride(principal, &mount));
        assert!(!can_control(principal, &mount));
    }

    #[test]
    fn test_untame_capabilities() {
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let own_only = UntameCapabilities {
            untame_own: true,
            untame_others: false,
        };
        assert!(can_untame(owner, owner, &own_only));
        assert!(!can_untame(stranger, owner, &own_only));

        let others = UntameCapabilities {
            untame_own: false,
            untame_others: true,
        };
        assert!(can_untame(stranger, owner, &others));
        assert!(!can_untame(owner, owner, &UntameCapabilities::default()));
    }

    #[test]
    fn test_passenger_tier_kind_gating() {
        assert!(tier_applies_to(AccessTier::Passenger, CritterKind::Camel));
        assert!(tier_applies_to(AccessTier::Passenger, CritterKind::HappyGhast));
        assert!(!tier_applies_to(AccessTier::Passenger, CritterKind::Horse));
        assert!(tier_applies_to(AccessTier::Full, CritterKind::Horse));
        assert!(!tier_applies_to(AccessTier::Full, CritterKind::Wolf));
    }
}
