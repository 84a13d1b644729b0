//! Tamed-animal records and access grants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::types::{CoreError, CritterId, CritterKind, Location, PrincipalId};

/// Delegated access level on a mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessTier {
    /// Ride, control, and interact as if owner (no granting or untaming)
    Full,
    /// Ride as a non-controlling occupant only
    Passenger,
}

impl AccessTier {
    /// Stable tag used by the record store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Passenger => "passenger",
        }
    }
}

impl FromStr for AccessTier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Self::Full),
            "passenger" => Ok(Self::Passenger),
            other => Err(CoreError::UnknownTier(other.to_string())),
        }
    }
}

/// One principal's access to one mount.
///
/// At most one grant exists per (mount, principal) pair; the mount's access
/// map is keyed by principal to make that structural.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    /// The mount the grant applies to
    pub mount: CritterId,
    /// The principal holding the grant
    pub principal: PrincipalId,
    /// Granted tier
    pub tier: AccessTier,
}

impl AccessGrant {
    /// Create a new grant.
    pub fn new(mount: CritterId, principal: PrincipalId, tier: AccessTier) -> Self {
        Self {
            mount,
            principal,
            tier,
        }
    }

    /// Whether this grant carries full access.
    pub fn is_full(&self) -> bool {
        self.tier == AccessTier::Full
    }
}

/// Fields shared by every tracked animal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimalRecord {
    /// Entity identifier in the world
    pub id: CritterId,
    /// Custom display name, if the animal has been named
    pub name: Option<String>,
    /// The principal who tamed the animal
    pub owner: PrincipalId,
    /// Animal kind
    pub kind: CritterKind,
    /// Last known location, refreshed when the animal's chunk unloads
    pub last_location: Option<Location>,
    /// 1-based position within the owner's owned list
    pub index: u32,
}

impl AnimalRecord {
    /// Create a new record. The index is assigned at registration time.
    pub fn new(id: CritterId, owner: PrincipalId, kind: CritterKind) -> Self {
        Self {
            id,
            name: None,
            owner,
            kind,
            last_location: None,
            index: 0,
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    /// Set the last known location.
    pub fn with_location(mut self, location: Location) -> Self {
        self.last_location = Some(location);
        self
    }

    /// Whether the given principal owns this animal.
    pub fn is_owner(&self, principal: PrincipalId) -> bool {
        self.owner == principal
    }
}

/// A rideable animal with a delegated access list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MountRecord {
    /// Common animal fields
    pub animal: AnimalRecord,
    /// Coat color, where the kind has one (horses, llamas)
    pub color: Option<String>,
    /// Coat style, where the kind has one (horses)
    pub style: Option<String>,
    /// When the mount was first registered
    pub created_at: DateTime<Utc>,
    /// Access grants keyed by principal
    pub access: HashMap<PrincipalId, AccessGrant>,
}

impl MountRecord {
    /// Create a record for a horse, which carries both color and style.
    pub fn horse(id: CritterId, owner: PrincipalId, color: String, style: String) -> Self {
        Self {
            animal: AnimalRecord::new(id, owner, CritterKind::Horse),
            color: Some(color),
            style: Some(style),
            created_at: Utc::now(),
            access: HashMap::new(),
        }
    }

    /// Create a record for a llama, which carries a color but no style.
    pub fn llama(id: CritterId, owner: PrincipalId, color: String) -> Self {
        Self {
            animal: AnimalRecord::new(id, owner, CritterKind::Llama),
            color: Some(color),
            style: None,
            created_at: Utc::now(),
            access: HashMap::new(),
        }
    }

    /// Create a record for any other mount kind (no cosmetic fields).
    pub fn plain(id: CritterId, owner: PrincipalId, kind: CritterKind) -> Self {
        Self {
            animal: AnimalRecord::new(id, owner, kind),
            color: None,
            style: None,
            created_at: Utc::now(),
            access: HashMap::new(),
        }
    }

    /// Whether the given principal owns this mount.
    pub fn is_owner(&self, principal: PrincipalId) -> bool {
        self.animal.is_owner(principal)
    }

    /// The grant held by the given principal, if any.
    pub fn grant_for(&self, principal: PrincipalId) -> Option<&AccessGrant> {
        self.access.get(&principal)
    }

    /// Whether the given principal holds any grant.
    pub fn has_access(&self, principal: PrincipalId) -> bool {
        self.access.contains_key(&principal)
    }

    /// Whether the given principal holds a full-access grant.
    pub fn has_full_access(&self, principal: PrincipalId) -> bool {
        self.grant_for(principal).is_some_and(AccessGrant::is_full)
    }

    /// Insert a grant, replacing any existing grant for the same principal.
    pub fn insert_grant(&mut self, grant: AccessGrant) {
        self.access.insert(grant.principal, grant);
    }

    /// Remove the grant for the given principal, returning it if present.
    pub fn remove_grant(&mut self, principal: PrincipalId) -> Option<AccessGrant> {
        self.access.remove(&principal)
    }
}

/// A single-owner pet; pets have no delegated access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PetRecord {
    /// Common animal fields
    pub animal: AnimalRecord,
    /// Breed variant (wolf variant, cat type, parrot variant)
    pub variant: Option<String>,
    /// Sound variant, where the kind has one (wolves)
    pub sound_variant: Option<String>,
}

impl PetRecord {
    /// Create a record for a wolf, which carries a breed and a sound variant.
    pub fn wolf(id: CritterId, owner: PrincipalId, variant: String, sound_variant: String) -> Self {
        Self {
            animal: AnimalRecord::new(id, owner, CritterKind::Wolf),
            variant: Some(variant),
            sound_variant: Some(sound_variant),
        }
    }

    /// Create a record for a cat.
    pub fn cat(id: CritterId, owner: PrincipalId, variant: String) -> Self {
        Self {
            animal: AnimalRecord::new(id, owner, CritterKind::Cat),
            variant: Some(variant),
            sound_variant: None,
        }
    }

    /// Create a record for a parrot.
    pub fn parrot(id: CritterId, owner: PrincipalId, variant: String) -> Self {
        Self {
            animal: AnimalRecord::new(id, owner, CritterKind::Parrot),
            variant: Some(variant),
            sound_variant: None,
        }
    }

    /// Whether the given principal owns this pet.
    pub fn is_owner(&self, principal: PrincipalId) -> bool {
        self.animal.is_owner(principal)
    }
}

/// Either variant of tracked animal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CritterRecord {
    Mount(MountRecord),
    Pet(PetRecord),
}

impl CritterRecord {
    /// Common fields of either variant.
    pub fn animal(&self) -> &AnimalRecord {
        match self {
            Self::Mount(m) => &m.animal,
            Self::Pet(p) => &p.animal,
        }
    }

    /// Mutable common fields of either variant.
    pub fn animal_mut(&mut self) -> &mut AnimalRecord {
        match self {
            Self::Mount(m) => &mut m.animal,
            Self::Pet(p) => &mut p.animal,
        }
    }

    /// Entity identifier.
    pub fn id(&self) -> CritterId {
        self.animal().id
    }

    /// Owning principal.
    pub fn owner(&self) -> PrincipalId {
        self.animal().owner
    }
}
