//! Durable row schema.
//!
//! Rows are the flat shapes the store persists: mounts and pets keyed by
//! entity id, grants keyed by (mount, principal). Access lists are not
//! nested inside mount rows; the index folds grant rows back into mounts
//! when it hydrates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use critter_core::{
    AccessGrant, AccessTier, AnimalRecord, CritterId, CritterKind, Location, MountRecord,
    PetRecord, PrincipalId,
};

/// Durable form of a [`MountRecord`], minus its access list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MountRow {
    pub id: CritterId,
    pub name: Option<String>,
    pub owner: PrincipalId,
    pub kind: CritterKind,
    pub color: Option<String>,
    pub style: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_location: Option<Location>,
}

impl From<&MountRecord> for MountRow {
    fn from(record: &MountRecord) -> Self {
        Self {
            id: record.animal.id,
            name: record.animal.name.clone(),
            owner: record.animal.owner,
            kind: record.animal.kind,
            color: record.color.clone(),
            style: record.style.clone(),
            created_at: record.created_at,
            last_location: record.animal.last_location.clone(),
        }
    }
}

impl From<MountRow> for MountRecord {
    fn from(row: MountRow) -> Self {
        let mut animal = AnimalRecord::new(row.id, row.owner, row.kind).with_name(row.name);
        animal.last_location = row.last_location;
        Self {
            animal,
            color: row.color,
            style: row.style,
            created_at: row.created_at,
            access: Default::default(),
        }
    }
}

/// Durable form of a [`PetRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PetRow {
    pub id: CritterId,
    pub name: Option<String>,
    pub owner: PrincipalId,
    pub kind: CritterKind,
    pub variant: Option<String>,
    pub sound_variant: Option<String>,
    pub last_location: Option<Location>,
}

impl From<&PetRecord> for PetRow {
    fn from(record: &PetRecord) -> Self {
        Self {
            id: record.animal.id,
            name: record.animal.name.clone(),
            owner: record.animal.owner,
            kind: record.animal.kind,
            variant: record.variant.clone(),
            sound_variant: record.sound_variant.clone(),
            last_location: record.animal.last_location.clone(),
        }
    }
}

impl From<PetRow> for PetRecord {
    fn from(row: PetRow) -> Self {
        let mut animal = AnimalRecord::new(row.id, row.owner, row.kind).with_name(row.name);
        animal.last_location = row.last_location;
        Self {
            animal,
            variant: row.variant,
            sound_variant: row.sound_variant,
        }
    }
}

/// Durable form of an [`AccessGrant`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRow {
    pub mount: CritterId,
    pub principal: PrincipalId,
    pub tier: AccessTier,
}

impl From<&AccessGrant> for GrantRow {
    fn from(grant: &AccessGrant) -> Self {
        Self {
            mount: grant.mount,
            principal: grant.principal,
            tier: grant.tier,
        }
    }
}

impl From<GrantRow> for AccessGrant {
    fn from(row: GrantRow) -> Self {
        Self {
            mount: row.mount,
            principal: row.principal,
            tier: row.tier,
        }
    }
}
