//! Core types for the critter-guard runtime.

use serde::{Deserialize, Serialize};

use critter_core::{CritterId, CritterKind, Location, MountRecord, PetRecord};

/// What the event adapter saw of a world entity when an event fired.
///
/// Records are keyed by entity id; the rest is the snapshot of world state
/// the runtime needs to build or refresh a record without reaching back into
/// the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CritterSighting {
    /// Entity identifier
    pub id: CritterId,
    /// Animal kind
    pub kind: CritterKind,
    /// Custom name, if the entity carries one
    pub name: Option<String>,
    /// Where the entity was at event time
    pub location: Option<Location>,
    /// Coat color (horses, llamas)
    pub color: Option<String>,
    /// Coat style (horses)
    pub style: Option<String>,
    /// Breed variant (wolves, cats, parrots)
    pub variant: Option<String>,
    /// Sound variant (wolves)
    pub sound_variant: Option<String>,
}

impl CritterSighting {
    /// Create a sighting with just an id and kind.
    pub fn new(id: CritterId, kind: CritterKind) -> Self {
        Self {
            id,
            kind,
            name: None,
            location: None,
            color: None,
            style: None,
            variant: None,
            sound_variant: None,
        }
    }

    /// Set the custom name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the location.
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Set the coat color.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Set the coat style.
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    /// Set the breed variant.
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    /// Set the sound variant.
    pub fn with_sound_variant(mut self, sound_variant: impl Into<String>) -> Self {
        self.sound_variant = Some(sound_variant.into());
        self
    }

    /// Rebuild a sighting from a resident mount record.
    pub fn from_mount(record: &MountRecord) -> Self {
        Self {
            id: record.animal.id,
            kind: record.animal.kind,
            name: record.animal.name.clone(),
            location: record.animal.last_location.clone(),
            color: record.color.clone(),
            style: record.style.clone(),
            variant: None,
            sound_variant: None,
        }
    }

    /// Rebuild a sighting from a resident pet record.
    pub fn from_pet(record: &PetRecord) -> Self {
        Self {
            id: record.animal.id,
            kind: record.animal.kind,
            name: record.animal.name.clone(),
            location: record.animal.last_location.clone(),
            color: None,
            style: None,
            variant: record.variant.clone(),
            sound_variant: record.sound_variant.clone(),
        }
    }
}

/// Extra context carried by an interaction event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InteractContext {
    /// Whether the target animal is an adult
    pub is_adult: bool,
    /// Whether the interacting principal is holding a breeding item for
    /// this animal kind
    pub holding_breed_item: bool,
}

/// Whether a cancellable world event should proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny,
}

impl Verdict {
    /// Whether the event may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// World-side attributes of a critter, shown by the info query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CritterStats {
    /// Movement speed attribute
    pub speed: f64,
    /// Jump strength attribute
    pub jump_strength: f64,
    /// Maximum health attribute
    pub max_health: f64,
    /// Carry strength (llamas)
    pub strength: Option<u8>,
}

/// Assembled answer to an info query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoReport {
    /// Entity identifier
    pub id: CritterId,
    /// Animal kind
    pub kind: CritterKind,
    /// Custom name, if any
    pub name: Option<String>,
    /// Resolved owner display name; `None` when nobody owns the critter
    pub owner_name: Option<String>,
    /// World-side attributes, when the entity exposes them
    pub stats: Option<CritterStats>,
    /// Display names of full-access holders
    pub full_access: Vec<String>,
    /// Display names of passenger-access holders
    pub passenger_access: Vec<String>,
}

/// Error types for the runtime.
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    /// The record store failed
    #[error("Store error: {0}")]
    Store(#[from] critter_store::StoreError),

    /// The core model rejected a value
    #[error("Model error: {0}")]
    Core(#[from] critter_core::CoreError),
}

pub type Result<T> = std::result::Result<T, GuardError>;
