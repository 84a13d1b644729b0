//! Core identifier and classification types.

use serde::{Deserialize, Serialize};

/// Identifier of a player (or other principal) in the world.
pub type PrincipalId = uuid::Uuid;

/// Identifier of a critter entity in the world.
pub type CritterId = uuid::Uuid;

/// A point in a named world, recorded when a critter's chunk unloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Name of the world the critter was last seen in
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    /// Create a new location.
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }
}

/// The animal kinds the system tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CritterKind {
    Horse,
    Donkey,
    Mule,
    Llama,
    Camel,
    HappyGhast,
    Strider,
    Wolf,
    Cat,
    Parrot,
}

impl CritterKind {
    /// Whether this kind is a rideable mount (carries an access list).
    pub fn is_mount(&self) -> bool {
        matches!(
            self,
            Self::Horse
                | Self::Donkey
                | Self::Mule
                | Self::Llama
                | Self::Camel
                | Self::HappyGhast
                | Self::Strider
        )
    }

    /// Whether this kind is a single-owner pet.
    pub fn is_pet(&self) -> bool {
        matches!(self, Self::Wolf | Self::Cat | Self::Parrot)
    }

    /// Whether the system tracks taming for this kind at all.
    pub fn is_tameable(&self) -> bool {
        self.is_mount() || self.is_pet()
    }

    /// Maximum simultaneous riders for this kind.
    pub fn seat_capacity(&self) -> usize {
        match self {
            Self::Camel => 2,
            Self::HappyGhast => 4,
            _ => 1,
        }
    }

    /// Whether passenger-tier access applies to this kind.
    ///
    /// Passenger grants only make sense on mounts with more than one seat.
    pub fn supports_passengers(&self) -> bool {
        self.seat_capacity() > 1
    }
}

/// Error types for the core model.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A record field failed validation
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// An unknown access tier tag was read back from storage
    #[error("Unknown access tier: {0}")]
    UnknownTier(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
