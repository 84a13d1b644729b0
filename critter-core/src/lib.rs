//! Critter data model and permission engine.
//!
//! This crate holds the pure half of the critter-guard system:
//!
//! - [`CritterKind`]: which animals are mounts, pets, and multi-seat mounts
//! - [`MountRecord`] / [`PetRecord`]: tamed-animal records and access lists
//! - [`permission`]: the owner / full / passenger / none decision logic
//!
//! Nothing in here performs I/O or touches a runtime; the runtime crate
//! (`critter-guard`) evaluates these functions against its in-memory index.

pub mod permission;
pub mod record;
pub mod types;

// Re-export main types
pub use permission::{AccessLevel, UntameCapabilities};
pub use record::{AccessGrant, AccessTier, AnimalRecord, CritterRecord, MountRecord, PetRecord};
pub use types::*;
