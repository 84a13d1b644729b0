//! Critter ownership and access control for a shared multiplayer world.
//!
//! The runtime half of the critter-guard system:
//!
//! - **Index**: the process-wide authoritative cache of animal records,
//!   access grants, and per-player metadata
//! - **Pending actions**: the one-slot-per-principal "issue a command, then
//!   select a target" state machine with timeout expiry
//! - **Seating**: rider order on multi-seat mounts, driver succession, and
//!   the emulated vertical stack used while a cosmetic overlay hides the
//!   mount's true form
//! - **Taming**: record registration, re-homing, and death handling
//! - **Service**: the [`CritterGuard`] facade the world-event adapter calls
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                       CritterGuard                         │
//! │                                                            │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐  ┌─────────┐        │
//! │  │ Pending │  │ Seating │  │ Taming  │  │ Actions │        │
//! │  └────┬────┘  └────┬────┘  └────┬────┘  └────┬────┘        │
//! │       └────────────┴─────┬──────┴────────────┘             │
//! │                   ┌──────▼──────┐                          │
//! │                   │    Index    │──▶ RecordStore (async)   │
//! │                   └─────────────┘                          │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! World reads and mutations go through the [`WorldLink`] boundary; player
//! messages through [`Notifier`]; name resolution through
//! [`PrincipalDirectory`]; the cosmetic disguise through
//! [`OverlayProvider`]. Each has a no-op or recording implementation for
//! tests.

pub mod actions;
pub mod config;
pub mod directory;
pub mod index;
pub mod pending;
pub mod seating;
pub mod service;
pub mod taming;
pub mod types;
pub mod world;

mod notify;

// Re-export main types
pub use config::GuardConfig;
pub use directory::{PrincipalDirectory, PrincipalProfile, StaticDirectory};
pub use index::{CritterIndex, HydrateReport, Persister, PrincipalMeta};
pub use notify::{MessageKind, Notifier, NullNotifier, RecordingNotifier};
pub use pending::{PendingAction, PendingRegistry};
pub use seating::{SeatManager, SeatingStrategy};
pub use service::CritterGuard;
pub use types::*;
pub use world::{EntityRef, FakeOverlay, FakeWorld, NoOverlay, OverlayProvider, WorldLink};
