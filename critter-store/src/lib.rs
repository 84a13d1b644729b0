//! Record store boundary for critter-guard.
//!
//! The durable side of the system is specified only at this interface:
//! a keyed row store with asynchronous save/delete/find-all operations.
//! [`RecordStore`] is the trait the runtime persists through, and
//! [`MemoryStore`] is the in-process implementation used in tests and as
//! the default session store.

pub mod memory;
pub mod rows;
pub mod traits;

// Re-export main types
pub use memory::MemoryStore;
pub use rows::{GrantRow, MountRow, PetRow};
pub use traits::{RecordStore, StoreError};
