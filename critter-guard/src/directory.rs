//! Principal name resolution.
//!
//! Display-name lookups go to the host's profile service and may block, so
//! the trait is async and callers re-join the core before touching shared
//! state with the result.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use critter_core::PrincipalId;

/// What the directory knows about a principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalProfile {
    /// Principal identifier
    pub id: PrincipalId,
    /// Display name
    pub name: String,
    /// Whether the principal is currently online
    pub online: bool,
}

/// Resolves principals by name or id.
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    /// Look up a principal by display name. `None` means the world has
    /// never seen a principal by that name.
    async fn lookup_name(&self, name: &str) -> Option<PrincipalProfile>;

    /// Look up a principal by id.
    async fn lookup_id(&self, id: PrincipalId) -> Option<PrincipalProfile>;
}

/// Directory backed by a fixed in-memory table.
#[derive(Default)]
pub struct StaticDirectory {
    profiles: RwLock<HashMap<PrincipalId, PrincipalProfile>>,
}

impl StaticDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a profile.
    pub async fn insert(&self, id: PrincipalId, name: impl Into<String>, online: bool) {
        let profile = PrincipalProfile {
            id,
            name: name.into(),
            online,
        };
        self.profiles.write().await.insert(id, profile);
    }
}

#[async_trait]
impl PrincipalDirectory for StaticDirectory {
    async fn lookup_name(&self, name: &str) -> Option<PrincipalProfile> {
        let profiles = self.profiles.read().await;
        profiles.values().find(|p| p.name == name).cloned()
    }

    async fn lookup_id(&self, id: PrincipalId) -> Option<PrincipalProfile> {
        let profiles = self.profiles.read().await;
        profiles.get(&id).cloned()
    }
}
