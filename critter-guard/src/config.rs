//! Configuration for the critter-guard runtime.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`crate::CritterGuard`] instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Pending-action configuration
    pub pending: PendingConfig,
    /// Seating configuration
    pub seating: SeatingConfig,
    /// Taming configuration
    pub taming: TamingConfig,
    /// Notification configuration
    pub notifications: NotificationConfig,
}

impl GuardConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Pending-action configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingConfig {
    /// How long a registered action waits for a target selection (seconds)
    pub timeout_secs: u64,
}

impl PendingConfig {
    /// Timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for PendingConfig {
    fn default() -> Self {
        Self { timeout_secs: 15 }
    }
}

/// Seating configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatingConfig {
    /// Delay between re-attach steps when rebuilding an emulated stack (ms).
    /// The world engine rejects re-parenting calls issued back to back.
    pub stack_attach_delay_ms: u64,
}

impl SeatingConfig {
    /// Attach delay as a [`Duration`].
    pub fn attach_delay(&self) -> Duration {
        Duration::from_millis(self.stack_attach_delay_ms)
    }
}

impl Default for SeatingConfig {
    fn default() -> Self {
        Self {
            stack_attach_delay_ms: 150,
        }
    }
}

/// Taming configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TamingConfig {
    /// Allow breeding a locked animal without access, given an adult target
    /// and a held breeding item
    pub breed_locked_animals: bool,
    /// Tame an unowned llama when a player leashes it
    pub tame_on_leash: bool,
    /// Tame an unowned camel, happy ghast, or strider when a player mounts it
    pub tame_on_mount: bool,
}

impl Default for TamingConfig {
    fn default() -> Self {
        Self {
            breed_locked_animals: true,
            tame_on_leash: true,
            tame_on_mount: true,
        }
    }
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Default owner-notification preference for newly seen principals
    pub default_enabled: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            default_enabled: true,
        }
    }
}
