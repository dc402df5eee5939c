//! Configuration types for dylink
//!
//! Defines:
//! - `Settings` - Global application settings (`config.toml`)
//! - One sub-struct per `[section]`

use std::path::PathBuf;
use std::time::Duration;

use dylink_core::DEFAULT_ATTACHMENT_NAME;
use serde::{Deserialize, Serialize};

/// Target managed when no `--bid` is given
pub const DEFAULT_TARGET_BID: &str = "com.dts.freefireth";

/// Application settings (config.toml)
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub target: TargetSettings,

    #[serde(default)]
    pub payload: PayloadSettings,

    #[serde(default)]
    pub patcher: PatcherSettings,

    #[serde(default)]
    pub behavior: BehaviorSettings,
}

/// Which installed application is managed
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TargetSettings {
    /// Bundle identifier looked up in the app catalog
    #[serde(default = "default_bid")]
    pub bid: String,
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self { bid: default_bid() }
    }
}

fn default_bid() -> String {
    DEFAULT_TARGET_BID.to_string()
}

/// Where the library to attach comes from
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PayloadSettings {
    /// Filename of the managed library
    #[serde(default = "default_payload_name")]
    pub name: String,

    /// Read-only resources directory; defaults to `resources/` next to the executable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundled_dir: Option<PathBuf>,

    /// Writable fallback directory; defaults to the user's Documents folder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_dir: Option<PathBuf>,
}

impl Default for PayloadSettings {
    fn default() -> Self {
        Self {
            name: default_payload_name(),
            bundled_dir: None,
            fallback_dir: None,
        }
    }
}

fn default_payload_name() -> String {
    DEFAULT_ATTACHMENT_NAME.to_string()
}

/// External patch tool
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PatcherSettings {
    /// Command name or path of the patch tool
    #[serde(default = "default_patcher_command")]
    pub command: String,

    /// Per-invocation timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl PatcherSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for PatcherSettings {
    fn default() -> Self {
        Self {
            command: default_patcher_command(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_patcher_command() -> String {
    dylink_patcher::DEFAULT_PATCH_TOOL.to_string()
}

fn default_timeout_secs() -> u64 {
    dylink_patcher::DEFAULT_TOOL_TIMEOUT.as_secs()
}

/// Behavior settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BehaviorSettings {
    /// How long a success message stays visible
    #[serde(default = "default_status_message_ttl_ms")]
    pub status_message_ttl_ms: u64,
}

impl BehaviorSettings {
    pub fn status_message_ttl(&self) -> Duration {
        Duration::from_millis(self.status_message_ttl_ms)
    }
}

impl Default for BehaviorSettings {
    fn default() -> Self {
        Self {
            status_message_ttl_ms: default_status_message_ttl_ms(),
        }
    }
}

fn default_status_message_ttl_ms() -> u64 {
    3000
}
