//! Handler module - TEA update function
//!
//! Organized into submodules:
//! - `update`: Main update() function and message dispatch

pub(crate) mod update;

#[cfg(test)]
mod tests;

use std::time::Duration;

use dylink_core::{InjectionConfiguration, OperationKind};

use crate::config::ConfigField;
use crate::message::Message;

// Re-export main entry point
pub use update::update;

/// Actions that the event loop should perform after update
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    /// Inspect the bundle in the background; `epoch` is echoed back
    InspectStatus { bid: String, epoch: u64 },

    /// Run an attach or detach in the background.
    ///
    /// `config` is `None` when returned by `handler::update()` and hydrated
    /// by `process.rs` with a snapshot from the configuration store before
    /// dispatch, so later option changes cannot reach the running operation.
    RunOperation {
        kind: OperationKind,
        bid: String,
        config: Option<InjectionConfiguration>,
    },

    /// Write one option to the configuration store.
    ///
    /// Performed by `process.rs` on the event loop itself; never spawned.
    PersistConfig { bid: String, field: ConfigField },

    /// Send `ClearStatus { generation }` after `after`
    ScheduleStatusClear { generation: u64, after: Duration },
}

/// Result of processing a message
#[derive(Debug, Default)]
pub struct UpdateResult {
    /// Optional follow-up message to process
    pub message: Option<Message>,
    /// Optional action for the event loop to perform
    pub action: Option<UpdateAction>,
}

impl UpdateResult {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn message(msg: Message) -> Self {
        Self {
            message: Some(msg),
            action: None,
        }
    }

    pub fn action(action: UpdateAction) -> Self {
        Self {
            message: None,
            action: Some(action),
        }
    }
}
