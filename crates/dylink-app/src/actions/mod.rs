//! Action handlers: UpdateAction dispatch and background task spawning

use std::sync::Arc;

use dylink_core::prelude::*;
use dylink_patcher::PatcherFactory;
use tokio::sync::mpsc;

use crate::message::Message;
use crate::orchestrator::OperationContext;
use crate::UpdateAction;

pub mod operation;
pub use operation::{spawn_inspection, spawn_operation, spawn_status_clear};

/// Execute an action by spawning a background task
pub fn handle_action<F: PatcherFactory>(
    action: UpdateAction,
    msg_tx: mpsc::Sender<Message>,
    context: Arc<OperationContext<F>>,
) {
    match action {
        UpdateAction::InspectStatus { bid, epoch } => {
            spawn_inspection(bid, epoch, msg_tx, context);
        }

        UpdateAction::RunOperation { kind, bid, config } => {
            // process.rs hydrates every RunOperation before dispatch
            let Some(config) = config else {
                debug_assert!(false, "RunOperation dispatched without a snapshot");
                error!("{} for {} dispatched without injection options", kind, bid);
                return;
            };
            spawn_operation(kind, bid, config, msg_tx, context);
        }

        UpdateAction::ScheduleStatusClear { generation, after } => {
            spawn_status_clear(generation, after, msg_tx);
        }

        UpdateAction::PersistConfig { bid, .. } => {
            // Handled inline by process.rs
            debug_assert!(false, "PersistConfig reached the task spawner");
            error!("Config write for {} reached the task spawner; dropped", bid);
        }
    }
}
