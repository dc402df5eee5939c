//! Background tasks for inspections, operations and status expiry

use std::sync::Arc;
use std::time::Duration;

use dylink_core::prelude::*;
use dylink_core::{InjectionConfiguration, OperationKind};
use dylink_patcher::PatcherFactory;
use tokio::sync::mpsc;

use crate::message::Message;
use crate::orchestrator::OperationContext;

/// Inspect `bid` off the event loop and report back
pub fn spawn_inspection<F: PatcherFactory>(
    bid: String,
    epoch: u64,
    msg_tx: mpsc::Sender<Message>,
    context: Arc<OperationContext<F>>,
) {
    tokio::spawn(async move {
        let status = context.inspect(&bid).await;
        if msg_tx
            .send(Message::StatusInspected { bid, epoch, status })
            .await
            .is_err()
        {
            debug!("Event loop gone; dropping inspection result");
        }
    });
}

/// Run one orchestration with a fixed configuration snapshot
pub fn spawn_operation<F: PatcherFactory>(
    kind: OperationKind,
    bid: String,
    config: InjectionConfiguration,
    msg_tx: mpsc::Sender<Message>,
    context: Arc<OperationContext<F>>,
) {
    tokio::spawn(async move {
        info!(
            "Starting {} for {} (weak: {}, main executable: {}, strategy: {})",
            kind, bid, config.use_weak_reference, config.prefer_main_executable, config.strategy
        );
        let report = context.run(kind, &bid, config).await;
        info!("{} for {} finished: {:?}", kind, bid, report.outcome);

        if msg_tx
            .send(Message::OperationFinished(report))
            .await
            .is_err()
        {
            warn!("Event loop gone; {} result for {} dropped", kind, bid);
        }
    });
}

/// Expire status message `generation` after `after`
pub fn spawn_status_clear(generation: u64, after: Duration, msg_tx: mpsc::Sender<Message>) {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        let _ = msg_tx.send(Message::ClearStatus { generation }).await;
    });
}
