//! Main update function - handles state transitions (TEA pattern)

use dylink_core::prelude::*;
use dylink_core::{OperationKind, OperationOutcome, OperationReport};

use super::{UpdateAction, UpdateResult};
use crate::message::Message;
use crate::state::AppState;

/// Process a message and update state
/// Returns an UpdateResult with optional follow-up message and action
pub fn update(state: &mut AppState, message: Message) -> UpdateResult {
    match message {
        // ─────────────────────────────────────────────────────────
        // Status
        // ─────────────────────────────────────────────────────────
        Message::RefreshStatus => {
            if state.inspecting {
                debug!("Status inspection already running");
                return UpdateResult::none();
            }
            // The running operation re-inspects the bundle when it finishes
            if let Some(running) = state.in_flight {
                debug!("Not inspecting while {} is running", running);
                return UpdateResult::none();
            }
            state.inspecting = true;
            UpdateResult::action(UpdateAction::InspectStatus {
                bid: state.bid.clone(),
                epoch: state.completed_operations,
            })
        }

        Message::StatusInspected { bid, epoch, status } => {
            if bid != state.bid {
                debug!("Ignoring inspection result for {}", bid);
                return UpdateResult::none();
            }
            state.inspecting = false;
            if epoch != state.completed_operations || state.is_busy() {
                debug!("Dropping inspection result taken before the last operation");
                return UpdateResult::none();
            }
            state.set_status(status);
            UpdateResult::none()
        }

        // ─────────────────────────────────────────────────────────
        // Operations
        // ─────────────────────────────────────────────────────────
        Message::Toggle => {
            let kind = state.toggle_kind();
            UpdateResult::message(Message::RequestOperation(kind))
        }

        Message::RequestOperation(kind) => handle_request_operation(state, kind),

        Message::OperationFinished(report) => handle_operation_finished(state, report),

        // ─────────────────────────────────────────────────────────
        // Configuration
        // ─────────────────────────────────────────────────────────
        Message::SetConfig(field) => UpdateResult::action(UpdateAction::PersistConfig {
            bid: state.bid.clone(),
            field,
        }),

        Message::ConfigSaved(config) => {
            state.config = config;
            UpdateResult::none()
        }

        Message::ConfigSaveFailed { message } => {
            state.reporter.raise_error(message);
            UpdateResult::none()
        }

        // ─────────────────────────────────────────────────────────
        // Reporting
        // ─────────────────────────────────────────────────────────
        Message::ClearStatus { generation } => {
            state.reporter.clear_if_current(generation);
            UpdateResult::none()
        }

        Message::DismissError => {
            state.reporter.dismiss_error();
            UpdateResult::none()
        }

        Message::ShowLastError => {
            state.reporter.show_last_error();
            UpdateResult::none()
        }
    }
}

fn handle_request_operation(state: &mut AppState, kind: OperationKind) -> UpdateResult {
    if let Some(running) = state.in_flight {
        info!("{} requested while {} is running; ignoring", kind, running);
        let generation = state.reporter.busy();
        return schedule_clear(state, generation);
    }

    state.in_flight = Some(kind);
    state.reporter.started(kind);

    UpdateResult::action(UpdateAction::RunOperation {
        kind,
        bid: state.bid.clone(),
        config: None,
    })
}

fn handle_operation_finished(state: &mut AppState, report: OperationReport) -> UpdateResult {
    if report.bid != state.bid {
        warn!("Ignoring {} report for {}", report.kind, report.bid);
        return UpdateResult::none();
    }

    state.in_flight = None;
    state.completed_operations += 1;

    match &report.outcome {
        OperationOutcome::NotApplicable => {
            state.application = None;
            state.set_status(None);
        }
        _ => {
            if report.status.is_some() {
                state.set_status(report.status);
            }
        }
    }

    let expiry = state.reporter.finished(&report);
    state.last_report = Some(report);

    match expiry {
        Some(generation) => schedule_clear(state, generation),
        None => UpdateResult::none(),
    }
}

fn schedule_clear(state: &AppState, generation: u64) -> UpdateResult {
    UpdateResult::action(UpdateAction::ScheduleStatusClear {
        generation,
        after: state.status_message_ttl,
    })
}
