//! Tests for the update function

use std::time::Duration;

use dylink_core::{
    AttachmentStatus, FailureReason, InjectStrategy, OperationKind, OperationOutcome,
    OperationReport,
};

use super::{update, UpdateAction};
use crate::config::ConfigField;
use crate::message::Message;
use crate::reporter::{StatusLevel, BUSY_MESSAGE, PAYLOAD_MISSING_MESSAGE};
use crate::state::AppState;

const BID: &str = "com.dts.freefireth";

fn test_state() -> AppState {
    AppState::new(BID).with_status_message_ttl(Duration::from_millis(3000))
}

fn finished(
    kind: OperationKind,
    outcome: OperationOutcome,
    status: Option<AttachmentStatus>,
) -> Message {
    let mut report = OperationReport::new(kind, BID);
    report.outcome = outcome;
    report.status = status;
    Message::OperationFinished(report)
}

// ─────────────────────────────────────────────────────────
// Status
// ─────────────────────────────────────────────────────────

#[test]
fn test_refresh_status_spawns_single_inspection() {
    let mut state = test_state();

    let result = update(&mut state, Message::RefreshStatus);
    assert_eq!(
        result.action,
        Some(UpdateAction::InspectStatus {
            bid: BID.to_string(),
            epoch: 0,
        })
    );
    assert!(state.inspecting);

    let again = update(&mut state, Message::RefreshStatus);
    assert!(again.action.is_none());
}

#[test]
fn test_status_inspected_updates_state() {
    let mut state = test_state();
    update(&mut state, Message::RefreshStatus);

    update(
        &mut state,
        Message::StatusInspected {
            bid: BID.to_string(),
            epoch: 0,
            status: Some(AttachmentStatus::Attached),
        },
    );

    assert!(!state.inspecting);
    assert!(state.is_attached());
}

#[test]
fn test_status_for_other_target_is_ignored() {
    let mut state = test_state();
    update(
        &mut state,
        Message::StatusInspected {
            bid: "com.other.app".to_string(),
            epoch: 0,
            status: Some(AttachmentStatus::Attached),
        },
    );
    assert!(state.status.is_none());
}

#[test]
fn test_refresh_is_refused_while_operation_runs() {
    let mut state = test_state();
    update(&mut state, Message::RequestOperation(OperationKind::Attach));

    let result = update(&mut state, Message::RefreshStatus);

    assert!(result.action.is_none());
    assert!(!state.inspecting);
}

#[test]
fn test_inspection_older_than_operation_is_dropped() {
    let mut state = test_state();
    update(&mut state, Message::RefreshStatus);
    update(&mut state, Message::RequestOperation(OperationKind::Attach));
    update(
        &mut state,
        finished(
            OperationKind::Attach,
            OperationOutcome::Success,
            Some(AttachmentStatus::Attached),
        ),
    );

    // Reading taken before the attach landed
    update(
        &mut state,
        Message::StatusInspected {
            bid: BID.to_string(),
            epoch: 0,
            status: Some(AttachmentStatus::NotAttached),
        },
    );

    assert_eq!(state.status, Some(AttachmentStatus::Attached));
    assert!(!state.inspecting);
    assert!(state.is_settled());

    let result = update(&mut state, Message::RefreshStatus);
    assert_eq!(
        result.action,
        Some(UpdateAction::InspectStatus {
            bid: BID.to_string(),
            epoch: 1,
        })
    );
}

// ─────────────────────────────────────────────────────────
// Operations
// ─────────────────────────────────────────────────────────

#[test]
fn test_request_operation_marks_busy_and_dispatches_unhydrated() {
    let mut state = test_state();

    let result = update(&mut state, Message::RequestOperation(OperationKind::Attach));

    assert_eq!(state.in_flight, Some(OperationKind::Attach));
    assert_eq!(state.reporter.text(), Some("Injecting..."));
    assert_eq!(
        result.action,
        Some(UpdateAction::RunOperation {
            kind: OperationKind::Attach,
            bid: BID.to_string(),
            config: None,
        })
    );
}

#[test]
fn test_request_while_busy_is_rejected() {
    let mut state = test_state();
    update(&mut state, Message::RequestOperation(OperationKind::Attach));

    let result = update(&mut state, Message::RequestOperation(OperationKind::Detach));

    assert_eq!(state.in_flight, Some(OperationKind::Attach));
    assert_eq!(state.reporter.text(), Some(BUSY_MESSAGE));
    assert!(matches!(
        result.action,
        Some(UpdateAction::ScheduleStatusClear { .. })
    ));
}

#[test]
fn test_toggle_picks_operation_from_status() {
    let mut state = test_state();
    let result = update(&mut state, Message::Toggle);
    assert!(matches!(
        result.message,
        Some(Message::RequestOperation(OperationKind::Attach))
    ));

    state.set_status(Some(AttachmentStatus::Attached));
    let result = update(&mut state, Message::Toggle);
    assert!(matches!(
        result.message,
        Some(Message::RequestOperation(OperationKind::Detach))
    ));
}

#[test]
fn test_success_updates_status_and_schedules_clear() {
    let mut state = test_state();
    update(&mut state, Message::RequestOperation(OperationKind::Attach));

    let result = update(
        &mut state,
        finished(
            OperationKind::Attach,
            OperationOutcome::Success,
            Some(AttachmentStatus::Attached),
        ),
    );

    assert!(!state.is_busy());
    assert!(state.is_attached());
    assert_eq!(state.completed_operations, 1);
    let message = state.reporter.message().unwrap();
    assert_eq!(message.text, "Successfully injected!");
    assert_eq!(message.level, StatusLevel::Success);
    assert_eq!(
        result.action,
        Some(UpdateAction::ScheduleStatusClear {
            generation: message.generation,
            after: Duration::from_millis(3000),
        })
    );
}

#[test]
fn test_failure_shows_alert_and_uses_reinspected_status() {
    let mut state = test_state();
    state.set_status(Some(AttachmentStatus::Attached));
    update(&mut state, Message::RequestOperation(OperationKind::Detach));

    let result = update(
        &mut state,
        finished(
            OperationKind::Detach,
            OperationOutcome::Failure(FailureReason::Patch {
                message: "ldid: failed".to_string(),
            }),
            Some(AttachmentStatus::Attached),
        ),
    );

    assert!(result.action.is_none());
    assert!(state.is_attached());
    assert_eq!(state.reporter.text(), Some("Ejection failed"));
    assert!(state.reporter.is_error_visible());
    assert_eq!(state.reporter.last_error(), Some("ldid: failed"));
}

#[test]
fn test_payload_missing_keeps_previous_status() {
    let mut state = test_state();
    state.set_status(Some(AttachmentStatus::NotAttached));
    update(&mut state, Message::RequestOperation(OperationKind::Attach));

    update(
        &mut state,
        finished(
            OperationKind::Attach,
            OperationOutcome::Failure(FailureReason::PayloadMissing {
                name: "FIle.dylib".to_string(),
            }),
            None,
        ),
    );

    assert_eq!(state.status, Some(AttachmentStatus::NotAttached));
    assert_eq!(state.reporter.text(), Some(PAYLOAD_MISSING_MESSAGE));
}

#[test]
fn test_not_applicable_clears_application() {
    let mut state = test_state()
        .with_application(Some(dylink_core::Application::new(BID, "/Apps/FF.app")));
    update(&mut state, Message::RequestOperation(OperationKind::Attach));

    update(
        &mut state,
        finished(OperationKind::Attach, OperationOutcome::NotApplicable, None),
    );

    assert!(!state.is_installed());
    assert!(state.status.is_none());
    assert!(state.reporter.text().is_none());
    assert!(!state.is_busy());
}

// ─────────────────────────────────────────────────────────
// Configuration and reporting
// ─────────────────────────────────────────────────────────

#[test]
fn test_set_config_defers_to_event_loop() {
    let mut state = test_state();
    let field = ConfigField::Strategy(InjectStrategy::Fast);

    let result = update(&mut state, Message::SetConfig(field));
    assert_eq!(
        result.action,
        Some(UpdateAction::PersistConfig {
            bid: BID.to_string(),
            field,
        })
    );
}

#[test]
fn test_config_save_failure_raises_error() {
    let mut state = test_state();
    update(
        &mut state,
        Message::ConfigSaveFailed {
            message: "read-only filesystem".to_string(),
        },
    );
    assert!(state.reporter.is_error_visible());
}

#[test]
fn test_clear_status_only_clears_matching_generation() {
    let mut state = test_state();
    update(&mut state, Message::RequestOperation(OperationKind::Attach));
    let started = state.reporter.message().unwrap().generation;

    update(
        &mut state,
        finished(
            OperationKind::Attach,
            OperationOutcome::Success,
            Some(AttachmentStatus::Attached),
        ),
    );

    update(&mut state, Message::ClearStatus { generation: started });
    assert_eq!(state.reporter.text(), Some("Successfully injected!"));

    let current = state.reporter.message().unwrap().generation;
    update(&mut state, Message::ClearStatus { generation: current });
    assert!(state.reporter.text().is_none());
}

#[test]
fn test_dismiss_and_reshow_error() {
    let mut state = test_state();
    state.reporter.raise_error("boom");

    update(&mut state, Message::DismissError);
    assert!(!state.reporter.is_error_visible());

    update(&mut state, Message::ShowLastError);
    assert!(state.reporter.is_error_visible());
}
