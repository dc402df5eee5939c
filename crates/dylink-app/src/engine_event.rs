//! Domain events emitted by the Engine for external consumers
//!
//! Events are broadcast after each message processing cycle via
//! `Engine::subscribe()`. The CLI's headless mode turns them into NDJSON.

use dylink_core::{AttachmentStatus, InjectionConfiguration, OperationKind, OperationReport};

/// Domain events emitted by the Engine.
///
/// Subscribers see a consistent view: each event is derived from comparing
/// state before and after one message was fully processed.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    // ─────────────────────────────────────────────────────────
    // Status
    // ─────────────────────────────────────────────────────────
    /// Attachment status was (re)established; `None` = app not installed
    StatusReported {
        bid: String,
        status: Option<AttachmentStatus>,
    },

    // ─────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────
    OperationStarted { kind: OperationKind, bid: String },

    OperationFinished { report: OperationReport },

    // ─────────────────────────────────────────────────────────
    // Reporting
    // ─────────────────────────────────────────────────────────
    /// The status line changed; `None` = cleared
    StatusMessage { text: Option<String> },

    /// The error alert was raised
    ErrorRaised { message: String },

    // ─────────────────────────────────────────────────────────
    // Configuration
    // ─────────────────────────────────────────────────────────
    ConfigChanged {
        bid: String,
        config: InjectionConfiguration,
    },

    /// Engine is shutting down
    Shutdown,
}

impl EngineEvent {
    /// Short label for logging and headless output
    pub fn event_type(&self) -> &'static str {
        match self {
            EngineEvent::StatusReported { .. } => "status_reported",
            EngineEvent::OperationStarted { .. } => "operation_started",
            EngineEvent::OperationFinished { .. } => "operation_finished",
            EngineEvent::StatusMessage { .. } => "status_message",
            EngineEvent::ErrorRaised { .. } => "error_raised",
            EngineEvent::ConfigChanged { .. } => "config_changed",
            EngineEvent::Shutdown => "shutdown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_labels() {
        assert_eq!(EngineEvent::Shutdown.event_type(), "shutdown");
        assert_eq!(
            EngineEvent::StatusMessage { text: None }.event_type(),
            "status_message"
        );
        assert_eq!(
            EngineEvent::OperationStarted {
                kind: OperationKind::Attach,
                bid: "com.dts.freefireth".to_string()
            }
            .event_type(),
            "operation_started"
        );
    }
}
