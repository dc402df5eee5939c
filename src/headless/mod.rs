//! Headless mode - JSON event output for scripting
//!
//! With `--json`, dylink writes structured events to stdout instead of
//! human-readable text so wrapper scripts can follow an operation without
//! scraping messages.
//!
//! # Event Format
//!
//! Events are output as NDJSON (newline-delimited JSON), one event per line.
//! Each event has an "event" field indicating its type, along with event-specific data.
//!
//! # Example Output
//!
//! ```json
//! {"event":"operation_started","operation":"attach","bid":"com.dts.freefireth","timestamp":1704700001000}
//! {"event":"operation_finished","operation":"attach","bid":"com.dts.freefireth","outcome":"success","error":null,"status":"attached","timestamp":1704700002000}
//! {"event":"status_message","text":"Successfully injected!","timestamp":1704700002000}
//! ```

use chrono::Utc;
use dylink_app::EngineEvent;
use dylink_core::{AttachmentStatus, InjectionConfiguration, OperationOutcome};
use serde::Serialize;
use std::io::{self, Write};
use tracing::error;

/// Events emitted in headless mode
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeadlessEvent {
    /// Attachment status established; `status` is null when the app is not installed
    StatusReported {
        bid: String,
        status: Option<AttachmentStatus>,
        timestamp: i64,
    },

    OperationStarted {
        operation: String,
        bid: String,
        timestamp: i64,
    },

    OperationFinished {
        operation: String,
        bid: String,
        outcome: String,
        error: Option<String>,
        status: Option<AttachmentStatus>,
        timestamp: i64,
    },

    /// The status line changed; `text` is null when it was cleared
    StatusMessage {
        text: Option<String>,
        timestamp: i64,
    },

    /// Injection options for a target, after a change or on request
    Config {
        bid: String,
        use_weak_reference: bool,
        prefer_main_executable: bool,
        strategy: String,
        timestamp: i64,
    },

    /// Error occurred
    Error {
        message: String,
        fatal: bool,
        timestamp: i64,
    },

    Shutdown { timestamp: i64 },
}

impl HeadlessEvent {
    /// Emit this event to stdout as JSON
    pub fn emit(&self) {
        let json = match serde_json::to_string(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize headless event: {}", e);
                return;
            }
        };

        // Write to stdout with newline (NDJSON format)
        let mut stdout = io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", json) {
            error!("Failed to write headless event to stdout: {}", e);
            return;
        }

        if let Err(e) = stdout.flush() {
            error!("Failed to flush headless stdout: {}", e);
        }
    }

    /// Get current timestamp in milliseconds
    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    // ─────────────────────────────────────────────────────────
    // Convenience constructors
    // ─────────────────────────────────────────────────────────

    pub fn config(bid: &str, config: &InjectionConfiguration) -> Self {
        Self::Config {
            bid: bid.to_string(),
            use_weak_reference: config.use_weak_reference,
            prefer_main_executable: config.prefer_main_executable,
            strategy: config.strategy.to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn error(message: String, fatal: bool) -> Self {
        Self::Error {
            message,
            fatal,
            timestamp: Self::now(),
        }
    }

    /// Translate an engine event
    pub fn from_engine_event(event: &EngineEvent) -> Self {
        let timestamp = Self::now();
        match event {
            EngineEvent::StatusReported { bid, status } => Self::StatusReported {
                bid: bid.clone(),
                status: *status,
                timestamp,
            },
            EngineEvent::OperationStarted { kind, bid } => Self::OperationStarted {
                operation: kind.to_string(),
                bid: bid.clone(),
                timestamp,
            },
            EngineEvent::OperationFinished { report } => Self::OperationFinished {
                operation: report.kind.to_string(),
                bid: report.bid.clone(),
                outcome: outcome_label(&report.outcome).to_string(),
                error: report.outcome.failure().map(|r| r.to_string()),
                status: report.status,
                timestamp,
            },
            EngineEvent::StatusMessage { text } => Self::StatusMessage {
                text: text.clone(),
                timestamp,
            },
            EngineEvent::ErrorRaised { message } => Self::Error {
                message: message.clone(),
                fatal: false,
                timestamp,
            },
            EngineEvent::ConfigChanged { bid, config } => Self::config(bid, config),
            EngineEvent::Shutdown => Self::Shutdown { timestamp },
        }
    }
}

/// Machine-readable outcome name
pub fn outcome_label(outcome: &OperationOutcome) -> &'static str {
    match outcome {
        OperationOutcome::Success => "success",
        OperationOutcome::Failure(_) => "failure",
        OperationOutcome::Busy => "busy",
        OperationOutcome::NotApplicable => "not_applicable",
    }
}
