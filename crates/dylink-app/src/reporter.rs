//! Result reporting: transient status line and the error alert
//!
//! All methods run on the engine's event loop. Success notices expire after
//! a delay; failures stay until dismissed and remain available afterwards.

use dylink_core::{FailureReason, OperationKind, OperationOutcome, OperationReport};

/// Shown when the payload file could not be located
pub const PAYLOAD_MISSING_MESSAGE: &str = "Dylib file not found in bundle";

/// Shown when a request arrives while an operation is running
pub const BUSY_MESSAGE: &str = "Operation already in progress";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    /// Operation running
    Progress,
    Success,
    /// Request ignored or nothing to do
    Info,
    Error,
}

impl StatusLevel {
    /// Whether messages at this level clear themselves
    pub fn expires(&self) -> bool {
        matches!(self, StatusLevel::Success | StatusLevel::Info)
    }
}

/// One status line; `generation` identifies it for delayed clears
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub level: StatusLevel,
    pub generation: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Reporter {
    message: Option<StatusMessage>,
    generation: u64,
    last_error: Option<String>,
    error_visible: bool,
    errors_raised: u64,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the status line; returns the new message's generation
    pub fn post(&mut self, text: impl Into<String>, level: StatusLevel) -> u64 {
        self.generation += 1;
        self.message = Some(StatusMessage {
            text: text.into(),
            level,
            generation: self.generation,
        });
        self.generation
    }

    /// Show the in-progress line for `kind`
    pub fn started(&mut self, kind: OperationKind) -> u64 {
        self.post(kind.in_progress_message(), StatusLevel::Progress)
    }

    /// Show the busy notice; returns its generation for expiry
    pub fn busy(&mut self) -> u64 {
        self.post(BUSY_MESSAGE, StatusLevel::Info)
    }

    /// Clear the status line only if it is still message `generation`
    pub fn clear_if_current(&mut self, generation: u64) -> bool {
        match &self.message {
            Some(message) if message.generation == generation => {
                self.message = None;
                true
            }
            _ => false,
        }
    }

    /// Raise the error alert
    pub fn raise_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
        self.error_visible = true;
        self.errors_raised += 1;
    }

    /// Hide the alert; the error stays available for [`Reporter::show_last_error`]
    pub fn dismiss_error(&mut self) {
        self.error_visible = false;
    }

    /// Re-display the last error, if any
    pub fn show_last_error(&mut self) -> bool {
        self.error_visible = self.last_error.is_some();
        self.error_visible
    }

    /// Fold a finished operation into the status line and alert
    ///
    /// Returns the generation to expire, when the new line should clear itself.
    pub fn finished(&mut self, report: &OperationReport) -> Option<u64> {
        match &report.outcome {
            OperationOutcome::Success => {
                self.post(report.kind.success_message(), StatusLevel::Success);
            }
            OperationOutcome::Failure(reason) => {
                let line = match reason {
                    FailureReason::PayloadMissing { .. } => PAYLOAD_MISSING_MESSAGE,
                    FailureReason::Patch { .. } => report.kind.failure_message(),
                };
                self.post(line, StatusLevel::Error);
                self.raise_error(reason.to_string());
            }
            OperationOutcome::Busy => {
                self.busy();
            }
            OperationOutcome::NotApplicable => {
                self.message = None;
            }
        }
        self.expiring()
    }

    /// Generation of the current line, if it clears itself
    fn expiring(&self) -> Option<u64> {
        self.message
            .as_ref()
            .filter(|m| m.level.expires())
            .map(|m| m.generation)
    }

    pub fn message(&self) -> Option<&StatusMessage> {
        self.message.as_ref()
    }

    pub fn text(&self) -> Option<&str> {
        self.message.as_ref().map(|m| m.text.as_str())
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_error_visible(&self) -> bool {
        self.error_visible
    }

    /// Number of times the alert was raised
    pub fn errors_raised(&self) -> u64 {
        self.errors_raised
    }
}
