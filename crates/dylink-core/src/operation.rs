//! Attach/detach operation lifecycle types

use std::fmt;

use crate::error::Error;
use crate::types::{AttachmentStatus, InjectionConfiguration};

/// Which mutation an orchestrator performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Attach,
    Detach,
}

impl OperationKind {
    /// Status text shown while the operation runs
    pub fn in_progress_message(&self) -> &'static str {
        match self {
            OperationKind::Attach => "Injecting...",
            OperationKind::Detach => "Ejecting...",
        }
    }

    pub fn success_message(&self) -> &'static str {
        match self {
            OperationKind::Attach => "Successfully injected!",
            OperationKind::Detach => "Successfully ejected!",
        }
    }

    pub fn failure_message(&self) -> &'static str {
        match self {
            OperationKind::Attach => "Injection failed",
            OperationKind::Detach => "Ejection failed",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Attach => "attach",
            OperationKind::Detach => "detach",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State machine phases visited by an orchestrator run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationPhase {
    Idle,
    Resolving,
    Configuring,
    /// Detach only: filtering attached libraries by filename
    Locating,
    Attaching,
    Detaching,
    Verifying,
    Succeeded,
    Failed,
}

/// Why an operation ended in `Failed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The library file was found in neither the bundled nor the fallback location
    PayloadMissing { name: String },
    /// Patcher construction, listing, attach or detach failed
    Patch { message: String },
}

impl From<Error> for FailureReason {
    fn from(err: Error) -> Self {
        match err {
            Error::PayloadMissing { name } => FailureReason::PayloadMissing { name },
            other => FailureReason::Patch {
                message: other.to_string(),
            },
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::PayloadMissing { name } => write!(
                f,
                "Could not find {} in app bundle or Documents folder",
                name
            ),
            FailureReason::Patch { message } => f.write_str(message),
        }
    }
}

/// Terminal result of one orchestrator invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Success,
    Failure(FailureReason),
    /// Another operation for the same target was in flight; nothing ran
    Busy,
    /// The target application is not installed; nothing ran
    NotApplicable,
}

impl OperationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationOutcome::Success)
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            OperationOutcome::Failure(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Everything the interactive side needs to reconcile after a run
#[derive(Debug, Clone)]
pub struct OperationReport {
    pub kind: OperationKind,
    pub bid: String,
    pub outcome: OperationOutcome,

    /// Status from the post-operation inspection; `None` when the run
    /// never reached the patcher (busy, not applicable, payload missing)
    pub status: Option<AttachmentStatus>,

    /// Configuration snapshot applied to the patcher
    pub applied: Option<InjectionConfiguration>,

    /// Phases visited, in order
    pub phases: Vec<OperationPhase>,
}

impl OperationReport {
    pub fn new(kind: OperationKind, bid: impl Into<String>) -> Self {
        Self {
            kind,
            bid: bid.into(),
            outcome: OperationOutcome::NotApplicable,
            status: None,
            applied: None,
            phases: vec![OperationPhase::Idle],
        }
    }

    /// Record a phase transition
    pub fn enter(&mut self, phase: OperationPhase) {
        tracing::debug!("{} {}: {:?}", self.kind, self.bid, phase);
        self.phases.push(phase);
    }

    pub fn final_phase(&self) -> OperationPhase {
        self.phases.last().copied().unwrap_or(OperationPhase::Idle)
    }

    pub fn visited(&self, phase: OperationPhase) -> bool {
        self.phases.contains(&phase)
    }
}
