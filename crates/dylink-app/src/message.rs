//! Message types for the application (TEA pattern)

use dylink_core::{AttachmentStatus, InjectionConfiguration, OperationKind, OperationReport};

use crate::config::ConfigField;

/// All possible messages in the application
#[derive(Debug, Clone)]
pub enum Message {
    // ─────────────────────────────────────────────────────────
    // Status
    // ─────────────────────────────────────────────────────────
    /// Re-inspect the bundle
    RefreshStatus,

    /// Inspection finished; `status` is `None` when the app is not installed.
    ///
    /// `epoch` is the `completed_operations` count at dispatch.
    StatusInspected {
        bid: String,
        epoch: u64,
        status: Option<AttachmentStatus>,
    },

    // ─────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────
    /// Start an attach or detach
    RequestOperation(OperationKind),

    /// Detach if attached, attach otherwise
    Toggle,

    /// A background operation reached a terminal outcome
    OperationFinished(OperationReport),

    // ─────────────────────────────────────────────────────────
    // Configuration
    // ─────────────────────────────────────────────────────────
    /// Change one injection option for the managed app
    SetConfig(ConfigField),

    /// Options after a successful store write
    ConfigSaved(InjectionConfiguration),

    ConfigSaveFailed { message: String },

    // ─────────────────────────────────────────────────────────
    // Reporting
    // ─────────────────────────────────────────────────────────
    /// Expire status message `generation` if it is still shown
    ClearStatus { generation: u64 },

    /// Close the error alert
    DismissError,

    /// Re-open the error alert with the last error
    ShowLastError,
}
