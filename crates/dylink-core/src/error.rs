//! Application error types with rich context

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Application error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    // ─────────────────────────────────────────────────────────────
    // Target/Payload Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Could not find {name} in app bundle or Documents folder")]
    PayloadMissing { name: String },

    #[error("App catalog error: {message}")]
    Catalog { message: String },

    // ─────────────────────────────────────────────────────────────
    // Patcher Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Unsupported or unreadable bundle {bundle}: {reason}")]
    PatcherUnavailable { bundle: PathBuf, reason: String },

    #[error("{message}")]
    Patch { message: String },

    #[error("Patch tool not found: {command}")]
    ToolNotFound { command: String },

    #[error("Failed to inspect attachment status: {message}")]
    StatusInspection { message: String },

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid configuration: {message}")]
    ConfigInvalid { message: String },
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn payload_missing(name: impl Into<String>) -> Self {
        Self::PayloadMissing { name: name.into() }
    }

    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog {
            message: message.into(),
        }
    }

    pub fn patcher_unavailable(bundle: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::PatcherUnavailable {
            bundle: bundle.into(),
            reason: reason.into(),
        }
    }

    pub fn patch(message: impl Into<String>) -> Self {
        Self::Patch {
            message: message.into(),
        }
    }

    pub fn status_inspection(message: impl Into<String>) -> Self {
        Self::StatusInspection {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
        }
    }

    /// Whether the patcher was involved in producing this error
    pub fn is_patch_error(&self) -> bool {
        matches!(
            self,
            Error::Patch { .. } | Error::PatcherUnavailable { .. } | Error::ToolNotFound { .. }
        )
    }

    /// Check if this is a recoverable error
    ///
    /// Recoverable errors leave the bundle untouched or in a state the user
    /// can fix and retry from. Anything else needs a setup change first.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::PayloadMissing { .. }
                | Error::StatusInspection { .. }
                | Error::Patch { .. }
                | Error::PatcherUnavailable { .. }
        )
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Log the error with context from a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}
