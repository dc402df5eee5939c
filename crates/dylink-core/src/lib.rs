//! # dylink-core - Core Domain Types
//!
//! Foundation crate for dylink. Provides domain types, error handling,
//! operation lifecycle types, and logging setup.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, thiserror, tracing).
//!
//! ## Public API
//!
//! ### Domain Types (`types`)
//! - [`Application`] - An installed app as listed by the external catalog
//! - [`ReloadHandle`] - Side-channel to request a presentation refresh
//! - [`AttachmentTarget`] - The managed library, identified by filename
//! - [`InjectionConfiguration`], [`InjectStrategy`] - Per-target patching options
//! - [`AttachmentStatus`] - Derived attached/not-attached status
//!
//! ### Operations (`operation`)
//! - [`OperationKind`] - Attach or detach
//! - [`OperationPhase`] - State machine phases
//! - [`OperationOutcome`], [`FailureReason`] - Terminal results
//! - [`OperationReport`] - Outcome plus re-inspected status and phase trail
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use dylink_core::prelude::*;
//! ```

pub mod error;
pub mod logging;
pub mod operation;
pub mod prelude;
pub mod types;

pub use error::{Error, Result, ResultExt};
pub use operation::{
    FailureReason, OperationKind, OperationOutcome, OperationPhase, OperationReport,
};
pub use types::{
    Application, AttachmentStatus, AttachmentTarget, InjectStrategy, InjectionConfiguration,
    ReloadHandle, DEFAULT_ATTACHMENT_NAME,
};
