//! # dylink-patcher - Binary Patcher Access
//!
//! Defines the contract between orchestration code and the component that
//! rewrites an executable's load-command table, plus the shipped
//! implementation that drives an external patch tool.
//!
//! Depends on [`dylink_core`] for domain types and error handling.
//!
//! ## Public API
//!
//! ### Contract
//! - [`BinaryPatcher`] - A patcher bound to one bundle (`Send` futures)
//! - [`LocalBinaryPatcher`] - Same contract without the `Send` bound
//! - [`PatcherFactory`] - Opens patchers for bundles
//! - [`apply_configuration()`] - Push an [`InjectionConfiguration`] into a patcher
//!
//! ### Patch Tool Driver
//! - [`ToolPatcherFactory`] - Resolves the patch tool on PATH
//! - [`ToolPatcher`] - Runs `list` / `attach` / `detach` subcommands
//!
//! ### Test Helpers (`test-helpers` feature)
//! - `test_utils::FakePatcherFactory` - In-memory bundle with call recording
//!
//! [`InjectionConfiguration`]: dylink_core::InjectionConfiguration

pub mod patcher;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;
pub mod tool;

pub use patcher::{apply_configuration, BinaryPatcher, LocalBinaryPatcher, PatcherFactory};
pub use tool::{ToolPatcher, ToolPatcherFactory, DEFAULT_PATCH_TOOL, DEFAULT_TOOL_TIMEOUT};
