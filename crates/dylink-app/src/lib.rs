//! dylink-app - Attachment orchestration and application state for dylink
//!
//! This crate implements the TEA (The Elm Architecture) pattern for state management,
//! the Engine that drives attach/detach operations, status inspection, result
//! reporting, configuration loading, and the per-target injection option store.

pub mod actions;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod engine_event;
pub mod handler;
pub mod inspector;
pub mod message;
pub mod orchestrator;
pub mod payload;
pub mod process;
pub mod reporter;
pub mod single_flight;
pub mod state;

// Re-export primary types
pub use catalog::{load_catalog, Catalog};
pub use engine::Engine;
pub use engine_event::EngineEvent;
pub use handler::{UpdateAction, UpdateResult};
pub use message::Message;
pub use orchestrator::OperationContext;
pub use payload::{FsPayloadLocator, PayloadLocator};
pub use reporter::{Reporter, StatusLevel};
pub use state::AppState;

// Re-export patcher types for the binary
pub use dylink_patcher::{PatcherFactory, ToolPatcherFactory};
