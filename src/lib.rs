//! dylink - Shared-library attachment manager
//!
//! Command-line front end over `dylink-app`. All orchestration lives in the
//! workspace crates; this crate parses arguments and renders results.

pub mod cli;
pub mod headless;
pub mod runner;

// Re-export main entry point
pub use runner::run;
