//! Command-line arguments

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// dylink - Attach and detach a shared library on an installed app bundle
#[derive(Parser, Debug)]
#[command(name = "dylink")]
#[command(about = "Attach and detach a shared library on an installed app bundle", long_about = None)]
pub struct Args {
    /// App catalog (.json or .toml) listing installed applications
    #[arg(long, global = true, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Bundle identifier to manage (overrides `[target] bid`)
    #[arg(long, global = true, value_name = "BID")]
    pub bid: Option<String>,

    /// Directory holding config.toml and injection.toml (overrides DYLINK_HOME)
    #[arg(long, global = true, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Emit NDJSON events on stdout instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Show whether the library is attached
    Status,

    /// Attach the library
    Attach,

    /// Detach the library
    Detach,

    /// Attach when detached, detach when attached
    Toggle,

    /// Show or change injection options
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Write a default config.toml
    Init,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ConfigCommand {
    /// Print the options stored for the target
    Show,

    /// Change one option (use_weak_reference, prefer_main_executable, strategy)
    Set {
        #[arg(value_name = "KEY")]
        key: String,

        #[arg(value_name = "VALUE")]
        value: String,
    },
}

impl Command {
    /// Whether the command needs the app catalog
    pub fn needs_catalog(&self) -> bool {
        matches!(
            self,
            Command::Status | Command::Attach | Command::Detach | Command::Toggle
        )
    }
}
