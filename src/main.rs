//! dylink - Attach and detach a shared library on an installed app bundle
//!
//! This is the binary entry point. All logic lives in the library.

use clap::Parser;
use color_eyre::eyre::Result;
use dylink::cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    dylink::run(args).await
}
