//! Command runner - builds an Engine and drives it for one CLI command

use std::path::Path;
use std::sync::Arc;

use color_eyre::eyre::{eyre, Result, WrapErr};
use tracing::{error, info, warn};

use dylink_app::config::{
    config_dir, data_dir, init_config_dir, load_settings, ConfigField, Settings, TomlConfigStore,
};
use dylink_app::{
    load_catalog, Catalog, Engine, EngineEvent, FsPayloadLocator, Message, ToolPatcherFactory,
};
use dylink_core::{OperationKind, OperationOutcome};
use tokio::sync::broadcast;

use crate::cli::{Args, Command, ConfigCommand};
use crate::headless::HeadlessEvent;

type CliEngine = Engine<ToolPatcherFactory>;

/// Run one command to completion
pub async fn run(args: Args) -> Result<()> {
    color_eyre::install()?;

    if let Err(e) = dylink_core::logging::init() {
        eprintln!("Logging disabled: {}", e);
    }

    info!("Command: {:?}", args.command);

    let result = run_command(&args).await;

    if let Err(ref e) = result {
        error!("Command failed: {:?}", e);
        if args.json {
            let fatal = e
                .downcast_ref::<dylink_core::Error>()
                .map_or(true, |e| !e.is_recoverable());
            HeadlessEvent::error(format!("{:#}", e), fatal).emit();
        } else {
            let log = dylink_core::logging::get_current_log_file();
            eprintln!("Details are logged to {}", log.display());
        }
    }

    result
}

async fn run_command(args: &Args) -> Result<()> {
    let config_dir = config_dir(args.config_dir.as_deref())?;

    if args.command == Command::Init {
        let path = init_config_dir(&config_dir)?;
        if !args.json {
            println!("Config: {}", path.display());
        }
        return Ok(());
    }

    let mut settings = load_settings(&config_dir);
    if let Some(bid) = &args.bid {
        settings.target.bid = bid.clone();
    }

    let catalog = if args.command.needs_catalog() {
        let path = args
            .catalog
            .as_deref()
            .ok_or_else(|| eyre!("--catalog is required for this command"))?;
        load_catalog(path).wrap_err("Failed to load app catalog")?
    } else {
        Catalog::default()
    };

    let store_dir = data_dir(args.config_dir.as_deref())?;
    let mut engine = build_engine(settings, catalog, &store_dir);
    let mut events = engine.subscribe();
    let output = Output { json: args.json };

    let result = match &args.command {
        Command::Status => status(&mut engine).await,
        Command::Attach => operate(&mut engine, Some(OperationKind::Attach)).await,
        Command::Detach => operate(&mut engine, Some(OperationKind::Detach)).await,
        Command::Toggle => operate(&mut engine, None).await,
        Command::Config(ConfigCommand::Show) => Ok(()),
        Command::Config(ConfigCommand::Set { key, value }) => set_config(&mut engine, key, value),
        Command::Init => Ok(()),
    };

    output.forward(&mut events);
    output.summarize(&engine, &args.command);
    engine.shutdown();
    output.forward(&mut events);

    result
}

fn build_engine(settings: Settings, catalog: Catalog, store_dir: &Path) -> CliEngine {
    let factory = ToolPatcherFactory::new(settings.patcher.command.clone())
        .with_timeout(settings.patcher.timeout());
    if !factory.is_available() {
        warn!("Patch tool {} is not on PATH", factory.command());
    }
    let locator = FsPayloadLocator::from_settings(&settings.payload);
    let store = TomlConfigStore::in_dir(store_dir);
    info!("Injection options stored at {:?}", store.path());

    Engine::new(
        settings,
        catalog,
        factory,
        Arc::new(locator),
        Box::new(store),
    )
}

// ─────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────

async fn status(engine: &mut CliEngine) -> Result<()> {
    engine.process_message(Message::RefreshStatus);
    engine.run_until_settled().await;
    Ok(())
}

/// Run `kind`, or a toggle decided from a fresh status when `None`
async fn operate(engine: &mut CliEngine, kind: Option<OperationKind>) -> Result<()> {
    let message = match kind {
        Some(kind) => Message::RequestOperation(kind),
        None => {
            status(engine).await?;
            Message::Toggle
        }
    };

    engine.process_message(message);
    engine.run_until_settled().await;

    let report = engine
        .state
        .last_report
        .as_ref()
        .ok_or_else(|| eyre!("operation did not finish"))?;

    match &report.outcome {
        OperationOutcome::Failure(reason) => Err(eyre!("{}", reason)),
        _ => Ok(()),
    }
}

fn set_config(engine: &mut CliEngine, key: &str, value: &str) -> Result<()> {
    let field = ConfigField::parse(key, value)?;
    let errors_before = engine.state.reporter.errors_raised();

    engine.process_message(Message::SetConfig(field));

    if engine.state.reporter.errors_raised() != errors_before {
        let message = engine.state.reporter.last_error().unwrap_or("unknown error");
        return Err(eyre!("Failed to save {}: {}", field.key(), message));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────

struct Output {
    json: bool,
}

impl Output {
    /// Print every buffered engine event as NDJSON
    fn forward(&self, events: &mut broadcast::Receiver<EngineEvent>) {
        if !self.json {
            return;
        }
        while let Ok(event) = events.try_recv() {
            HeadlessEvent::from_engine_event(&event).emit();
        }
    }

    /// Final human-readable summary; `config show` also prints in JSON mode
    fn summarize(&self, engine: &CliEngine, command: &Command) {
        let bid = &engine.state.bid;

        if let Command::Config(ConfigCommand::Show) = command {
            let config = engine.config();
            if self.json {
                HeadlessEvent::config(bid, &config).emit();
            } else {
                println!("{}", bid);
                println!("  use_weak_reference     = {}", config.use_weak_reference);
                println!("  prefer_main_executable = {}", config.prefer_main_executable);
                println!("  strategy               = {}", config.strategy);
            }
            return;
        }

        if self.json {
            return;
        }

        if let Command::Config(ConfigCommand::Set { .. }) = command {
            let config = engine.state.config;
            println!(
                "{}: use_weak_reference={} prefer_main_executable={} strategy={}",
                bid, config.use_weak_reference, config.prefer_main_executable, config.strategy
            );
            return;
        }

        if let Some(text) = engine.state.reporter.text() {
            println!("{}", text);
        }

        match (&engine.state.application, engine.state.status) {
            (Some(app), Some(status)) => match &app.version {
                Some(version) => {
                    println!("{} {} ({}): {}", app.display_name(), version, bid, status)
                }
                None => println!("{} ({}): {}", app.display_name(), bid, status),
            },
            // Payload was missing; the bundle was never inspected
            (Some(app), None) => println!("{} ({})", app.display_name(), bid),
            (None, _) => println!("{} is not installed", bid),
        }
    }
}
