// Switchboard service orchestrator
// Main entry point for the switchboard binary

use clap::Parser;
use sdk::errors::{EngineError, SwitchboardErrorExt};
use switchboard_engine::cli::{Cli, Command};
use switchboard_engine::config::Config;
use switchboard_engine::handlers::{
    handle_ask, handle_reconcile, handle_register, handle_serve, handle_services,
    registration_from_args, OutputFormat,
};
use switchboard_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log wins over the configured level; RUST_LOG wins over both
    let log_level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(log_level);

    tracing::info!("Switchboard v{}", env!("CARGO_PKG_VERSION"));

    // Handle commands
    let result = match cli.command {
        Command::Serve { host, port } => {
            tracing::info!("Starting HTTP intake...");
            handle_serve(&config, host, port, format).await
        }

        Command::Ask { prompt } => {
            tracing::info!("Dispatching query: {}", prompt);
            handle_ask(prompt, &config, format).await
        }

        Command::Services => handle_services(&config, format).await,

        Command::Register {
            id,
            name,
            endpoint,
            description,
            system_prompt,
            keywords,
        } => {
            tracing::info!("Registering service: {} ({})", name, id);
            let registration =
                registration_from_args(id, name, endpoint, description, system_prompt, keywords);
            handle_register(registration, &config, format).await
        }

        Command::Reconcile => {
            tracing::info!("Running reconciliation...");
            handle_reconcile(&config, format).await
        }
    };

    if let Err(e) = &result {
        tracing::error!("Command failed: {:#}", e);
        if let Some(engine_err) = e.downcast_ref::<EngineError>() {
            eprintln!("Hint: {}", engine_err.user_hint());
        }
    }

    result
}
