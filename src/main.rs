//! Vocal Master CLI
//!
//! Command-line interface for the vocal processing chain.

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::info;

use vocal_master::cli::{commands, Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("Vocal Master v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("Vocal Master v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Presets { json } => commands::list_presets(json).context("listing presets"),
        Commands::Render {
            vocal,
            beat,
            settings,
            style,
            config,
            output,
        } => commands::render(
            &vocal,
            beat.as_deref(),
            settings.as_deref(),
            style.as_deref(),
            config.as_deref(),
            &output,
        )
        .with_context(|| format!("rendering {}", vocal.display())),
        Commands::Inspect { path } => {
            commands::inspect(&path).with_context(|| format!("inspecting {}", path.display()))
        }
    }
}
