//! repocache - single-flight git snapshot cache
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use repocache::cli::args::ConfigAction;
use repocache::cli::{commands, Cli, Commands};
use repocache::config::{Config, ConfigManager};
use repocache::error::RepoCacheResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> RepoCacheResult<()> {
    let cli = Cli::parse();

    let manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    // Commands that rewrite the file must work even when it no longer parses
    let config = match &cli.command {
        Commands::Config(args)
            if matches!(
                args.action,
                Some(ConfigAction::Path | ConfigAction::Init { .. } | ConfigAction::Set { .. })
            ) =>
        {
            Config::default()
        }
        _ => manager.load().await?,
    };

    init_logging(cli.verbose, &config.general.log_format);

    match cli.command {
        Commands::Fetch(args) => commands::fetch(args, &config).await,
        Commands::Unlock(args) => commands::unlock(args, &config).await,
        Commands::Cache(args) => commands::cache(args, &config).await,
        Commands::Daemon(args) => commands::daemon(args, &config).await,
        Commands::Config(args) => commands::config(args, &manager, &config).await,
    }
}

/// 0 = warn (spinners only), 1 = info, 2+ = debug. `RUST_LOG` wins when set.
fn init_logging(verbose: u8, format: &str) {
    let level = match verbose {
        0 => "repocache=warn",
        1 => "repocache=info",
        _ => "repocache=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr)
            .init();
    }
}
