//! postwatch CLI
//!
//! Local execution entry point.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use postwatch::{
    config,
    error::Result,
    models::Config,
    pipeline,
    storage::{JsonStateStore, StateStore},
};
use tokio_util::sync::CancellationToken;

/// postwatch - New post monitor for per-author board listings
#[derive(Parser, Debug)]
#[command(
    name = "postwatch",
    version,
    about = "Announces each new post on watched board listings exactly once"
)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, default_value = "storage/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan all enabled sources every `monitor.interval_secs` until Ctrl-C
    Run,

    /// Run a single scan cycle and deliver notifications
    Once {
        /// Print the cycle report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Forget a source's cursor so its next scan baselines again
    Reset {
        /// Source id
        #[arg(long)]
        source: i64,

        /// Platform key
        #[arg(long)]
        platform: String,
    },

    /// Show stored cursors
    Status,

    /// Validate configuration and sources files
    Validate,
}

/// Initialize logging based on verbosity flag and configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Shutdown requested, stopping after the current step...");
            token.cancel();
        }
    });
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = Config::load(&cli.config)
        .map(|c| c.logging.level)
        .unwrap_or_else(|_| "info".to_string());
    init_logging(cli.verbose, &level);

    match cli.command {
        Command::Run => {
            let (config, registry) = config::load_all(&cli.config)?;
            let cancel = CancellationToken::new();
            let monitor = pipeline::build_monitor(&config, cancel.clone())?;
            cancel_on_ctrl_c(cancel);

            let interval = Duration::from_secs(config.monitor.interval_secs);
            pipeline::run_loop(&monitor, &registry.enabled(), interval).await;
        }

        Command::Once { json } => {
            let (config, registry) = config::load_all(&cli.config)?;
            let cancel = CancellationToken::new();
            let monitor = pipeline::build_monitor(&config, cancel.clone())?;
            cancel_on_ctrl_c(cancel);

            let report = pipeline::run_once(&monitor, &registry.enabled()).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for source in &report.sources {
                    log::info!(
                        "{} ({}): {:?}",
                        source.source.label(),
                        source.source.platform,
                        source.outcome
                    );
                }
            }
        }

        Command::Reset { source, platform } => {
            let config = config::load_config(&cli.config)?;
            let monitor = pipeline::build_monitor(&config, CancellationToken::new())?;
            if !monitor
                .orchestrator
                .reset_monitor_state(source, &platform)
                .await?
            {
                log::warn!("Nothing to reset for {platform}:{source}");
            }
        }

        Command::Status => {
            let config = config::load_config(&cli.config)?;
            let store = JsonStateStore::new(&config.paths.state_file);
            let states = store.list().await?;

            log::info!("State file: {}", store.path().display());
            if states.is_empty() {
                log::info!("No sources have been scanned yet.");
            }
            for state in states {
                log::info!(
                    "{}:{}  cursor={}  status={}  checked={}",
                    state.platform,
                    state.source_id,
                    state.last_content_id.as_deref().unwrap_or("-"),
                    state.last_status,
                    state.last_check_time.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            let (config, registry) = config::load_all(&cli.config)?;
            log::info!("✓ Config OK ({} board definition(s))", config.boards.len());
            log::info!(
                "✓ Sources OK ({} total, {} enabled)",
                registry.sources.len(),
                registry.enabled().len()
            );
        }
    }

    Ok(())
}
