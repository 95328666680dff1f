mod config_commands;
mod replay;
mod store_commands;

use std::path::{Path, PathBuf};

use {
    clap::{Parser, Subcommand},
    gamehall_config::GamehallConfig,
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "gamehall", about = "Gamehall, a session-multiplexed chat game bot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info", env = "GAMEHALL_LOG")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to use instead of the discovered one.
    #[arg(long, global = true, env = "GAMEHALL_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
    /// Inspect and edit the permission store.
    Store {
        #[command(subcommand)]
        action: store_commands::StoreAction,
    },
    /// Feed a JSONL recording of platform events through the router.
    Replay {
        /// File with one inbound event per line.
        events: PathBuf,
        /// Trivia questions file, enables the trivia commands.
        #[arg(long)]
        trivia: Option<PathBuf>,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Load the config named on the command line, or discover one.
fn load_config(path: Option<&Path>) -> anyhow::Result<GamehallConfig> {
    match path {
        Some(path) => Ok(gamehall_config::load_config(path)?),
        None => Ok(gamehall_config::discover_and_load()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_telemetry(&cli);
    debug!(version = env!("CARGO_PKG_VERSION"), "gamehall starting");

    match cli.command {
        Commands::Config { action } => config_commands::handle_config(action, cli.config.as_deref()),
        Commands::Store { action } => {
            let config = load_config(cli.config.as_deref())?;
            store_commands::handle_store(action, &config).await
        },
        Commands::Replay { events, trivia } => {
            let config = load_config(cli.config.as_deref())?;
            let summary = replay::replay_file(&config, &events, trivia.as_deref()).await?;
            for line in summary.transcript() {
                println!("{line}");
            }
            eprintln!(
                "{} event(s) replayed, {} skipped, {} outbound action(s)",
                summary.events,
                summary.skipped,
                summary.actions.len()
            );
            Ok(())
        },
    }
}
