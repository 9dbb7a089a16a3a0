use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rewind")]
#[command(about = "Session interaction recorder and replayer", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the collector server
    Run,
    /// Record a synthetic session against a running collector
    Simulate {
        /// Number of raw interaction events to generate
        #[arg(long, default_value_t = 600)]
        events: usize,
    },
    /// Play back a recorded session in the terminal
    Replay {
        /// Session id to fetch and replay
        session_id: String,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rewind=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config_path = rewind::config::resolve_config_path(cli.config.as_deref());

    match cli.command {
        Some(Commands::Run) | None => {
            // Default behavior is to run the collector
            rewind::cli::run::run(config_path).await?;
        }
        Some(Commands::Simulate { events }) => {
            rewind::cli::simulate::simulate(config_path, events).await?;
        }
        Some(Commands::Replay { session_id }) => {
            rewind::cli::replay::replay(config_path, &session_id).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                rewind::cli::config::init(stdout)?;
            }
        },
    }

    Ok(())
}
