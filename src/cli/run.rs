use crate::config::parse::load_config;
use crate::storage::{DuckDbStorage, Storage};
use crate::web::{run_server, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    #[error("invalid listen address '{0}': {1}")]
    ListenAddr(String, std::net::AddrParseError),

    #[error("server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match config_path {
        Some(path) => path,
        None => {
            eprintln!("Error: config not found");
            eprintln!("Searched locations:");
            eprintln!("  ~/.config/rewind/config.yml");
            eprintln!("  /etc/rewind/config.yml");
            eprintln!("\nUse --config <path> to specify a config file, or run 'rewind config init' to generate one.");
            std::process::exit(1);
        }
    };

    run_collector(&config_path).await.map_err(|e| e.into())
}

async fn run_collector(config_path: &PathBuf) -> Result<(), RunError> {
    info!(config_path = %config_path.display(), "Loading configuration");
    let config = load_config(config_path)?;

    let listen_addr: SocketAddr = config
        .collector
        .listen
        .parse()
        .map_err(|e| RunError::ListenAddr(config.collector.listen.clone(), e))?;

    if let Some(parent) = config.storage.path.parent() {
        std::fs::create_dir_all(parent).map_err(RunError::Server)?;
    }

    info!(path = %config.storage.path.display(), "Initializing storage");
    let storage = Arc::new(DuckDbStorage::new(&config.storage.path)?);
    storage.init_schema().await?;

    let state = AppState::new(storage);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut server_handle = tokio::spawn(run_server(listen_addr, state, shutdown_rx));

    info!("Collector started, press Ctrl+C to shutdown");

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
            server_handle.await??;
        }
        result = &mut server_handle => {
            // Server ended on its own (e.g. bind failure).
            match result? {
                Ok(()) => info!("Server stopped"),
                Err(e) => {
                    error!(error = %e, "Server error");
                    return Err(RunError::Server(e));
                }
            }
        }
    }

    info!("Collector shutdown complete");
    Ok(())
}
