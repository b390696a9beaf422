//! CipherKeep Server
//!
//! A self-hostable store for client-encrypted records. The server keeps only
//! ciphertext and an append-only change ledger per account.

use cipherkeep_server::challenge::spawn_sweeper;
use cipherkeep_server::{build_router, AppState, SecretStore, ServerConfig};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cipherkeep-server", about = "CipherKeep record store and sync server")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "cipherkeep-server.toml")]
    config: PathBuf,

    /// Listen address override
    #[arg(short, long, env = "ADDRESS")]
    listen: Option<String>,

    /// Database path override
    #[arg(short, long, env = "CIPHERKEEP_DATABASE")]
    database: Option<PathBuf>,

    /// HMAC key for session tokens
    #[arg(long, env = "CIPHERKEEP_TOKEN_SECRET", hide_env_values = true)]
    token_secret: Option<String>,

    /// Disable the /register endpoint
    #[arg(long)]
    no_registration: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut cfg = if cli.config.exists() {
        ServerConfig::load(&cli.config)?
    } else {
        tracing::info!("No config file found, using defaults");
        ServerConfig::default()
    };

    if let Some(listen) = cli.listen {
        cfg.listen_addr = listen;
    }
    if let Some(database) = cli.database {
        cfg.storage_path = database;
    }
    if let Some(secret) = cli.token_secret {
        cfg.token_secret = Some(secret);
    }
    if cli.no_registration {
        cfg.registration_enabled = false;
    }
    cfg.validate()?;

    tracing::info!("Starting CipherKeep server on {}", cfg.listen_addr);

    let store = SecretStore::open(&cfg.storage_path)?;
    let listen_addr = cfg.listen_addr.clone();
    let sweep_interval = cfg.sweep_interval();
    let state = AppState::new(store, cfg);
    let sweeper = spawn_sweeper(state.challenges.clone(), sweep_interval);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.stop().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Graceful shutdown initiated");
}
