pub mod app_state;
pub mod clients;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod repositories;
pub mod security;
pub mod services;
pub mod tasks;

pub use app_state::AppState;
pub use error::PaymentError;

use std::sync::Arc;

use eyre::Report;
use tokio::signal;
use tracing::info;

use crate::clients::{LogNotifier, PaygateClient};
use crate::config::AppConfig;
use crate::logging::setup_logging;
use crate::tasks::{load_env, spawn_background_tasks};

pub async fn run() -> Result<(), Report> {
    // 1. load environment variables
    load_env();

    // 2. initialize logging first (so we can log everything else)
    setup_logging();

    info!("Starting Kolo payment engine...");

    // 3. load configuration
    let config = AppConfig::from_env()?;

    // 4. payment gateway client
    let gateway = Arc::new(PaygateClient::new(&config.gateway)?);

    // 5. build application state
    let state = AppState::new(config, gateway, Arc::new(LogNotifier::new()));

    // 6. start background workers
    spawn_background_tasks(state.clone());

    // 7. run until asked to stop
    shutdown_signal().await;

    info!("Kolo payment engine shut down gracefully");
    Ok(())
}

// handle Ctrl+C / SIGTERM for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
