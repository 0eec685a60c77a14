use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::{debug, info};

use crate::app_state::AppState;
use crate::services::RetryQueue;

const RETRY_POLL_INTERVAL: Duration = Duration::from_secs(1);
const TOKEN_PURGE_INTERVAL: Duration = Duration::from_secs(60);

pub fn load_env() {
    if dotenvy::dotenv().is_ok() {
        info!("Loaded .env file");
    } else {
        info!("No .env file found, using system environment");
    }
}

pub fn spawn_background_tasks(state: Arc<AppState>) {
    let retry_state = state.clone();
    tokio::spawn(async move {
        info!("Starting retry dispatch worker");
        run_retry_worker(retry_state).await;
    });

    let purge_state = state;
    tokio::spawn(async move {
        info!("Starting authorization token purge task");
        run_token_purge(purge_state).await;
    });

    info!("Background tasks spawned");
}

/// Picks up entries whose retry or deferred-dispatch time has arrived. Also
/// how parked work resumes after a restart: the journal scan needs no state
/// beyond the entries themselves.
async fn run_retry_worker(state: Arc<AppState>) {
    let mut interval = interval(RETRY_POLL_INTERVAL);
    interval.tick().await;

    loop {
        interval.tick().await;
        let dispatched = RetryQueue::drain_due(&state, Utc::now()).await;
        if dispatched > 0 {
            debug!(dispatched, "retry worker dispatched due entries");
        }
    }
}

async fn run_token_purge(state: Arc<AppState>) {
    let mut interval = interval(TOKEN_PURGE_INTERVAL);
    interval.tick().await;

    loop {
        interval.tick().await;
        let purged = state.pins.purge_expired_tokens(Utc::now());
        if purged > 0 {
            debug!(purged, "purged expired authorization tokens");
        }
    }
}
