// BlackBook Settlement Ledger - Main Entry Point
// Binary prediction markets with cross-domain bet relay

use std::sync::Arc;
use tracing::{error, info, warn};

use blackbook_settlement::app_state::{AppState, SharedState};
use blackbook_settlement::config::Config;
use blackbook_settlement::logging;
use blackbook_settlement::routes;

#[tokio::main]
async fn main() {
    // .env is optional
    dotenv::dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = logging::init_tracing(config.log_json) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let state: SharedState = match AppState::load(config) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!(error = %e, "failed to initialize state");
            std::process::exit(1);
        }
    };

    if state.config.channel_key.is_none() {
        warn!("BLACKBOOK_CHANNEL_PUBKEY not set, relayed bets will be rejected");
    }

    let addr = state.config.bind_addr;
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    info!(
        %addr,
        markets = state.engine.markets().len(),
        trusted_remotes = state.config.trusted_remotes.len(),
        "settlement ledger listening"
    );

    let app = routes::router(state.clone());
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    if let Err(e) = served {
        error!(error = %e, "server error");
    }

    info!("saving state to disk");
    match state.save_to_disk() {
        Ok(()) => info!("state saved, goodbye"),
        Err(e) => {
            error!(error = %e, "failed to save state");
            std::process::exit(1);
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
