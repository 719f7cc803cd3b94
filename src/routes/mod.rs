// Routes module - wires every HTTP endpoint to its handler

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::app_state::SharedState;
use crate::handlers::*;

pub fn router(state: SharedState) -> Router {
    Router::new()
        // ===== HEALTH CHECK =====
        .route("/", get(health_check))
        .route("/health", get(health_check))

        // ===== MARKETS =====
        .route("/markets", get(get_markets).post(create_market))
        .route("/markets/:id", get(get_market))
        .route("/markets/:id/quote", get(get_quote))

        // ===== TRADING & SETTLEMENT =====
        .route("/markets/:id/trades", post(place_trade))
        .route("/markets/:id/resolve", post(resolve_market))
        .route("/markets/:id/claims", post(claim_payout))
        .route("/markets/:id/positions", get(get_market_positions))
        .route("/markets/:id/positions/:account", get(get_position))

        // ===== CROSS-DOMAIN RELAY =====
        .route("/relay/inbound", post(relay_inbound))

        // ===== EVENTS =====
        .route("/events", get(get_events))

        // ===== ACCOUNTS =====
        .route("/accounts/:id/deposit", post(deposit))
        .route("/accounts/:id/balance", get(get_balance))
        .route("/accounts/:id/positions", get(get_account_positions))

        // Apply CORS, tracing and state
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
