// Request/response types for the settlement HTTP API

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bridge::RelayStats;
use crate::events::EventRecord;
use crate::market_resolve::{Market, MarketId, MarketStatus, Side};

// ===== ENVELOPES =====

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub kind: String,
}

// ===== MARKETS =====

#[derive(Debug, Deserialize)]
pub struct CreateMarketRequest {
    pub question: String,
    pub resolution_time: u64,
    pub resolver: String,
    #[serde(default)]
    pub creator: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateMarketResponse {
    pub market_id: MarketId,
    pub market: MarketView,
}

/// Market record plus derived status and current prices
#[derive(Debug, Serialize)]
pub struct MarketView {
    #[serde(flatten)]
    pub market: Market,
    pub status: MarketStatus,
    pub yes_price: Decimal,
    pub no_price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub side: String,
    /// Scaled units, as a decimal string
    pub amount: String,
}

// ===== TRADING & SETTLEMENT =====

#[derive(Debug, Deserialize)]
pub struct TradeRequest {
    pub account: String,
    pub side: Side,
    pub amount: u128,
    /// Omitted means no slippage cap
    #[serde(default)]
    pub max_cost: Option<u128>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub outcome: Side,
    pub caller: String,
}

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub account: String,
}

// ===== ACCOUNTS =====

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub amount: u128,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub account: String,
    pub balance: u128,
}

// ===== EVENTS & HEALTH =====

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub since: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub events: Vec<EventRecord>,
    pub last_sequence: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub now: u64,
    pub markets: usize,
    pub last_event_sequence: u64,
    pub relay: RelayStats,
}
