// HTTP request handlers for the BlackBook settlement API

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

use crate::app_state::SharedState;
use crate::error::{ErrorKind, MarketError};
use crate::ledger::LedgerError;
use crate::market_resolve::{ClaimReceipt, Market, MarketId, NewMarket, PricingEngine, Quote, Side, TradeReceipt};
use crate::models::*;
use crate::oracle::OracleResolution;
use crate::rpc::ChannelEnvelope;
use crate::shares::Position;

// ===== ERROR MAPPING =====

#[derive(Debug)]
pub enum ApiError {
    Market(MarketError),
    BadRequest(String),
    NotFound(String),
}

impl From<MarketError> for ApiError {
    fn from(err: MarketError) -> Self {
        ApiError::Market(err)
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Market(err.into())
    }
}

fn status_for(err: &MarketError) -> StatusCode {
    match err {
        MarketError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
        MarketError::SlippageExceeded { .. } => StatusCode::PRECONDITION_FAILED,
        MarketError::LedgerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        other => match other.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::State | ErrorKind::Consistency => StatusCode::CONFLICT,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::Economic => StatusCode::UNPROCESSABLE_ENTITY,
        },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, kind) = match self {
            ApiError::Market(err) => (status_for(&err), err.to_string(), err.kind().as_str()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, ErrorKind::Validation.as_str()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, ErrorKind::NotFound.as_str()),
        };

        let body = ErrorResponse {
            success: false,
            error,
            kind: kind.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn ok<T: serde::Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

fn market_view(state: &SharedState, market: Market) -> MarketView {
    let now = state.engine.now();
    // each market prices on the depth it was created with
    let curve = PricingEngine::new(market.liquidity_depth).unwrap_or_else(|_| state.engine.pricing());
    MarketView {
        status: market.status(now),
        yes_price: curve.spot_price(market.yes_exposure),
        no_price: curve.spot_price(market.no_exposure),
        market,
    }
}

// ===== HEALTH =====

pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    let markets = state.engine.markets().len();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        now: state.engine.now(),
        markets,
        last_event_sequence: state.engine.events().last_sequence(),
        relay: state.relay.stats(),
    })
}

// ===== MARKETS =====

pub async fn get_markets(State(state): State<SharedState>) -> ApiResult<Vec<MarketView>> {
    let views = state
        .engine
        .markets()
        .into_iter()
        .map(|m| market_view(&state, m))
        .collect();
    ok(views)
}

pub async fn create_market(
    State(state): State<SharedState>,
    Json(request): Json<CreateMarketRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreateMarketResponse>>), ApiError> {
    let mut params = NewMarket::new(request.question, request.resolution_time, request.resolver);
    if let Some(creator) = request.creator {
        params = params.created_by(creator);
    }

    let market_id = state.engine.create_market(params)?;
    let market = state.engine.market(market_id)?;
    let response = CreateMarketResponse {
        market_id,
        market: market_view(&state, market),
    };
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(response))))
}

pub async fn get_market(State(state): State<SharedState>, Path(id): Path<MarketId>) -> ApiResult<MarketView> {
    let market = state.engine.market(id)?;
    ok(market_view(&state, market))
}

pub async fn get_quote(
    State(state): State<SharedState>,
    Path(id): Path<MarketId>,
    Query(query): Query<QuoteQuery>,
) -> ApiResult<Quote> {
    let side = Side::parse(&query.side)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown side '{}', expected yes or no", query.side)))?;
    let amount: u128 = query
        .amount
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid amount '{}'", query.amount)))?;

    ok(state.engine.quote(id, side, amount)?)
}

// ===== TRADING =====

pub async fn place_trade(
    State(state): State<SharedState>,
    Path(id): Path<MarketId>,
    Json(request): Json<TradeRequest>,
) -> ApiResult<TradeReceipt> {
    let max_cost = request.max_cost.unwrap_or(u128::MAX);
    let receipt = state
        .engine
        .trade(id, &request.account, request.side, request.amount, max_cost)?;
    ok(receipt)
}

pub async fn resolve_market(
    State(state): State<SharedState>,
    Path(id): Path<MarketId>,
    Json(request): Json<ResolveRequest>,
) -> ApiResult<OracleResolution> {
    ok(state.oracle.resolve(id, request.outcome, &request.caller)?)
}

pub async fn claim_payout(
    State(state): State<SharedState>,
    Path(id): Path<MarketId>,
    Json(request): Json<ClaimRequest>,
) -> ApiResult<ClaimReceipt> {
    ok(state.engine.claim(id, &request.account)?)
}

pub async fn get_position(
    State(state): State<SharedState>,
    Path((id, account)): Path<(MarketId, String)>,
) -> ApiResult<Position> {
    state.engine.market(id)?;
    let position = state
        .engine
        .position(id, &account)
        .ok_or_else(|| ApiError::NotFound(format!("{} holds no position in market {}", account, id)))?;
    ok(position)
}

pub async fn get_market_positions(
    State(state): State<SharedState>,
    Path(id): Path<MarketId>,
) -> ApiResult<Vec<Position>> {
    state.engine.market(id)?;
    ok(state.engine.positions_for_market(id))
}

// ===== RELAY =====

pub async fn relay_inbound(
    State(state): State<SharedState>,
    Json(envelope): Json<ChannelEnvelope>,
) -> ApiResult<TradeReceipt> {
    ok(state.relay.on_remote_message(&envelope)?)
}

// ===== EVENTS =====

pub async fn get_events(State(state): State<SharedState>, Query(query): Query<EventsQuery>) -> ApiResult<EventsResponse> {
    let log = state.engine.events();
    ok(EventsResponse {
        events: log.since(query.since.unwrap_or(0)),
        last_sequence: log.last_sequence(),
    })
}

// ===== ACCOUNTS =====

pub async fn deposit(
    State(state): State<SharedState>,
    Path(account): Path<String>,
    Json(request): Json<DepositRequest>,
) -> ApiResult<BalanceResponse> {
    if account.trim().is_empty() {
        return Err(MarketError::InvalidAccount.into());
    }
    if request.amount == 0 {
        return Err(MarketError::InvalidAmount.into());
    }

    let balance = state.ledger.deposit(&account, request.amount)?;
    ok(BalanceResponse { account, balance })
}

pub async fn get_balance(State(state): State<SharedState>, Path(account): Path<String>) -> ApiResult<BalanceResponse> {
    let balance = state.ledger.balance(&account);
    ok(BalanceResponse { account, balance })
}

pub async fn get_account_positions(
    State(state): State<SharedState>,
    Path(account): Path<String>,
) -> ApiResult<Vec<Position>> {
    ok(state.engine.positions_for_account(&account))
}
