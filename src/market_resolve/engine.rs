// ============================================================================
// Market Engine - Binary Market Lifecycle
// ============================================================================
//
// Owns every Market and Position record.
//
//   create_market -> trade* -> (resolution_time passes) -> resolve -> claim*
//
// Concurrency model: a single writer. Every mutation runs under one write
// guard over the engine state (markets, positions, relay dedup table), so
// operations never interleave. Quotes take the read guard and may be stale by
// the time a trade commits; `max_cost` covers that gap.
//
// Atomicity: the collateral ledger call is the only fallible step after
// validation and it runs before any engine state is touched. Everything
// after it is infallible.
//
// ============================================================================

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::markets::{ClaimReceipt, Market, MarketId, MarketStatus, NewMarket, Quote, Side, TradeReceipt};
use super::pricing::{PricingEngine, PricingError};
use crate::clock::Clock;
use crate::error::{MarketError, MarketResult};
use crate::events::{EventLog, LedgerEvent};
use crate::ledger::Ledger;
use crate::shares::{Position, PositionLedger};

// ============================================================================
// ENGINE STATE
// ============================================================================

/// Identity of an inbound cross-domain message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageKey {
    pub source_domain: u32,
    pub nonce: u64,
}

/// Everything that must be persisted together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    pub next_market_id: MarketId,
    pub markets: BTreeMap<MarketId, Market>,
    pub positions: PositionLedger,
    /// Relay messages already applied
    #[serde(default)]
    pub applied_messages: BTreeSet<MessageKey>,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            next_market_id: 1,
            markets: BTreeMap::new(),
            positions: PositionLedger::new(),
            applied_messages: BTreeSet::new(),
        }
    }
}

/// A trade request, local or relayed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeOrder {
    pub market_id: MarketId,
    pub account: String,
    pub side: Side,
    pub amount: u128,
    /// `None` means no slippage cap
    pub max_cost: Option<u128>,
}

// ============================================================================
// MARKET ENGINE
// ============================================================================

pub struct MarketEngine {
    state: RwLock<EngineState>,
    pricing: PricingEngine,
    ledger: Arc<dyn Ledger>,
    clock: Arc<dyn Clock>,
    events: Arc<EventLog>,
}

impl MarketEngine {
    pub fn new(pricing: PricingEngine, ledger: Arc<dyn Ledger>, clock: Arc<dyn Clock>) -> Self {
        Self::restore(EngineState::default(), pricing, ledger, clock)
    }

    /// Rebuild an engine from persisted state
    pub fn restore(
        state: EngineState,
        pricing: PricingEngine,
        ledger: Arc<dyn Ledger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        info!(
            markets = state.markets.len(),
            positions = state.positions.len(),
            applied_messages = state.applied_messages.len(),
            depth = pricing.depth(),
            "market engine ready"
        );
        Self {
            state: RwLock::new(state),
            pricing,
            ledger,
            clock,
            events: Arc::new(EventLog::new()),
        }
    }

    pub fn events(&self) -> Arc<EventLog> {
        self.events.clone()
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn pricing(&self) -> PricingEngine {
        self.pricing
    }

    /// Copy of the full persisted state
    pub fn snapshot(&self) -> EngineState {
        self.state.read().clone()
    }

    // ------------------------------------------------------------------------
    // create
    // ------------------------------------------------------------------------

    pub fn create_market(&self, params: NewMarket) -> MarketResult<MarketId> {
        let question = params.question.trim().to_string();
        if question.is_empty() {
            return Err(MarketError::InvalidQuestion);
        }
        let resolver = params.resolver.trim().to_string();
        if resolver.is_empty() {
            return Err(MarketError::InvalidAccount);
        }

        let mut state = self.state.write();
        let now = self.clock.now();
        if params.resolution_time <= now {
            return Err(MarketError::InvalidSchedule {
                resolution_time: params.resolution_time,
                now,
            });
        }

        let market_id = state.next_market_id;
        state.next_market_id += 1;

        let market = Market {
            id: market_id,
            question: question.clone(),
            resolution_time: params.resolution_time,
            yes_exposure: 0,
            no_exposure: 0,
            resolved: false,
            outcome: None,
            resolver,
            collateral: 0,
            paid_out: 0,
            liquidity_depth: self.pricing.depth(),
            creator: params.creator,
            created_at: now,
            resolved_at: None,
        };
        state.markets.insert(market_id, market);

        self.events.emit(LedgerEvent::MarketCreated {
            market_id,
            question: question.clone(),
            resolution_time: params.resolution_time,
        });
        info!(market_id, resolution_time = params.resolution_time, %question, "market created");

        Ok(market_id)
    }

    // ------------------------------------------------------------------------
    // quote
    // ------------------------------------------------------------------------

    /// Price `amount` more shares on `side` without changing anything
    pub fn quote(&self, market_id: MarketId, side: Side, amount: u128) -> MarketResult<Quote> {
        let state = self.state.read();
        let market = state
            .markets
            .get(&market_id)
            .ok_or(MarketError::UnknownMarket(market_id))?;
        Self::price(market, side, amount)
    }

    fn price(market: &Market, side: Side, amount: u128) -> MarketResult<Quote> {
        let curve = Self::curve(market)?;
        let exposure = market.exposure(side);
        let cost = curve.cost(exposure, amount).map_err(|err| match err {
            PricingError::Overflow { amount, .. } => MarketError::AmountOutOfRange { amount },
            PricingError::ZeroDepth => MarketError::AmountOutOfRange { amount },
        })?;

        Ok(Quote {
            market_id: market.id,
            side,
            amount,
            cost,
            exposure,
            average_price: PricingEngine::average_price(amount, cost),
            spot_price: curve.spot_price(exposure),
        })
    }

    fn curve(market: &Market) -> MarketResult<PricingEngine> {
        PricingEngine::new(market.liquidity_depth)
            .map_err(|_| MarketError::AmountOutOfRange { amount: 0 })
    }

    // ------------------------------------------------------------------------
    // trade
    // ------------------------------------------------------------------------

    /// Buy `amount` shares of `side` for `account`, paying at most `max_cost`
    pub fn trade(
        &self,
        market_id: MarketId,
        account: &str,
        side: Side,
        amount: u128,
        max_cost: u128,
    ) -> MarketResult<TradeReceipt> {
        let order = TradeOrder {
            market_id,
            account: account.to_string(),
            side,
            amount,
            max_cost: Some(max_cost),
        };
        let mut state = self.state.write();
        self.execute_trade(&mut state, &order)
    }

    /// Apply a relayed trade exactly once per message key. The key is recorded
    /// in the same critical section as the trade, and only if it succeeds.
    pub(crate) fn trade_once(&self, key: MessageKey, order: &TradeOrder) -> MarketResult<TradeReceipt> {
        let mut state = self.state.write();
        if state.applied_messages.contains(&key) {
            debug!(source_domain = key.source_domain, nonce = key.nonce, "duplicate relay delivery");
            return Err(MarketError::DuplicateMessage {
                source_domain: key.source_domain,
                nonce: key.nonce,
            });
        }

        let receipt = self.execute_trade(&mut state, order)?;
        state.applied_messages.insert(key);
        Ok(receipt)
    }

    pub fn is_message_applied(&self, key: MessageKey) -> bool {
        self.state.read().applied_messages.contains(&key)
    }

    fn execute_trade(&self, state: &mut EngineState, order: &TradeOrder) -> MarketResult<TradeReceipt> {
        if order.amount == 0 {
            return Err(MarketError::InvalidAmount);
        }
        if order.account.trim().is_empty() {
            return Err(MarketError::InvalidAccount);
        }

        let market = state
            .markets
            .get(&order.market_id)
            .ok_or(MarketError::UnknownMarket(order.market_id))?;

        let now = self.clock.now();
        match market.status(now) {
            MarketStatus::Resolved => return Err(MarketError::MarketResolved(market.id)),
            MarketStatus::Expired => {
                return Err(MarketError::MarketExpired {
                    market_id: market.id,
                    resolution_time: market.resolution_time,
                })
            }
            MarketStatus::Open => {}
        }

        let quote = Self::price(market, order.side, order.amount)?;
        if let Some(max_cost) = order.max_cost {
            if quote.cost > max_cost {
                return Err(MarketError::SlippageExceeded {
                    market_id: market.id,
                    side: order.side,
                    cost: quote.cost,
                    max_cost,
                });
            }
        }

        // Check every counter before moving money so nothing after the debit can fail
        let new_exposure = market
            .exposure(order.side)
            .checked_add(order.amount)
            .ok_or(MarketError::AmountOutOfRange { amount: order.amount })?;
        let new_collateral = market
            .collateral
            .checked_add(quote.cost)
            .ok_or(MarketError::AmountOutOfRange { amount: order.amount })?;

        self.ledger.debit(&order.account, quote.cost)?;

        // Infallible from here on
        let market = state
            .markets
            .get_mut(&order.market_id)
            .ok_or(MarketError::UnknownMarket(order.market_id))?;
        *market.exposure_mut(order.side) = new_exposure;
        market.collateral = new_collateral;
        let (yes_exposure, no_exposure) = (market.yes_exposure, market.no_exposure);

        state
            .positions
            .credit(order.market_id, &order.account, order.side, order.amount, quote.cost);

        let sequence = self.events.emit(LedgerEvent::BetPlaced {
            market_id: order.market_id,
            account: order.account.clone(),
            amount: order.amount,
            side: order.side,
            cost: quote.cost,
        });
        info!(
            market_id = order.market_id,
            account = %order.account,
            side = %order.side,
            amount = order.amount,
            cost = quote.cost,
            "bet placed"
        );

        Ok(TradeReceipt {
            market_id: order.market_id,
            account: order.account.clone(),
            side: order.side,
            amount: order.amount,
            cost: quote.cost,
            yes_exposure,
            no_exposure,
            sequence,
        })
    }

    // ------------------------------------------------------------------------
    // resolve (driven by the oracle resolver)
    // ------------------------------------------------------------------------

    /// Record the outcome. Only the market's resolver, only once, only after
    /// the trading window has closed.
    pub(crate) fn record_outcome(&self, market_id: MarketId, outcome: Side, caller: &str) -> MarketResult<Market> {
        let mut state = self.state.write();
        let now = self.clock.now();
        let market = state
            .markets
            .get_mut(&market_id)
            .ok_or(MarketError::UnknownMarket(market_id))?;

        if market.resolver != caller {
            warn!(market_id, caller, resolver = %market.resolver, "unauthorized resolution attempt");
            return Err(MarketError::UnauthorizedResolver {
                market_id,
                caller: caller.to_string(),
            });
        }
        if market.resolved {
            return Err(MarketError::AlreadyResolved(market_id));
        }
        if now < market.resolution_time {
            return Err(MarketError::ResolutionTooEarly {
                market_id,
                resolution_time: market.resolution_time,
                now,
            });
        }

        market.resolved = true;
        market.outcome = Some(outcome);
        market.resolved_at = Some(now);
        let resolved = market.clone();

        self.events.emit(LedgerEvent::MarketResolved { market_id, outcome });
        info!(market_id, outcome = %outcome, "market resolved");

        Ok(resolved)
    }

    // ------------------------------------------------------------------------
    // claim
    // ------------------------------------------------------------------------

    /// Pay out a resolved position. Winners split the whole pool in proportion
    /// to their winning shares; losers claim zero.
    pub fn claim(&self, market_id: MarketId, account: &str) -> MarketResult<ClaimReceipt> {
        let mut state = self.state.write();
        let market = state
            .markets
            .get(&market_id)
            .ok_or(MarketError::UnknownMarket(market_id))?;

        let outcome = match (market.resolved, market.outcome) {
            (true, Some(outcome)) => outcome,
            _ => return Err(MarketError::MarketNotResolved(market_id)),
        };

        let position = state
            .positions
            .read(market_id, account)
            .ok_or_else(|| MarketError::NoPosition {
                market_id,
                account: account.to_string(),
            })?;
        if position.claimed {
            return Err(MarketError::AlreadyClaimed {
                market_id,
                account: account.to_string(),
            });
        }

        let winning_shares = position.amount(outcome);
        let payout = Self::payout(market, outcome, winning_shares)?;
        let paid_out = market
            .paid_out
            .checked_add(payout)
            .ok_or(MarketError::AmountOutOfRange { amount: payout })?;

        if payout > 0 {
            self.ledger.credit(account, payout)?;
        }

        // Infallible from here on: position exists and is unclaimed
        state.positions.mark_claimed(market_id, account, payout)?;
        if let Some(market) = state.markets.get_mut(&market_id) {
            market.paid_out = paid_out;
        }

        self.events.emit(LedgerEvent::Claimed {
            market_id,
            account: account.to_string(),
            payout,
        });
        info!(market_id, account, payout, winning_shares, "claim paid");

        Ok(ClaimReceipt {
            market_id,
            account: account.to_string(),
            outcome,
            winning_shares,
            payout,
        })
    }

    /// floor(collateral * winning_shares / winning_exposure)
    fn payout(market: &Market, outcome: Side, winning_shares: u128) -> MarketResult<u128> {
        let winning_exposure = market.exposure(outcome);
        if winning_shares == 0 || winning_exposure == 0 {
            return Ok(0);
        }
        // winning_shares <= winning_exposure, so the quotient fits in u128
        mul_div(market.collateral, winning_shares, winning_exposure)
            .ok_or(MarketError::AmountOutOfRange { amount: winning_shares })
    }

    // ------------------------------------------------------------------------
    // reads
    // ------------------------------------------------------------------------

    pub fn market(&self, market_id: MarketId) -> MarketResult<Market> {
        self.state
            .read()
            .markets
            .get(&market_id)
            .cloned()
            .ok_or(MarketError::UnknownMarket(market_id))
    }

    pub fn markets(&self) -> Vec<Market> {
        self.state.read().markets.values().cloned().collect()
    }

    pub fn status(&self, market_id: MarketId) -> MarketResult<MarketStatus> {
        let now = self.clock.now();
        self.market(market_id).map(|m| m.status(now))
    }

    pub fn position(&self, market_id: MarketId, account: &str) -> Option<Position> {
        self.state.read().positions.read(market_id, account).cloned()
    }

    pub fn positions_for_market(&self, market_id: MarketId) -> Vec<Position> {
        self.state
            .read()
            .positions
            .positions_for_market(market_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn positions_for_account(&self, account: &str) -> Vec<Position> {
        self.state
            .read()
            .positions
            .positions_for_account(account)
            .into_iter()
            .cloned()
            .collect()
    }
}

// ============================================================================
// ARITHMETIC
// ============================================================================

/// floor(a * b / d) through a 256-bit intermediate.
/// `None` when `d == 0` or the quotient does not fit in u128.
fn mul_div(a: u128, b: u128, d: u128) -> Option<u128> {
    if d == 0 {
        return None;
    }
    if let Some(product) = a.checked_mul(b) {
        return Some(product / d);
    }

    const LOW: u128 = u64::MAX as u128;
    let (a_hi, a_lo) = (a >> 64, a & LOW);
    let (b_hi, b_lo) = (b >> 64, b & LOW);

    let lo_lo = a_lo * b_lo;
    let hi_lo = a_hi * b_lo;
    let lo_hi = a_lo * b_hi;
    let hi_hi = a_hi * b_hi;

    let mid = (lo_lo >> 64) + (hi_lo & LOW) + (lo_hi & LOW);
    let lo = (lo_lo & LOW) | ((mid & LOW) << 64);
    let hi = hi_hi + (hi_lo >> 64) + (lo_hi >> 64) + (mid >> 64);

    if hi >= d {
        return None;
    }

    // binary long division of (hi:lo) by d; the running remainder starts at hi
    let mut rem = hi;
    let mut quotient = 0u128;
    for bit in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((lo >> bit) & 1);
        quotient <<= 1;
        if carry == 1 || rem >= d {
            rem = rem.wrapping_sub(d);
            quotient |= 1;
        }
    }
    Some(quotient)
}

// ============================================================================
// UNIT TESTS
// ============================================================================
