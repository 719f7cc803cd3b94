// ============================================================================
// Position Ledger - BlackBook Settlement
// ============================================================================
//
// Outcome holdings per (market, account).
//
//   - YES/NO amounts only ever grow
//   - `claimed` flips once, after the market resolves
//   - a second claim is an error, never a silent no-op
//
// Positions are created lazily on the first trade and never deleted.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{MarketError, MarketResult};
use crate::market_resolve::{AccountId, MarketId, Side};

// ============================================================================
// POSITION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub market_id: MarketId,
    pub account: AccountId,
    pub yes_amount: u128,
    pub no_amount: u128,
    pub claimed: bool,
    /// Total collateral paid for this position
    #[serde(default)]
    pub cost_basis: u128,
    /// Amount paid out on claim
    #[serde(default)]
    pub payout: Option<u128>,
}

impl Position {
    pub fn new(market_id: MarketId, account: impl Into<String>) -> Self {
        Self {
            market_id,
            account: account.into(),
            yes_amount: 0,
            no_amount: 0,
            claimed: false,
            cost_basis: 0,
            payout: None,
        }
    }

    pub fn amount(&self, side: Side) -> u128 {
        match side {
            Side::Yes => self.yes_amount,
            Side::No => self.no_amount,
        }
    }
}

// ============================================================================
// POSITION LEDGER
// ============================================================================

type PositionKey = (MarketId, AccountId);

/// Keyed table (market_id, account) -> Position
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Position>", into = "Vec<Position>")]
pub struct PositionLedger {
    positions: HashMap<PositionKey, Position>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increase the account's holding on `side`, creating the position if needed.
    /// Overflow is checked by the caller before any mutation.
    pub fn credit(&mut self, market_id: MarketId, account: &str, side: Side, amount: u128, cost: u128) -> &Position {
        let position = self
            .positions
            .entry((market_id, account.to_string()))
            .or_insert_with(|| Position::new(market_id, account));

        match side {
            Side::Yes => position.yes_amount = position.yes_amount.saturating_add(amount),
            Side::No => position.no_amount = position.no_amount.saturating_add(amount),
        }
        position.cost_basis = position.cost_basis.saturating_add(cost);
        position
    }

    pub fn read(&self, market_id: MarketId, account: &str) -> Option<&Position> {
        self.positions.get(&(market_id, account.to_string()))
    }

    /// Record the claim. Fails if the position is missing or already claimed.
    pub fn mark_claimed(&mut self, market_id: MarketId, account: &str, payout: u128) -> MarketResult<()> {
        let position = self
            .positions
            .get_mut(&(market_id, account.to_string()))
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

        position.claimed = true;
        position.payout = Some(payout);
        Ok(())
    }

    pub fn positions_for_market(&self, market_id: MarketId) -> Vec<&Position> {
        let mut positions: Vec<&Position> = self
            .positions
            .values()
            .filter(|p| p.market_id == market_id)
            .collect();
        positions.sort_by(|a, b| a.account.cmp(&b.account));
        positions
    }

    pub fn positions_for_account(&self, account: &str) -> Vec<&Position> {
        let mut positions: Vec<&Position> = self
            .positions
            .values()
            .filter(|p| p.account == account)
            .collect();
        positions.sort_by_key(|p| p.market_id);
        positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl From<Vec<Position>> for PositionLedger {
    fn from(list: Vec<Position>) -> Self {
        let positions = list
            .into_iter()
            .map(|p| ((p.market_id, p.account.clone()), p))
            .collect();
        Self { positions }
    }
}

impl From<PositionLedger> for Vec<Position> {
    fn from(ledger: PositionLedger) -> Self {
        let mut list: Vec<Position> = ledger.positions.into_values().collect();
        list.sort_by(|a, b| a.market_id.cmp(&b.market_id).then_with(|| a.account.cmp(&b.account)));
        list
    }
}

// ============================================================================
// TESTS
// ============================================================================
