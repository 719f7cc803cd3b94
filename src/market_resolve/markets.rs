//! Binary market records: markets, sides, quotes and trade receipts

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type MarketId = u64;
pub type AccountId = String;

// ============================================================================
// SIDE
// ============================================================================

/// One side of a binary market. Also used as the resolved outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Side::Yes => Side::No,
            Side::No => Side::Yes,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Yes => "yes",
            Side::No => "no",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "yes" | "y" => Some(Side::Yes),
            "no" | "n" => Some(Side::No),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// MARKET STATUS
// ============================================================================

/// Lifecycle of a market, derived from the record and the clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    /// Trading is live
    Open,
    /// Trading window closed, waiting for the resolver
    Expired,
    /// Outcome recorded, claims are open
    Resolved,
}

impl MarketStatus {
    pub fn is_trading_open(&self) -> bool {
        matches!(self, MarketStatus::Open)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MarketStatus::Resolved)
    }
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status_str = match self {
            MarketStatus::Open => "open",
            MarketStatus::Expired => "expired",
            MarketStatus::Resolved => "resolved",
        };
        write!(f, "{}", status_str)
    }
}

// ============================================================================
// MARKET
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    /// Sequential identifier, never reused
    pub id: MarketId,

    /// Question being predicted
    pub question: String,

    /// Unix timestamp when trading stops and resolution may begin
    pub resolution_time: u64,

    /// Cumulative YES shares issued
    pub yes_exposure: u128,

    /// Cumulative NO shares issued
    pub no_exposure: u128,

    pub resolved: bool,

    /// Final outcome, only set once resolved
    pub outcome: Option<Side>,

    /// Principal allowed to report the outcome
    pub resolver: AccountId,

    /// Collateral collected from every trade
    pub collateral: u128,

    /// Collateral already paid out to claimants
    #[serde(default)]
    pub paid_out: u128,

    /// Curve depth frozen at creation so config changes never reprice a market
    pub liquidity_depth: u128,

    pub creator: AccountId,

    pub created_at: u64,

    #[serde(default)]
    pub resolved_at: Option<u64>,
}

impl Market {
    pub fn status(&self, now: u64) -> MarketStatus {
        if self.resolved {
            MarketStatus::Resolved
        } else if now >= self.resolution_time {
            MarketStatus::Expired
        } else {
            MarketStatus::Open
        }
    }

    pub fn exposure(&self, side: Side) -> u128 {
        match side {
            Side::Yes => self.yes_exposure,
            Side::No => self.no_exposure,
        }
    }

    pub(crate) fn exposure_mut(&mut self, side: Side) -> &mut u128 {
        match side {
            Side::Yes => &mut self.yes_exposure,
            Side::No => &mut self.no_exposure,
        }
    }

    /// Collateral not yet paid out
    pub fn remaining_collateral(&self) -> u128 {
        self.collateral.saturating_sub(self.paid_out)
    }
}

/// Parameters for opening a new market
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMarket {
    pub question: String,
    pub resolution_time: u64,
    pub resolver: AccountId,
    #[serde(default)]
    pub creator: AccountId,
}

impl NewMarket {
    pub fn new(question: impl Into<String>, resolution_time: u64, resolver: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            resolution_time,
            resolver: resolver.into(),
            creator: String::new(),
        }
    }

    pub fn created_by(mut self, creator: impl Into<String>) -> Self {
        self.creator = creator.into();
        self
    }
}

// ============================================================================
// QUOTES & RECEIPTS
// ============================================================================

/// Price of `amount` more shares on `side`, against exposure at call time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub market_id: MarketId,
    pub side: Side,
    pub amount: u128,
    pub cost: u128,
    /// Exposure on `side` the quote was computed against
    pub exposure: u128,
    pub average_price: Decimal,
    pub spot_price: Decimal,
}

/// Result of a committed trade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub market_id: MarketId,
    pub account: AccountId,
    pub side: Side,
    pub amount: u128,
    pub cost: u128,
    pub yes_exposure: u128,
    pub no_exposure: u128,
    /// Event sequence of the BetPlaced observation
    pub sequence: u64,
}

/// Result of a claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReceipt {
    pub market_id: MarketId,
    pub account: AccountId,
    pub outcome: Side,
    pub winning_shares: u128,
    pub payout: u128,
}
