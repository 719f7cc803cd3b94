// ============================================================================
// Pricing Engine - Bounded Saturating AMM Curve
// ============================================================================
//
// Every share pays out from a shared pool, so the market maker only needs a
// curve that moves price with demand and never charges more than one
// collateral unit per share.
//
// Marginal price at exposure x (liquidity depth b):
//
//     p(x) = 1 - b^2 / (2 * (x + b)^2)
//
//   - p(0) = 0.5 (an untouched side starts at even odds)
//   - p(x) -> 1 as x grows (heavily bought side approaches full price)
//
// Cost of buying `a` shares at current exposure `q` is the exact integral:
//
//     cost(q, a) = a - b^2 * a / (2 * (q + b) * (q + a + b))
//
// All values are fixed-point u128 scaled by COLLATERAL_SCALE. The discount
// term is floored, so the charged cost is rounded up.
//
// ============================================================================

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Fixed-point scale: one whole collateral unit (or one whole share)
pub const COLLATERAL_SCALE: u128 = 1_000_000;

/// Default liquidity depth, in whole shares
pub const DEFAULT_LIQUIDITY_DEPTH: u128 = 1_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    #[error("Liquidity depth must be greater than zero")]
    ZeroDepth,
    #[error("Arithmetic overflow pricing {amount} at exposure {exposure}")]
    Overflow { exposure: u128, amount: u128 },
}

// ============================================================================
// PRICING ENGINE
// ============================================================================

/// Pure cost function over one side's cumulative exposure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingEngine {
    /// Liquidity depth `b` in scaled units. Larger = flatter curve.
    depth: u128,
}

impl PricingEngine {
    /// Build an engine from a depth given in scaled units
    pub fn new(depth: u128) -> Result<Self, PricingError> {
        if depth == 0 {
            return Err(PricingError::ZeroDepth);
        }
        Ok(Self { depth })
    }

    /// Build an engine from a depth given in whole shares
    pub fn with_whole_depth(whole_shares: u128) -> Result<Self, PricingError> {
        let depth = whole_shares
            .checked_mul(COLLATERAL_SCALE)
            .ok_or(PricingError::Overflow { exposure: 0, amount: whole_shares })?;
        Self::new(depth)
    }

    pub fn depth(&self) -> u128 {
        self.depth
    }

    /// Collateral charged for `amount` more shares on a side already holding
    /// `exposure` shares.
    ///
    /// Non-decreasing in both arguments; `amount == 0` costs nothing.
    pub fn cost(&self, exposure: u128, amount: u128) -> Result<u128, PricingError> {
        if amount == 0 {
            return Ok(0);
        }

        let overflow = || PricingError::Overflow { exposure, amount };
        let b = self.depth;

        // discount = b^2 * a / (2 * (q + b) * (q + a + b)), multiply first
        let numerator = b
            .checked_mul(b)
            .and_then(|b2| b2.checked_mul(amount))
            .ok_or_else(overflow)?;

        let low = exposure.checked_add(b).ok_or_else(overflow)?;
        let high = low.checked_add(amount).ok_or_else(overflow)?;
        let denominator = low
            .checked_mul(high)
            .and_then(|d| d.checked_mul(2))
            .ok_or_else(overflow)?;

        let discount = numerator / denominator;
        Ok(amount - discount)
    }

    /// Marginal price of the next share at `exposure`, in collateral units
    pub fn spot_price(&self, exposure: u128) -> Decimal {
        let b = Decimal::from_i128_with_scale(self.depth.min(i64::MAX as u128) as i128, 0);
        let x = Decimal::from_i128_with_scale(exposure.min(i64::MAX as u128) as i128, 0);
        let shifted = x + b;
        // b / (x + b) first to keep the intermediate small
        let ratio = b / shifted;
        Decimal::ONE - ratio * ratio / Decimal::TWO
    }

    /// Average price per share paid for a filled quote
    pub fn average_price(amount: u128, cost: u128) -> Decimal {
        if amount == 0 {
            return Decimal::ZERO;
        }
        let amount = Decimal::from_i128_with_scale(amount.min(i64::MAX as u128) as i128, 0);
        let cost = Decimal::from_i128_with_scale(cost.min(i64::MAX as u128) as i128, 0);
        cost / amount
    }
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self {
            depth: DEFAULT_LIQUIDITY_DEPTH * COLLATERAL_SCALE,
        }
    }
}

/// Convert whole units to scaled fixed-point
pub fn units(whole: u128) -> u128 {
    whole.saturating_mul(COLLATERAL_SCALE)
}

// ============================================================================
// UNIT TESTS
// ============================================================================
