// ============================================================================
// Market Resolve Module - Core Market & Settlement Logic
// ============================================================================
//
// This module contains the binary prediction market core:
//   - pricing: bounded-price cost curve (quotes and trade costs)
//   - markets: Market, Side, status and receipt types
//   - engine: market lifecycle (create, trade, resolve, claim)
//
// ============================================================================

pub mod pricing;
pub mod markets;
pub mod engine;

pub use pricing::*;
pub use markets::*;
pub use engine::{EngineState, MarketEngine, MessageKey, TradeOrder};
