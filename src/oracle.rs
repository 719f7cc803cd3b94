// ============================================================================
// Oracle Resolver - Authoritative Market Outcomes
// ============================================================================
//
// The designated resolver of a market reports its outcome exactly once,
// after the trading window has closed. There is no dispute path: the first
// accepted report is final.
//
//   caller == market.resolver  AND  now >= resolution_time  AND  !resolved
//
// Rejected reports by the wrong principal are logged at warn for audit.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::MarketResult;
use crate::market_resolve::{MarketEngine, MarketId, Side};

/// Outcome accepted for a market
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleResolution {
    pub market_id: MarketId,
    pub outcome: Side,
    pub resolver: String,
    pub resolved_at: u64,
    /// Collateral that winners will split
    pub collateral: u128,
    pub winning_exposure: u128,
}

#[derive(Clone)]
pub struct OracleResolver {
    engine: Arc<MarketEngine>,
}

impl OracleResolver {
    pub fn new(engine: Arc<MarketEngine>) -> Self {
        Self { engine }
    }

    /// Record `outcome` for `market_id` on behalf of `caller`
    pub fn resolve(&self, market_id: MarketId, outcome: Side, caller: &str) -> MarketResult<OracleResolution> {
        let market = self.engine.record_outcome(market_id, outcome, caller)?;

        Ok(OracleResolution {
            market_id,
            outcome,
            resolver: market.resolver.clone(),
            resolved_at: market.resolved_at.unwrap_or_else(|| self.engine.now()),
            collateral: market.collateral,
            winning_exposure: market.exposure(outcome),
        })
    }

    /// Markets whose window has closed but still wait for `resolver`
    pub fn pending_for(&self, resolver: &str) -> Vec<MarketId> {
        let now = self.engine.now();
        self.engine
            .markets()
            .into_iter()
            .filter(|m| m.resolver == resolver && !m.resolved && now >= m.resolution_time)
            .map(|m| m.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::MarketError;
    use crate::ledger::InMemoryLedger;
    use crate::market_resolve::{units, NewMarket, PricingEngine};

    const START: u64 = 1_000;

    fn setup() -> (OracleResolver, Arc<MarketEngine>, Arc<ManualClock>, Arc<InMemoryLedger>) {
        let clock = Arc::new(ManualClock::new(START));
        let ledger = Arc::new(InMemoryLedger::new());
        let engine = Arc::new(MarketEngine::new(PricingEngine::default(), ledger.clone(), clock.clone()));
        (OracleResolver::new(engine.clone()), engine, clock, ledger)
    }

    #[test]
    fn test_resolve_before_deadline_is_rejected() {
        let (oracle, engine, _clock, _ledger) = setup();
        let id = engine
            .create_market(NewMarket::new("Rain in Lisbon tomorrow?", START + 100, "weather-oracle"))
            .unwrap();

        let err = oracle.resolve(id, Side::Yes, "weather-oracle").unwrap_err();
        assert_eq!(
            err,
            MarketError::ResolutionTooEarly { market_id: id, resolution_time: START + 100, now: START }
        );
        assert!(!engine.market(id).unwrap().resolved);
    }

    #[test]
    fn test_resolve_reports_pool() {
        let (oracle, engine, clock, ledger) = setup();
        let id = engine
            .create_market(NewMarket::new("Rain in Lisbon tomorrow?", START + 100, "weather-oracle"))
            .unwrap();
        ledger.deposit("alice", units(500)).unwrap();
        let receipt = engine.trade(id, "alice", Side::No, units(40), u128::MAX).unwrap();

        clock.set(START + 100);
        assert_eq!(oracle.pending_for("weather-oracle"), vec![id]);

        let resolution = oracle.resolve(id, Side::No, "weather-oracle").unwrap();
        assert_eq!(resolution.collateral, receipt.cost);
        assert_eq!(resolution.winning_exposure, units(40));
        assert_eq!(resolution.resolved_at, START + 100);
        assert!(oracle.pending_for("weather-oracle").is_empty());
    }

    #[test]
    fn test_resolve_unknown_market() {
        let (oracle, _engine, _clock, _ledger) = setup();
        assert_eq!(oracle.resolve(42, Side::Yes, "anyone"), Err(MarketError::UnknownMarket(42)));
    }

    #[test]
    fn test_only_designated_resolver() {
        let (oracle, engine, clock, _ledger) = setup();
        let id = engine
            .create_market(NewMarket::new("Fed cuts rates?", START + 1, "fed-oracle"))
            .unwrap();
        clock.set(START + 1);

        assert!(matches!(
            oracle.resolve(id, Side::Yes, "random"),
            Err(MarketError::UnauthorizedResolver { .. })
        ));
        assert!(oracle.resolve(id, Side::Yes, "fed-oracle").is_ok());
        assert_eq!(oracle.resolve(id, Side::No, "fed-oracle"), Err(MarketError::AlreadyResolved(id)));
    }
}
