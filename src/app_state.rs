// Application state management

use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::bridge::CrossDomainRelay;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::ledger::{Balances, InMemoryLedger};
use crate::market_resolve::{EngineState, MarketEngine, PricingEngine, PricingError};
use crate::oracle::OracleResolver;
use crate::persistence::{self, PersistenceError, Snapshot};

pub type SharedState = Arc<AppState>;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Invalid liquidity depth: {0}")]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

pub struct AppState {
    pub config: Config,
    pub engine: Arc<MarketEngine>,
    pub oracle: OracleResolver,
    pub relay: CrossDomainRelay,
    pub ledger: Arc<InMemoryLedger>,
    pub started_at: u64,
}

impl AppState {
    /// Restore from the configured snapshot (if any) on the wall clock
    pub fn load(config: Config) -> Result<Self, StartupError> {
        let snapshot = persistence::load_snapshot(&config.snapshot_path)?;
        match &snapshot {
            Some(s) => info!(
                path = %config.snapshot_path.display(),
                markets = s.engine.markets.len(),
                saved_at = %s.saved_at,
                "loaded persisted state"
            ),
            None => info!(path = %config.snapshot_path.display(), "no persisted state found, starting fresh"),
        }
        Self::build(config, snapshot, Arc::new(SystemClock))
    }

    /// Fresh state with an explicit clock (tests, replays)
    pub fn in_memory(config: Config, clock: Arc<dyn Clock>) -> Result<Self, StartupError> {
        Self::build(config, None, clock)
    }

    fn build(config: Config, snapshot: Option<Snapshot>, clock: Arc<dyn Clock>) -> Result<Self, StartupError> {
        let pricing = PricingEngine::with_whole_depth(config.liquidity_depth)?;
        let (engine_state, balances) = match snapshot {
            Some(s) => (s.engine, s.balances),
            None => (EngineState::default(), Balances::default()),
        };

        let ledger = Arc::new(InMemoryLedger::from_balances(balances));
        let started_at = clock.now();
        let engine = Arc::new(MarketEngine::restore(engine_state, pricing, ledger.clone(), clock));
        let oracle = OracleResolver::new(engine.clone());
        let relay = CrossDomainRelay::new(engine.clone(), config.relay_config());

        Ok(Self {
            config,
            engine,
            oracle,
            relay,
            ledger,
            started_at,
        })
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.engine.snapshot(), self.ledger.snapshot())
    }

    pub fn save_to_disk(&self) -> Result<(), PersistenceError> {
        persistence::save_snapshot(&self.config.snapshot_path, &self.snapshot())
    }
}
