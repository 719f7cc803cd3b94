//! BlackBook Settlement Ledger
//! Binary prediction markets: pricing, positions, oracle resolution and
//! cross-domain bet relay. Exports all modules for use as a library crate.

pub mod error;
pub mod clock;
pub mod events;
pub mod market_resolve;
pub mod shares;
pub mod ledger;
pub mod oracle;
pub mod bridge;
pub mod persistence;
pub mod config;
pub mod logging;
pub mod app_state;
pub mod models;
pub mod handlers;
pub mod routes;

#[path = "../rpc/mod.rs"]
pub mod rpc;

// Re-export the settlement core
pub use error::{ErrorKind, MarketError, MarketResult};
pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{EventLog, EventRecord, LedgerEvent};
pub use market_resolve::{
    units, AccountId, ClaimReceipt, EngineState, Market, MarketEngine, MarketId, MarketStatus,
    MessageKey, NewMarket, PricingEngine, PricingError, Quote, Side, TradeReceipt,
    COLLATERAL_SCALE, DEFAULT_LIQUIDITY_DEPTH,
};
pub use shares::{Position, PositionLedger};
pub use ledger::{Balances, InMemoryLedger, Ledger, LedgerError};
pub use oracle::{OracleResolution, OracleResolver};
pub use bridge::{CrossDomainRelay, RelayConfig, RelayPayload, RelayStats, TrustedRemote};
pub use rpc::{ChannelEnvelope, EnvelopeError};
pub use persistence::{PersistenceError, Snapshot};
pub use config::{Config, ConfigError};
