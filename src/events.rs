//! Observation stream for external indexers.
//!
//! Events are appended while the engine holds its write guard, so the global
//! sequence number follows execution order (and therefore order per market).
//! Consumers either poll with [`EventLog::since`] or follow live with
//! [`EventLog::subscribe`].

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::market_resolve::{AccountId, MarketId, Side};

/// Capacity of the live broadcast channel; slow subscribers see `Lagged`
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Externally tagged on the wire (`{"bet_placed": {...}}`) so the u128
/// amounts deserialize without serde's buffered content path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEvent {
    MarketCreated {
        market_id: MarketId,
        question: String,
        resolution_time: u64,
    },
    BetPlaced {
        market_id: MarketId,
        account: AccountId,
        amount: u128,
        side: Side,
        cost: u128,
    },
    MarketResolved {
        market_id: MarketId,
        outcome: Side,
    },
    Claimed {
        market_id: MarketId,
        account: AccountId,
        payout: u128,
    },
}

impl LedgerEvent {
    pub fn market_id(&self) -> MarketId {
        match self {
            LedgerEvent::MarketCreated { market_id, .. }
            | LedgerEvent::BetPlaced { market_id, .. }
            | LedgerEvent::MarketResolved { market_id, .. }
            | LedgerEvent::Claimed { market_id, .. } => *market_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub sequence: u64,
    pub recorded_at: DateTime<Utc>,
    pub event: LedgerEvent,
}

/// Append-only event log with live fan-out
#[derive(Debug)]
pub struct EventLog {
    records: RwLock<Vec<EventRecord>>,
    sender: broadcast::Sender<EventRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            records: RwLock::new(Vec::new()),
            sender,
        }
    }

    /// Append an event and return its sequence number (starting at 1)
    pub fn emit(&self, event: LedgerEvent) -> u64 {
        let mut records = self.records.write();
        let sequence = records.len() as u64 + 1;
        let record = EventRecord {
            sequence,
            recorded_at: Utc::now(),
            event,
        };
        records.push(record.clone());
        // no receivers is fine
        let _ = self.sender.send(record);
        sequence
    }

    /// Records with a sequence strictly greater than `after`
    pub fn since(&self, after: u64) -> Vec<EventRecord> {
        let records = self.records.read();
        let start = (after as usize).min(records.len());
        records[start..].to_vec()
    }

    pub fn for_market(&self, market_id: MarketId) -> Vec<EventRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.event.market_id() == market_id)
            .cloned()
            .collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn last_sequence(&self) -> u64 {
        self.records.read().len() as u64
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
