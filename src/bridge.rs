//! Cross-Domain Relay for Remote Bets
//!
//! Bets placed on another execution domain arrive here as signed channel
//! envelopes and are replayed as ordinary trades on the domain that owns
//! the market.
//!
//! Relay Flow:
//! 1. Envelope signature must verify against the channel key
//! 2. (source_domain, source_address) must be a registered trusted remote
//! 3. Payload decodes to (market_id, account, amount, side)
//! 4. (source_domain, nonce) must not have been applied before
//! 5. Trade runs with the relay's cost cap; the nonce is recorded only if it succeeds

use bincode::Options;
use ed25519_dalek::VerifyingKey;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{MarketError, MarketResult};
use crate::market_resolve::{MarketEngine, MarketId, MessageKey, Side, TradeOrder, TradeReceipt};
use crate::rpc::ChannelEnvelope;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Upper bound on an encoded payload; anything larger is malformed
pub const MAX_PAYLOAD_BYTES: u64 = 4 * 1024;

fn payload_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_PAYLOAD_BYTES)
        .reject_trailing_bytes()
}

// ============================================================================
// RELAY PAYLOAD
// ============================================================================

/// A remote bet: (market_id, account, amount, side)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayPayload {
    pub market_id: MarketId,
    pub account: String,
    pub amount: u128,
    pub side: Side,
}

impl RelayPayload {
    pub fn new(market_id: MarketId, account: impl Into<String>, amount: u128, side: Side) -> Self {
        Self {
            market_id,
            account: account.into(),
            amount,
            side,
        }
    }

    /// Encode for the channel (sending side)
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        payload_options().serialize(&(self.market_id, &self.account, self.amount, self.side))
    }

    pub fn decode(bytes: &[u8]) -> MarketResult<Self> {
        let (market_id, account, amount, side): (MarketId, String, u128, Side) = payload_options()
            .deserialize(bytes)
            .map_err(|e| MarketError::MalformedPayload(e.to_string()))?;

        if account.trim().is_empty() {
            return Err(MarketError::MalformedPayload("empty account".into()));
        }

        Ok(Self {
            market_id,
            account,
            amount,
            side,
        })
    }
}

// ============================================================================
// TRUSTED REMOTES
// ============================================================================

/// A sender on another domain allowed to relay bets here
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrustedRemote {
    pub domain: u32,
    pub address: String,
}

impl TrustedRemote {
    pub fn new(domain: u32, address: impl Into<String>) -> Self {
        Self {
            domain,
            address: address.into(),
        }
    }
}

/// Relay settings, usually built from the service config
#[derive(Debug, Clone, Default)]
pub struct RelayConfig {
    /// Channel key; without one every message is untrusted
    pub channel_key: Option<VerifyingKey>,
    pub trusted_remotes: Vec<TrustedRemote>,
    /// Cost cap applied to relayed trades; `None` means unbounded
    pub remote_max_cost: Option<u128>,
}

// ============================================================================
// RELAY STATS
// ============================================================================

#[derive(Debug, Default)]
struct RelayCounters {
    applied: AtomicU64,
    duplicates: AtomicU64,
    rejected: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayStats {
    pub applied: u64,
    pub duplicates: u64,
    pub rejected: u64,
    pub trusted_remotes: usize,
}

// ============================================================================
// CROSS-DOMAIN RELAY
// ============================================================================

pub struct CrossDomainRelay {
    engine: Arc<MarketEngine>,
    channel_key: Option<VerifyingKey>,
    trusted: RwLock<HashSet<TrustedRemote>>,
    remote_max_cost: Option<u128>,
    counters: RelayCounters,
}

impl CrossDomainRelay {
    pub fn new(engine: Arc<MarketEngine>, config: RelayConfig) -> Self {
        CrossDomainRelay {
            engine,
            channel_key: config.channel_key,
            trusted: RwLock::new(config.trusted_remotes.into_iter().collect()),
            remote_max_cost: config.remote_max_cost,
            counters: RelayCounters::default(),
        }
    }

    pub fn add_trusted_remote(&self, remote: TrustedRemote) {
        info!(domain = remote.domain, address = %remote.address, "trusted remote registered");
        self.trusted.write().insert(remote);
    }

    pub fn is_trusted(&self, domain: u32, address: &str) -> bool {
        self.trusted.read().contains(&TrustedRemote::new(domain, address))
    }

    /// Apply an inbound message as a trade, at most once per (source_domain, nonce)
    pub fn on_remote_message(&self, envelope: &ChannelEnvelope) -> MarketResult<TradeReceipt> {
        let result = self.apply(envelope);
        match &result {
            Ok(_) => self.counters.applied.fetch_add(1, Ordering::Relaxed),
            Err(MarketError::DuplicateMessage { .. }) => self.counters.duplicates.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.counters.rejected.fetch_add(1, Ordering::Relaxed),
        };
        result
    }

    fn apply(&self, envelope: &ChannelEnvelope) -> MarketResult<TradeReceipt> {
        self.authenticate(envelope)?;

        let bytes = envelope
            .payload_bytes()
            .map_err(|e| MarketError::MalformedPayload(e.to_string()))?;
        let payload = RelayPayload::decode(&bytes)?;

        let key = MessageKey {
            source_domain: envelope.source_domain,
            nonce: envelope.nonce,
        };
        let order = TradeOrder {
            market_id: payload.market_id,
            account: payload.account,
            side: payload.side,
            amount: payload.amount,
            max_cost: self.remote_max_cost,
        };

        let receipt = self.engine.trade_once(key, &order)?;
        info!(
            source_domain = key.source_domain,
            nonce = key.nonce,
            market_id = receipt.market_id,
            account = %receipt.account,
            cost = receipt.cost,
            "relayed bet applied"
        );
        Ok(receipt)
    }

    fn authenticate(&self, envelope: &ChannelEnvelope) -> MarketResult<()> {
        let channel_key = self.channel_key.as_ref().ok_or_else(|| {
            warn!(source_domain = envelope.source_domain, "relay message rejected: no channel key configured");
            MarketError::UntrustedChannel("no channel key configured".into())
        })?;

        if let Err(err) = envelope.verify(channel_key) {
            warn!(
                source_domain = envelope.source_domain,
                source_address = %envelope.source_address,
                nonce = envelope.nonce,
                error = %err,
                "relay message rejected: bad channel signature"
            );
            return Err(MarketError::UntrustedChannel(err.to_string()));
        }

        if !self.is_trusted(envelope.source_domain, &envelope.source_address) {
            warn!(
                source_domain = envelope.source_domain,
                source_address = %envelope.source_address,
                nonce = envelope.nonce,
                "relay message rejected: unknown remote"
            );
            return Err(MarketError::UntrustedChannel(format!(
                "{}:{} is not a trusted remote",
                envelope.source_domain, envelope.source_address
            )));
        }

        debug!(source_domain = envelope.source_domain, nonce = envelope.nonce, "relay message authenticated");
        Ok(())
    }

    pub fn is_applied(&self, source_domain: u32, nonce: u64) -> bool {
        self.engine.is_message_applied(MessageKey { source_domain, nonce })
    }

    pub fn stats(&self) -> RelayStats {
        RelayStats {
            applied: self.counters.applied.load(Ordering::Relaxed),
            duplicates: self.counters.duplicates.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            trusted_remotes: self.trusted.read().len(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::ledger::InMemoryLedger;
    use crate::market_resolve::{units, NewMarket, PricingEngine};
    use ed25519_dalek::SigningKey;

    const START: u64 = 5_000;
    const DOMAIN: u32 = 8453;
    const SENDER: &str = "0xremote-bridge";

    struct Setup {
        relay: CrossDomainRelay,
        engine: Arc<MarketEngine>,
        ledger: Arc<InMemoryLedger>,
        key: SigningKey,
        market_id: MarketId,
    }

    fn setup(remote_max_cost: Option<u128>) -> Setup {
        let key = SigningKey::from_bytes(&[3u8; 32]);
        let ledger = Arc::new(InMemoryLedger::new());
        let clock = Arc::new(ManualClock::new(START));
        let engine = Arc::new(MarketEngine::new(PricingEngine::default(), ledger.clone(), clock));
        let market_id = engine
            .create_market(NewMarket::new("ETH above 5k?", START + 600, "oracle"))
            .unwrap();

        let relay = CrossDomainRelay::new(
            engine.clone(),
            RelayConfig {
                channel_key: Some(key.verifying_key()),
                trusted_remotes: vec![TrustedRemote::new(DOMAIN, SENDER)],
                remote_max_cost,
            },
        );
        Setup { relay, engine, ledger, key, market_id }
    }

    fn envelope(s: &Setup, nonce: u64, payload: &RelayPayload) -> ChannelEnvelope {
        ChannelEnvelope::seal(&s.key, DOMAIN, SENDER, nonce, &payload.encode().unwrap())
    }

    #[test]
    fn test_payload_layout() {
        let payload = RelayPayload::new(1, "bob", 5, Side::No);
        let bytes = payload.encode().unwrap();
        // u64 + (u64 len + 3) + u128 + u32 variant
        assert_eq!(bytes.len(), 8 + 8 + 3 + 16 + 4);
        assert_eq!(RelayPayload::decode(&bytes).unwrap(), payload);
    }

    #[test]
    fn test_payload_rejects_trailing_bytes() {
        let mut bytes = RelayPayload::new(1, "bob", 5, Side::Yes).encode().unwrap();
        bytes.push(0);
        assert!(matches!(RelayPayload::decode(&bytes), Err(MarketError::MalformedPayload(_))));
        assert!(matches!(RelayPayload::decode(&[1, 2, 3]), Err(MarketError::MalformedPayload(_))));
    }

    #[test]
    fn test_payload_rejects_blank_account() {
        let bytes = RelayPayload::new(1, " ", 5, Side::Yes).encode().unwrap();
        assert!(matches!(RelayPayload::decode(&bytes), Err(MarketError::MalformedPayload(_))));
    }

    #[test]
    fn test_relayed_bet_applies_once() {
        let s = setup(None);
        s.ledger.deposit("remote-alice", units(1_000)).unwrap();
        let payload = RelayPayload::new(s.market_id, "remote-alice", units(25), Side::Yes);
        let message = envelope(&s, 7, &payload);

        let receipt = s.relay.on_remote_message(&message).unwrap();
        assert_eq!(receipt.amount, units(25));

        let again = s.relay.on_remote_message(&message);
        assert_eq!(again, Err(MarketError::DuplicateMessage { source_domain: DOMAIN, nonce: 7 }));

        let market = s.engine.market(s.market_id).unwrap();
        assert_eq!(market.yes_exposure, units(25));
        assert!(s.relay.is_applied(DOMAIN, 7));

        let stats = s.relay.stats();
        assert_eq!((stats.applied, stats.duplicates, stats.rejected), (1, 1, 0));
    }

    #[test]
    fn test_untrusted_sender_is_rejected() {
        let s = setup(None);
        let payload = RelayPayload::new(s.market_id, "remote-alice", units(1), Side::Yes);
        let message =
            ChannelEnvelope::seal(&s.key, DOMAIN, "0xsomeone-else", 1, &payload.encode().unwrap());

        assert!(matches!(s.relay.on_remote_message(&message), Err(MarketError::UntrustedChannel(_))));
        assert!(!s.relay.is_applied(DOMAIN, 1));

        s.relay.add_trusted_remote(TrustedRemote::new(DOMAIN, "0xsomeone-else"));
        assert!(s.relay.is_trusted(DOMAIN, "0xsomeone-else"));
    }

    #[test]
    fn test_trust_is_per_domain_and_address() {
        let s = setup(None);
        assert!(s.relay.is_trusted(DOMAIN, SENDER));
        assert!(!s.relay.is_trusted(DOMAIN + 1, SENDER));
        assert!(!s.relay.is_trusted(DOMAIN, "0xREMOTE-BRIDGE"));

        s.relay.add_trusted_remote(TrustedRemote::new(DOMAIN + 1, SENDER));
        assert!(s.relay.is_trusted(DOMAIN + 1, SENDER));
    }

    #[test]
    fn test_forged_signature_is_rejected() {
        let s = setup(None);
        let forger = SigningKey::from_bytes(&[4u8; 32]);
        let payload = RelayPayload::new(s.market_id, "remote-alice", units(1), Side::Yes);
        let message = ChannelEnvelope::seal(&forger, DOMAIN, SENDER, 1, &payload.encode().unwrap());

        assert!(matches!(s.relay.on_remote_message(&message), Err(MarketError::UntrustedChannel(_))));
    }

    #[test]
    fn test_missing_channel_key_rejects_everything() {
        let s = setup(None);
        let relay = CrossDomainRelay::new(s.engine.clone(), RelayConfig::default());
        let payload = RelayPayload::new(s.market_id, "remote-alice", units(1), Side::Yes);

        assert!(matches!(
            relay.on_remote_message(&envelope(&s, 1, &payload)),
            Err(MarketError::UntrustedChannel(_))
        ));
    }

    #[test]
    fn test_remote_cost_cap() {
        let s = setup(Some(units(1)));
        s.ledger.deposit("remote-alice", units(1_000)).unwrap();
        let payload = RelayPayload::new(s.market_id, "remote-alice", units(100), Side::No);

        let err = s.relay.on_remote_message(&envelope(&s, 3, &payload)).unwrap_err();
        assert!(matches!(err, MarketError::SlippageExceeded { .. }));
        assert!(!s.relay.is_applied(DOMAIN, 3));
        assert_eq!(s.relay.stats().rejected, 1);
    }

    #[test]
    fn test_malformed_payload_in_envelope() {
        let s = setup(None);
        let message = ChannelEnvelope::seal(&s.key, DOMAIN, SENDER, 9, b"garbage");
        assert!(matches!(s.relay.on_remote_message(&message), Err(MarketError::MalformedPayload(_))));
    }
}
