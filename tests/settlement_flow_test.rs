// End-to-end settlement flows on the library API

use std::sync::Arc;
use std::thread;

use blackbook_settlement::app_state::AppState;
use blackbook_settlement::{
    units, ChannelEnvelope, Config, CrossDomainRelay, InMemoryLedger, LedgerEvent, ManualClock, MarketEngine,
    MarketError, MarketStatus, NewMarket, OracleResolver, PricingEngine, RelayConfig, RelayPayload, Side,
    TrustedRemote,
};
use ed25519_dalek::SigningKey;

const START: u64 = 1_750_000_000;
const CLOSE: u64 = START + 86_400;

struct World {
    engine: Arc<MarketEngine>,
    oracle: OracleResolver,
    ledger: Arc<InMemoryLedger>,
    clock: Arc<ManualClock>,
}

fn world() -> World {
    let ledger = Arc::new(InMemoryLedger::new());
    let clock = Arc::new(ManualClock::new(START));
    let engine = Arc::new(MarketEngine::new(PricingEngine::default(), ledger.clone(), clock.clone()));
    let oracle = OracleResolver::new(engine.clone());
    World { engine, oracle, ledger, clock }
}

fn btc_market(w: &World) -> u64 {
    w.engine
        .create_market(NewMarket::new("BTC above 120k on Friday?", CLOSE, "oracle").created_by("alice"))
        .unwrap()
}

#[test]
fn test_early_resolution_is_rejected() {
    let w = world();
    let id = btc_market(&w);

    w.clock.set(CLOSE - 1);
    let err = w.oracle.resolve(id, Side::Yes, "oracle").unwrap_err();
    assert!(matches!(err, MarketError::ResolutionTooEarly { .. }));

    let market = w.engine.market(id).unwrap();
    assert!(!market.resolved);
    assert_eq!(market.outcome, None);
}

#[test]
fn test_curve_steepens_with_repeated_buys() {
    let w = world();
    let id = btc_market(&w);
    w.ledger.deposit("whale", units(100_000)).unwrap();

    let mut last_cost = 0;
    for round in 0..10 {
        let quote = w.engine.quote(id, Side::Yes, units(100)).unwrap();
        assert_eq!(quote.exposure, units(100) * round);

        let receipt = w.engine.trade(id, "whale", Side::Yes, units(100), quote.cost).unwrap();
        assert_eq!(receipt.cost, quote.cost);
        assert!(receipt.cost > last_cost, "round {} did not get more expensive", round);
        assert!(receipt.cost <= units(100));
        last_cost = receipt.cost;
    }

    let market = w.engine.market(id).unwrap();
    assert_eq!(market.yes_exposure, units(1_000));
    assert_eq!(market.no_exposure, 0);
    // the untouched side still quotes at the opening price
    let fresh_no = w.engine.quote(id, Side::No, units(100)).unwrap();
    let first_yes = PricingEngine::default().cost(0, units(100)).unwrap();
    assert_eq!(fresh_no.cost, first_yes);
}

#[test]
fn test_winner_claims_once() {
    let w = world();
    let id = btc_market(&w);
    w.ledger.deposit("bob", units(1_000)).unwrap();
    w.ledger.deposit("carol", units(1_000)).unwrap();

    let bob = w.engine.trade(id, "bob", Side::Yes, units(100), u128::MAX).unwrap();
    let carol = w.engine.trade(id, "carol", Side::No, units(60), u128::MAX).unwrap();

    w.clock.set(CLOSE);
    assert_eq!(w.engine.status(id).unwrap(), MarketStatus::Expired);
    w.oracle.resolve(id, Side::Yes, "oracle").unwrap();
    assert_eq!(w.engine.status(id).unwrap(), MarketStatus::Resolved);

    let receipt = w.engine.claim(id, "bob").unwrap();
    assert_eq!(receipt.winning_shares, units(100));
    assert_eq!(receipt.payout, bob.cost + carol.cost);
    assert_eq!(w.ledger.balance("bob"), units(1_000) - bob.cost + receipt.payout);

    let again = w.engine.claim(id, "bob").unwrap_err();
    assert_eq!(again, MarketError::AlreadyClaimed { market_id: id, account: "bob".into() });
    assert_eq!(w.ledger.balance("bob"), units(1_000) - bob.cost + receipt.payout);

    let loser = w.engine.claim(id, "carol").unwrap();
    assert_eq!(loser.payout, 0);
    assert!(w.engine.position(id, "carol").unwrap().claimed);
}

#[test]
fn test_payouts_never_exceed_collateral() {
    let w = world();
    let id = btc_market(&w);
    let traders = ["t1", "t2", "t3", "t4", "t5", "t6", "t7"];
    for (i, trader) in traders.iter().enumerate() {
        w.ledger.deposit(trader, units(10_000)).unwrap();
        let side = if i % 3 == 0 { Side::No } else { Side::Yes };
        // odd sizes so the pro-rata split has remainders
        let amount = units(37) + 1_234_567 * (i as u128 + 1);
        w.engine.trade(id, trader, side, amount, u128::MAX).unwrap();
    }

    w.clock.set(CLOSE + 5);
    w.oracle.resolve(id, Side::Yes, "oracle").unwrap();

    let paid: u128 = traders
        .iter()
        .map(|t| w.engine.claim(id, t).unwrap().payout)
        .sum();
    let market = w.engine.market(id).unwrap();
    assert!(paid <= market.collateral);
    assert_eq!(market.paid_out, paid);
    // rounding dust is at most one unit per winner
    assert!(market.collateral - paid < traders.len() as u128);
}

#[test]
fn test_value_is_conserved_under_concurrent_trading() {
    let w = world();
    let id = btc_market(&w);
    let engine = w.engine.clone();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = engine.clone();
            let ledger = w.ledger.clone();
            thread::spawn(move || {
                let account = format!("trader-{}", i);
                ledger.deposit(&account, units(5_000)).unwrap();
                let side = if i % 2 == 0 { Side::Yes } else { Side::No };
                for _ in 0..25 {
                    engine.trade(id, &account, side, units(10), u128::MAX).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let market = w.engine.market(id).unwrap();
    assert_eq!(market.yes_exposure, units(10) * 25 * 4);
    assert_eq!(market.no_exposure, units(10) * 25 * 4);
    assert_eq!(w.ledger.total_supply() + market.collateral, units(5_000) * 8);

    let bets = w
        .engine
        .events()
        .for_market(id)
        .into_iter()
        .filter(|r| matches!(r.event, LedgerEvent::BetPlaced { .. }))
        .count();
    assert_eq!(bets, 200);
}

#[test]
fn test_events_follow_the_lifecycle() {
    let w = world();
    let id = btc_market(&w);
    w.ledger.deposit("dave", units(50)).unwrap();
    w.engine.trade(id, "dave", Side::No, units(10), u128::MAX).unwrap();
    w.clock.set(CLOSE);
    w.oracle.resolve(id, Side::No, "oracle").unwrap();
    w.engine.claim(id, "dave").unwrap();

    let records = w.engine.events().since(0);
    let kinds: Vec<&str> = records
        .iter()
        .map(|r| match r.event {
            LedgerEvent::MarketCreated { .. } => "created",
            LedgerEvent::BetPlaced { .. } => "bet",
            LedgerEvent::MarketResolved { .. } => "resolved",
            LedgerEvent::Claimed { .. } => "claimed",
        })
        .collect();
    assert_eq!(kinds, vec!["created", "bet", "resolved", "claimed"]);
    assert!(records.windows(2).all(|pair| pair[0].sequence < pair[1].sequence));
}

#[test]
fn test_relayed_bet_redelivery_applies_once() {
    let w = world();
    let id = btc_market(&w);
    w.ledger.deposit("0xabc", units(1_000)).unwrap();

    let channel = SigningKey::from_bytes(&[21u8; 32]);
    let relay = CrossDomainRelay::new(
        w.engine.clone(),
        RelayConfig {
            channel_key: Some(channel.verifying_key()),
            trusted_remotes: vec![TrustedRemote::new(10, "0xbridge")],
            remote_max_cost: None,
        },
    );

    let payload = RelayPayload::new(id, "0xabc", units(20), Side::Yes).encode().unwrap();
    let envelope = ChannelEnvelope::seal(&channel, 10, "0xbridge", 77, &payload);

    relay.on_remote_message(&envelope).unwrap();
    for _ in 0..3 {
        assert!(matches!(
            relay.on_remote_message(&envelope),
            Err(MarketError::DuplicateMessage { source_domain: 10, nonce: 77 })
        ));
    }

    assert_eq!(w.engine.market(id).unwrap().yes_exposure, units(20));
    assert_eq!(w.engine.position(id, "0xabc").unwrap().yes_amount, units(20));

    // same nonce from another domain is a different message
    let other = ChannelEnvelope::seal(&channel, 11, "0xbridge", 77, &payload);
    relay.add_trusted_remote(TrustedRemote::new(11, "0xbridge"));
    relay.on_remote_message(&other).unwrap();
    assert_eq!(w.engine.market(id).unwrap().yes_exposure, units(40));
}

#[test]
fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        snapshot_path: dir.path().join("settlement.json"),
        ..Config::default()
    };

    let clock = Arc::new(ManualClock::new(START));
    let state = AppState::in_memory(config.clone(), clock.clone()).unwrap();
    let id = state
        .engine
        .create_market(NewMarket::new("Persisted?", u64::MAX, "oracle"))
        .unwrap();
    state.ledger.deposit("erin", units(100)).unwrap();
    let receipt = state.engine.trade(id, "erin", Side::Yes, units(10), u128::MAX).unwrap();
    state.save_to_disk().unwrap();

    let restored = AppState::load(config).unwrap();
    let market = restored.engine.market(id).unwrap();
    assert_eq!(market.yes_exposure, units(10));
    assert_eq!(market.collateral, receipt.cost);
    assert_eq!(restored.ledger.balance("erin"), units(100) - receipt.cost);
    assert_eq!(restored.engine.position(id, "erin").unwrap().cost_basis, receipt.cost);

    // ids keep counting from where they stopped
    let next = restored
        .engine
        .create_market(NewMarket::new("Second", u64::MAX, "oracle"))
        .unwrap();
    assert_eq!(next, id + 1);
}
