//! End-to-end integration tests for the proxy-bid system.
//!
//! These tests exercise:
//! 1. A full round with manual bids, proxies and an instant purchase
//! 2. Serialization of concurrent bids and proxies on one round
//! 3. Atomic proxy reconciliation and buy-now when the store fails
//! 4. Fee providers and overrides
//! 5. The node and client over JSON-RPC

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use proxybid_engine::ledger::{current_highest, highest_bids, winner};
use proxybid_engine::queries::get_auction_state;
use proxybid_engine::{
    BidLedger, BiddingEngine, CallContext, EngineConfig, EngineError, EngineEvent, ItemDirectory,
    MemoryStore, Notifier, ProxyStore, Rule, StaticFeeRanges, StorageError,
};
use proxybid_types::{
    AuctionItem, AutobidProxy, Bid, BidKind, FeeRange, ItemId, NewBid, OpenWindow, PurchaseOffer,
    Round, UserId, Workflow,
};
use rust_decimal::Decimal;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap()
}

fn d(v: i64) -> Decimal {
    Decimal::from(v)
}

fn sample_item(id: ItemId) -> AuctionItem {
    AuctionItem {
        id,
        name: format!("lot {}", id),
        owner: 1_000,
        starting_price: d(20),
        buy_now_price: d(350),
        bid_step: d(10),
        threshold_percent: d(80),
        instant_only: false,
        currency: "USD".into(),
        workflow: Workflow::Active,
        window: OpenWindow::new(start(), start() + Duration::days(7)),
        relist_count: 0,
    }
}

fn at(user: UserId, hours: i64) -> CallContext {
    CallContext::new(user, start() + Duration::hours(hours))
}

fn engine_with(item: AuctionItem) -> BiddingEngine<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.insert_item(item);
    BiddingEngine::new(store, EngineConfig::default())
}

/// Test a full round: proxies, manual bids, countering and buy-now.
#[test]
fn test_full_round() {
    let engine = engine_with(sample_item(1));

    // Alice registers a proxy; nobody to reconcile against yet.
    let alice = engine.set_proxy(&at(10, 1), 1, 0, d(150)).unwrap();
    assert!(engine.store().bids_for(1, 0).unwrap().is_empty());

    // Bob bids manually and is countered once by Alice's proxy.
    let receipt = engine
        .place_bid(&at(11, 2), 1, 0, d(50), BidKind::Standard)
        .unwrap();
    assert_eq!(receipt.counter.as_ref().map(|b| (b.user_id, b.amount)), Some((10, d(60))));

    // Carol sets a higher ceiling and takes the lead one step above Alice.
    engine.set_proxy(&at(12, 3), 1, 0, d(300)).unwrap();
    let current = current_highest(engine.store(), &sample_item(1), 0).unwrap();
    assert_eq!(current.lead_user(), Some(12));
    assert_eq!(current.min_price, d(160));

    // Alice raises in place and now beats Carol's standing ceiling.
    let raised = engine.set_proxy(&at(10, 4), 1, 0, d(350)).unwrap();
    assert_eq!(raised.id, alice.id);
    let current = current_highest(engine.store(), &sample_item(1), 0).unwrap();
    assert_eq!(current.lead_user(), Some(10));
    assert_eq!(current.min_price, d(310));

    // Amounts of accepted bids never fall below the lead at the time.
    let bids = engine.store().bids_for(1, 0).unwrap();
    let mut top = Decimal::ZERO;
    for bid in &bids {
        top = top.max(bid.amount);
    }
    assert_eq!(top, d(310));

    // The price passed 80% of buy-now (280), so the option is hidden.
    let view = get_auction_state(engine.store(), 1, 0, start() + Duration::hours(5), false).unwrap();
    assert!(!view.buy_now_visible);
    assert_eq!(view.lead_bid_user_id, Some(10));

    // Visibility is not authorization: buy-now still goes through.
    let purchase = engine.place_buy_now(&at(13, 6), 1).unwrap();
    assert_eq!(purchase.amount, d(350));
    assert_eq!(engine.store().item(1).unwrap().unwrap().workflow, Workflow::Finished);
    assert_eq!(winner(engine.store(), 1, 0).unwrap().map(|b| b.user_id), Some(13));

    let quote = engine.fees().fee_for(purchase.amount, "USD").unwrap();
    assert_eq!(quote.total_fee, Decimal::new(2550, 2));

    // Nothing more is accepted in this round.
    let err = engine
        .place_bid(&at(11, 7), 1, 0, d(500), BidKind::Standard)
        .unwrap_err();
    assert!(err.validation().unwrap().has(Rule::Finished));
}

/// Bids after the window are refused even while the workflow is still active.
#[test]
fn test_expired_while_active() {
    let engine = engine_with(sample_item(1));
    let late = CallContext::new(5, start() + Duration::days(8));
    let err = engine
        .place_bid(&late, 1, 0, d(100), BidKind::Standard)
        .unwrap_err();
    let rules: Vec<Rule> = err
        .validation()
        .unwrap()
        .violations
        .iter()
        .map(|v| v.rule)
        .collect();
    assert_eq!(rules, vec![Rule::Expired]);
}

/// Rounds never compete with each other.
#[test]
fn test_relist_isolates_rounds() {
    let engine = engine_with(sample_item(1));
    engine
        .place_bid(&at(2, 1), 1, 0, d(90), BidKind::Standard)
        .unwrap();

    assert_eq!(engine.store().relist(1).unwrap(), 1);

    // The old round is no longer the current one.
    let err = engine
        .place_bid(&at(3, 2), 1, 0, d(100), BidKind::Standard)
        .unwrap_err();
    assert_eq!(err, EngineError::RoundMismatch { expected: 1, got: 0 });

    // The new round starts again from the starting price.
    let receipt = engine
        .place_bid(&at(3, 2), 1, 1, d(20), BidKind::Standard)
        .unwrap();
    assert_eq!(receipt.bid.round, 1);
    assert_eq!(highest_bids(engine.store(), 1, 1, None).unwrap().len(), 1);
    assert_eq!(highest_bids(engine.store(), 1, 0, None).unwrap()[0].amount, d(90));
}

/// Concurrent submissions on one round are serialized.
#[test]
fn test_concurrent_bids_from_one_user_accept_once() {
    let engine = engine_with(sample_item(1));

    let accepted = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = &engine;
                s.spawn(move || {
                    engine
                        .place_bid(&at(7, 1), 1, 0, d(50 + i), BidKind::Standard)
                        .is_ok()
                })
            })
            .collect();
        handles
            .into_iter()
            .filter_map(|h| h.join().ok())
            .filter(|accepted| *accepted)
            .count()
    });

    // Every bid after the first is a self-outbid.
    assert_eq!(accepted, 1);
    assert_eq!(engine.store().bid_count(1, 0), 1);
}

/// The price shown to readers never goes down while bids and proxies race.
#[test]
fn test_concurrent_bids_and_proxies_never_lower_the_price() {
    let engine = engine_with(sample_item(1));
    let done = AtomicBool::new(false);

    std::thread::scope(|s| {
        let watcher = s.spawn(|| {
            let mut seen = Decimal::ZERO;
            while !done.load(Ordering::SeqCst) {
                let top = highest_bids(engine.store(), 1, 0, Some(1))
                    .unwrap()
                    .first()
                    .map(|b| b.amount)
                    .unwrap_or(Decimal::ZERO);
                assert!(top >= seen, "price fell from {} to {}", seen, top);
                seen = top;
            }
        });

        let writers: Vec<_> = (0..16u64)
            .map(|user| {
                let engine = &engine;
                s.spawn(move || {
                    let amount = d(20 + ((user * 37) % 200) as i64);
                    let ctx = at(100 + user, 1);
                    for _ in 0..5 {
                        let _ = if user % 2 == 0 {
                            engine.set_proxy(&ctx, 1, 0, amount + d(15)).map(|_| ())
                        } else {
                            engine
                                .place_bid(&ctx, 1, 0, amount, BidKind::Standard)
                                .map(|_| ())
                        };
                    }
                })
            })
            .collect();

        for writer in writers {
            writer.join().unwrap();
        }
        done.store(true, Ordering::SeqCst);
        watcher.join().unwrap();
    });

    // Every accepted manual bid met the highest amount written before it.
    let mut bids = engine.store().bids_for(1, 0).unwrap();
    assert!(!bids.is_empty());
    bids.sort_by_key(|b| b.id);
    let mut top = Decimal::ZERO;
    for bid in &bids {
        if bid.kind != BidKind::Auto {
            assert!(bid.amount >= top, "bid {:?} under {}", bid, top);
        }
        top = top.max(bid.amount);
    }
}

/// Store whose writes fail on demand.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    /// Fail every two-row batch.
    fail_pairs: AtomicBool,
    /// Fail every workflow change.
    fail_workflow: AtomicBool,
    /// Fail the closing purchase write.
    fail_closing: AtomicBool,
}

impl ItemDirectory for FlakyStore {
    fn item(&self, item_id: ItemId) -> Result<Option<AuctionItem>, StorageError> {
        self.inner.item(item_id)
    }

    fn set_workflow(&self, item_id: ItemId, workflow: Workflow) -> Result<(), StorageError> {
        if self.fail_workflow.load(Ordering::SeqCst) {
            return Err(StorageError("items table unavailable".into()));
        }
        self.inner.set_workflow(item_id, workflow)
    }
}

impl BidLedger for FlakyStore {
    fn bids_for(&self, item_id: ItemId, round: Round) -> Result<Vec<Bid>, StorageError> {
        self.inner.bids_for(item_id, round)
    }

    fn append(&self, bids: Vec<NewBid>) -> Result<Vec<Bid>, StorageError> {
        if bids.len() == 2 && self.fail_pairs.load(Ordering::SeqCst) {
            return Err(StorageError("ledger unavailable".into()));
        }
        self.inner.append(bids)
    }

    fn append_closing(&self, bid: NewBid, workflow: Workflow) -> Result<Bid, StorageError> {
        if self.fail_closing.load(Ordering::SeqCst) {
            return Err(StorageError("ledger unavailable".into()));
        }
        self.inner.append_closing(bid, workflow)
    }
}

impl ProxyStore for FlakyStore {
    fn active_proxy(
        &self,
        item_id: ItemId,
        round: Round,
        user_id: UserId,
    ) -> Result<Option<AutobidProxy>, StorageError> {
        self.inner.active_proxy(item_id, round, user_id)
    }

    fn active_proxies(&self, item_id: ItemId, round: Round) -> Result<Vec<AutobidProxy>, StorageError> {
        self.inner.active_proxies(item_id, round)
    }

    fn put_proxy(&self, proxy: AutobidProxy) -> Result<AutobidProxy, StorageError> {
        self.inner.put_proxy(proxy)
    }

    fn delete_proxy(&self, proxy: &AutobidProxy) -> Result<(), StorageError> {
        self.inner.delete_proxy(proxy)
    }
}

fn flaky_engine() -> (Arc<FlakyStore>, BiddingEngine<FlakyStore>) {
    let store = Arc::new(FlakyStore::default());
    store.inner.insert_item(sample_item(1));
    let engine = BiddingEngine::new(store.clone(), EngineConfig::default());
    (store, engine)
}

fn purchases(store: &FlakyStore) -> usize {
    store
        .bids_for(1, 0)
        .unwrap()
        .iter()
        .filter(|b| b.purchase_offer == PurchaseOffer::Purchased)
        .count()
}

/// Buy-now writes the purchase and the close together or not at all.
#[test]
fn test_failed_buy_now_leaves_item_open() {
    let (store, engine) = flaky_engine();
    store.fail_closing.store(true, Ordering::SeqCst);

    for buyer in [20, 21] {
        let err = engine.place_buy_now(&at(buyer, 1), 1).unwrap_err();
        assert!(matches!(err, EngineError::Storage(_)));
    }
    assert_eq!(purchases(&store), 0);
    assert_eq!(store.item(1).unwrap().unwrap().workflow, Workflow::Active);

    store.fail_closing.store(false, Ordering::SeqCst);
    engine.place_buy_now(&at(22, 2), 1).unwrap();
    assert_eq!(purchases(&store), 1);
}

/// A broken workflow write elsewhere cannot sell the item twice.
#[test]
fn test_buy_now_sells_once_without_workflow_writes() {
    let (store, engine) = flaky_engine();
    store.fail_workflow.store(true, Ordering::SeqCst);

    engine.place_buy_now(&at(20, 1), 1).unwrap();
    let err = engine.place_buy_now(&at(21, 2), 1).unwrap_err();
    assert!(err.validation().unwrap().has(Rule::AuctionClosed));
    assert_eq!(purchases(&store), 1);
    assert_eq!(store.item(1).unwrap().unwrap().workflow, Workflow::Finished);
}

/// A failed reconciliation write leaves no Auto bid and restores proxies.
#[test]
fn test_failed_reconciliation_rolls_back() {
    let (store, engine) = flaky_engine();

    engine.set_proxy(&at(10, 1), 1, 0, d(100)).unwrap();
    engine.set_proxy(&at(11, 2), 1, 0, d(120)).unwrap();
    assert_eq!(store.inner.bid_count(1, 0), 2);

    store.fail_pairs.store(true, Ordering::SeqCst);

    // A brand new proxy is removed again.
    let err = engine.set_proxy(&at(12, 3), 1, 0, d(200)).unwrap_err();
    assert!(matches!(err, EngineError::Storage(_)));
    assert!(store.active_proxy(1, 0, 12).unwrap().is_none());

    // A raise falls back to the previous ceiling.
    let err = engine.set_proxy(&at(10, 4), 1, 0, d(180)).unwrap_err();
    assert!(matches!(err, EngineError::Storage(_)));
    assert_eq!(store.active_proxy(1, 0, 10).unwrap().map(|p| p.ceiling), Some(d(100)));

    // No partial writes.
    assert_eq!(store.inner.bid_count(1, 0), 2);

    // A manual bid answered by a proxy is one batch, so it fails as a whole too.
    let err = engine
        .place_bid(&at(13, 5), 1, 0, d(115), BidKind::Standard)
        .unwrap_err();
    assert!(matches!(err, EngineError::Storage(_)));
    assert_eq!(store.inner.bid_count(1, 0), 2);
}

/// Providers contribute in order, overrides run in order.
#[test]
fn test_fee_providers_and_overrides() {
    let store = Arc::new(MemoryStore::new());
    let config = EngineConfig {
        fee_ranges: vec![FeeRange::new(d(0), Decimal::new(3, 2), d(15))],
        ..Default::default()
    };
    let mut engine = BiddingEngine::new(store, config);

    engine
        .fees_mut()
        .register_provider(StaticFeeRanges(vec![FeeRange::new(
            d(10_000),
            Decimal::new(25, 3),
            d(50),
        )]))
        .add_override(|ranges| {
            for range in ranges.iter_mut() {
                range.single_auction_fee += d(5);
            }
        })
        .add_override(|ranges| ranges.retain(|r| r.from < d(10_000)));

    let table = engine.fees().table().unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table[0].single_auction_fee, d(20));

    let quote = engine.fees().fee_for(d(20_000), "EUR").unwrap();
    assert_eq!(quote.fraction, Decimal::new(3, 2));
    assert_eq!(quote.total_fee, d(620));
    assert_eq!(quote.currency, "EUR");
}

/// Notifications fire after commits.
#[test]
fn test_outbid_notifications_from_proxies() {
    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<EngineEvent>>>);

    impl Notifier for Recorder {
        fn notify(&self, event: &EngineEvent) {
            self.0.lock().push(event.clone());
        }
    }

    let recorder = Recorder::default();
    let store = Arc::new(MemoryStore::new());
    store.insert_item(sample_item(1));
    let engine = BiddingEngine::new(store, EngineConfig::default()).with_notifier(recorder.clone());

    engine.set_proxy(&at(10, 1), 1, 0, d(100)).unwrap();
    engine
        .place_bid(&at(11, 2), 1, 0, d(40), BidKind::Standard)
        .unwrap();

    let events = recorder.0.lock();
    assert_eq!(
        events.as_slice(),
        &[EngineEvent::Outbid {
            item_id: 1,
            round: 0,
            previous_leader: 11,
            new_leader: 10,
            amount: d(50),
        }]
    );
}
