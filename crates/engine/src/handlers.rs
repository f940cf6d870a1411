//! Call handlers for the bidding engine.
//!
//! Every mutating operation takes the per-(item, round) lock for its whole
//! read-validate-write sequence. Reads used only for display go through
//! [`crate::queries`] and never take it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use proxybid_types::{
    round_cents, AuctionItem, AutobidProxy, Bid, BidKind, ItemId, NewBid, PurchaseOffer, Round,
    UserId, Workflow,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, StorageError, ValidationError, Violation};
use crate::fees::FeeSchedule;
use crate::ledger::current_highest;
use crate::phase::resolve;
use crate::resolver::{counter_amount, opening_amount, reconcile, strongest_rival};
use crate::storage::{AllowAll, Authorizer, EngineEvent, NoopNotifier, Notifier, Storage};
use crate::validator::{validate_bid, validate_buy_now, validate_ceiling, BidCandidate, RuleContext};

/// Context provided by the caller for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallContext {
    /// Authenticated user making the request
    pub user: UserId,
    /// Current time
    pub now: DateTime<Utc>,
}

impl CallContext {
    pub fn new(user: UserId, now: DateTime<Utc>) -> Self {
        Self { user, now }
    }
}

/// Result type for handlers.
pub type HandlerResult<T> = Result<T, EngineError>;

/// An accepted bid plus the Auto bid a rival proxy answered it with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BidReceipt {
    pub bid: Bid,
    pub counter: Option<Bid>,
}

impl BidReceipt {
    /// Whoever holds the lead once this submission settled.
    pub fn leader(&self) -> UserId {
        self.counter.as_ref().unwrap_or(&self.bid).user_id
    }
}

/// The bidding engine.
///
/// Owns no bid data itself: everything lives behind the [`Storage`]
/// collaborator, so several engines may share one store only if they also
/// share this engine's lock registry. Use one engine per store.
pub struct BiddingEngine<S: Storage> {
    store: Arc<S>,
    config: EngineConfig,
    fees: FeeSchedule,
    authorizer: Box<dyn Authorizer>,
    notifier: Box<dyn Notifier>,
    locks: Mutex<HashMap<(ItemId, Round), Arc<Mutex<()>>>>,
}

impl<S: Storage> BiddingEngine<S> {
    /// Create an engine that lets everyone bid and drops notifications.
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        let fees = FeeSchedule::from_ranges(config.fee_ranges.clone());
        Self {
            store,
            config,
            fees,
            authorizer: Box::new(AllowAll),
            notifier: Box::new(NoopNotifier),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_authorizer<A: Authorizer + 'static>(mut self, authorizer: A) -> Self {
        self.authorizer = Box::new(authorizer);
        self
    }

    pub fn with_notifier<N: Notifier + 'static>(mut self, notifier: N) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    /// Register fee providers or overrides.
    pub fn fees_mut(&mut self) -> &mut FeeSchedule {
        &mut self.fees
    }

    /// Lock for the item's current round.
    ///
    /// Only rounds that passed [`Self::load_round`] get an entry, and entries
    /// for rounds the item has moved past are dropped when a new one is made.
    fn round_lock(&self, item: &AuctionItem) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        let key = (item.id, item.relist_count);
        if !locks.contains_key(&key) {
            locks.retain(|(id, round), _| *id != item.id || *round >= item.relist_count);
        }
        locks.entry(key).or_default().clone()
    }

    fn authorize(&self, ctx: &CallContext) -> HandlerResult<()> {
        if !self.authorizer.may_bid(ctx.user) {
            warn!(user = ctx.user, "Bidding denied by authorizer");
            return Err(EngineError::NotAuthorized);
        }
        Ok(())
    }

    fn load_item(&self, item_id: ItemId) -> HandlerResult<AuctionItem> {
        self.store
            .item(item_id)?
            .ok_or(EngineError::ItemNotFound(item_id))
    }

    fn load_round(&self, item_id: ItemId, round: Round) -> HandlerResult<AuctionItem> {
        let item = self.load_item(item_id)?;
        if item.relist_count != round {
            return Err(EngineError::RoundMismatch {
                expected: item.relist_count,
                got: round,
            });
        }
        Ok(item)
    }

    fn reject(&self, item_id: ItemId, user: UserId, violations: Vec<Violation>) -> EngineError {
        let err = ValidationError::new(violations);
        warn!(item_id, user, reason = %err, "Request rejected");
        err.into()
    }

    fn notify_outbid(
        &self,
        item_id: ItemId,
        round: Round,
        previous: Option<UserId>,
        new_leader: UserId,
        amount: Decimal,
    ) {
        if let Some(previous_leader) = previous.filter(|p| *p != new_leader) {
            self.notifier.notify(&EngineEvent::Outbid {
                item_id,
                round,
                previous_leader,
                new_leader,
                amount,
            });
        }
    }

    /// Handle a manual or instant bid.
    pub fn place_bid(
        &self,
        ctx: &CallContext,
        item_id: ItemId,
        round: Round,
        amount: Decimal,
        kind: BidKind,
    ) -> HandlerResult<BidReceipt> {
        self.authorize(ctx)?;
        let amount = round_cents(amount);

        let lock = self.round_lock(&self.load_round(item_id, round)?);
        let _guard = lock.lock();

        let item = self.load_round(item_id, round)?;
        let status = resolve(ctx.now, &item.window);
        let current = current_highest(self.store.as_ref(), &item, round)?;

        let candidate = BidCandidate {
            user_id: ctx.user,
            amount,
            kind,
        };
        let rules = RuleContext {
            item: &item,
            status: &status,
            current: &current,
        };
        let violations = validate_bid(&rules, &candidate);
        if !violations.is_empty() {
            return Err(self.reject(item_id, ctx.user, violations));
        }

        let mut batch = vec![NewBid {
            item_id,
            user_id: ctx.user,
            amount,
            kind,
            purchase_offer: PurchaseOffer::NotApplicable,
            round,
            created_at: ctx.now,
        }];

        // Single-level counter from the strongest rival proxy, written in the
        // same batch as the bid it answers.
        if self.config.autobid_enabled {
            let proxies = self.store.active_proxies(item_id, round)?;
            if let Some(rival) = strongest_rival(&proxies, ctx.user, self.config.proxy_ordering) {
                if let Some(counter) = counter_amount(amount, rival.ceiling, item.bid_step) {
                    debug!(item_id, round, rival = rival.user_id, %counter, "Proxy counters bid");
                    batch.push(NewBid {
                        item_id,
                        user_id: rival.user_id,
                        amount: counter,
                        kind: BidKind::Auto,
                        purchase_offer: PurchaseOffer::NotApplicable,
                        round,
                        created_at: ctx.now,
                    });
                }
            }
        }

        let mut written = self.store.append(batch)?.into_iter();
        let bid = written
            .next()
            .ok_or_else(|| StorageError("Ledger returned no bid".into()))?;
        let receipt = BidReceipt {
            bid,
            counter: written.next(),
        };

        info!(
            item_id,
            round,
            user = ctx.user,
            %amount,
            countered = receipt.counter.is_some(),
            "Bid accepted"
        );

        let leader = receipt.leader();
        let top = receipt.counter.as_ref().unwrap_or(&receipt.bid).amount;
        self.notify_outbid(item_id, round, current.lead_user(), leader, top);
        if leader != ctx.user {
            self.notify_outbid(item_id, round, Some(ctx.user), leader, top);
        }

        Ok(receipt)
    }

    /// Handle an instant purchase at the buy-now price. Ends the round.
    pub fn place_buy_now(&self, ctx: &CallContext, item_id: ItemId) -> HandlerResult<Bid> {
        self.authorize(ctx)?;

        let listed = self.load_item(item_id)?;
        let round = listed.relist_count;
        let lock = self.round_lock(&listed);
        let _guard = lock.lock();

        // Reload under the lock; a relist may have raced the first read.
        let item = self.load_round(item_id, round)?;
        let status = resolve(ctx.now, &item.window);
        let violations = validate_buy_now(&item, &status);
        if !violations.is_empty() {
            return Err(self.reject(item_id, ctx.user, violations));
        }

        let previous = current_highest(self.store.as_ref(), &item, round)?.lead_user();

        let purchase = NewBid {
            item_id,
            user_id: ctx.user,
            amount: round_cents(item.buy_now_price),
            kind: BidKind::Instant,
            purchase_offer: PurchaseOffer::Purchased,
            round,
            created_at: ctx.now,
        };
        let bid = self.store.append_closing(purchase, Workflow::Finished)?;

        info!(item_id, round, user = ctx.user, amount = %bid.amount, "Item bought instantly");

        self.notify_outbid(item_id, round, previous, ctx.user, bid.amount);
        self.notifier.notify(&EngineEvent::Closed {
            item_id,
            round,
            buyer: ctx.user,
            amount: bid.amount,
        });

        Ok(bid)
    }

    /// Handle creating or changing the caller's proxy ceiling.
    pub fn set_proxy(
        &self,
        ctx: &CallContext,
        item_id: ItemId,
        round: Round,
        ceiling: Decimal,
    ) -> HandlerResult<AutobidProxy> {
        self.authorize(ctx)?;
        let ceiling = round_cents(ceiling);

        let lock = self.round_lock(&self.load_round(item_id, round)?);
        let _guard = lock.lock();

        let item = self.load_round(item_id, round)?;
        let status = resolve(ctx.now, &item.window);
        let current = current_highest(self.store.as_ref(), &item, round)?;

        let rules = RuleContext {
            item: &item,
            status: &status,
            current: &current,
        };
        let violations = validate_ceiling(&rules, ceiling, self.config.autobid_enabled);
        if !violations.is_empty() {
            return Err(self.reject(item_id, ctx.user, violations));
        }

        let previous = self.store.active_proxy(item_id, round, ctx.user)?;
        let proxy = match &previous {
            Some(existing) => AutobidProxy {
                ceiling,
                updated_at: ctx.now,
                ..existing.clone()
            },
            None => AutobidProxy {
                id: 0,
                item_id,
                user_id: ctx.user,
                ceiling,
                round,
                active: true,
                created_at: ctx.now,
                updated_at: ctx.now,
            },
        };
        let saved = self.store.put_proxy(proxy)?;

        info!(
            item_id,
            round,
            user = ctx.user,
            proxy_id = saved.id,
            %ceiling,
            raised = previous.is_some(),
            "Proxy set"
        );

        // A rival whose ceiling the round has already passed cannot compete.
        let mut proxies = self.store.active_proxies(item_id, round)?;
        proxies.retain(|p| p.ceiling > current.min_price);

        let bids = match strongest_rival(&proxies, ctx.user, self.config.proxy_ordering) {
            Some(rival) => {
                let outcome =
                    reconcile(ceiling, rival.ceiling, item.bid_step).floored_at(current.min_price);
                debug!(
                    item_id,
                    round,
                    rival = rival.user_id,
                    leader = ?outcome.leader,
                    leader_amount = %outcome.leader_amount,
                    trailing_amount = %outcome.trailing_amount,
                    "Proxies reconciled"
                );
                outcome.into_bids(item_id, round, ctx.user, rival.user_id, ctx.now)
            }
            None => match current.lead_user() {
                Some(lead) if lead != ctx.user => {
                    let amount = opening_amount(current.min_price, ceiling, item.bid_step);
                    debug!(item_id, round, %amount, "No competing proxy, bidding over the lead");
                    vec![NewBid {
                        item_id,
                        user_id: ctx.user,
                        amount,
                        kind: BidKind::Auto,
                        purchase_offer: PurchaseOffer::NotApplicable,
                        round,
                        created_at: ctx.now,
                    }]
                }
                _ => {
                    debug!(item_id, round, "Nothing to reconcile against");
                    return Ok(saved);
                }
            },
        };

        if let Err(err) = self.store.append(bids) {
            warn!(item_id, round, user = ctx.user, error = %err, "Proxy bid write failed, restoring proxy");
            let restored = match previous {
                Some(old) => self.store.put_proxy(old).map(|_| ()),
                None => self.store.delete_proxy(&saved),
            };
            if let Err(restore_err) = restored {
                warn!(item_id, round, user = ctx.user, error = %restore_err, "Proxy restore failed");
            }
            return Err(err.into());
        }

        let after = current_highest(self.store.as_ref(), &item, round)?;
        if let Some(leader) = after.lead_user() {
            let previous_lead = current.lead_user();
            self.notify_outbid(item_id, round, previous_lead, leader, after.min_price);
            if previous_lead != Some(ctx.user) {
                self.notify_outbid(item_id, round, Some(ctx.user), leader, after.min_price);
            }
        }

        Ok(saved)
    }

    /// Handle deactivating the caller's proxy. Returns whether one was active.
    pub fn remove_proxy(
        &self,
        ctx: &CallContext,
        item_id: ItemId,
        round: Round,
    ) -> HandlerResult<bool> {
        let lock = self.round_lock(&self.load_round(item_id, round)?);
        let _guard = lock.lock();

        self.load_round(item_id, round)?;

        let Some(proxy) = self.store.active_proxy(item_id, round, ctx.user)? else {
            return Ok(false);
        };

        self.store.put_proxy(AutobidProxy {
            active: false,
            updated_at: ctx.now,
            ..proxy
        })?;

        info!(item_id, round, user = ctx.user, "Proxy removed");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Rule;
    use crate::state::MemoryStore;
    use crate::storage::{BidLedger, ItemDirectory, ProxyStore};
    use chrono::{Duration, TimeZone};
    use proxybid_types::OpenWindow;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 1, 8, 0, 0).unwrap()
    }

    fn item() -> AuctionItem {
        AuctionItem {
            id: 1,
            name: "guitar".into(),
            owner: 100,
            starting_price: Decimal::from(20),
            buy_now_price: Decimal::from(500),
            bid_step: Decimal::from(10),
            threshold_percent: Decimal::from(80),
            instant_only: false,
            currency: "USD".into(),
            workflow: Workflow::Active,
            window: OpenWindow::new(start(), start() + Duration::days(3)),
            relist_count: 0,
        }
    }

    fn engine() -> BiddingEngine<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.insert_item(item());
        BiddingEngine::new(store, EngineConfig::default())
    }

    fn ctx(user: UserId, minutes: i64) -> CallContext {
        CallContext::new(user, start() + Duration::minutes(minutes))
    }

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    fn rules_of(err: &EngineError) -> Vec<Rule> {
        err.validation()
            .map(|v| v.violations.iter().map(|v| v.rule).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_place_bid_accepted() {
        let engine = engine();
        let receipt = engine
            .place_bid(&ctx(2, 1), 1, 0, d(30), BidKind::Standard)
            .unwrap();
        assert_eq!(receipt.bid.amount, d(30));
        assert!(receipt.counter.is_none());
        assert_eq!(receipt.leader(), 2);
    }

    #[test]
    fn test_self_outbid_rejected() {
        let engine = engine();
        engine
            .place_bid(&ctx(2, 1), 1, 0, d(30), BidKind::Standard)
            .unwrap();
        let err = engine
            .place_bid(&ctx(2, 2), 1, 0, d(40), BidKind::Standard)
            .unwrap_err();
        assert_eq!(rules_of(&err), vec![Rule::SelfOutbid]);
    }

    #[test]
    fn test_round_mismatch() {
        let engine = engine();
        let err = engine
            .place_bid(&ctx(2, 1), 1, 3, d(30), BidKind::Standard)
            .unwrap_err();
        assert_eq!(err, EngineError::RoundMismatch { expected: 0, got: 3 });
    }

    #[test]
    fn test_unknown_item() {
        let engine = engine();
        let err = engine
            .place_bid(&ctx(2, 1), 9, 0, d(30), BidKind::Standard)
            .unwrap_err();
        assert_eq!(err, EngineError::ItemNotFound(9));
    }

    #[test]
    fn test_manual_bid_is_countered_once() {
        let engine = engine();
        engine.set_proxy(&ctx(3, 1), 1, 0, d(80)).unwrap();

        let receipt = engine
            .place_bid(&ctx(2, 2), 1, 0, d(50), BidKind::Standard)
            .unwrap();
        let counter = receipt.counter.unwrap();
        assert_eq!(counter.user_id, 3);
        assert_eq!(counter.amount, d(60));
        assert_eq!(counter.kind, BidKind::Auto);
        assert_eq!(engine.store().bid_count(1, 0), 2);
    }

    #[test]
    fn test_counter_capped_at_ceiling() {
        let engine = engine();
        engine.set_proxy(&ctx(3, 1), 1, 0, d(55)).unwrap();
        let receipt = engine
            .place_bid(&ctx(2, 2), 1, 0, d(50), BidKind::Standard)
            .unwrap();
        assert_eq!(receipt.counter.map(|b| b.amount), Some(d(55)));
    }

    #[test]
    fn test_no_counter_when_proxies_disabled() {
        let store = Arc::new(MemoryStore::new());
        store.insert_item(item());
        let now = start();
        store
            .put_proxy(AutobidProxy {
                id: 0,
                item_id: 1,
                user_id: 3,
                ceiling: d(90),
                round: 0,
                active: true,
                created_at: now,
                updated_at: now,
            })
            .unwrap();
        let config = EngineConfig {
            autobid_enabled: false,
            ..Default::default()
        };
        let engine = BiddingEngine::new(store, config);

        let receipt = engine
            .place_bid(&ctx(2, 2), 1, 0, d(50), BidKind::Standard)
            .unwrap();
        assert!(receipt.counter.is_none());

        let err = engine.set_proxy(&ctx(4, 3), 1, 0, d(200)).unwrap_err();
        assert_eq!(rules_of(&err), vec![Rule::ProxiesDisabled]);
    }

    #[test]
    fn test_equal_ceilings_reconcile() {
        let engine = engine();
        engine.set_proxy(&ctx(3, 1), 1, 0, d(100)).unwrap();
        engine.set_proxy(&ctx(4, 2), 1, 0, d(100)).unwrap();

        let bids = engine.store().bids_for(1, 0).unwrap();
        assert_eq!(bids.len(), 2);
        assert_eq!((bids[0].user_id, bids[0].amount), (4, d(100)));
        assert_eq!((bids[1].user_id, bids[1].amount), (3, d(90)));
        assert!(bids.iter().all(|b| b.kind == BidKind::Auto && b.round == 0));
    }

    #[test]
    fn test_raise_updates_in_place() {
        let engine = engine();
        let first = engine.set_proxy(&ctx(3, 1), 1, 0, d(100)).unwrap();
        let raised = engine.set_proxy(&ctx(3, 2), 1, 0, d(150)).unwrap();
        assert_eq!(first.id, raised.id);
        assert_eq!(raised.ceiling, d(150));
        assert_eq!(raised.created_at, first.created_at);
        assert_eq!(engine.store().active_proxies(1, 0).unwrap().len(), 1);
    }

    #[test]
    fn test_ceiling_must_exceed_current_price() {
        let engine = engine();
        engine
            .place_bid(&ctx(2, 1), 1, 0, d(60), BidKind::Standard)
            .unwrap();
        let err = engine.set_proxy(&ctx(3, 2), 1, 0, d(60)).unwrap_err();
        assert_eq!(rules_of(&err), vec![Rule::CeilingTooLow]);
    }

    #[test]
    fn test_remove_proxy() {
        let engine = engine();
        engine.set_proxy(&ctx(3, 1), 1, 0, d(100)).unwrap();
        assert!(engine.remove_proxy(&ctx(3, 2), 1, 0).unwrap());
        assert!(!engine.remove_proxy(&ctx(3, 3), 1, 0).unwrap());

        let receipt = engine
            .place_bid(&ctx(2, 4), 1, 0, d(50), BidKind::Standard)
            .unwrap();
        assert!(receipt.counter.is_none());
    }

    #[test]
    fn test_buy_now_finishes_item() {
        let engine = engine();
        let bid = engine.place_buy_now(&ctx(5, 10), 1).unwrap();
        assert_eq!(bid.amount, d(500));
        assert_eq!(bid.purchase_offer, PurchaseOffer::Purchased);
        assert_eq!(engine.store().item(1).unwrap().unwrap().workflow, Workflow::Finished);

        let err = engine
            .place_bid(&ctx(2, 11), 1, 0, d(600), BidKind::Standard)
            .unwrap_err();
        assert_eq!(rules_of(&err), vec![Rule::Finished]);

        let again = engine.place_buy_now(&ctx(6, 12), 1).unwrap_err();
        assert_eq!(rules_of(&again), vec![Rule::AuctionClosed]);
    }

    #[test]
    fn test_authorizer_denies() {
        struct DenyAll;
        impl Authorizer for DenyAll {
            fn may_bid(&self, _user_id: UserId) -> bool {
                false
            }
        }

        let engine = engine().with_authorizer(DenyAll);
        let err = engine
            .place_bid(&ctx(2, 1), 1, 0, d(30), BidKind::Standard)
            .unwrap_err();
        assert_eq!(err, EngineError::NotAuthorized);
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<EngineEvent>>);

    impl Notifier for Arc<Recorder> {
        fn notify(&self, event: &EngineEvent) {
            self.0.lock().push(event.clone());
        }
    }

    #[test]
    fn test_notifier_receives_outbid() {
        let recorder = Arc::new(Recorder::default());
        let engine = engine().with_notifier(recorder.clone());
        engine
            .place_bid(&ctx(2, 1), 1, 0, d(30), BidKind::Standard)
            .unwrap();
        engine
            .place_bid(&ctx(3, 2), 1, 0, d(40), BidKind::Standard)
            .unwrap();

        let events = recorder.0.lock();
        assert_eq!(
            events.as_slice(),
            &[EngineEvent::Outbid {
                item_id: 1,
                round: 0,
                previous_leader: 2,
                new_leader: 3,
                amount: d(40),
            }]
        );
    }

    #[test]
    fn test_proxy_ignores_rival_below_current_price() {
        let recorder = Arc::new(Recorder::default());
        let engine = engine().with_notifier(recorder.clone());

        engine.set_proxy(&ctx(3, 1), 1, 0, d(60)).unwrap();
        engine
            .place_bid(&ctx(2, 2), 1, 0, d(100), BidKind::Standard)
            .unwrap();
        engine.set_proxy(&ctx(4, 3), 1, 0, d(150)).unwrap();

        // The stale 60 ceiling is not reconciled; the new proxy bids over the lead.
        let ranked = crate::ledger::highest_bids(engine.store(), 1, 0, None).unwrap();
        let summary: Vec<(UserId, Decimal, BidKind)> =
            ranked.iter().map(|b| (b.user_id, b.amount, b.kind)).collect();
        assert_eq!(
            summary,
            vec![(4, d(110), BidKind::Auto), (2, d(100), BidKind::Standard)]
        );

        let events = recorder.0.lock();
        assert_eq!(
            events.as_slice(),
            &[EngineEvent::Outbid {
                item_id: 1,
                round: 0,
                previous_leader: 2,
                new_leader: 4,
                amount: d(110),
            }]
        );
    }

    #[test]
    fn test_proxy_leader_keeps_lead_without_rival() {
        let engine = engine();
        engine
            .place_bid(&ctx(2, 1), 1, 0, d(100), BidKind::Standard)
            .unwrap();
        engine.set_proxy(&ctx(2, 2), 1, 0, d(300)).unwrap();
        assert_eq!(engine.store().bid_count(1, 0), 1);
    }

    #[test]
    fn test_reconciliation_never_bids_below_price() {
        let engine = engine();
        engine.set_proxy(&ctx(3, 1), 1, 0, d(100)).unwrap();
        engine
            .place_bid(&ctx(2, 2), 1, 0, d(95), BidKind::Standard)
            .unwrap();
        // Proxy 3 countered at 100; the round is now at 100.
        engine.set_proxy(&ctx(4, 3), 1, 0, d(100)).unwrap_err();

        engine
            .place_bid(&ctx(5, 4), 1, 0, d(100), BidKind::Standard)
            .unwrap();
        let min_before = current_highest(engine.store(), &item(), 0).unwrap().min_price;
        engine.set_proxy(&ctx(6, 5), 1, 0, d(120)).unwrap();

        let bids = engine.store().bids_for(1, 0).unwrap();
        assert_eq!(bids.len(), 4);
        let written: Vec<&Bid> = bids.iter().filter(|b| b.user_id == 6).collect();
        assert_eq!(written.len(), 1);
        assert!(written.iter().all(|b| b.amount >= min_before));
        assert_eq!(written[0].amount, d(110));
    }

    #[test]
    fn test_equal_ceiling_trailing_bid_floored_at_price() {
        let engine = engine();
        engine.set_proxy(&ctx(3, 1), 1, 0, d(100)).unwrap();
        engine
            .place_bid(&ctx(2, 2), 1, 0, d(95), BidKind::Standard)
            .unwrap();
        let ranked = crate::ledger::highest_bids(engine.store(), 1, 0, Some(1)).unwrap();
        assert_eq!((ranked[0].user_id, ranked[0].amount), (3, d(100)));

        // Proxy 3's ceiling equals the price, so it no longer competes.
        engine
            .place_bid(&ctx(7, 3), 1, 0, d(100), BidKind::Standard)
            .unwrap();
        engine.set_proxy(&ctx(8, 4), 1, 0, d(115)).unwrap();
        engine.set_proxy(&ctx(9, 5), 1, 0, d(115)).unwrap();

        // Equal ceilings would trail at 105, under the price of 110.
        let bids = engine.store().bids_for(1, 0).unwrap();
        let last_two: Vec<(UserId, Decimal)> =
            bids[bids.len() - 2..].iter().map(|b| (b.user_id, b.amount)).collect();
        assert_eq!(last_two, vec![(9, d(115)), (8, d(110))]);
    }

    #[test]
    fn test_lock_registry_only_tracks_live_rounds() {
        let engine = engine();
        for round in 0..500 {
            let _ = engine.place_bid(&ctx(2, 1), 999, round, d(30), BidKind::Standard);
            let _ = engine.place_bid(&ctx(2, 1), 1, round + 1, d(30), BidKind::Standard);
            let _ = engine.set_proxy(&ctx(2, 1), 1, round + 1, d(30));
            let _ = engine.remove_proxy(&ctx(2, 1), 999, round);
        }
        assert!(engine.locks.lock().is_empty());

        engine
            .place_bid(&ctx(2, 1), 1, 0, d(30), BidKind::Standard)
            .unwrap();
        assert_eq!(engine.locks.lock().len(), 1);

        engine.store().relist(1).unwrap();
        engine
            .place_bid(&ctx(3, 2), 1, 1, d(30), BidKind::Standard)
            .unwrap();
        let keys: Vec<(ItemId, Round)> = engine.locks.lock().keys().copied().collect();
        assert_eq!(keys, vec![(1, 1)]);
    }

    #[test]
    fn test_storage_error_propagates() {
        let err: EngineError = StorageError("disk full".into()).into();
        assert!(err.to_string().contains("disk full"));
    }
}
