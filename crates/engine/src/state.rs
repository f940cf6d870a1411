//! In-memory storage for the engine.

use std::collections::HashMap;

use parking_lot::RwLock;
use proxybid_types::{
    AuctionItem, AutobidProxy, Bid, BidId, ItemId, NewBid, ProxyId, Round, UserId, Workflow,
};

use crate::error::StorageError;
use crate::storage::{BidLedger, ItemDirectory, ProxyStore};

/// Store contents.
///
/// A real deployment backs the storage traits with a database; this is the
/// in-memory representation used by the node and by tests.
#[derive(Debug, Default)]
pub struct StoreState {
    /// Next bid ID to assign
    pub next_bid_id: BidId,

    /// Next proxy ID to assign
    pub next_proxy_id: ProxyId,

    /// Items by ID
    pub items: HashMap<ItemId, AuctionItem>,

    /// Bids: (item_id, round) -> bids in insertion order
    pub bids: HashMap<(ItemId, Round), Vec<Bid>>,

    /// Proxies by ID, active or not
    pub proxies: HashMap<ProxyId, AutobidProxy>,
}

impl StoreState {
    /// Get the next bid ID and increment.
    pub fn allocate_bid_id(&mut self) -> BidId {
        let id = self.next_bid_id;
        self.next_bid_id += 1;
        id
    }

    /// Get the next proxy ID and increment.
    pub fn allocate_proxy_id(&mut self) -> ProxyId {
        let id = self.next_proxy_id;
        self.next_proxy_id += 1;
        id
    }
}

/// Thread-safe in-memory store implementing every storage trait.
#[derive(Debug)]
pub struct MemoryStore {
    inner: RwLock<StoreState>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreState {
                next_bid_id: 1,
                next_proxy_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Register or replace an item.
    pub fn insert_item(&self, item: AuctionItem) {
        self.inner.write().items.insert(item.id, item);
    }

    /// All items, ordered by ID.
    pub fn items(&self) -> Vec<AuctionItem> {
        let state = self.inner.read();
        let mut items: Vec<AuctionItem> = state.items.values().cloned().collect();
        items.sort_by_key(|item| item.id);
        items
    }

    /// Open a new round for an item and return it.
    pub fn relist(&self, item_id: ItemId) -> Result<Round, StorageError> {
        let mut state = self.inner.write();
        let item = state
            .items
            .get_mut(&item_id)
            .ok_or_else(|| StorageError(format!("Item {} does not exist", item_id)))?;
        item.relist_count += 1;
        item.workflow = Workflow::Relisted;
        Ok(item.relist_count)
    }

    /// Number of bids stored for a round, rejected offers included.
    pub fn bid_count(&self, item_id: ItemId, round: Round) -> usize {
        self.inner
            .read()
            .bids
            .get(&(item_id, round))
            .map(|v| v.len())
            .unwrap_or(0)
    }
}

impl ItemDirectory for MemoryStore {
    fn item(&self, item_id: ItemId) -> Result<Option<AuctionItem>, StorageError> {
        Ok(self.inner.read().items.get(&item_id).cloned())
    }

    fn set_workflow(&self, item_id: ItemId, workflow: Workflow) -> Result<(), StorageError> {
        let mut state = self.inner.write();
        let item = state
            .items
            .get_mut(&item_id)
            .ok_or_else(|| StorageError(format!("Item {} does not exist", item_id)))?;
        item.workflow = workflow;
        Ok(())
    }
}

impl BidLedger for MemoryStore {
    fn bids_for(&self, item_id: ItemId, round: Round) -> Result<Vec<Bid>, StorageError> {
        Ok(self
            .inner
            .read()
            .bids
            .get(&(item_id, round))
            .cloned()
            .unwrap_or_default())
    }

    fn append(&self, bids: Vec<NewBid>) -> Result<Vec<Bid>, StorageError> {
        let mut state = self.inner.write();
        let mut written = Vec::with_capacity(bids.len());
        for new in bids {
            let id = state.allocate_bid_id();
            let bid = Bid::from_new(id, new);
            state
                .bids
                .entry((bid.item_id, bid.round))
                .or_default()
                .push(bid.clone());
            written.push(bid);
        }
        Ok(written)
    }

    fn append_closing(&self, new: NewBid, workflow: Workflow) -> Result<Bid, StorageError> {
        let mut state = self.inner.write();
        if !state.items.contains_key(&new.item_id) {
            return Err(StorageError(format!("Item {} does not exist", new.item_id)));
        }

        let id = state.allocate_bid_id();
        let bid = Bid::from_new(id, new);
        state
            .bids
            .entry((bid.item_id, bid.round))
            .or_default()
            .push(bid.clone());
        if let Some(item) = state.items.get_mut(&bid.item_id) {
            item.workflow = workflow;
        }
        Ok(bid)
    }
}

impl ProxyStore for MemoryStore {
    fn active_proxy(
        &self,
        item_id: ItemId,
        round: Round,
        user_id: UserId,
    ) -> Result<Option<AutobidProxy>, StorageError> {
        Ok(self
            .inner
            .read()
            .proxies
            .values()
            .find(|p| p.active && p.item_id == item_id && p.round == round && p.user_id == user_id)
            .cloned())
    }

    fn active_proxies(
        &self,
        item_id: ItemId,
        round: Round,
    ) -> Result<Vec<AutobidProxy>, StorageError> {
        let state = self.inner.read();
        let mut proxies: Vec<AutobidProxy> = state
            .proxies
            .values()
            .filter(|p| p.active && p.item_id == item_id && p.round == round)
            .cloned()
            .collect();
        proxies.sort_by_key(|p| p.id);
        Ok(proxies)
    }

    fn put_proxy(&self, mut proxy: AutobidProxy) -> Result<AutobidProxy, StorageError> {
        let mut state = self.inner.write();
        if proxy.id == 0 {
            proxy.id = state.allocate_proxy_id();
        }
        state.proxies.insert(proxy.id, proxy.clone());
        Ok(proxy)
    }

    fn delete_proxy(&self, proxy: &AutobidProxy) -> Result<(), StorageError> {
        self.inner.write().proxies.remove(&proxy.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use proxybid_types::{BidKind, OpenWindow, PurchaseOffer};
    use rust_decimal::Decimal;

    fn item(id: ItemId) -> AuctionItem {
        let now = Utc::now();
        AuctionItem {
            id,
            name: "clock".into(),
            owner: 1,
            starting_price: Decimal::from(10),
            buy_now_price: Decimal::ZERO,
            bid_step: Decimal::ONE,
            threshold_percent: Decimal::from(80),
            instant_only: false,
            currency: "USD".into(),
            workflow: Workflow::Active,
            window: OpenWindow::new(now, now + Duration::hours(1)),
            relist_count: 0,
        }
    }

    fn new_bid(item_id: ItemId, round: Round, amount: i64) -> NewBid {
        NewBid {
            item_id,
            user_id: 2,
            amount: Decimal::from(amount),
            kind: BidKind::Standard,
            purchase_offer: PurchaseOffer::NotApplicable,
            round,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_append_assigns_sequential_ids() {
        let store = MemoryStore::new();
        let written = store
            .append(vec![new_bid(1, 0, 10), new_bid(1, 0, 11)])
            .unwrap();
        assert_eq!(written[0].id, 1);
        assert_eq!(written[1].id, 2);
        assert_eq!(store.bid_count(1, 0), 2);
    }

    #[test]
    fn test_append_closing_writes_bid_and_workflow() {
        let store = MemoryStore::new();
        store.insert_item(item(1));
        let bid = store.append_closing(new_bid(1, 0, 50), Workflow::Finished).unwrap();
        assert_eq!(bid.id, 1);
        assert_eq!(store.bid_count(1, 0), 1);
        assert_eq!(store.item(1).unwrap().unwrap().workflow, Workflow::Finished);
    }

    #[test]
    fn test_append_closing_unknown_item_writes_nothing() {
        let store = MemoryStore::new();
        assert!(store.append_closing(new_bid(4, 0, 50), Workflow::Finished).is_err());
        assert_eq!(store.bid_count(4, 0), 0);
    }

    #[test]
    fn test_bids_are_partitioned_by_round() {
        let store = MemoryStore::new();
        store.append(vec![new_bid(1, 0, 10)]).unwrap();
        store.append(vec![new_bid(1, 1, 20)]).unwrap();
        assert_eq!(store.bids_for(1, 0).unwrap().len(), 1);
        assert_eq!(store.bids_for(1, 1).unwrap()[0].amount, Decimal::from(20));
        assert!(store.bids_for(2, 0).unwrap().is_empty());
    }

    #[test]
    fn test_relist_bumps_round() {
        let store = MemoryStore::new();
        store.insert_item(item(7));
        assert_eq!(store.relist(7).unwrap(), 1);
        let relisted = store.item(7).unwrap().unwrap();
        assert_eq!(relisted.relist_count, 1);
        assert_eq!(relisted.workflow, Workflow::Relisted);
        assert!(store.relist(8).is_err());
    }

    #[test]
    fn test_proxy_lookup_ignores_inactive() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let proxy = store
            .put_proxy(AutobidProxy {
                id: 0,
                item_id: 1,
                user_id: 3,
                ceiling: Decimal::from(50),
                round: 0,
                active: true,
                created_at: now,
                updated_at: now,
            })
            .unwrap();
        assert_eq!(proxy.id, 1);
        assert!(store.active_proxy(1, 0, 3).unwrap().is_some());

        store
            .put_proxy(AutobidProxy {
                active: false,
                ..proxy
            })
            .unwrap();
        assert!(store.active_proxy(1, 0, 3).unwrap().is_none());
        assert!(store.active_proxies(1, 0).unwrap().is_empty());
    }
}
