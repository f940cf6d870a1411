//! Collaborator interfaces consumed by the engine.
//!
//! All traits take `&self` and rely on interior mutability so a single store
//! can be shared through `Arc` between the engine and request threads.

use proxybid_types::{
    AuctionItem, AutobidProxy, Bid, ItemId, NewBid, Round, UserId, Workflow,
};
use rust_decimal::Decimal;

use crate::error::StorageError;

/// Read access to items plus the workflow transition the engine may trigger.
pub trait ItemDirectory: Send + Sync {
    fn item(&self, item_id: ItemId) -> Result<Option<AuctionItem>, StorageError>;

    fn set_workflow(&self, item_id: ItemId, workflow: Workflow) -> Result<(), StorageError>;
}

/// Append-only bid history.
pub trait BidLedger: Send + Sync {
    /// Every bid recorded for the item in the given round, in insertion order.
    fn bids_for(&self, item_id: ItemId, round: Round) -> Result<Vec<Bid>, StorageError>;

    /// Write a batch of bids. Either every bid is written or none is.
    fn append(&self, bids: Vec<NewBid>) -> Result<Vec<Bid>, StorageError>;

    /// Write a bid and move its item to `workflow` as one write. On error
    /// neither change is applied.
    fn append_closing(&self, bid: NewBid, workflow: Workflow) -> Result<Bid, StorageError>;
}

/// Autobid proxies, at most one active per (item, round, user).
pub trait ProxyStore: Send + Sync {
    /// The user's active proxy for the round, if any.
    fn active_proxy(
        &self,
        item_id: ItemId,
        round: Round,
        user_id: UserId,
    ) -> Result<Option<AutobidProxy>, StorageError>;

    /// All active proxies for the round.
    fn active_proxies(&self, item_id: ItemId, round: Round)
        -> Result<Vec<AutobidProxy>, StorageError>;

    /// Insert or replace a proxy. A zero id asks the store to assign one.
    fn put_proxy(&self, proxy: AutobidProxy) -> Result<AutobidProxy, StorageError>;

    /// Drop a proxy row entirely. Only used to undo a failed registration.
    fn delete_proxy(&self, proxy: &AutobidProxy) -> Result<(), StorageError>;
}

/// Everything the engine needs from persistence.
pub trait Storage: ItemDirectory + BidLedger + ProxyStore {}

impl<T: ItemDirectory + BidLedger + ProxyStore> Storage for T {}

/// "May this user bid" check owned by the identity layer.
pub trait Authorizer: Send + Sync {
    fn may_bid(&self, user_id: UserId) -> bool;
}

/// Lets everyone bid.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn may_bid(&self, _user_id: UserId) -> bool {
        true
    }
}

/// Events emitted after a mutation commits.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// `previous_leader` no longer holds the lead bid.
    Outbid {
        item_id: ItemId,
        round: Round,
        previous_leader: UserId,
        new_leader: UserId,
        amount: Decimal,
    },
    /// The round ended through an instant purchase.
    Closed {
        item_id: ItemId,
        round: Round,
        buyer: UserId,
        amount: Decimal,
    },
}

/// Fire-and-forget notification hook (mail, websockets, ...).
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &EngineEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _event: &EngineEvent) {}
}
