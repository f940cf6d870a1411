//! Call message types for the bidding engine.

use proxybid_types::{AutobidProxy, Bid, BidKind, ItemId, Round};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::handlers::{BidReceipt, BiddingEngine, CallContext, HandlerResult};
use crate::storage::Storage;

/// State-changing requests. The acting user comes from the [`CallContext`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BiddingCall {
    /// Submit a manual or instant bid.
    PlaceBid {
        item_id: ItemId,
        round: Round,
        amount: Decimal,
        kind: BidKind,
    },

    /// Buy the item at its buy-now price.
    PlaceBuyNow { item_id: ItemId },

    /// Create or change a proxy ceiling.
    SetProxy {
        item_id: ItemId,
        round: Round,
        ceiling: Decimal,
    },

    /// Deactivate the caller's proxy.
    RemoveProxy { item_id: ItemId, round: Round },
}

/// What a dispatched call produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CallOutcome {
    Bid(BidReceipt),
    Purchase(Bid),
    Proxy(AutobidProxy),
    ProxyRemoved(bool),
}

impl<S: Storage> BiddingEngine<S> {
    /// Route a call to its handler.
    pub fn dispatch(&self, ctx: &CallContext, call: BiddingCall) -> HandlerResult<CallOutcome> {
        match call {
            BiddingCall::PlaceBid {
                item_id,
                round,
                amount,
                kind,
            } => self
                .place_bid(ctx, item_id, round, amount, kind)
                .map(CallOutcome::Bid),
            BiddingCall::PlaceBuyNow { item_id } => {
                self.place_buy_now(ctx, item_id).map(CallOutcome::Purchase)
            }
            BiddingCall::SetProxy {
                item_id,
                round,
                ceiling,
            } => self
                .set_proxy(ctx, item_id, round, ceiling)
                .map(CallOutcome::Proxy),
            BiddingCall::RemoveProxy { item_id, round } => self
                .remove_proxy(ctx, item_id, round)
                .map(CallOutcome::ProxyRemoved),
        }
    }
}
