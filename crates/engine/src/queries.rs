//! Query handlers for the bidding engine.
//!
//! Read-only and lock-free: results may lag a concurrent write slightly,
//! which is fine for polling displays but never used on the accept path.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use proxybid_types::{AuctionItem, AutobidProxy, Bid, FeeQuote, ItemId, Round, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::handlers::{BiddingEngine, HandlerResult};
use crate::ledger::{bids_by_user, current_highest, highest_bids, unique_bidders, winner};
use crate::phase::{is_closed, is_open, resolve, Phase};
use crate::storage::Storage;
use crate::threshold::buy_now_visible;

/// Snapshot of an item's round for display.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuctionStateView {
    pub item_id: ItemId,
    pub round: Round,
    pub phase: Phase,
    pub start_passed: bool,
    pub end_passed: bool,
    pub is_open: bool,
    pub is_closed: bool,
    pub min_price: Decimal,
    pub lead_bid_user_id: Option<UserId>,
    pub buy_now_visible: bool,
    pub bid_count: usize,
}

/// A user's proxy and whether bidding has passed it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProxyStatus {
    pub proxy: Option<AutobidProxy>,
    pub min_price: Decimal,
    /// The ceiling no longer beats the current price and the owner does not lead.
    pub outbid: bool,
}

/// Query request types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum BiddingQuery {
    /// Phase, price and buy-now visibility of a round.
    GetAuctionState { item_id: ItemId, round: Round },

    /// Ranked bids; `None` uses the configured listing size.
    GetHighestBids {
        item_id: ItemId,
        round: Round,
        limit: Option<usize>,
    },

    /// A user's proxy for a round.
    GetProxyStatus {
        item_id: ItemId,
        round: Round,
        user_id: UserId,
    },

    /// Fee owed on a sale.
    FeeFor { sale_price: Decimal, currency: String },

    /// Item details.
    GetItem { item_id: ItemId },

    /// Top bid of a round.
    GetWinner { item_id: ItemId, round: Round },

    /// Distinct bidders of a round.
    GetUniqueBidders { item_id: ItemId, round: Round },

    /// Bids of a round grouped by user.
    GetBidsByUser { item_id: ItemId, round: Round },
}

/// Query response types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum BiddingQueryResponse {
    AuctionState(AuctionStateView),
    HighestBids(Vec<Bid>),
    ProxyStatus(ProxyStatus),
    Fee(FeeQuote),
    Item(Option<AuctionItem>),
    Winner(Option<Bid>),
    UniqueBidders(Vec<UserId>),
    BidsByUser(BTreeMap<UserId, Vec<Bid>>),
}

fn require_item<S: Storage + ?Sized>(store: &S, item_id: ItemId) -> HandlerResult<AuctionItem> {
    store.item(item_id)?.ok_or(EngineError::ItemNotFound(item_id))
}

/// State of an item's round at `now`.
pub fn get_auction_state<S: Storage + ?Sized>(
    store: &S,
    item_id: ItemId,
    round: Round,
    now: DateTime<Utc>,
    strict_open: bool,
) -> HandlerResult<AuctionStateView> {
    let item = require_item(store, item_id)?;
    let status = resolve(now, &item.window);
    let current = current_highest(store, &item, round)?;
    let visible = buy_now_visible(&item, now, current.min_price)?;
    let bid_count = store.bids_for(item_id, round)?.len();

    Ok(AuctionStateView {
        item_id,
        round,
        phase: status.phase,
        start_passed: status.start_passed,
        end_passed: status.end_passed,
        is_open: is_open(item.workflow, &status, strict_open),
        is_closed: is_closed(item.workflow, &status),
        min_price: current.min_price,
        lead_bid_user_id: current.lead_user(),
        buy_now_visible: visible,
        bid_count,
    })
}

/// A user's active proxy for the round, if any.
pub fn get_proxy_status<S: Storage + ?Sized>(
    store: &S,
    item_id: ItemId,
    round: Round,
    user_id: UserId,
) -> HandlerResult<ProxyStatus> {
    let item = require_item(store, item_id)?;
    let current = current_highest(store, &item, round)?;
    let proxy = store.active_proxy(item_id, round, user_id)?;

    let outbid = proxy.as_ref().is_some_and(|p| {
        p.ceiling <= current.min_price && current.lead_user() != Some(user_id)
    });

    Ok(ProxyStatus {
        proxy,
        min_price: current.min_price,
        outbid,
    })
}

/// Handle a query.
pub fn handle_query<S: Storage>(
    engine: &BiddingEngine<S>,
    now: DateTime<Utc>,
    query: BiddingQuery,
) -> HandlerResult<BiddingQueryResponse> {
    let store = engine.store();
    let config = engine.config();

    let response = match query {
        BiddingQuery::GetAuctionState { item_id, round } => BiddingQueryResponse::AuctionState(
            get_auction_state(store, item_id, round, now, config.strict_open)?,
        ),

        BiddingQuery::GetHighestBids {
            item_id,
            round,
            limit,
        } => {
            let limit = limit.unwrap_or(config.highest_bids_limit);
            BiddingQueryResponse::HighestBids(highest_bids(store, item_id, round, Some(limit))?)
        }

        BiddingQuery::GetProxyStatus {
            item_id,
            round,
            user_id,
        } => BiddingQueryResponse::ProxyStatus(get_proxy_status(store, item_id, round, user_id)?),

        BiddingQuery::FeeFor {
            sale_price,
            currency,
        } => BiddingQueryResponse::Fee(engine.fees().fee_for(sale_price, &currency)?),

        BiddingQuery::GetItem { item_id } => BiddingQueryResponse::Item(store.item(item_id)?),

        BiddingQuery::GetWinner { item_id, round } => {
            BiddingQueryResponse::Winner(winner(store, item_id, round)?)
        }

        BiddingQuery::GetUniqueBidders { item_id, round } => {
            BiddingQueryResponse::UniqueBidders(unique_bidders(store, item_id, round)?)
        }

        BiddingQuery::GetBidsByUser { item_id, round } => {
            BiddingQueryResponse::BidsByUser(bids_by_user(store, item_id, round)?)
        }
    };

    Ok(response)
}
