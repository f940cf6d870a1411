//! JSON-RPC server hosting a bidding engine over an in-memory store.
//!
//! The node keeps its own simulated clock so tests and demos can move time
//! across an auction window without waiting.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use parking_lot::RwLock;
use proxybid_engine::phase::initial_workflow;
use proxybid_engine::queries::handle_query;
use proxybid_engine::validator::validate_item;
use proxybid_engine::{
    AuctionStateView, BidReceipt, BiddingCall, BiddingEngine, BiddingQuery, BiddingQueryResponse,
    CallContext, CallOutcome, EngineConfig, EngineError, ItemDirectory, MemoryStore, ProxyStatus,
};
use proxybid_types::{
    suggested_bid_step, AuctionItem, AutobidProxy, Bid, FeeQuote, ItemId, OpenWindow, Round,
    UserId, Workflow,
};
use rust_decimal::Decimal;
use tracing::info;

use crate::types::{ClockInfo, PlaceBidParams, RegisterItemParams, SetProxyParams, ViolationRpc};

/// Error code for requests rejected on business rules.
pub const VALIDATION_ERROR_CODE: i32 = -32001;

/// Error code for every other failure.
pub const NODE_ERROR_CODE: i32 = -32000;

/// Mutable node state outside the engine.
struct NodeState {
    /// Simulated current time
    clock: DateTime<Utc>,
    /// Next item ID to assign
    next_item_id: ItemId,
}

/// RPC API definition for the node.
#[rpc(server)]
pub trait NodeApi {
    // ============ Admin Methods ============

    /// Set the simulated clock.
    #[method(name = "admin_setTimestamp")]
    async fn admin_set_timestamp(&self, now: DateTime<Utc>) -> Result<ClockInfo, ErrorObjectOwned>;

    /// Move the simulated clock forward (or back) by `seconds`.
    #[method(name = "admin_advanceClock")]
    async fn admin_advance_clock(&self, seconds: i64) -> Result<ClockInfo, ErrorObjectOwned>;

    /// Register a new item.
    #[method(name = "admin_registerItem")]
    async fn admin_register_item(&self, params: RegisterItemParams) -> Result<ItemId, ErrorObjectOwned>;

    /// Open the next round of an item.
    #[method(name = "admin_relistItem")]
    async fn admin_relist_item(&self, item_id: ItemId) -> Result<Round, ErrorObjectOwned>;

    /// Force an item's admin workflow.
    #[method(name = "admin_setWorkflow")]
    async fn admin_set_workflow(
        &self,
        item_id: ItemId,
        workflow: Workflow,
    ) -> Result<bool, ErrorObjectOwned>;

    // ============ Auction Methods ============

    /// Place a manual or instant bid.
    #[method(name = "auction_placeBid")]
    async fn auction_place_bid(&self, params: PlaceBidParams) -> Result<BidReceipt, ErrorObjectOwned>;

    /// Buy an item at its buy-now price.
    #[method(name = "auction_placeBuyNow")]
    async fn auction_place_buy_now(
        &self,
        sender: UserId,
        item_id: ItemId,
    ) -> Result<Bid, ErrorObjectOwned>;

    /// Create or change a proxy ceiling.
    #[method(name = "auction_setProxy")]
    async fn auction_set_proxy(&self, params: SetProxyParams) -> Result<AutobidProxy, ErrorObjectOwned>;

    /// Deactivate a proxy.
    #[method(name = "auction_removeProxy")]
    async fn auction_remove_proxy(
        &self,
        sender: UserId,
        item_id: ItemId,
        round: Round,
    ) -> Result<bool, ErrorObjectOwned>;

    // ============ Query Methods ============

    #[method(name = "query_getAuctionState")]
    async fn query_get_auction_state(
        &self,
        item_id: ItemId,
        round: Round,
    ) -> Result<AuctionStateView, ErrorObjectOwned>;

    #[method(name = "query_getHighestBids")]
    async fn query_get_highest_bids(
        &self,
        item_id: ItemId,
        round: Round,
        limit: Option<usize>,
    ) -> Result<Vec<Bid>, ErrorObjectOwned>;

    #[method(name = "query_getProxyStatus")]
    async fn query_get_proxy_status(
        &self,
        item_id: ItemId,
        round: Round,
        user_id: UserId,
    ) -> Result<ProxyStatus, ErrorObjectOwned>;

    #[method(name = "query_feeFor")]
    async fn query_fee_for(
        &self,
        sale_price: Decimal,
        currency: String,
    ) -> Result<FeeQuote, ErrorObjectOwned>;

    #[method(name = "query_getItem")]
    async fn query_get_item(&self, item_id: ItemId) -> Result<Option<AuctionItem>, ErrorObjectOwned>;

    #[method(name = "query_getWinner")]
    async fn query_get_winner(
        &self,
        item_id: ItemId,
        round: Round,
    ) -> Result<Option<Bid>, ErrorObjectOwned>;
}

/// Implementation of the node RPC server.
pub struct NodeServer {
    engine: Arc<BiddingEngine<MemoryStore>>,
    state: Arc<RwLock<NodeState>>,
}

impl NodeServer {
    pub fn new(config: EngineConfig, start_time: DateTime<Utc>) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            engine: Arc::new(BiddingEngine::new(store, config)),
            state: Arc::new(RwLock::new(NodeState {
                clock: start_time,
                next_item_id: 1,
            })),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.state.read().clock
    }

    fn make_context(&self, sender: UserId) -> CallContext {
        CallContext::new(sender, self.now())
    }

    fn rpc_error(msg: &str) -> ErrorObjectOwned {
        ErrorObjectOwned::owned(NODE_ERROR_CODE, msg.to_string(), None::<()>)
    }

    fn engine_error(err: EngineError) -> ErrorObjectOwned {
        match err.validation() {
            Some(validation) => {
                let data: Vec<ViolationRpc> =
                    validation.violations.iter().map(ViolationRpc::from).collect();
                ErrorObjectOwned::owned(VALIDATION_ERROR_CODE, err.to_string(), Some(data))
            }
            None => Self::rpc_error(&err.to_string()),
        }
    }

    fn call(&self, sender: UserId, call: BiddingCall) -> Result<CallOutcome, ErrorObjectOwned> {
        self.engine
            .dispatch(&self.make_context(sender), call)
            .map_err(Self::engine_error)
    }

    fn query(&self, query: BiddingQuery) -> Result<BiddingQueryResponse, ErrorObjectOwned> {
        handle_query(self.engine.as_ref(), self.now(), query).map_err(Self::engine_error)
    }

    fn unexpected<T>(what: &str) -> Result<T, ErrorObjectOwned> {
        Err(Self::rpc_error(&format!("Unexpected engine response to {}", what)))
    }
}

#[async_trait]
impl NodeApiServer for NodeServer {
    async fn admin_set_timestamp(&self, now: DateTime<Utc>) -> Result<ClockInfo, ErrorObjectOwned> {
        self.state.write().clock = now;
        info!(%now, "Clock set");
        Ok(ClockInfo { now })
    }

    async fn admin_advance_clock(&self, seconds: i64) -> Result<ClockInfo, ErrorObjectOwned> {
        let mut state = self.state.write();
        state.clock += Duration::seconds(seconds);
        info!(now = %state.clock, seconds, "Clock advanced");
        Ok(ClockInfo { now: state.clock })
    }

    async fn admin_register_item(&self, params: RegisterItemParams) -> Result<ItemId, ErrorObjectOwned> {
        let window = OpenWindow::new(params.start, params.end);
        let mut item = AuctionItem {
            id: 0,
            name: params.name,
            owner: params.owner,
            starting_price: params.starting_price,
            buy_now_price: params.buy_now_price.unwrap_or(Decimal::ZERO),
            bid_step: params
                .bid_step
                .unwrap_or_else(|| suggested_bid_step(params.starting_price)),
            threshold_percent: params.threshold_percent,
            instant_only: params.instant_only,
            currency: params.currency,
            workflow: Workflow::NotStarted,
            window,
            relist_count: 0,
        };

        let problems = validate_item(&item);
        if !problems.is_empty() {
            let msg = problems
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            return Err(Self::rpc_error(&msg));
        }

        {
            let mut state = self.state.write();
            item.id = state.next_item_id;
            state.next_item_id += 1;
            item.workflow = initial_workflow(state.clock, &window);
        }

        let item_id = item.id;
        info!(item_id, name = %item.name, workflow = ?item.workflow, "Item registered");
        self.engine.store().insert_item(item);
        Ok(item_id)
    }

    async fn admin_relist_item(&self, item_id: ItemId) -> Result<Round, ErrorObjectOwned> {
        let round = self
            .engine
            .store()
            .relist(item_id)
            .map_err(|e| Self::rpc_error(&e.to_string()))?;
        info!(item_id, round, "Item relisted");
        Ok(round)
    }

    async fn admin_set_workflow(
        &self,
        item_id: ItemId,
        workflow: Workflow,
    ) -> Result<bool, ErrorObjectOwned> {
        self.engine
            .store()
            .set_workflow(item_id, workflow)
            .map_err(|e| Self::rpc_error(&e.to_string()))?;
        info!(item_id, ?workflow, "Workflow set");
        Ok(true)
    }

    async fn auction_place_bid(&self, params: PlaceBidParams) -> Result<BidReceipt, ErrorObjectOwned> {
        let call = BiddingCall::PlaceBid {
            item_id: params.item_id,
            round: params.round,
            amount: params.amount,
            kind: params.kind,
        };
        match self.call(params.sender, call)? {
            CallOutcome::Bid(receipt) => Ok(receipt),
            _ => Self::unexpected("placeBid"),
        }
    }

    async fn auction_place_buy_now(
        &self,
        sender: UserId,
        item_id: ItemId,
    ) -> Result<Bid, ErrorObjectOwned> {
        match self.call(sender, BiddingCall::PlaceBuyNow { item_id })? {
            CallOutcome::Purchase(bid) => Ok(bid),
            _ => Self::unexpected("placeBuyNow"),
        }
    }

    async fn auction_set_proxy(&self, params: SetProxyParams) -> Result<AutobidProxy, ErrorObjectOwned> {
        let call = BiddingCall::SetProxy {
            item_id: params.item_id,
            round: params.round,
            ceiling: params.ceiling,
        };
        match self.call(params.sender, call)? {
            CallOutcome::Proxy(proxy) => Ok(proxy),
            _ => Self::unexpected("setProxy"),
        }
    }

    async fn auction_remove_proxy(
        &self,
        sender: UserId,
        item_id: ItemId,
        round: Round,
    ) -> Result<bool, ErrorObjectOwned> {
        match self.call(sender, BiddingCall::RemoveProxy { item_id, round })? {
            CallOutcome::ProxyRemoved(removed) => Ok(removed),
            _ => Self::unexpected("removeProxy"),
        }
    }

    async fn query_get_auction_state(
        &self,
        item_id: ItemId,
        round: Round,
    ) -> Result<AuctionStateView, ErrorObjectOwned> {
        match self.query(BiddingQuery::GetAuctionState { item_id, round })? {
            BiddingQueryResponse::AuctionState(view) => Ok(view),
            _ => Self::unexpected("getAuctionState"),
        }
    }

    async fn query_get_highest_bids(
        &self,
        item_id: ItemId,
        round: Round,
        limit: Option<usize>,
    ) -> Result<Vec<Bid>, ErrorObjectOwned> {
        match self.query(BiddingQuery::GetHighestBids {
            item_id,
            round,
            limit,
        })? {
            BiddingQueryResponse::HighestBids(bids) => Ok(bids),
            _ => Self::unexpected("getHighestBids"),
        }
    }

    async fn query_get_proxy_status(
        &self,
        item_id: ItemId,
        round: Round,
        user_id: UserId,
    ) -> Result<ProxyStatus, ErrorObjectOwned> {
        match self.query(BiddingQuery::GetProxyStatus {
            item_id,
            round,
            user_id,
        })? {
            BiddingQueryResponse::ProxyStatus(status) => Ok(status),
            _ => Self::unexpected("getProxyStatus"),
        }
    }

    async fn query_fee_for(
        &self,
        sale_price: Decimal,
        currency: String,
    ) -> Result<FeeQuote, ErrorObjectOwned> {
        match self.query(BiddingQuery::FeeFor {
            sale_price,
            currency,
        })? {
            BiddingQueryResponse::Fee(quote) => Ok(quote),
            _ => Self::unexpected("feeFor"),
        }
    }

    async fn query_get_item(&self, item_id: ItemId) -> Result<Option<AuctionItem>, ErrorObjectOwned> {
        match self.query(BiddingQuery::GetItem { item_id })? {
            BiddingQueryResponse::Item(item) => Ok(item),
            _ => Self::unexpected("getItem"),
        }
    }

    async fn query_get_winner(
        &self,
        item_id: ItemId,
        round: Round,
    ) -> Result<Option<Bid>, ErrorObjectOwned> {
        match self.query(BiddingQuery::GetWinner { item_id, round })? {
            BiddingQueryResponse::Winner(bid) => Ok(bid),
            _ => Self::unexpected("getWinner"),
        }
    }
}

/// Bind and start the server. Returns the bound address and a stop handle.
pub async fn start(
    addr: SocketAddr,
    config: EngineConfig,
    start_time: DateTime<Utc>,
) -> anyhow::Result<(SocketAddr, ServerHandle)> {
    let server = Server::builder().build(addr).await?;
    let local_addr = server.local_addr()?;
    let handle = server.start(NodeServer::new(config, start_time).into_rpc());
    Ok((local_addr, handle))
}
