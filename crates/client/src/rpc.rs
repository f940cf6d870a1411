//! Typed access to the node's JSON-RPC methods.

use chrono::{DateTime, Utc};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use proxybid_engine::{AuctionStateView, BidReceipt, ProxyStatus};
use proxybid_node::types::{
    ClockInfo, PlaceBidParams, RegisterItemParams, SetProxyParams, ViolationRpc,
};
use proxybid_node::VALIDATION_ERROR_CODE;
use proxybid_types::{AuctionItem, AutobidProxy, Bid, FeeQuote, ItemId, Round, UserId, Workflow};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors returned by [`NodeClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The node rejected the request on business rules.
    #[error("{message}")]
    Rejected {
        message: String,
        violations: Vec<ViolationRpc>,
    },

    #[error("RPC error: {0}")]
    Rpc(jsonrpsee::core::ClientError),
}

impl From<jsonrpsee::core::ClientError> for ClientError {
    fn from(err: jsonrpsee::core::ClientError) -> Self {
        if let jsonrpsee::core::ClientError::Call(obj) = &err {
            if obj.code() == VALIDATION_ERROR_CODE {
                let violations = obj
                    .data()
                    .and_then(|raw| serde_json::from_str(raw.get()).ok())
                    .unwrap_or_default();
                return ClientError::Rejected {
                    message: obj.message().to_string(),
                    violations,
                };
            }
        }
        ClientError::Rpc(err)
    }
}

/// JSON-RPC client for a bidding node.
#[derive(Clone, Debug)]
pub struct NodeClient {
    inner: HttpClient,
}

impl NodeClient {
    /// Connect to a node at `url`, e.g. `http://127.0.0.1:9944`.
    pub fn new(url: &str) -> Result<Self, ClientError> {
        let inner = HttpClientBuilder::default().build(url)?;
        Ok(Self { inner })
    }

    // ============ Admin ============

    pub async fn set_timestamp(&self, now: DateTime<Utc>) -> Result<ClockInfo, ClientError> {
        Ok(self.inner.request("admin_setTimestamp", rpc_params![now]).await?)
    }

    pub async fn advance_clock(&self, seconds: i64) -> Result<ClockInfo, ClientError> {
        Ok(self.inner.request("admin_advanceClock", rpc_params![seconds]).await?)
    }

    pub async fn register_item(&self, params: RegisterItemParams) -> Result<ItemId, ClientError> {
        Ok(self.inner.request("admin_registerItem", rpc_params![params]).await?)
    }

    pub async fn relist_item(&self, item_id: ItemId) -> Result<Round, ClientError> {
        Ok(self.inner.request("admin_relistItem", rpc_params![item_id]).await?)
    }

    pub async fn set_workflow(&self, item_id: ItemId, workflow: Workflow) -> Result<bool, ClientError> {
        Ok(self
            .inner
            .request("admin_setWorkflow", rpc_params![item_id, workflow])
            .await?)
    }

    // ============ Auction ============

    pub async fn place_bid(&self, params: PlaceBidParams) -> Result<BidReceipt, ClientError> {
        Ok(self.inner.request("auction_placeBid", rpc_params![params]).await?)
    }

    pub async fn place_buy_now(&self, sender: UserId, item_id: ItemId) -> Result<Bid, ClientError> {
        Ok(self
            .inner
            .request("auction_placeBuyNow", rpc_params![sender, item_id])
            .await?)
    }

    pub async fn set_proxy(&self, params: SetProxyParams) -> Result<AutobidProxy, ClientError> {
        Ok(self.inner.request("auction_setProxy", rpc_params![params]).await?)
    }

    pub async fn remove_proxy(
        &self,
        sender: UserId,
        item_id: ItemId,
        round: Round,
    ) -> Result<bool, ClientError> {
        Ok(self
            .inner
            .request("auction_removeProxy", rpc_params![sender, item_id, round])
            .await?)
    }

    // ============ Queries ============

    pub async fn auction_state(
        &self,
        item_id: ItemId,
        round: Round,
    ) -> Result<AuctionStateView, ClientError> {
        Ok(self
            .inner
            .request("query_getAuctionState", rpc_params![item_id, round])
            .await?)
    }

    pub async fn highest_bids(
        &self,
        item_id: ItemId,
        round: Round,
        limit: Option<usize>,
    ) -> Result<Vec<Bid>, ClientError> {
        Ok(self
            .inner
            .request("query_getHighestBids", rpc_params![item_id, round, limit])
            .await?)
    }

    pub async fn proxy_status(
        &self,
        item_id: ItemId,
        round: Round,
        user_id: UserId,
    ) -> Result<ProxyStatus, ClientError> {
        Ok(self
            .inner
            .request("query_getProxyStatus", rpc_params![item_id, round, user_id])
            .await?)
    }

    pub async fn fee_for(&self, sale_price: Decimal, currency: &str) -> Result<FeeQuote, ClientError> {
        Ok(self
            .inner
            .request("query_feeFor", rpc_params![sale_price, currency])
            .await?)
    }

    pub async fn item(&self, item_id: ItemId) -> Result<Option<AuctionItem>, ClientError> {
        Ok(self.inner.request("query_getItem", rpc_params![item_id]).await?)
    }

    pub async fn winner(&self, item_id: ItemId, round: Round) -> Result<Option<Bid>, ClientError> {
        Ok(self
            .inner
            .request("query_getWinner", rpc_params![item_id, round])
            .await?)
    }
}
