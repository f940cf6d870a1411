//! RPC-compatible types for the node.
//!
//! Amounts travel as decimal strings and instants as RFC 3339 strings.

use chrono::{DateTime, Utc};
use proxybid_engine::Violation;
use proxybid_types::{BidKind, ItemId, Round, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Simulated clock reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockInfo {
    pub now: DateTime<Utc>,
}

/// Parameters for registering an item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterItemParams {
    pub name: String,
    pub owner: UserId,
    pub starting_price: Decimal,
    /// Omitted or zero disables buy-now.
    #[serde(default)]
    pub buy_now_price: Option<Decimal>,
    /// Omitted uses the suggested increment for the starting price.
    #[serde(default)]
    pub bid_step: Option<Decimal>,
    #[serde(default = "default_threshold")]
    pub threshold_percent: Decimal,
    #[serde(default)]
    pub instant_only: bool,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

fn default_threshold() -> Decimal {
    Decimal::from(80)
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Parameters for placing a bid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceBidParams {
    pub sender: UserId,
    pub item_id: ItemId,
    pub round: Round,
    pub amount: Decimal,
    #[serde(default = "default_kind")]
    pub kind: BidKind,
}

fn default_kind() -> BidKind {
    BidKind::Standard
}

/// Parameters for setting a proxy ceiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetProxyParams {
    pub sender: UserId,
    pub item_id: ItemId,
    pub round: Round,
    pub ceiling: Decimal,
}

/// A rule violation as reported in the RPC error data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationRpc {
    pub rule: String,
    pub field: String,
    pub message: String,
}

impl From<&Violation> for ViolationRpc {
    fn from(v: &Violation) -> Self {
        Self {
            rule: format!("{:?}", v.rule),
            field: v.field.to_string(),
            message: v.message.clone(),
        }
    }
}
