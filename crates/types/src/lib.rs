//! Core type definitions for proxy-bid auctions.
//!
//! This crate provides the shared data structures used across the auction system:
//! auction items and their admin workflow, bids, autobid proxies, fee ranges and
//! the money helpers that keep every amount at cent precision.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub mod money;

pub use money::{round_cents, show_as_cents, suggested_bid_step};

// =========================
// IDENTIFIERS
// =========================

/// Auction item identifier.
pub type ItemId = u64;

/// Bidder identity (owned by the external identity provider).
pub type UserId = u64;

/// Ledger-assigned bid identifier.
pub type BidId = u64;

/// Store-assigned proxy identifier.
pub type ProxyId = u64;

/// Relist epoch of an item. Bids and proxies only compete within one round.
pub type Round = u32;

// =========================
// AUCTION ITEMS
// =========================

/// Admin workflow of an auction item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Workflow {
    Deleted,
    NotStarted,
    Active,
    Relisted,
    Finished,
    Closed,
}

impl Workflow {
    /// Numeric code used by the storage layer.
    pub fn code(self) -> i8 {
        match self {
            Workflow::Deleted => -1,
            Workflow::NotStarted => 0,
            Workflow::Active => 1,
            Workflow::Relisted => 2,
            Workflow::Finished => 3,
            Workflow::Closed => 4,
        }
    }

    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            -1 => Some(Workflow::Deleted),
            0 => Some(Workflow::NotStarted),
            1 => Some(Workflow::Active),
            2 => Some(Workflow::Relisted),
            3 => Some(Workflow::Finished),
            4 => Some(Workflow::Closed),
            _ => None,
        }
    }

    /// Workflows that end a round regardless of the clock.
    pub fn is_terminal(self) -> bool {
        matches!(self, Workflow::Deleted | Workflow::Finished | Workflow::Closed)
    }
}

/// Bidding window as absolute UTC instants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl OpenWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }
}

/// An auctioned item as seen by the engine.
///
/// The item and its round counter are owned by the external auction lifecycle;
/// the engine only reads it and requests workflow transitions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuctionItem {
    pub id: ItemId,
    pub name: String,
    pub owner: UserId,

    // Pricing
    pub starting_price: Decimal,
    /// Zero disables the instant purchase path.
    pub buy_now_price: Decimal,
    pub bid_step: Decimal,
    /// Percentage (0-100) at which buy-now is hidden.
    pub threshold_percent: Decimal,
    pub instant_only: bool,
    pub currency: String,

    // Lifecycle
    pub workflow: Workflow,
    pub window: OpenWindow,
    pub relist_count: Round,
}

impl AuctionItem {
    /// Buy-now price when instant purchase is enabled.
    pub fn buy_now(&self) -> Option<Decimal> {
        if self.buy_now_price > Decimal::ZERO {
            Some(self.buy_now_price)
        } else {
            None
        }
    }
}

// =========================
// BIDS
// =========================

/// How a bid entered the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidKind {
    Standard,
    Instant,
    /// Synthesized by the engine on behalf of a proxy.
    Auto,
}

/// Purchase offer state attached to a bid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOffer {
    #[default]
    NotApplicable,
    Pending,
    Rejected,
    Purchased,
}

impl PurchaseOffer {
    pub fn code(self) -> i8 {
        match self {
            PurchaseOffer::NotApplicable => 0,
            PurchaseOffer::Pending => 2,
            PurchaseOffer::Rejected => -1,
            PurchaseOffer::Purchased => 3,
        }
    }

    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            0 => Some(PurchaseOffer::NotApplicable),
            2 => Some(PurchaseOffer::Pending),
            -1 => Some(PurchaseOffer::Rejected),
            3 => Some(PurchaseOffer::Purchased),
            _ => None,
        }
    }
}

/// A bid that has not been written to the ledger yet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewBid {
    pub item_id: ItemId,
    pub user_id: UserId,
    pub amount: Decimal,
    pub kind: BidKind,
    pub purchase_offer: PurchaseOffer,
    pub round: Round,
    pub created_at: DateTime<Utc>,
}

/// An accepted bid. Immutable once written.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub id: BidId,
    pub item_id: ItemId,
    pub user_id: UserId,
    pub amount: Decimal,
    pub kind: BidKind,
    pub purchase_offer: PurchaseOffer,
    pub round: Round,
    pub created_at: DateTime<Utc>,
}

impl Bid {
    pub fn from_new(id: BidId, new: NewBid) -> Self {
        Self {
            id,
            item_id: new.item_id,
            user_id: new.user_id,
            amount: new.amount,
            kind: new.kind,
            purchase_offer: new.purchase_offer,
            round: new.round,
            created_at: new.created_at,
        }
    }

    /// Whether the bid takes part in "current highest" computations.
    pub fn counts_toward_price(&self) -> bool {
        self.purchase_offer != PurchaseOffer::Rejected
    }
}

// =========================
// PROXIES
// =========================

/// A private ceiling the engine spends on the owner's behalf.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AutobidProxy {
    pub id: ProxyId,
    pub item_id: ItemId,
    pub user_id: UserId,
    pub ceiling: Decimal,
    pub round: Round,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =========================
// FEES
// =========================

/// One tier of the fee table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeeRange {
    /// Lowest sale price this tier applies to.
    pub from: Decimal,
    /// Fraction of the sale price (0-1).
    pub sell_price_fee: Decimal,
    /// Flat amount added per auction.
    pub single_auction_fee: Decimal,
}

impl FeeRange {
    pub fn new(from: Decimal, sell_price_fee: Decimal, single_auction_fee: Decimal) -> Self {
        Self {
            from,
            sell_price_fee,
            single_auction_fee,
        }
    }
}

/// Result of a fee lookup for a closing sale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeeQuote {
    pub sale_price: Decimal,
    pub currency: String,
    pub fraction: Decimal,
    pub flat: Decimal,
    pub total_fee: Decimal,
}

// =========================
// HELPER FUNCTIONS
// =========================

/// `percent` percent of `value`, unrounded. 80 percent of 250 is 200.
pub fn percent_of(value: Decimal, percent: Decimal) -> Decimal {
    value * percent / Decimal::ONE_HUNDRED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_codes() {
        for code in -1..=4 {
            let workflow = Workflow::from_code(code).unwrap();
            assert_eq!(workflow.code(), code);
        }
        assert_eq!(Workflow::from_code(5), None);
        assert!(Workflow::Finished.is_terminal());
        assert!(!Workflow::Relisted.is_terminal());
    }

    #[test]
    fn test_purchase_offer_codes() {
        assert_eq!(PurchaseOffer::from_code(-1), Some(PurchaseOffer::Rejected));
        assert_eq!(PurchaseOffer::Purchased.code(), 3);
        assert_eq!(PurchaseOffer::from_code(1), None);
    }

    #[test]
    fn test_rejected_offers_do_not_count() {
        let bid = Bid {
            id: 1,
            item_id: 1,
            user_id: 7,
            amount: Decimal::from(10),
            kind: BidKind::Instant,
            purchase_offer: PurchaseOffer::Rejected,
            round: 0,
            created_at: Utc::now(),
        };
        assert!(!bid.counts_toward_price());
    }

    #[test]
    fn test_buy_now_disabled_at_zero() {
        let now = Utc::now();
        let mut item = AuctionItem {
            id: 1,
            name: "lamp".into(),
            owner: 1,
            starting_price: Decimal::from(10),
            buy_now_price: Decimal::ZERO,
            bid_step: Decimal::ONE,
            threshold_percent: Decimal::from(80),
            instant_only: false,
            currency: "USD".into(),
            workflow: Workflow::Active,
            window: OpenWindow::new(now, now),
            relist_count: 0,
        };
        assert_eq!(item.buy_now(), None);
        item.buy_now_price = Decimal::from(90);
        assert_eq!(item.buy_now(), Some(Decimal::from(90)));
    }

    #[test]
    fn test_percent_of_keeps_precision() {
        assert_eq!(percent_of(Decimal::from(250), Decimal::from(80)), Decimal::from(200));
        assert_eq!(
            percent_of(Decimal::from(100), Decimal::new(33340049, 6)),
            Decimal::new(33340049, 6)
        );
    }

    #[test]
    fn test_workflow_serialization() {
        let json = serde_json::to_string(&Workflow::NotStarted).unwrap();
        assert_eq!(json, "\"not_started\"");
    }
}
