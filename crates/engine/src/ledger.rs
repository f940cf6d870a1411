//! Read-side queries over the bid ledger.

use std::collections::BTreeMap;

use proxybid_types::{AuctionItem, Bid, ItemId, Round, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::storage::BidLedger;

/// The price a new bid has to reach and who currently leads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurrentHighest {
    pub min_price: Decimal,
    pub lead_bid: Option<Bid>,
}

impl CurrentHighest {
    pub fn lead_user(&self) -> Option<UserId> {
        self.lead_bid.as_ref().map(|b| b.user_id)
    }
}

/// Bids of a round ranked by amount, highest first.
///
/// Rejected purchase offers are skipped. Equal amounts rank the earlier bid
/// first.
pub fn highest_bids<L: BidLedger + ?Sized>(
    ledger: &L,
    item_id: ItemId,
    round: Round,
    limit: Option<usize>,
) -> Result<Vec<Bid>, StorageError> {
    let mut bids: Vec<Bid> = ledger
        .bids_for(item_id, round)?
        .into_iter()
        .filter(|b| b.item_id == item_id && b.round == round && b.counts_toward_price())
        .collect();

    bids.sort_by(|a, b| {
        b.amount
            .cmp(&a.amount)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });

    if let Some(limit) = limit {
        bids.truncate(limit);
    }
    Ok(bids)
}

/// Minimum price and lead bid for the item's round.
pub fn current_highest<L: BidLedger + ?Sized>(
    ledger: &L,
    item: &AuctionItem,
    round: Round,
) -> Result<CurrentHighest, StorageError> {
    let lead_bid = highest_bids(ledger, item.id, round, Some(1))?.into_iter().next();

    let min_price = match &lead_bid {
        Some(lead) if lead.amount > item.starting_price => lead.amount,
        _ => item.starting_price,
    };

    Ok(CurrentHighest {
        min_price,
        lead_bid,
    })
}

/// Distinct users that bid in the round, in order of first bid.
pub fn unique_bidders<L: BidLedger + ?Sized>(
    ledger: &L,
    item_id: ItemId,
    round: Round,
) -> Result<Vec<UserId>, StorageError> {
    let mut users = Vec::new();
    for bid in ledger.bids_for(item_id, round)? {
        if !users.contains(&bid.user_id) {
            users.push(bid.user_id);
        }
    }
    Ok(users)
}

/// Bids of the round grouped by user, newest first within each group.
pub fn bids_by_user<L: BidLedger + ?Sized>(
    ledger: &L,
    item_id: ItemId,
    round: Round,
) -> Result<BTreeMap<UserId, Vec<Bid>>, StorageError> {
    let mut grouped: BTreeMap<UserId, Vec<Bid>> = BTreeMap::new();
    let mut bids = ledger.bids_for(item_id, round)?;
    bids.sort_by(|a, b| b.id.cmp(&a.id));
    for bid in bids {
        grouped.entry(bid.user_id).or_default().push(bid);
    }
    Ok(grouped)
}

/// Holder of the top bid of the round.
pub fn winner<L: BidLedger + ?Sized>(
    ledger: &L,
    item_id: ItemId,
    round: Round,
) -> Result<Option<Bid>, StorageError> {
    Ok(highest_bids(ledger, item_id, round, Some(1))?.into_iter().next())
}
