//! Proxy resolution: turns standing ceilings into concrete Auto bids.
//!
//! Two entry points:
//! - [`counter_amount`] answers a manual bid once on behalf of the strongest
//!   rival proxy. It never recurses into the bid it produces.
//! - [`reconcile`] settles a freshly set ceiling against the strongest rival
//!   ceiling. The higher ceiling leads at `min(lower + step, higher)` and equal
//!   ceilings favor the caller, whose registration is the newer one.
//!
//! Everything here is pure. Reading proxies and writing the resulting bids is
//! the handler's job.

use chrono::{DateTime, Utc};
use proxybid_types::{
    round_cents, AutobidProxy, BidKind, ItemId, NewBid, PurchaseOffer, Round, UserId,
};
use rust_decimal::Decimal;

use crate::config::ProxyOrdering;

/// Which party of a reconciliation a bid belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// The user who just set their ceiling.
    Caller,
    /// Owner of the strongest other proxy.
    Rival,
}

/// Outcome of reconciling two ceilings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reconciliation {
    pub leader: Side,
    pub leader_amount: Decimal,
    pub trailing_amount: Decimal,
}

impl Reconciliation {
    pub fn amount_for(&self, side: Side) -> Decimal {
        if side == self.leader {
            self.leader_amount
        } else {
            self.trailing_amount
        }
    }

    /// Raise both amounts to at least `min_price`, the price the round has
    /// already reached.
    pub fn floored_at(self, min_price: Decimal) -> Self {
        Self {
            leader_amount: self.leader_amount.max(min_price),
            trailing_amount: self.trailing_amount.max(min_price),
            ..self
        }
    }

    /// Two Auto bids, leader first, ready for a single ledger batch.
    pub fn into_bids(
        self,
        item_id: ItemId,
        round: Round,
        caller: UserId,
        rival: UserId,
        now: DateTime<Utc>,
    ) -> Vec<NewBid> {
        let trailing = match self.leader {
            Side::Caller => Side::Rival,
            Side::Rival => Side::Caller,
        };

        [self.leader, trailing]
            .into_iter()
            .map(|side| NewBid {
                item_id,
                user_id: match side {
                    Side::Caller => caller,
                    Side::Rival => rival,
                },
                amount: self.amount_for(side),
                kind: BidKind::Auto,
                purchase_offer: PurchaseOffer::NotApplicable,
                round,
                created_at: now,
            })
            .collect()
    }
}

/// Settle the caller's ceiling `caller` against the rival ceiling `rival`.
pub fn reconcile(caller: Decimal, rival: Decimal, step: Decimal) -> Reconciliation {
    let (leader, leader_amount, trailing_amount) = if caller == rival {
        (Side::Caller, caller, (caller - step).max(Decimal::ZERO))
    } else if caller < rival {
        if caller + step < rival {
            (Side::Rival, caller + step, caller)
        } else {
            (Side::Rival, rival, caller)
        }
    } else if rival + step < caller {
        (Side::Caller, rival + step, rival)
    } else {
        (Side::Caller, caller, rival)
    };

    Reconciliation {
        leader,
        leader_amount: round_cents(leader_amount),
        trailing_amount: round_cents(trailing_amount),
    }
}

/// Auto bid a rival proxy places against a manual bid of `amount`.
///
/// `None` when the rival's ceiling does not exceed the bid.
pub fn counter_amount(amount: Decimal, rival_ceiling: Decimal, step: Decimal) -> Option<Decimal> {
    if rival_ceiling <= amount {
        return None;
    }
    Some(round_cents((amount + step).min(rival_ceiling)))
}

/// Auto bid a new ceiling places when no rival proxy can still compete.
///
/// One step above the current price, capped at the ceiling.
pub fn opening_amount(min_price: Decimal, ceiling: Decimal, step: Decimal) -> Decimal {
    round_cents((min_price + step).min(ceiling))
}

/// Strongest active proxy not owned by `exclude`.
///
/// Highest ceiling wins. Equal ceilings are ordered by registration time as
/// configured, then by id.
pub fn strongest_rival(
    proxies: &[AutobidProxy],
    exclude: UserId,
    ordering: ProxyOrdering,
) -> Option<&AutobidProxy> {
    proxies
        .iter()
        .filter(|p| p.active && p.user_id != exclude)
        .min_by(|a, b| {
            let by_time = match ordering {
                ProxyOrdering::EarliestFirst => {
                    a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))
                }
                ProxyOrdering::LatestFirst => {
                    b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
                }
            };
            b.ceiling.cmp(&a.ceiling).then(by_time)
        })
}
