//! Business rules for bids, proxy ceilings, buy-now and item setup.
//!
//! Every rule is evaluated independently and the full set of violations is
//! returned, so a caller can show all problems at once. Rejecting is left to
//! the handlers.

use proxybid_types::{AuctionItem, BidKind, UserId, Workflow};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::error::{Field, Rule, Violation};
use crate::ledger::CurrentHighest;
use crate::phase::{is_closed, validate_window, Phase, PhaseStatus};

/// A bid as submitted by a caller.
#[derive(Clone, Debug, PartialEq)]
pub struct BidCandidate {
    pub user_id: UserId,
    pub amount: Decimal,
    pub kind: BidKind,
}

/// Snapshot the rules are evaluated against.
#[derive(Clone, Copy, Debug)]
pub struct RuleContext<'a> {
    pub item: &'a AuctionItem,
    pub status: &'a PhaseStatus,
    pub current: &'a CurrentHighest,
}

/// Validate a manual or instant bid.
pub fn validate_bid(ctx: &RuleContext<'_>, candidate: &BidCandidate) -> Vec<Violation> {
    let mut violations = Vec::new();

    if ctx.current.lead_user() == Some(candidate.user_id) {
        violations.push(Violation::new(
            Rule::SelfOutbid,
            Field::Amount,
            "You already hold the lead bid. Self outbidding is not allowed.",
        ));
    }

    violations.extend(status_violations(ctx, Field::Amount));

    if candidate.amount < Decimal::ZERO {
        violations.push(Violation::new(
            Rule::NegativeAmount,
            Field::Amount,
            "Amount cannot be negative.",
        ));
    }

    let below_lead = ctx
        .current
        .lead_bid
        .as_ref()
        .is_some_and(|lead| candidate.amount < lead.amount);
    if candidate.amount < ctx.current.min_price || below_lead {
        violations.push(Violation::new(
            Rule::InsufficientAmount,
            Field::Amount,
            format!(
                "This bid is not high enough. Current price is {}.",
                ctx.current.min_price
            ),
        ));
    }

    match candidate.kind {
        BidKind::Auto => violations.push(Violation::new(
            Rule::ReservedKind,
            Field::Amount,
            "Automatic bids are placed by the engine only.",
        )),
        BidKind::Standard if ctx.item.instant_only => violations.push(Violation::new(
            Rule::InstantOnly,
            Field::Amount,
            "This item can only be bought instantly.",
        )),
        _ => {}
    }

    violations
}

/// Validate creating or raising a proxy ceiling.
pub fn validate_ceiling(
    ctx: &RuleContext<'_>,
    ceiling: Decimal,
    autobid_enabled: bool,
) -> Vec<Violation> {
    let mut violations = Vec::new();

    if !autobid_enabled {
        violations.push(Violation::new(
            Rule::ProxiesDisabled,
            Field::Ceiling,
            "Automatic bidding is disabled.",
        ));
    }

    if ctx.item.instant_only {
        violations.push(Violation::new(
            Rule::InstantOnly,
            Field::Ceiling,
            "This item can only be bought instantly.",
        ));
    }

    violations.extend(status_violations(ctx, Field::Ceiling));

    if ceiling <= Decimal::ZERO {
        violations.push(Violation::new(
            Rule::NegativeAmount,
            Field::Ceiling,
            "Ceiling must be positive.",
        ));
    }

    if ceiling <= ctx.current.min_price {
        violations.push(Violation::new(
            Rule::CeilingTooLow,
            Field::Ceiling,
            format!(
                "Your maximum has to be higher than the current highest bid of {}.",
                ctx.current.min_price
            ),
        ));
    }

    violations
}

/// Validate an instant purchase.
pub fn validate_buy_now(item: &AuctionItem, status: &PhaseStatus) -> Vec<Violation> {
    let mut violations = Vec::new();

    if is_closed(item.workflow, status) {
        violations.push(Violation::new(
            Rule::AuctionClosed,
            Field::BuyNow,
            "Auction has closed!",
        ));
    }

    if item.buy_now().is_none() {
        violations.push(Violation::new(
            Rule::BuyNowDisabled,
            Field::BuyNow,
            "This item has no buy-now price.",
        ));
    }

    violations
}

/// Workflow and clock rules shared by bids and ceilings.
fn status_violations(ctx: &RuleContext<'_>, field: Field) -> Vec<Violation> {
    let mut violations = Vec::new();

    if ctx.item.workflow == Workflow::NotStarted {
        violations.push(Violation::new(
            Rule::NotStarted,
            field,
            "This auction is not yet open!",
        ));
    }

    if matches!(ctx.item.workflow, Workflow::Finished | Workflow::Closed) {
        violations.push(Violation::new(
            Rule::Finished,
            field,
            "This auction has been closed!",
        ));
    }

    if ctx.status.phase == Phase::Ended {
        violations.push(Violation::new(
            Rule::Expired,
            field,
            format!("Auction has expired! {}", ctx.item.window.end.to_rfc3339()),
        ));
    }

    violations
}

/// Problems with an item's own setup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemProblem {
    #[error("Buy Now amount is lower than Starting Price.")]
    BuyNowBelowStartingPrice,

    #[error("Auction Item is Set as Instant Only without Buy Now Price.")]
    InstantOnlyWithoutBuyNow,

    #[error("Starting Price cannot be zero.")]
    StartingPriceZero,

    #[error("Prices cannot be negative.")]
    NegativePrice,

    #[error("Bid step must be positive.")]
    NonPositiveBidStep,

    #[error("Threshold must be between 0 and 100 percent.")]
    ThresholdOutOfRange,

    #[error("Auction end must be after its start.")]
    MalformedWindow,
}

/// Check an item's pricing and window before it is registered.
pub fn validate_item(item: &AuctionItem) -> Vec<ItemProblem> {
    let mut problems = Vec::new();

    if item.starting_price < Decimal::ZERO || item.buy_now_price < Decimal::ZERO {
        problems.push(ItemProblem::NegativePrice);
    }
    if item.starting_price.is_zero() {
        problems.push(ItemProblem::StartingPriceZero);
    }
    if item.buy_now().is_some() && item.buy_now_price < item.starting_price {
        problems.push(ItemProblem::BuyNowBelowStartingPrice);
    }
    if item.instant_only && item.buy_now().is_none() {
        problems.push(ItemProblem::InstantOnlyWithoutBuyNow);
    }
    if item.bid_step <= Decimal::ZERO {
        problems.push(ItemProblem::NonPositiveBidStep);
    }
    if item.threshold_percent < Decimal::ZERO || item.threshold_percent > Decimal::ONE_HUNDRED {
        problems.push(ItemProblem::ThresholdOutOfRange);
    }
    if validate_window(item).is_err() {
        problems.push(ItemProblem::MalformedWindow);
    }

    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::resolve;
    use chrono::{Duration, TimeZone, Utc};
    use proxybid_types::{Bid, OpenWindow, PurchaseOffer};

    fn item(workflow: Workflow) -> AuctionItem {
        let start = Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap();
        AuctionItem {
            id: 4,
            name: "bicycle".into(),
            owner: 1,
            starting_price: Decimal::from(50),
            buy_now_price: Decimal::from(200),
            bid_step: Decimal::from(10),
            threshold_percent: Decimal::from(80),
            instant_only: false,
            currency: "USD".into(),
            workflow,
            window: OpenWindow::new(start, start + Duration::days(2)),
            relist_count: 0,
        }
    }

    fn lead(user: UserId, amount: i64) -> CurrentHighest {
        CurrentHighest {
            min_price: Decimal::from(amount),
            lead_bid: Some(Bid {
                id: 1,
                item_id: 4,
                user_id: user,
                amount: Decimal::from(amount),
                kind: BidKind::Standard,
                purchase_offer: PurchaseOffer::NotApplicable,
                round: 0,
                created_at: Utc::now(),
            }),
        }
    }

    fn no_bids() -> CurrentHighest {
        CurrentHighest {
            min_price: Decimal::from(50),
            lead_bid: None,
        }
    }

    fn during(item: &AuctionItem) -> PhaseStatus {
        resolve(item.window.start + Duration::hours(1), &item.window)
    }

    fn after(item: &AuctionItem) -> PhaseStatus {
        resolve(item.window.end + Duration::hours(1), &item.window)
    }

    fn candidate(user: UserId, amount: i64) -> BidCandidate {
        BidCandidate {
            user_id: user,
            amount: Decimal::from(amount),
            kind: BidKind::Standard,
        }
    }

    fn rules(violations: &[Violation]) -> Vec<Rule> {
        violations.iter().map(|v| v.rule).collect()
    }

    #[test]
    fn test_valid_bid_passes() {
        let item = item(Workflow::Active);
        let status = during(&item);
        let current = lead(7, 60);
        let ctx = RuleContext {
            item: &item,
            status: &status,
            current: &current,
        };
        assert!(validate_bid(&ctx, &candidate(8, 70)).is_empty());
    }

    #[test]
    fn test_bid_equal_to_starting_price_is_accepted() {
        let item = item(Workflow::Active);
        let status = during(&item);
        let current = no_bids();
        let ctx = RuleContext {
            item: &item,
            status: &status,
            current: &current,
        };
        assert!(validate_bid(&ctx, &candidate(8, 50)).is_empty());
    }

    #[test]
    fn test_all_violations_reported() {
        let item = item(Workflow::Finished);
        let status = after(&item);
        let current = lead(7, 60);
        let ctx = RuleContext {
            item: &item,
            status: &status,
            current: &current,
        };

        let violations = validate_bid(&ctx, &candidate(7, 55));
        assert_eq!(
            rules(&violations),
            vec![
                Rule::SelfOutbid,
                Rule::Finished,
                Rule::Expired,
                Rule::InsufficientAmount
            ]
        );
        assert!(violations.iter().all(|v| v.field == Field::Amount));
    }

    #[test]
    fn test_expired_even_when_active() {
        let item = item(Workflow::Active);
        let status = after(&item);
        let current = no_bids();
        let ctx = RuleContext {
            item: &item,
            status: &status,
            current: &current,
        };
        assert_eq!(rules(&validate_bid(&ctx, &candidate(8, 100))), vec![Rule::Expired]);
    }

    #[test]
    fn test_finished_without_expiry() {
        let item = item(Workflow::Closed);
        let status = during(&item);
        let current = no_bids();
        let ctx = RuleContext {
            item: &item,
            status: &status,
            current: &current,
        };
        assert_eq!(rules(&validate_bid(&ctx, &candidate(8, 100))), vec![Rule::Finished]);
    }

    #[test]
    fn test_not_started() {
        let item = item(Workflow::NotStarted);
        let status = during(&item);
        let current = no_bids();
        let ctx = RuleContext {
            item: &item,
            status: &status,
            current: &current,
        };
        assert_eq!(rules(&validate_bid(&ctx, &candidate(8, 100))), vec![Rule::NotStarted]);
    }

    #[test]
    fn test_below_min_price_rejected_for_every_kind() {
        let item = item(Workflow::Active);
        let status = during(&item);
        let current = lead(7, 80);
        let ctx = RuleContext {
            item: &item,
            status: &status,
            current: &current,
        };
        for kind in [BidKind::Standard, BidKind::Instant] {
            let bid = BidCandidate {
                user_id: 9,
                amount: Decimal::from(79),
                kind,
            };
            assert!(rules(&validate_bid(&ctx, &bid)).contains(&Rule::InsufficientAmount));
        }
    }

    #[test]
    fn test_auto_kind_is_reserved() {
        let item = item(Workflow::Active);
        let status = during(&item);
        let current = no_bids();
        let ctx = RuleContext {
            item: &item,
            status: &status,
            current: &current,
        };
        let bid = BidCandidate {
            user_id: 9,
            amount: Decimal::from(60),
            kind: BidKind::Auto,
        };
        assert_eq!(rules(&validate_bid(&ctx, &bid)), vec![Rule::ReservedKind]);
    }

    #[test]
    fn test_instant_only_rejects_standard_bids() {
        let mut item = item(Workflow::Active);
        item.instant_only = true;
        let status = during(&item);
        let current = no_bids();
        let ctx = RuleContext {
            item: &item,
            status: &status,
            current: &current,
        };
        assert_eq!(rules(&validate_bid(&ctx, &candidate(9, 60))), vec![Rule::InstantOnly]);
    }

    #[test]
    fn test_ceiling_must_exceed_min_price() {
        let item = item(Workflow::Active);
        let status = during(&item);
        let current = lead(7, 80);
        let ctx = RuleContext {
            item: &item,
            status: &status,
            current: &current,
        };

        let violations = validate_ceiling(&ctx, Decimal::from(80), true);
        assert_eq!(rules(&violations), vec![Rule::CeilingTooLow]);
        assert_eq!(violations[0].field, Field::Ceiling);
        assert!(validate_ceiling(&ctx, Decimal::new(8001, 2), true).is_empty());
    }

    #[test]
    fn test_ceiling_when_proxies_disabled() {
        let item = item(Workflow::Active);
        let status = during(&item);
        let current = no_bids();
        let ctx = RuleContext {
            item: &item,
            status: &status,
            current: &current,
        };
        assert_eq!(
            rules(&validate_ceiling(&ctx, Decimal::from(90), false)),
            vec![Rule::ProxiesDisabled]
        );
    }

    #[test]
    fn test_buy_now_rules() {
        let item = item(Workflow::Active);
        assert!(validate_buy_now(&item, &during(&item)).is_empty());
        assert_eq!(
            rules(&validate_buy_now(&item, &after(&item))),
            vec![Rule::AuctionClosed]
        );

        let mut no_price = item.clone();
        no_price.buy_now_price = Decimal::ZERO;
        assert_eq!(
            rules(&validate_buy_now(&no_price, &during(&no_price))),
            vec![Rule::BuyNowDisabled]
        );
    }

    #[test]
    fn test_validate_item() {
        let mut bad = item(Workflow::NotStarted);
        bad.buy_now_price = Decimal::from(10);
        bad.bid_step = Decimal::ZERO;
        bad.window.end = bad.window.start;
        assert_eq!(
            validate_item(&bad),
            vec![
                ItemProblem::BuyNowBelowStartingPrice,
                ItemProblem::NonPositiveBidStep,
                ItemProblem::MalformedWindow
            ]
        );

        let mut instant = item(Workflow::NotStarted);
        instant.instant_only = true;
        instant.buy_now_price = Decimal::ZERO;
        assert_eq!(validate_item(&instant), vec![ItemProblem::InstantOnlyWithoutBuyNow]);

        assert!(validate_item(&item(Workflow::Active)).is_empty());
    }
}
