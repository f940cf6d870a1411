//! Plain-text rendering for the CLI.

use proxybid_engine::{AuctionStateView, ProxyStatus};
use proxybid_types::{show_as_cents, Bid, BidKind, FeeQuote};
use rust_decimal::Decimal;

/// `1234.5` in `USD` renders as `1,234.50 USD`.
pub fn money(amount: Decimal, currency: &str) -> String {
    format!("{} {}", show_as_cents(amount, ".", ","), currency)
}

fn kind_label(kind: BidKind) -> &'static str {
    match kind {
        BidKind::Standard => "manual",
        BidKind::Instant => "instant",
        BidKind::Auto => "auto",
    }
}

/// One line per bid: `#id user amount (kind)`.
pub fn bid_line(bid: &Bid, currency: &str) -> String {
    format!(
        "#{} user {} {} ({})",
        bid.id,
        bid.user_id,
        money(bid.amount, currency),
        kind_label(bid.kind)
    )
}

pub fn auction_state(view: &AuctionStateView, currency: &str) -> Vec<String> {
    let leader = view
        .lead_bid_user_id
        .map(|u| u.to_string())
        .unwrap_or_else(|| "-".to_string());

    vec![
        format!("Item {} round {}:", view.item_id, view.round),
        format!("  Phase: {:?}", view.phase),
        format!("  Open: {}  Closed: {}", view.is_open, view.is_closed),
        format!("  Current price: {}", money(view.min_price, currency)),
        format!("  Leader: {}", leader),
        format!("  Buy-now shown: {}", view.buy_now_visible),
        format!("  Bids: {}", view.bid_count),
    ]
}

pub fn proxy_status(status: &ProxyStatus, currency: &str) -> String {
    match &status.proxy {
        Some(proxy) if status.outbid => format!(
            "Proxy #{} ceiling {} is outbid (current price {})",
            proxy.id,
            money(proxy.ceiling, currency),
            money(status.min_price, currency)
        ),
        Some(proxy) => format!(
            "Proxy #{} ceiling {} is active",
            proxy.id,
            money(proxy.ceiling, currency)
        ),
        None => "No active proxy".to_string(),
    }
}

pub fn fee_quote(quote: &FeeQuote) -> String {
    format!(
        "Fee on {}: {} ({}% + {})",
        money(quote.sale_price, &quote.currency),
        money(quote.total_fee, &quote.currency),
        (quote.fraction * Decimal::ONE_HUNDRED).normalize(),
        money(quote.flat, &quote.currency)
    )
}
