//! Buy-now visibility.
//!
//! The buy-now option disappears once enough of the window has elapsed or once
//! bidding has climbed close enough to the buy-now price. This only drives
//! presentation: an instant purchase is accepted whenever the item is not
//! closed.

use chrono::{DateTime, Utc};
use proxybid_types::{percent_of, AuctionItem};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::ConfigurationError;
use crate::phase::validate_window;

/// Elapsed share of the window in `[0, 1]`, rounded to two places.
pub fn time_fraction(item: &AuctionItem, now: DateTime<Utc>) -> Result<Decimal, ConfigurationError> {
    validate_window(item)?;
    let window = &item.window;

    let total = (window.end - window.start).num_milliseconds();
    let elapsed = (now - window.start).num_milliseconds();

    let fraction = (Decimal::from(elapsed) / Decimal::from(total))
        .max(Decimal::ZERO)
        .min(Decimal::ONE);
    Ok(fraction.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

/// Whether the buy-now option should be offered at `now`.
pub fn buy_now_visible(
    item: &AuctionItem,
    now: DateTime<Utc>,
    min_price: Decimal,
) -> Result<bool, ConfigurationError> {
    let fraction = time_fraction(item, now)?;
    if item.instant_only {
        return Ok(true);
    }

    let late = fraction * Decimal::ONE_HUNDRED >= item.threshold_percent;
    let close_to_price = item.buy_now_price > Decimal::ZERO
        && percent_of(item.buy_now_price, item.threshold_percent) <= min_price;

    Ok(!(late || close_to_price))
}
