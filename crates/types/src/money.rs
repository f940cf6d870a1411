//! Cent-precision money helpers.

use rust_decimal::{Decimal, RoundingStrategy};

/// Round to two decimals, halves away from zero.
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Format an amount with two decimals and the given separators.
pub fn show_as_cents(value: Decimal, decimal_sep: &str, thousands_sep: &str) -> String {
    let rounded = round_cents(value);
    let plain = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push_str(thousands_sep);
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped}{decimal_sep}{frac_part}")
}

/// Conventional increment ladder: (upper bound exclusive, step).
const INCREMENT_LADDER: &[(i64, i64)] = &[
    (300, 25),
    (500, 50),
    (2_000, 100),
    (5_000, 250),
    (10_000, 500),
    (20_000, 1_000),
    (50_000, 2_500),
    (100_000, 5_000),
    (300_000, 10_000),
    (1_000_000, 25_000),
    (2_000_000, 50_000),
    (3_000_000, 100_000),
    (5_000_000, 250_000),
    (10_000_000, 500_000),
];

/// Suggested bid increment for an item currently priced at `price`.
pub fn suggested_bid_step(price: Decimal) -> Decimal {
    INCREMENT_LADDER
        .iter()
        .find(|(upper, _)| price < Decimal::from(*upper))
        .map(|(_, step)| Decimal::from(*step))
        .unwrap_or_else(|| Decimal::from(1_000_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_cents_half_away_from_zero() {
        assert_eq!(round_cents(Decimal::new(10005, 3)), Decimal::new(1001, 2));
        assert_eq!(round_cents(Decimal::new(-10005, 3)), Decimal::new(-1001, 2));
        assert_eq!(round_cents(Decimal::new(1234, 2)), Decimal::new(1234, 2));
    }

    #[test]
    fn test_show_as_cents() {
        assert_eq!(show_as_cents(Decimal::new(123456789, 2), ".", ","), "1,234,567.89");
        assert_eq!(show_as_cents(Decimal::from(5), ",", "."), "5,00");
        assert_eq!(show_as_cents(Decimal::new(-15, 1), ".", ""), "-1.50");
        assert_eq!(show_as_cents(Decimal::from(100), ".", ","), "100.00");
    }

    #[test]
    fn test_suggested_bid_step() {
        assert_eq!(suggested_bid_step(Decimal::from(10)), Decimal::from(25));
        assert_eq!(suggested_bid_step(Decimal::from(300)), Decimal::from(50));
        assert_eq!(suggested_bid_step(Decimal::from(4_999)), Decimal::from(250));
        assert_eq!(suggested_bid_step(Decimal::from(12_000_000)), Decimal::from(1_000_000));
    }
}
