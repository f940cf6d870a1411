//! Tiered sale fees.
//!
//! Ranges come from any number of registered providers. Their contributions
//! are concatenated in registration order, passed through the registered
//! overrides in order, then sorted by `from`. The table is rebuilt on every
//! lookup so a provider change is picked up immediately.

use std::fmt;

use proxybid_types::{round_cents, FeeQuote, FeeRange};
use rust_decimal::Decimal;

use crate::error::ConfigurationError;

/// Source of fee tiers.
pub trait FeeRangeProvider: Send + Sync {
    fn fee_ranges(&self) -> Vec<FeeRange>;
}

/// Fixed list of tiers, e.g. from configuration.
#[derive(Clone, Debug, Default)]
pub struct StaticFeeRanges(pub Vec<FeeRange>);

impl FeeRangeProvider for StaticFeeRanges {
    fn fee_ranges(&self) -> Vec<FeeRange> {
        self.0.clone()
    }
}

/// Adjustment applied to the merged tier list before sorting.
pub type FeeOverride = Box<dyn Fn(&mut Vec<FeeRange>) + Send + Sync>;

/// Provider registry plus ordered overrides.
#[derive(Default)]
pub struct FeeSchedule {
    providers: Vec<Box<dyn FeeRangeProvider>>,
    overrides: Vec<FeeOverride>,
}

impl fmt::Debug for FeeSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeeSchedule")
            .field("providers", &self.providers.len())
            .field("overrides", &self.overrides.len())
            .finish()
    }
}

impl FeeSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule backed by a single static provider.
    pub fn from_ranges(ranges: Vec<FeeRange>) -> Self {
        let mut schedule = Self::new();
        schedule.register_provider(StaticFeeRanges(ranges));
        schedule
    }

    pub fn register_provider<P: FeeRangeProvider + 'static>(&mut self, provider: P) -> &mut Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Overrides run in registration order, so a later one sees (and wins
    /// over) the edits of an earlier one.
    pub fn add_override<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&mut Vec<FeeRange>) + Send + Sync + 'static,
    {
        self.overrides.push(Box::new(f));
        self
    }

    /// The effective tier table, sorted ascending by `from`.
    pub fn table(&self) -> Result<Vec<FeeRange>, ConfigurationError> {
        let mut ranges: Vec<FeeRange> = self
            .providers
            .iter()
            .flat_map(|p| p.fee_ranges())
            .collect();

        for adjust in &self.overrides {
            adjust(&mut ranges);
        }

        ranges.sort_by(|a, b| a.from.cmp(&b.from));

        // Keep the last contribution for a repeated threshold.
        let mut table: Vec<FeeRange> = Vec::with_capacity(ranges.len());
        for range in ranges {
            match table.last_mut() {
                Some(last) if last.from == range.from => *last = range,
                _ => table.push(range),
            }
        }

        if table.is_empty() {
            return Err(ConfigurationError::EmptyFeeTable);
        }
        for range in &table {
            check_range(range)?;
        }
        Ok(table)
    }

    /// Fee owed on a sale at `sale_price`.
    pub fn fee_for(&self, sale_price: Decimal, currency: &str) -> Result<FeeQuote, ConfigurationError> {
        let table = self.table()?;
        let tier = table
            .iter()
            .rev()
            .find(|r| r.from <= sale_price)
            .unwrap_or(&table[0]);

        Ok(FeeQuote {
            sale_price,
            currency: currency.to_string(),
            fraction: tier.sell_price_fee,
            flat: tier.single_auction_fee,
            total_fee: round_cents(sale_price * tier.sell_price_fee + tier.single_auction_fee),
        })
    }
}

/// Reject a tier with a fraction outside `[0, 1]` or a negative flat fee.
pub fn check_range(range: &FeeRange) -> Result<(), ConfigurationError> {
    if range.sell_price_fee < Decimal::ZERO || range.sell_price_fee > Decimal::ONE {
        return Err(ConfigurationError::InvalidFeeRange {
            from: range.from,
            reason: format!("fraction {} is outside 0..=1", range.sell_price_fee),
        });
    }
    if range.single_auction_fee < Decimal::ZERO {
        return Err(ConfigurationError::InvalidFeeRange {
            from: range.from,
            reason: format!("flat fee {} is negative", range.single_auction_fee),
        });
    }
    Ok(())
}
