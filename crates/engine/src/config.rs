//! Engine configuration.
//!
//! Operators tune proxy behavior and the default fee table here. The node loads
//! it from a TOML file; embedding applications can build it in code.

use std::fs;
use std::path::Path;

use proxybid_types::FeeRange;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Tie-break between proxies with equal ceilings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyOrdering {
    /// Whoever opted in first is stronger.
    #[default]
    EarliestFirst,
    LatestFirst,
}

/// Configuration for a bidding engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Whether bidders may register proxies at all.
    pub autobid_enabled: bool,

    /// Ordering among equal-ceiling proxies.
    pub proxy_ordering: ProxyOrdering,

    /// Require an item to be not closed before it reports open.
    pub strict_open: bool,

    /// Fee tiers contributed by the configuration provider.
    pub fee_ranges: Vec<FeeRange>,

    /// Default number of rows for highest-bid listings.
    pub highest_bids_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            autobid_enabled: true,
            proxy_ordering: ProxyOrdering::default(),
            strict_open: false,
            fee_ranges: default_fee_ranges(),
            highest_bids_limit: 10,
        }
    }
}

/// Three-tier schedule used when nothing else is configured.
pub fn default_fee_ranges() -> Vec<FeeRange> {
    vec![
        FeeRange::new(Decimal::ZERO, Decimal::new(3, 2), Decimal::from(15)),
        FeeRange::new(Decimal::from(10_000), Decimal::new(25, 3), Decimal::from(50)),
        FeeRange::new(Decimal::from(100_000), Decimal::new(2, 2), Decimal::from(100)),
    ]
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigurationError> {
        let contents = fs::read_to_string(&path).map_err(|e| {
            ConfigurationError::InvalidConfig(format!("Failed to read config file: {}", e))
        })?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(s: &str) -> Result<Self, ConfigurationError> {
        let config: Self = toml::from_str(s).map_err(|e| {
            ConfigurationError::InvalidConfig(format!("Failed to parse config: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.highest_bids_limit == 0 {
            return Err(ConfigurationError::InvalidConfig(
                "highest_bids_limit cannot be zero".into(),
            ));
        }

        for range in &self.fee_ranges {
            crate::fees::check_range(range)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.autobid_enabled);
        assert_eq!(config.fee_ranges.len(), 3);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = EngineConfig::from_toml(
            r#"
            autobid_enabled = false
            proxy_ordering = "latest_first"
            "#,
        )
        .unwrap();
        assert!(!config.autobid_enabled);
        assert_eq!(config.proxy_ordering, ProxyOrdering::LatestFirst);
        assert_eq!(config.highest_bids_limit, 10);
    }

    #[test]
    fn test_from_toml_fee_ranges() {
        let config = EngineConfig::from_toml(
            r#"
            [[fee_ranges]]
            from = "0"
            sell_price_fee = "0.05"
            single_auction_fee = "2"
            "#,
        )
        .unwrap();
        assert_eq!(config.fee_ranges.len(), 1);
        assert_eq!(config.fee_ranges[0].sell_price_fee, Decimal::new(5, 2));
    }

    #[test]
    fn test_invalid_listing_limit() {
        let config = EngineConfig {
            highest_bids_limit: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_invalid_fee_fraction() {
        let mut config = EngineConfig::default();
        config.fee_ranges[0].sell_price_fee = Decimal::from(2);
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidFeeRange { .. })
        ));
    }
}
