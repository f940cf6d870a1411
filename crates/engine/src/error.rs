//! Engine error types.

use std::fmt;

use proxybid_types::{ItemId, Round};
use rust_decimal::Decimal;
use thiserror::Error;

/// Business rule that rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// The bidder already holds the lead bid.
    SelfOutbid,
    NotStarted,
    Finished,
    Expired,
    InsufficientAmount,
    CeilingTooLow,
    NegativeAmount,
    InstantOnly,
    ReservedKind,
    AuctionClosed,
    BuyNowDisabled,
    ProxiesDisabled,
}

/// Input field a violation is reported against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Amount,
    Ceiling,
    BuyNow,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Amount => write!(f, "amount"),
            Field::Ceiling => write!(f, "ceiling"),
            Field::BuyNow => write!(f, "buy_now"),
        }
    }
}

/// A single violated rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub rule: Rule,
    pub field: Field,
    pub message: String,
}

impl Violation {
    pub fn new(rule: Rule, field: Field, message: impl Into<String>) -> Self {
        Self {
            rule,
            field,
            message: message.into(),
        }
    }
}

/// Every rule a request violated, in evaluation order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Rejected: {}", summary(.violations))]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl ValidationError {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    pub fn has(&self, rule: Rule) -> bool {
        self.violations.iter().any(|v| v.rule == rule)
    }

    /// The single message to show when only one fits. Self-outbid wins.
    pub fn primary(&self) -> Option<&Violation> {
        self.violations
            .iter()
            .find(|v| v.rule == Rule::SelfOutbid)
            .or_else(|| self.violations.first())
    }
}

fn summary(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.field, v.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Misconfiguration that an operator has to fix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Fee table is empty")]
    EmptyFeeTable,

    #[error("Malformed bidding window on item {0}: end must be after start")]
    MalformedWindow(ItemId),

    #[error("Invalid fee range starting at {from}: {reason}")]
    InvalidFeeRange { from: Decimal, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Persistence failure, propagated unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Storage failure: {0}")]
pub struct StorageError(pub String);

/// Errors that can occur in the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Auction item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("Round mismatch. Expected: {expected}, Got: {got}")]
    RoundMismatch { expected: Round, got: Round },

    #[error("Not authorized")]
    NotAuthorized,
}

impl EngineError {
    /// Validation details when the request was rejected on business rules.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            EngineError::Validation(err) => Some(err),
            _ => None,
        }
    }
}
