//! Bid and proxy-bid resolution engine for time-boxed auctions.
//!
//! Bidders either place manual bids or register a private ceiling (a proxy)
//! that the engine spends on their behalf. This crate decides:
//!
//! - the phase of an auction from its window and admin workflow
//! - the current leading price of a round
//! - whether a bid, ceiling or instant purchase is acceptable
//! - which Auto bids competing proxies produce
//! - whether the buy-now option is still shown
//! - the fee owed on a closing sale
//!
//! # Architecture
//!
//! - `call`: Message types for state-changing operations
//! - `handlers`: The engine and its mutating operations
//! - `queries`: Read-only views
//! - `storage`: Collaborator traits (items, ledger, proxies, auth, notifications)
//! - `state`: In-memory storage
//! - `config`: Engine configuration
//! - `error`: Error types
//!
//! # Example
//!
//! ```ignore
//! use proxybid_engine::{BiddingEngine, CallContext, EngineConfig, MemoryStore};
//!
//! let store = Arc::new(MemoryStore::new());
//! store.insert_item(item);
//! let engine = BiddingEngine::new(store, EngineConfig::default());
//!
//! let ctx = CallContext::new(user_id, Utc::now());
//! engine.set_proxy(&ctx, item_id, round, ceiling)?;
//! engine.place_bid(&ctx, item_id, round, amount, BidKind::Standard)?;
//! ```

pub mod call;
pub mod config;
pub mod error;
pub mod fees;
pub mod handlers;
pub mod ledger;
pub mod phase;
pub mod queries;
pub mod resolver;
pub mod state;
pub mod storage;
pub mod threshold;
pub mod validator;

pub use call::{BiddingCall, CallOutcome};
pub use config::{EngineConfig, ProxyOrdering};
pub use error::{ConfigurationError, EngineError, Rule, StorageError, ValidationError, Violation};
pub use fees::{FeeRangeProvider, FeeSchedule, StaticFeeRanges};
pub use handlers::{BidReceipt, BiddingEngine, CallContext, HandlerResult};
pub use phase::{Phase, PhaseStatus};
pub use queries::{AuctionStateView, BiddingQuery, BiddingQueryResponse, ProxyStatus};
pub use state::MemoryStore;
pub use storage::{
    AllowAll, Authorizer, BidLedger, EngineEvent, ItemDirectory, NoopNotifier, Notifier,
    ProxyStore, Storage,
};
