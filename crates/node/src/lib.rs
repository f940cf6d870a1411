//! JSON-RPC node for the proxy-bid engine.
//!
//! Hosts a [`proxybid_engine::BiddingEngine`] over an in-memory store with a
//! simulated clock, for local testing and demos.

pub mod config;
pub mod server;
pub mod types;

pub use config::NodeConfig;
pub use server::{start, NodeApiServer, NodeServer, NODE_ERROR_CODE, VALIDATION_ERROR_CODE};
