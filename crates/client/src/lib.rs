//! Client SDK for the proxy-bid node.
//!
//! This crate provides:
//! - A typed JSON-RPC client for every node method
//! - Rejection details decoded from validation errors
//! - Plain-text formatting of bids and auction state

pub mod format;
pub mod rpc;

pub use rpc::{ClientError, NodeClient};
