//! Bitcoin Core RPC integration module
//!
//! This module provides all Bitcoin Core RPC-related functionality including:
//! - **Client** - Async Bitcoin Core RPC client with retry logic
//! - **Cache** - Per-session transaction caching for RPC responses
//! - **Retry** - Exponential backoff retry utilities and timeout wrappers
//!
//! The client speaks JSON-RPC over HTTP (verbose, prevout-annotated
//! `getrawtransaction`) and implements the `NodeQuery` collaborator
//! contract consumed by the traversal engines.

pub mod cache;
pub mod client;
pub mod retry;

pub use cache::{CacheStats, TransactionCache};
pub use client::BitcoinRpcClient;
pub use retry::{calculate_next_backoff, execute_with_timeout};
