//! Retry logic utilities for RPC operations
//!
//! This module provides helper functions for implementing exponential backoff
//! retry logic and timeout wrappers for RPC client operations.

use std::future::Future;
use std::time::Duration;
use tokio::time::error::Elapsed;
use tokio::time::timeout;

/// Calculate next backoff duration using exponential backoff with a maximum cap
///
/// Pure helper implementing the formula:
/// `new_backoff = min(current_backoff * multiplier, max_backoff)`
///
/// # Example
/// ```
/// use std::time::Duration;
/// use utxo_tracer::rpc::calculate_next_backoff;
///
/// let backoff = Duration::from_millis(100);
/// let next = calculate_next_backoff(backoff, 2.0, 30);
/// assert_eq!(next, Duration::from_millis(200));
/// ```
pub fn calculate_next_backoff(
    current_backoff: Duration,
    multiplier: f64,
    max_backoff_seconds: u64,
) -> Duration {
    Duration::from_millis((current_backoff.as_millis() as f64 * multiplier) as u64)
        .min(Duration::from_secs(max_backoff_seconds))
}

/// Execute an async operation with a timeout wrapper
///
/// Collaborators apply their own per-call timeouts so a single hanging
/// request cannot eat a traversal's whole wall-clock budget. The outer
/// `Err(Elapsed)` is the timeout; the inner value is the operation result.
pub async fn execute_with_timeout<T, F>(
    timeout_seconds: u64,
    operation: F,
) -> Result<T, Elapsed>
where
    F: Future<Output = T>,
{
    timeout(Duration::from_secs(timeout_seconds), operation).await
}
