//! Safety limits shared by the traversal engines
//!
//! Every traversal terminates when any cap is hit, returning partial
//! results with `hit_limit` set rather than erroring. Limit values are
//! policy, not physics - callers may tighten them per request.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard caps applied to one traversal run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceLimits {
    /// Maximum transactions fetched and processed
    pub max_transactions: u64,
    /// Maximum BFS queue length; the queue is truncated beyond this
    pub max_queue_size: usize,
    /// Overall wall-clock budget in seconds
    pub max_trace_seconds: u64,
    /// Consecutive address-index failures before forward resolution is
    /// disabled for the remainder of the run
    pub max_consecutive_index_failures: u32,
}

impl TraceLimits {
    /// Limits for plain forward/backward traces
    pub fn standard() -> Self {
        Self {
            max_transactions: 200,
            max_queue_size: 1000,
            max_trace_seconds: 60,
            max_consecutive_index_failures: 3,
        }
    }

    /// Limits for KYC privacy traces (more transactions, same clock)
    pub fn kyc() -> Self {
        Self {
            max_transactions: 300,
            max_queue_size: 1000,
            max_trace_seconds: 60,
            max_consecutive_index_failures: 3,
        }
    }

    pub fn time_budget(&self) -> Duration {
        Duration::from_secs(self.max_trace_seconds)
    }
}

impl Default for TraceLimits {
    fn default() -> Self {
        Self::standard()
    }
}
