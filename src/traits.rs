//! Collaborator contracts consumed by the traversal engines
//!
//! The tracers never talk to Bitcoin Core or the address index directly -
//! they hold `Arc<dyn NodeQuery>` / `Arc<dyn AddressIndex>` handles injected
//! by the caller. This keeps traversal state request-scoped (no hidden
//! global clients) and lets tests drive the engines against in-memory
//! transaction graphs.

use crate::errors::{IndexResult, RpcResult};
use crate::types::{OutputStatus, TransactionRecord};
use async_trait::async_trait;

/// Read-only view of the blockchain node
///
/// Implementations must be idempotent and side-effect-free from the core's
/// perspective. A transaction that does not exist is `Ok(None)`, never an
/// error - errors mean the collaborator itself failed.
#[async_trait]
pub trait NodeQuery: Send + Sync {
    /// Fetch a transaction by id, `None` when the node has no record of it
    async fn get_transaction(&self, txid: &str) -> RpcResult<Option<TransactionRecord>>;

    /// UTXO-set membership check for an outpoint
    async fn get_output_status(&self, txid: &str, vout: u32) -> RpcResult<OutputStatus>;

    /// Current chain tip height
    async fn get_block_height(&self) -> RpcResult<u64>;

    /// Unix timestamp of the block at the given height
    async fn get_block_time(&self, height: u64) -> RpcResult<i64>;
}

/// One entry in an address's transaction history
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub txid: String,
    /// 0 for unconfirmed transactions
    pub height: u64,
}

/// Optional address-indexing collaborator
///
/// Forward-direction tracing degrades gracefully when this is unavailable:
/// spent outputs are recorded as dead branches instead of being followed.
#[async_trait]
pub trait AddressIndex: Send + Sync {
    /// Transaction history for an address, oldest first
    async fn get_history(&self, address: &str) -> IndexResult<Vec<HistoryEntry>>;

    /// The transaction that spent the given outpoint, `None` when unknown
    async fn find_spending_transaction(&self, txid: &str, vout: u32)
        -> IndexResult<Option<String>>;
}

/// Progress update emitted once per dequeued BFS item
#[derive(Debug, Clone, Copy)]
pub struct ProgressUpdate {
    pub transactions_processed: u64,
    pub visited: usize,
    pub current_depth: u32,
}

/// Injectable progress sink, invoked between I/O suspension points
///
/// Implementations must not block: the tracer calls this synchronously from
/// inside its BFS loop.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, update: ProgressUpdate);
}

/// Sink that discards all updates
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn on_progress(&self, _update: ProgressUpdate) {}
}
