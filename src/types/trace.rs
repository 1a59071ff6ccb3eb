//! Trace graph types shared by the forward and backward tracers
//!
//! A `TraceResult` is created empty at traversal start, grows monotonically
//! while the BFS runs and is frozen on return. The visited-set inside the
//! tracers guarantees no (txid, vout) pair ever appears as more than one
//! node, so nodes and edges always form a DAG.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a traced output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtxoStatus {
    Unspent,
    Spent,
    Coinbase,
    Unknown,
}

/// A single output instance discovered by a traversal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtxoNode {
    pub txid: String,
    pub vout: u32,
    pub value_sats: u64,
    pub address: Option<String>,
    pub script_type: String,
    pub status: UtxoStatus,
    pub block_height: Option<u64>,
    pub block_time: Option<i64>,
    pub spent_by_txid: Option<String>,
    pub spent_by_vin: Option<u32>,
    pub depth: u32,
    pub coinjoin_score: f64,
}

/// A spend edge: (source output) -> (destination transaction, input index)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEdge {
    pub from_txid: String,
    pub from_vout: u32,
    pub to_txid: String,
    pub to_vin: u32,
    pub value_sats: u64,
}

/// Direction a trace ran in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
}

/// Complete result of one bounded traversal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceResult {
    pub start_txid: String,
    pub start_vout: u32,
    pub direction: Direction,
    pub max_depth: u32,
    pub nodes: Vec<UtxoNode>,
    pub edges: Vec<TraceEdge>,
    pub unspent_endpoints: Vec<UtxoNode>,
    pub coinbase_origins: Vec<UtxoNode>,
    pub coinjoin_txids: Vec<String>,
    pub total_transactions: u64,
    pub total_value_traced_sats: u64,
    pub execution_time_ms: u64,
    pub warnings: Vec<String>,
    pub hit_limit: bool,
    pub index_enabled: bool,
}

impl TraceResult {
    pub fn new(start_txid: &str, start_vout: u32, direction: Direction, max_depth: u32) -> Self {
        Self {
            start_txid: start_txid.to_string(),
            start_vout,
            direction,
            max_depth,
            nodes: Vec::new(),
            edges: Vec::new(),
            unspent_endpoints: Vec::new(),
            coinbase_origins: Vec::new(),
            coinjoin_txids: Vec::new(),
            total_transactions: 0,
            total_value_traced_sats: 0,
            execution_time_ms: 0,
            warnings: Vec::new(),
            hit_limit: false,
            index_enabled: false,
        }
    }

    /// Record a CoinJoin txid once
    pub fn record_coinjoin(&mut self, txid: &str) {
        if !self.coinjoin_txids.iter().any(|t| t == txid) {
            self.coinjoin_txids.push(txid.to_string());
        }
    }

    /// Summary counters for report assembly
    pub fn summary(&self) -> TraceSummary {
        TraceSummary {
            total_nodes: self.nodes.len(),
            unspent_count: self.unspent_endpoints.len(),
            coinbase_count: self.coinbase_origins.len(),
            coinjoin_count: self.coinjoin_txids.len(),
        }
    }
}

/// Aggregate counts derived from a trace result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSummary {
    pub total_nodes: usize,
    pub unspent_count: usize,
    pub coinbase_count: usize,
    pub coinjoin_count: usize,
}
