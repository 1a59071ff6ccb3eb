//! Common test utilities
//!
//! In-memory mock collaborators and transaction-graph builders shared by
//! the traversal engine tests. The mocks implement the same `NodeQuery` /
//! `AddressIndex` contracts the production clients do, so the engines run
//! unmodified against synthetic graphs.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use utxo_tracer::errors::{IndexError, IndexResult, RpcResult};
use utxo_tracer::traits::{AddressIndex, HistoryEntry, NodeQuery};
use utxo_tracer::types::{OutputStatus, PrevOut, TransactionRecord, TxInput, TxOutput};

/// Deterministic 64-hex txid from a small number
pub fn txid(n: u32) -> String {
    format!("{:064x}", n)
}

pub fn coinbase_input() -> TxInput {
    TxInput::Coinbase
}

pub fn outpoint(prev_txid: &str, vout: u32) -> TxInput {
    TxInput::Outpoint {
        txid: prev_txid.to_string(),
        vout,
        prevout: None,
    }
}

pub fn outpoint_resolved(prev_txid: &str, vout: u32, value_sats: u64, address: &str) -> TxInput {
    TxInput::Outpoint {
        txid: prev_txid.to_string(),
        vout,
        prevout: Some(PrevOut {
            value_sats,
            address: Some(address.to_string()),
            script_type: "witness_v0_keyhash".to_string(),
        }),
    }
}

pub fn output(value_sats: u64, address: &str) -> TxOutput {
    TxOutput {
        value_sats,
        address: Some(address.to_string()),
        script_type: "witness_v0_keyhash".to_string(),
    }
}

pub fn record(
    txid: &str,
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
    height: u64,
) -> TransactionRecord {
    TransactionRecord {
        txid: txid.to_string(),
        inputs,
        outputs,
        block_height: Some(height),
        block_time: Some(height as i64 * 600),
        confirmations: Some(10),
    }
}

/// In-memory blockchain view implementing `NodeQuery`
#[derive(Default)]
pub struct MockChain {
    transactions: HashMap<String, TransactionRecord>,
    unspent: HashSet<(String, u32)>,
    tip_height: u64,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            transactions: HashMap::new(),
            unspent: HashSet::new(),
            tip_height: 800_000,
        }
    }

    pub fn with_tip(mut self, height: u64) -> Self {
        self.tip_height = height;
        self
    }

    pub fn add_tx(&mut self, tx: TransactionRecord) {
        self.transactions.insert(tx.txid.clone(), tx);
    }

    pub fn mark_unspent(&mut self, txid: &str, vout: u32) {
        self.unspent.insert((txid.to_string(), vout));
    }
}

#[async_trait]
impl NodeQuery for MockChain {
    async fn get_transaction(&self, txid: &str) -> RpcResult<Option<TransactionRecord>> {
        Ok(self.transactions.get(txid).cloned())
    }

    async fn get_output_status(&self, txid: &str, vout: u32) -> RpcResult<OutputStatus> {
        if self.unspent.contains(&(txid.to_string(), vout)) {
            let value_sats = self
                .transactions
                .get(txid)
                .and_then(|tx| tx.outputs.get(vout as usize))
                .map(|o| o.value_sats)
                .unwrap_or(0);
            Ok(OutputStatus::Unspent {
                value_sats,
                confirmations: 10,
            })
        } else {
            Ok(OutputStatus::Spent)
        }
    }

    async fn get_block_height(&self) -> RpcResult<u64> {
        Ok(self.tip_height)
    }

    async fn get_block_time(&self, height: u64) -> RpcResult<i64> {
        Ok(height as i64 * 600)
    }
}

/// In-memory address index implementing `AddressIndex`
///
/// Lookups resolve from the configured maps; missing spend entries answer
/// `Ok(None)`. `fail_all` switches every call to a connection error for
/// circuit-breaker tests.
#[derive(Default)]
pub struct MockIndex {
    spends: HashMap<(String, u32), String>,
    histories: HashMap<String, Vec<HistoryEntry>>,
    fail_all: bool,
    pub calls: AtomicUsize,
}

impl MockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    pub fn add_spend(&mut self, txid: &str, vout: u32, spender: &str) {
        self.spends
            .insert((txid.to_string(), vout), spender.to_string());
    }

    pub fn add_history(&mut self, address: &str, entries: Vec<(String, u64)>) {
        self.histories.insert(
            address.to_string(),
            entries
                .into_iter()
                .map(|(txid, height)| HistoryEntry { txid, height })
                .collect(),
        );
    }
}

#[async_trait]
impl AddressIndex for MockIndex {
    async fn get_history(&self, address: &str) -> IndexResult<Vec<HistoryEntry>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_all {
            return Err(IndexError::ConnectionFailed("mock failure".to_string()));
        }
        Ok(self
            .histories
            .get(address)
            .cloned()
            .unwrap_or_default())
    }

    async fn find_spending_transaction(
        &self,
        txid: &str,
        vout: u32,
    ) -> IndexResult<Option<String>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_all {
            return Err(IndexError::ConnectionFailed("mock failure".to_string()));
        }
        Ok(self.spends.get(&(txid.to_string(), vout)).cloned())
    }
}

/// Assert no (txid, vout) pair appears as more than one node
pub fn assert_unique_nodes(result: &utxo_tracer::types::TraceResult) {
    let mut seen = HashSet::new();
    for node in &result.nodes {
        assert!(
            seen.insert((node.txid.clone(), node.vout)),
            "duplicate node {}:{}",
            node.txid,
            node.vout
        );
    }
}
