//! Backward UTXO tracing: where did this transaction's inputs come from
//!
//! Simpler than the forward direction because input references are embedded
//! in the transaction data - no address index needed. BFS over transaction
//! ids, stopping each branch at a coinbase origin or a limit.

use crate::config::TracePolicy;
use crate::detection::classify_coinjoin;
use crate::errors::{validate_txid, AppResult};
use crate::tracer::TraceLimits;
use crate::traits::{NodeQuery, ProgressSink, ProgressUpdate};
use crate::types::{Direction, TraceEdge, TraceResult, TxInput, UtxoNode, UtxoStatus};
use crate::utils::currency::format_sats_as_btc;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Backward tracer over an injected node handle
pub struct BackwardTracer {
    node: Arc<dyn NodeQuery>,
    limits: TraceLimits,
    policy: TracePolicy,
}

impl BackwardTracer {
    pub fn new(node: Arc<dyn NodeQuery>) -> Self {
        Self {
            node,
            limits: TraceLimits::standard(),
            policy: TracePolicy::default(),
        }
    }

    pub fn with_limits(mut self, limits: TraceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_policy(mut self, policy: TracePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Trace a transaction backward through its inputs to find origins
    pub async fn trace_backward(
        &self,
        txid: &str,
        max_depth: u32,
        progress: Option<&dyn ProgressSink>,
    ) -> AppResult<TraceResult> {
        validate_txid(txid)?;
        let max_depth = max_depth.min(self.policy.max_depth);

        info!(
            "Backward trace start: {}, max_depth={}, max_transactions={}",
            txid, max_depth, self.limits.max_transactions
        );

        let start_time = Instant::now();
        let mut result = TraceResult::new(txid, 0, Direction::Backward, max_depth);

        let mut queue: VecDeque<(String, u32)> = VecDeque::new();
        queue.push_back((txid.to_string(), 0));
        let mut visited: HashSet<String> = HashSet::new();
        let mut tx_count: u64 = 0;

        while !queue.is_empty() && tx_count < self.limits.max_transactions {
            if start_time.elapsed() >= self.limits.time_budget() {
                result.warnings.push(format!(
                    "Trace timeout ({}s) reached - returning partial results",
                    self.limits.max_trace_seconds
                ));
                result.hit_limit = true;
                break;
            }

            if queue.len() > self.limits.max_queue_size {
                result.warnings.push(format!(
                    "Queue size exceeded {}, truncating",
                    self.limits.max_queue_size
                ));
                result.hit_limit = true;
                queue.truncate(self.limits.max_queue_size);
            }

            let (current_txid, depth) = match queue.pop_front() {
                Some(item) => item,
                None => break,
            };

            if !visited.insert(current_txid.clone()) {
                continue;
            }

            if depth > max_depth {
                result
                    .warnings
                    .push(format!("Depth limit reached at {}", current_txid));
                continue;
            }

            let tx = match self.node.get_transaction(&current_txid).await {
                Ok(Some(tx)) => tx,
                Ok(None) => {
                    result
                        .warnings
                        .push(format!("Transaction not found: {}", current_txid));
                    continue;
                }
                Err(e) => {
                    warn!("Transaction fetch failed for {}: {}", current_txid, e);
                    result
                        .warnings
                        .push(format!("Transaction lookup failed: {}: {}", current_txid, e));
                    continue;
                }
            };

            tx_count += 1;

            if tx.is_coinbase() {
                // Newly minted coins: the branch ends here
                let total_value = tx.total_output_sats();
                let coinbase_address = tx.outputs.first().and_then(|o| o.address.clone());
                let node = UtxoNode {
                    txid: current_txid.clone(),
                    vout: 0,
                    value_sats: total_value,
                    address: coinbase_address,
                    script_type: "coinbase".to_string(),
                    status: UtxoStatus::Coinbase,
                    block_height: tx.block_height,
                    block_time: tx.block_time,
                    spent_by_txid: None,
                    spent_by_vin: None,
                    depth,
                    coinjoin_score: 0.0,
                };
                result.coinbase_origins.push(node.clone());
                result.nodes.push(node);

                if let Some(sink) = progress {
                    sink.on_progress(ProgressUpdate {
                        transactions_processed: tx_count,
                        visited: visited.len(),
                        current_depth: depth,
                    });
                }
                continue;
            }

            let detection = classify_coinjoin(&tx);
            if detection.score > self.policy.coinjoin_threshold {
                result.record_coinjoin(&current_txid);
            }

            // Parent transactions are only expanded below the depth limit
            if depth < max_depth {
                for (vin_idx, input) in tx.inputs.iter().enumerate() {
                    if let TxInput::Outpoint {
                        txid: prev_txid,
                        vout: prev_vout,
                        ..
                    } = input
                    {
                        result.edges.push(TraceEdge {
                            from_txid: prev_txid.clone(),
                            from_vout: *prev_vout,
                            to_txid: current_txid.clone(),
                            to_vin: vin_idx as u32,
                            value_sats: 0,
                        });

                        if !visited.contains(prev_txid) {
                            queue.push_back((prev_txid.clone(), depth + 1));
                        }
                    }
                }
            }

            let total_output = tx.total_output_sats();

            // Address from the largest output (usually the main recipient)
            let (tx_address, tx_script_type) = tx
                .outputs
                .iter()
                .max_by_key(|o| o.value_sats)
                .map(|o| (o.address.clone(), o.script_type.clone()))
                .unwrap_or((None, "transaction".to_string()));

            result.nodes.push(UtxoNode {
                txid: current_txid.clone(),
                vout: 0,
                value_sats: total_output,
                address: tx_address,
                script_type: tx_script_type,
                status: UtxoStatus::Spent,
                block_height: tx.block_height,
                block_time: tx.block_time,
                spent_by_txid: None,
                spent_by_vin: None,
                depth,
                coinjoin_score: detection.score,
            });
            result.total_value_traced_sats += total_output;

            if let Some(sink) = progress {
                sink.on_progress(ProgressUpdate {
                    transactions_processed: tx_count,
                    visited: visited.len(),
                    current_depth: depth,
                });
            }
        }

        if tx_count >= self.limits.max_transactions {
            result.warnings.push(format!(
                "Transaction limit ({}) reached",
                self.limits.max_transactions
            ));
            result.hit_limit = true;
        }

        result.total_transactions = tx_count;
        result.execution_time_ms = start_time.elapsed().as_millis() as u64;

        info!(
            "Backward trace complete: {} transactions, {} coinbase origins, {} traced in {}ms",
            tx_count,
            result.coinbase_origins.len(),
            format_sats_as_btc(result.total_value_traced_sats),
            result.execution_time_ms
        );

        Ok(result)
    }
}
