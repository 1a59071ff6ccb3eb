//! Forward UTXO tracing: where did this output's value go
//!
//! Follows spends hop by hop using the address-index collaborator to find
//! each spending transaction. Without the index the tracer still identifies
//! whether an output is spent, it just cannot follow the spend - branches
//! end as dead SPENT nodes with a warning.

use crate::config::TracePolicy;
use crate::detection::classify_coinjoin;
use crate::errors::{validate_txid, AppResult};
use crate::tracer::TraceLimits;
use crate::traits::{AddressIndex, NodeQuery, ProgressSink, ProgressUpdate};
use crate::types::{Direction, TraceEdge, TraceResult, UtxoNode, UtxoStatus};
use crate::utils::currency::format_sats_as_btc;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Forward tracer over injected collaborator handles
pub struct ForwardTracer {
    node: Arc<dyn NodeQuery>,
    index: Option<Arc<dyn AddressIndex>>,
    limits: TraceLimits,
    policy: TracePolicy,
}

impl ForwardTracer {
    pub fn new(node: Arc<dyn NodeQuery>, index: Option<Arc<dyn AddressIndex>>) -> Self {
        Self {
            node,
            index,
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

    /// Trace a UTXO forward through all subsequent spends
    pub async fn trace_forward(
        &self,
        txid: &str,
        vout: u32,
        max_depth: u32,
        progress: Option<&dyn ProgressSink>,
    ) -> AppResult<TraceResult> {
        validate_txid(txid)?;
        let max_depth = max_depth.min(self.policy.max_depth);

        info!(
            "Forward trace start: {}:{}, max_depth={}, max_transactions={}, timeout={}s",
            txid, vout, max_depth, self.limits.max_transactions, self.limits.max_trace_seconds
        );

        let start_time = Instant::now();
        let mut result = TraceResult::new(txid, vout, Direction::Forward, max_depth);
        result.index_enabled = self.index.is_some();

        if !result.index_enabled {
            result.warnings.push(
                "Address index not available - forward tracing limited. \
                 Can identify spent UTXOs but cannot follow to spending transaction."
                    .to_string(),
            );
        }

        let mut queue: VecDeque<(String, u32, u32)> = VecDeque::new();
        queue.push_back((txid.to_string(), vout, 0));
        let mut visited: HashSet<(String, u32)> = HashSet::new();
        let mut tx_count: u64 = 0;
        let mut consecutive_index_failures: u32 = 0;
        let mut index_disabled = false;

        while !queue.is_empty() && tx_count < self.limits.max_transactions {
            if start_time.elapsed() >= self.limits.time_budget() {
                warn!(
                    "Forward trace timeout after {:?}: tx_count={}, queue={}, visited={}",
                    start_time.elapsed(),
                    tx_count,
                    queue.len(),
                    visited.len()
                );
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

            let (current_txid, current_vout, depth) = match queue.pop_front() {
                Some(item) => item,
                None => break,
            };

            if !visited.insert((current_txid.clone(), current_vout)) {
                continue;
            }

            if depth > max_depth {
                debug!(
                    "Depth limit {} reached at {}:{}",
                    max_depth, current_txid, current_vout
                );
                result
                    .warnings
                    .push(format!("Depth limit reached at {}:{}", current_txid, current_vout));
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

            let output = match tx.outputs.get(current_vout as usize) {
                Some(o) => o.clone(),
                None => {
                    result.warnings.push(format!(
                        "Invalid vout {} for tx {}",
                        current_vout, current_txid
                    ));
                    continue;
                }
            };

            let detection = classify_coinjoin(&tx);
            if detection.score > self.policy.coinjoin_threshold {
                result.record_coinjoin(&current_txid);
            }

            let status = match self.node.get_output_status(&current_txid, current_vout).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(
                        "Output status check failed for {}:{}: {}",
                        current_txid, current_vout, e
                    );
                    result.warnings.push(format!(
                        "Output status check failed for {}:{}: {}",
                        current_txid, current_vout, e
                    ));
                    result.nodes.push(UtxoNode {
                        txid: current_txid.clone(),
                        vout: current_vout,
                        value_sats: output.value_sats,
                        address: output.address.clone(),
                        script_type: output.script_type.clone(),
                        status: UtxoStatus::Unknown,
                        block_height: tx.block_height,
                        block_time: tx.block_time,
                        spent_by_txid: None,
                        spent_by_vin: None,
                        depth,
                        coinjoin_score: detection.score,
                    });
                    continue;
                }
            };

            if status.is_unspent() {
                let node = UtxoNode {
                    txid: current_txid.clone(),
                    vout: current_vout,
                    value_sats: output.value_sats,
                    address: output.address.clone(),
                    script_type: output.script_type.clone(),
                    status: UtxoStatus::Unspent,
                    block_height: tx.block_height,
                    block_time: tx.block_time,
                    spent_by_txid: None,
                    spent_by_vin: None,
                    depth,
                    coinjoin_score: detection.score,
                };
                result.unspent_endpoints.push(node.clone());
                result.nodes.push(node);
                result.total_value_traced_sats += output.value_sats;
            } else {
                let mut spending_txid: Option<String> = None;
                let mut spending_vin: Option<u32> = None;

                if let Some(index) = &self.index {
                    if depth < max_depth && !index_disabled {
                        match index
                            .find_spending_transaction(&current_txid, current_vout)
                            .await
                        {
                            Ok(Some(spender)) => {
                                consecutive_index_failures = 0;
                                debug!(
                                    "Index resolved spender of {}:{} -> {}",
                                    current_txid, current_vout, spender
                                );

                                match self.node.get_transaction(&spender).await {
                                    Ok(Some(spending_tx)) => {
                                        spending_vin = spending_tx
                                            .input_index_spending(&current_txid, current_vout)
                                            .map(|i| i as u32);

                                        result.edges.push(TraceEdge {
                                            from_txid: current_txid.clone(),
                                            from_vout: current_vout,
                                            to_txid: spender.clone(),
                                            to_vin: spending_vin.unwrap_or(0),
                                            value_sats: output.value_sats,
                                        });

                                        for out_idx in 0..spending_tx.outputs.len() {
                                            let key = (spender.clone(), out_idx as u32);
                                            if !visited.contains(&key) {
                                                queue.push_back((
                                                    spender.clone(),
                                                    out_idx as u32,
                                                    depth + 1,
                                                ));
                                            }
                                        }
                                        spending_txid = Some(spender);
                                    }
                                    Ok(None) => {
                                        result.warnings.push(format!(
                                            "Spending transaction not found: {}",
                                            spender
                                        ));
                                        spending_txid = Some(spender);
                                    }
                                    Err(e) => {
                                        result.warnings.push(format!(
                                            "Spending transaction lookup failed: {}: {}",
                                            spender, e
                                        ));
                                        spending_txid = Some(spender);
                                    }
                                }
                            }
                            Ok(None) => {
                                consecutive_index_failures += 1;
                                debug!(
                                    "Index could not resolve spender of {}:{} ({} consecutive failures)",
                                    current_txid, current_vout, consecutive_index_failures
                                );
                            }
                            Err(e) => {
                                consecutive_index_failures += 1;
                                warn!(
                                    "Index lookup failed for {}:{}: {} ({} consecutive failures)",
                                    current_txid, current_vout, e, consecutive_index_failures
                                );
                            }
                        }

                        if consecutive_index_failures
                            >= self.limits.max_consecutive_index_failures
                            && !index_disabled
                        {
                            index_disabled = true;
                            result.warnings.push(format!(
                                "Address index disabled after {} consecutive failures - \
                                 continuing without forward resolution",
                                consecutive_index_failures
                            ));
                        }
                    }
                }

                result.nodes.push(UtxoNode {
                    txid: current_txid.clone(),
                    vout: current_vout,
                    value_sats: output.value_sats,
                    address: output.address.clone(),
                    script_type: output.script_type.clone(),
                    status: UtxoStatus::Spent,
                    block_height: tx.block_height,
                    block_time: tx.block_time,
                    spent_by_txid: spending_txid,
                    spent_by_vin: spending_vin,
                    depth,
                    coinjoin_score: detection.score,
                });
                result.total_value_traced_sats += output.value_sats;
            }

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
            "Forward trace complete: {} transactions, {} nodes, {} edges, {} unspent endpoints, {} traced in {}ms",
            tx_count,
            result.nodes.len(),
            result.edges.len(),
            result.unspent_endpoints.len(),
            format_sats_as_btc(result.total_value_traced_sats),
            result.execution_time_ms
        );

        Ok(result)
    }
}
