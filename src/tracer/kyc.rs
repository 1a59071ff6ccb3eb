//! KYC withdrawal privacy tracing
//!
//! Simulates what an adversary who knows an exchange withdrawal (txid +
//! destination address) could discover about the current location of those
//! funds. A breadth-first search follows the money forward while a
//! cumulative confidence score decays through every hop; CoinJoins degrade
//! it sharply, and a branch whose confidence falls below the cold threshold
//! is pruned immediately - confidence-based early termination is what
//! distinguishes this search from a plain forward trace.
//!
//! Heuristic analysis only: a high privacy score does not mean privacy is
//! actually good, and attacks this model cannot see (timing correlation,
//! network-level observation) exist.

use crate::config::TracePolicy;
use crate::detection::{
    classify_coinjoin, detect_change_output, estimate_anonymity_set, CoinJoinProtocol,
};
use crate::errors::{validate_txid, AppResult};
use crate::tracer::TraceLimits;
use crate::traits::{AddressIndex, NodeQuery, ProgressSink, ProgressUpdate};
use crate::types::{
    ConfidenceLevel, KycTraceResult, PathNode, ProbableDestination, TrailStatus,
};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Absolute ceiling on KYC trace depth, preset-independent
const ABSOLUTE_MAX_DEPTH: u32 = 15;

/// Cumulative confidence never reaches exactly zero
const CONFIDENCE_FLOOR: f64 = 0.001;

/// Named depth tiers exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthPreset {
    Quick,
    Standard,
    Deep,
    Thorough,
}

impl DepthPreset {
    pub fn depth(&self) -> u32 {
        match self {
            DepthPreset::Quick => 3,
            DepthPreset::Standard => 6,
            DepthPreset::Deep => 10,
            DepthPreset::Thorough => 15,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DepthPreset::Quick => "quick",
            DepthPreset::Standard => "standard",
            DepthPreset::Deep => "deep",
            DepthPreset::Thorough => "thorough",
        }
    }

    /// Parse a preset name, falling back to `standard` for unknown input
    pub fn parse(name: &str) -> Self {
        match name {
            "quick" => DepthPreset::Quick,
            "deep" => DepthPreset::Deep,
            "thorough" => DepthPreset::Thorough,
            _ => DepthPreset::Standard,
        }
    }
}

/// One queued branch of the search
struct QueueItem {
    txid: String,
    vout: u32,
    depth: u32,
    coinjoin_count: u32,
    path: Vec<PathNode>,
    tracked_value_sats: u64,
    confidence: f64,
}

/// KYC privacy tracer over injected collaborator handles
pub struct KycPrivacyTracer {
    node: Arc<dyn NodeQuery>,
    index: Option<Arc<dyn AddressIndex>>,
    limits: TraceLimits,
    policy: TracePolicy,
}

impl KycPrivacyTracer {
    pub fn new(node: Arc<dyn NodeQuery>, index: Option<Arc<dyn AddressIndex>>) -> Self {
        Self {
            node,
            index,
            limits: TraceLimits::kyc(),
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

    /// Trace a KYC exchange withdrawal to probable current holdings
    pub async fn trace_kyc_withdrawal(
        &self,
        exchange_txid: &str,
        destination_address: &str,
        depth_preset: DepthPreset,
        progress: Option<&dyn ProgressSink>,
    ) -> AppResult<KycTraceResult> {
        validate_txid(exchange_txid)?;
        let max_depth = depth_preset.depth().min(ABSOLUTE_MAX_DEPTH);

        info!(
            "KYC trace start: {} -> {}, preset={}, max_depth={}",
            exchange_txid,
            destination_address,
            depth_preset.as_str(),
            max_depth
        );

        let start_time = Instant::now();
        let mut result = KycTraceResult::new(exchange_txid, destination_address, max_depth);
        result.index_enabled = self.index.is_some();

        if !result.index_enabled {
            result
                .warnings
                .push("Address index not available - forward tracing will be limited".to_string());
        }

        // Locate the withdrawal output paying the destination address
        let tx = match self.node.get_transaction(exchange_txid).await {
            Ok(Some(tx)) => tx,
            Ok(None) => {
                result
                    .warnings
                    .push(format!("Transaction not found: {}", exchange_txid));
                result.summary = "Could not find the exchange transaction".to_string();
                return Ok(result);
            }
            Err(e) => {
                result
                    .warnings
                    .push(format!("Transaction lookup failed: {}: {}", exchange_txid, e));
                result.summary = "Could not fetch the exchange transaction".to_string();
                return Ok(result);
            }
        };

        let start = tx.outputs.iter().enumerate().find(|(_, out)| {
            out.address.as_deref() == Some(destination_address)
        });

        let (start_vout, start_value) = match start {
            Some((idx, out)) => (idx as u32, out.value_sats),
            None => {
                result.warnings.push(format!(
                    "Destination address {} not found in transaction outputs",
                    destination_address
                ));
                result.summary =
                    "The destination address was not found in the transaction".to_string();
                return Ok(result);
            }
        };

        result.original_value_sats = start_value;

        let mut queue: VecDeque<QueueItem> = VecDeque::new();
        queue.push_back(QueueItem {
            txid: exchange_txid.to_string(),
            vout: start_vout,
            depth: 0,
            coinjoin_count: 0,
            path: Vec::new(),
            tracked_value_sats: start_value,
            confidence: 1.0,
        });

        let mut visited: HashSet<(String, u32)> = HashSet::new();
        let mut destinations: Vec<ProbableDestination> = Vec::new();
        let mut coinjoin_txids: HashSet<String> = HashSet::new();
        let mut tx_count: u64 = 0;
        let mut consecutive_index_failures: u32 = 0;
        let mut index_disabled = false;

        while !queue.is_empty() && tx_count < self.limits.max_transactions {
            if start_time.elapsed() >= self.limits.time_budget() {
                result.warnings.push(format!(
                    "Trace timeout ({}s) reached - returning partial results",
                    self.limits.max_trace_seconds
                ));
                break;
            }

            if queue.len() > self.limits.max_queue_size {
                result
                    .warnings
                    .push("Queue size exceeded, some paths truncated".to_string());
                queue.truncate(self.limits.max_queue_size);
            }

            let item = match queue.pop_front() {
                Some(item) => item,
                None => break,
            };

            if !visited.insert((item.txid.clone(), item.vout)) {
                continue;
            }

            // Depth-limited branches terminate with a confidence penalty
            if item.depth > max_depth {
                if !item.path.is_empty() {
                    let (conf, mut reasoning) =
                        self.calculate_path_confidence(&item.path, start_value);
                    reasoning.push("Hit depth limit".to_string());
                    let penalized = conf * 0.5;
                    destinations.push(ProbableDestination {
                        address: item
                            .path
                            .last()
                            .and_then(|n| n.address.clone())
                            .unwrap_or_else(|| "unknown".to_string()),
                        value_sats: item.tracked_value_sats,
                        confidence_score: penalized,
                        confidence_level: ConfidenceLevel::from_score(penalized),
                        path_length: item.path.len(),
                        coinjoins_passed: item.coinjoin_count,
                        trail_status: TrailStatus::DepthLimit,
                        reasoning,
                        path: item.path,
                    });
                }
                continue;
            }

            let tx = match self.node.get_transaction(&item.txid).await {
                Ok(Some(tx)) => tx,
                Ok(None) => {
                    result
                        .warnings
                        .push(format!("Transaction not found: {}", item.txid));
                    continue;
                }
                Err(e) => {
                    warn!("Transaction fetch failed for {}: {}", item.txid, e);
                    result
                        .warnings
                        .push(format!("Transaction lookup failed: {}: {}", item.txid, e));
                    continue;
                }
            };

            tx_count += 1;

            let output = match tx.outputs.get(item.vout as usize) {
                Some(o) => o.clone(),
                None => continue,
            };

            // CoinJoin classification for this hop
            let detection = classify_coinjoin(&tx);
            let is_coinjoin = detection.score >= self.policy.coinjoin_threshold;

            let mut current_cj_count = item.coinjoin_count;
            let mut coinjoin_protocol = CoinJoinProtocol::None;
            let mut anonymity_set: u32 = 0;

            if is_coinjoin {
                current_cj_count += 1;
                coinjoin_txids.insert(item.txid.clone());
                coinjoin_protocol = detection.protocol;
                anonymity_set = estimate_anonymity_set(detection.protocol, &tx);
            }

            let change = detect_change_output(&tx, item.vout as usize);

            // Core numeric invariant: confidence only decays along a path
            let prev_confidence = item.confidence;
            let current_confidence = if is_coinjoin {
                degrade_confidence(coinjoin_protocol, anonymity_set, prev_confidence)
            } else {
                (prev_confidence * self.policy.hop_decay).max(CONFIDENCE_FLOOR)
            };

            let node = PathNode {
                txid: item.txid.clone(),
                vout: item.vout,
                value_sats: output.value_sats,
                address: output.address.clone(),
                block_height: tx.block_height,
                block_time: tx.block_time,
                is_coinjoin,
                coinjoin_score: detection.score,
                coinjoin_count_in_path: current_cj_count,
                coinjoin_protocol: coinjoin_protocol.as_str().to_string(),
                anonymity_set_size: anonymity_set,
                depth: item.depth,
                is_change: change.is_change,
                change_probability: change.probability,
                cumulative_confidence: current_confidence,
            };

            let mut current_path = item.path;
            current_path.push(node);

            // Cold-trail pruning: below the threshold the branch ends now,
            // spent or not, and is never expanded further
            if current_confidence < self.policy.confidence_cold_threshold {
                let (conf, mut reasoning) =
                    self.calculate_path_confidence(&current_path, start_value);
                reasoning.push(format!(
                    "Trail confidence dropped to {:.2}% (below {:.0}% threshold)",
                    current_confidence * 100.0,
                    self.policy.confidence_cold_threshold * 100.0
                ));
                reasoning.push(format!(
                    "Passed through {} CoinJoin(s) - trail is cold",
                    current_cj_count
                ));

                debug!(
                    "Cold trail at {}:{} (confidence {:.4})",
                    item.txid, item.vout, current_confidence
                );

                destinations.push(ProbableDestination {
                    address: output
                        .address
                        .clone()
                        .unwrap_or_else(|| "unknown".to_string()),
                    value_sats: output.value_sats,
                    confidence_score: conf,
                    confidence_level: ConfidenceLevel::from_score(conf),
                    path_length: current_path.len(),
                    coinjoins_passed: current_cj_count,
                    trail_status: TrailStatus::Cold,
                    reasoning,
                    path: current_path,
                });
                result.total_untraceable_sats += output.value_sats;
                continue;
            }

            // Is the output still sitting in the UTXO set?
            let status = match self.node.get_output_status(&item.txid, item.vout).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(
                        "Output status check failed for {}:{}: {}",
                        item.txid, item.vout, e
                    );
                    result.warnings.push(format!(
                        "Output status check failed for {}:{}: {}",
                        item.txid, item.vout, e
                    ));
                    let (conf, mut reasoning) =
                        self.calculate_path_confidence(&current_path, start_value);
                    reasoning.push("Output status unavailable - trail lost".to_string());
                    let penalized = conf * 0.5;
                    destinations.push(ProbableDestination {
                        address: output
                            .address
                            .clone()
                            .unwrap_or_else(|| "unknown".to_string()),
                        value_sats: output.value_sats,
                        confidence_score: penalized,
                        confidence_level: ConfidenceLevel::from_score(penalized),
                        path_length: current_path.len(),
                        coinjoins_passed: current_cj_count,
                        trail_status: TrailStatus::Lost,
                        reasoning,
                        path: current_path,
                    });
                    continue;
                }
            };

            if status.is_unspent() {
                // Current holding
                let (conf, mut reasoning) =
                    self.calculate_path_confidence(&current_path, start_value);
                reasoning.push("UTXO is unspent (current holding)".to_string());

                destinations.push(ProbableDestination {
                    address: output
                        .address
                        .clone()
                        .unwrap_or_else(|| "unknown".to_string()),
                    value_sats: output.value_sats,
                    confidence_score: conf,
                    confidence_level: ConfidenceLevel::from_score(conf),
                    path_length: current_path.len(),
                    coinjoins_passed: current_cj_count,
                    trail_status: TrailStatus::DeadEnd,
                    reasoning,
                    path: current_path,
                });
                result.total_traced_sats += output.value_sats;
            } else {
                let index = self.index.as_ref().filter(|_| !index_disabled);

                match index {
                    Some(index) => {
                        match index.find_spending_transaction(&item.txid, item.vout).await {
                            Ok(Some(spender)) => {
                                consecutive_index_failures = 0;
                                match self.node.get_transaction(&spender).await {
                                    Ok(Some(spending_tx)) => {
                                        for (out_idx, out) in
                                            spending_tx.outputs.iter().enumerate()
                                        {
                                            let key = (spender.clone(), out_idx as u32);
                                            if !visited.contains(&key) {
                                                queue.push_back(QueueItem {
                                                    txid: spender.clone(),
                                                    vout: out_idx as u32,
                                                    depth: item.depth + 1,
                                                    coinjoin_count: current_cj_count,
                                                    path: current_path.clone(),
                                                    tracked_value_sats: out.value_sats,
                                                    confidence: current_confidence,
                                                });
                                            }
                                        }
                                    }
                                    Ok(None) | Err(_) => {
                                        result.warnings.push(format!(
                                            "Spending transaction not resolvable: {}",
                                            spender
                                        ));
                                        let (conf, mut reasoning) = self
                                            .calculate_path_confidence(&current_path, start_value);
                                        reasoning.push(
                                            "UTXO spent but spending transaction not found"
                                                .to_string(),
                                        );
                                        let penalized = conf * 0.3;
                                        destinations.push(ProbableDestination {
                                            address: output
                                                .address
                                                .clone()
                                                .unwrap_or_else(|| "unknown".to_string()),
                                            value_sats: output.value_sats,
                                            confidence_score: penalized,
                                            confidence_level: ConfidenceLevel::from_score(
                                                penalized,
                                            ),
                                            path_length: current_path.len(),
                                            coinjoins_passed: current_cj_count,
                                            trail_status: TrailStatus::Lost,
                                            reasoning,
                                            path: current_path,
                                        });
                                    }
                                }
                            }
                            Ok(None) | Err(_) => {
                                consecutive_index_failures += 1;
                                if consecutive_index_failures
                                    >= self.limits.max_consecutive_index_failures
                                    && !index_disabled
                                {
                                    index_disabled = true;
                                    result.warnings.push(format!(
                                        "Address index disabled after {} consecutive failures",
                                        consecutive_index_failures
                                    ));
                                }

                                let (conf, mut reasoning) =
                                    self.calculate_path_confidence(&current_path, start_value);
                                reasoning.push(
                                    "UTXO spent but spending transaction not found".to_string(),
                                );
                                let penalized = conf * 0.3;
                                destinations.push(ProbableDestination {
                                    address: output
                                        .address
                                        .clone()
                                        .unwrap_or_else(|| "unknown".to_string()),
                                    value_sats: output.value_sats,
                                    confidence_score: penalized,
                                    confidence_level: ConfidenceLevel::from_score(penalized),
                                    path_length: current_path.len(),
                                    coinjoins_passed: current_cj_count,
                                    trail_status: TrailStatus::Lost,
                                    reasoning,
                                    path: current_path,
                                });
                            }
                        }
                    }
                    None => {
                        // No index: spent output cannot be followed
                        let (conf, mut reasoning) =
                            self.calculate_path_confidence(&current_path, start_value);
                        reasoning
                            .push("Cannot follow spent output (address index required)".to_string());
                        let penalized = conf * 0.5;
                        destinations.push(ProbableDestination {
                            address: output
                                .address
                                .clone()
                                .unwrap_or_else(|| "unknown".to_string()),
                            value_sats: output.value_sats,
                            confidence_score: penalized,
                            confidence_level: ConfidenceLevel::from_score(penalized),
                            path_length: current_path.len(),
                            coinjoins_passed: current_cj_count,
                            trail_status: TrailStatus::Lost,
                            reasoning,
                            path: current_path,
                        });
                    }
                }
            }

            if let Some(sink) = progress {
                sink.on_progress(ProgressUpdate {
                    transactions_processed: tx_count,
                    visited: visited.len(),
                    current_depth: item.depth,
                });
            }
        }

        if tx_count >= self.limits.max_transactions {
            result.warnings.push(format!(
                "Transaction limit ({}) reached",
                self.limits.max_transactions
            ));
        }

        destinations.sort_by(|a, b| {
            b.confidence_score
                .partial_cmp(&a.confidence_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        result.probable_destinations = destinations;
        result.coinjoins_encountered = coinjoin_txids.len();

        result.overall_privacy_score = self.calculate_overall_privacy(&result);
        result.privacy_rating = privacy_rating(result.overall_privacy_score).to_string();
        result.summary = self.generate_summary(&result);
        result.recommendations = self.generate_recommendations(&result);
        result.execution_time_ms = start_time.elapsed().as_millis() as u64;

        info!(
            "KYC trace complete: {} destinations, {} CoinJoins, privacy score {:.1} in {}ms",
            result.probable_destinations.len(),
            result.coinjoins_encountered,
            result.overall_privacy_score,
            result.execution_time_ms
        );

        Ok(result)
    }

    /// Final confidence and reasoning for a terminated path
    ///
    /// Starts from the last node's cumulative confidence; heavy value
    /// splits reduce it, and a path following a high-confidence change
    /// output gets the one permitted upward nudge (x1.1, capped at 1.0).
    fn calculate_path_confidence(
        &self,
        path: &[PathNode],
        original_value_sats: u64,
    ) -> (f64, Vec<String>) {
        let last = match path.last() {
            Some(node) => node,
            None => return (0.0, vec!["Empty path".to_string()]),
        };

        let mut reasoning = Vec::new();
        let mut confidence = last.cumulative_confidence;

        let path_length = path.len();
        let coinjoins = path.iter().filter(|n| n.is_coinjoin).count();

        if path_length == 1 {
            reasoning.push("Direct transfer (1 hop)".to_string());
        } else if path_length <= 3 {
            reasoning.push(format!("Short path ({} hops)", path_length));
        } else {
            reasoning.push(format!("Longer path ({} hops)", path_length));
        }

        match coinjoins {
            0 => reasoning.push("No CoinJoins in path - easily traceable".to_string()),
            n => reasoning.push(format!(
                "Passed through {} CoinJoin(s) (confidence: {:.1}%)",
                n,
                confidence * 100.0
            )),
        }

        let value_ratio = last.value_sats as f64 / original_value_sats.max(1) as f64;
        if value_ratio > 0.9 {
            reasoning.push("Value very similar to original (>90%)".to_string());
        } else if value_ratio > 0.5 {
            reasoning.push(format!("Value is {:.0}% of original", value_ratio * 100.0));
        } else if value_ratio > 0.1 {
            reasoning.push(format!(
                "Value is {:.0}% of original (likely split)",
                value_ratio * 100.0
            ));
        } else {
            confidence *= 0.7;
            reasoning.push(format!(
                "Value is only {:.1}% of original (split/mixed)",
                value_ratio * 100.0
            ));
        }

        let change_nodes: Vec<&PathNode> = path.iter().filter(|n| n.is_change).collect();
        if !change_nodes.is_empty() {
            let high_confidence_change =
                change_nodes.iter().filter(|n| n.change_probability > 0.8).count();
            if high_confidence_change > 0 {
                // Following change increases traceability
                confidence = (confidence * 1.1).min(1.0);
                reasoning.push(format!(
                    "Path follows {} high-confidence change output(s)",
                    high_confidence_change
                ));
            } else {
                reasoning.push(format!(
                    "Path follows {} possible change output(s)",
                    change_nodes.len()
                ));
            }
        }

        (confidence.clamp(0.0, 1.0), reasoning)
    }

    /// Overall privacy score (0-100, higher = more private)
    ///
    /// Scores only what actually protects the owner: value whose trail went
    /// cold, absence of high-confidence destinations, and CoinJoins that
    /// demonstrably produced cold trails. Hop count alone earns nothing,
    /// and lost (unresolved) trails are penalized - tooling failure is not
    /// a privacy win.
    fn calculate_overall_privacy(&self, result: &KycTraceResult) -> f64 {
        if result.probable_destinations.is_empty() {
            return 100.0;
        }

        let mut score = 0.0;
        let total = result.original_value_sats;

        if total > 0 {
            let cold_value: u64 = result
                .probable_destinations
                .iter()
                .filter(|d| d.trail_status == TrailStatus::Cold)
                .map(|d| d.value_sats)
                .sum();
            score += cold_value as f64 / total as f64 * 50.0;
        }

        let high_conf = result
            .probable_destinations
            .iter()
            .filter(|d| d.confidence_level == ConfidenceLevel::High)
            .count();
        if high_conf == 0 {
            score += 30.0;
        } else if high_conf == 1 {
            score += 10.0;
        }

        let any_cold = result
            .probable_destinations
            .iter()
            .any(|d| d.trail_status == TrailStatus::Cold);
        if result.coinjoins_encountered >= 2 {
            score += if any_cold { 20.0 } else { 10.0 };
        } else if result.coinjoins_encountered == 1 {
            score += 5.0;
        }

        if total > 0 {
            let lost_value: u64 = result
                .probable_destinations
                .iter()
                .filter(|d| d.trail_status == TrailStatus::Lost)
                .map(|d| d.value_sats)
                .sum();
            score -= lost_value as f64 / total as f64 * 10.0;
        }

        score.clamp(0.0, 100.0)
    }

    fn generate_summary(&self, result: &KycTraceResult) -> String {
        let high = result.destinations_at_level(ConfidenceLevel::High);
        let medium = result.destinations_at_level(ConfidenceLevel::Medium);
        let cold = result
            .probable_destinations
            .iter()
            .filter(|d| d.trail_status == TrailStatus::Cold)
            .count();

        if result.overall_privacy_score >= 70.0 {
            format!(
                "Good privacy detected. {} trail(s) went cold after CoinJoins. \
                 Found {} high-confidence destination(s). \
                 WARNING: this analysis cannot detect all attacks.",
                cold, high
            )
        } else if result.overall_privacy_score >= 50.0 {
            format!(
                "Moderate privacy. Some trails obscured but {} high-confidence and \
                 {} medium-confidence destination(s) remain traceable.",
                high, medium
            )
        } else if result.overall_privacy_score >= 30.0 {
            format!(
                "Poor privacy. Funds can be traced with reasonable confidence to \
                 {} address(es). Consider CoinJoin.",
                high
            )
        } else {
            format!(
                "Very poor privacy. Funds are easily traceable to {} address(es) \
                 with high confidence.",
                high
            )
        }
    }

    fn generate_recommendations(&self, result: &KycTraceResult) -> Vec<String> {
        let mut recs = vec![
            "This is heuristic analysis only - do NOT rely on it for operational security"
                .to_string(),
            "Timing correlation, network-level observation and novel mixing protocols are \
             outside this model"
                .to_string(),
        ];

        if result.coinjoins_encountered == 0 {
            recs.push("No CoinJoins detected - these funds are trivially traceable".to_string());
        }

        let high = result.destinations_at_level(ConfidenceLevel::High);
        if high > 0 {
            recs.push(format!(
                "{} destination(s) are easily linkable to the withdrawal identity",
                high
            ));
        }

        if result.overall_privacy_score < 60.0 {
            recs.push(
                "Avoid consolidating UTXOs from different sources without mixing first"
                    .to_string(),
            );
            recs.push("Use a new address for each transaction to prevent clustering".to_string());
        }

        if !result.index_enabled {
            recs.push("Configure an address index for more complete forward tracing".to_string());
        }

        // Address reuse anywhere in the discovered paths hurts privacy
        let mut seen = HashSet::new();
        let mut reused = false;
        for dest in &result.probable_destinations {
            for node in &dest.path {
                if let Some(addr) = &node.address {
                    if !seen.insert(addr.clone()) {
                        reused = true;
                    }
                }
            }
        }
        if reused {
            recs.push("Address reuse detected in the transaction history".to_string());
        }

        recs
    }
}

/// Confidence degradation through one CoinJoin hop
///
/// With perfect mixing an observer's confidence is 1/anonymity-set; the
/// protocol multiplier accounts for known attacks and unverifiable mixing
/// quality. Floored so confidence never reaches exactly zero.
pub fn degrade_confidence(
    protocol: CoinJoinProtocol,
    anonymity_set_size: u32,
    prev_confidence: f64,
) -> f64 {
    if anonymity_set_size < 2 {
        return prev_confidence;
    }

    let base_degradation = 1.0 / anonymity_set_size as f64;
    let new_confidence = prev_confidence * base_degradation * protocol.degradation_multiplier();

    new_confidence.max(CONFIDENCE_FLOOR)
}

/// Map a privacy score to its conservative rating band
pub fn privacy_rating(score: f64) -> &'static str {
    if score >= 70.0 {
        "good"
    } else if score >= 50.0 {
        "moderate"
    } else if score >= 30.0 {
        "poor"
    } else {
        "very_poor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_presets() {
        assert_eq!(DepthPreset::Quick.depth(), 3);
        assert_eq!(DepthPreset::Standard.depth(), 6);
        assert_eq!(DepthPreset::Deep.depth(), 10);
        assert_eq!(DepthPreset::Thorough.depth(), 15);
        assert_eq!(DepthPreset::parse("deep"), DepthPreset::Deep);
        assert_eq!(DepthPreset::parse("bogus"), DepthPreset::Standard);
    }

    #[test]
    fn test_degrade_confidence_fixed_denomination() {
        // 1.0 * (1/5) * 1.5 = 0.30
        let conf = degrade_confidence(CoinJoinProtocol::FixedDenomination, 5, 1.0);
        assert!((conf - 0.30).abs() < 1e-9);
    }

    #[test]
    fn test_degrade_confidence_many_equal() {
        // 1.0 * (1/20) * 1.3 = 0.065
        let conf = degrade_confidence(CoinJoinProtocol::ManyEqualOutput, 20, 1.0);
        assert!((conf - 0.065).abs() < 1e-9);
    }

    #[test]
    fn test_degrade_confidence_floors_at_0001() {
        let conf = degrade_confidence(CoinJoinProtocol::ManyEqualOutput, 1000, 0.001);
        assert_eq!(conf, CONFIDENCE_FLOOR);
    }

    #[test]
    fn test_degrade_confidence_tiny_set_is_noop() {
        assert_eq!(degrade_confidence(CoinJoinProtocol::UnknownMix, 1, 0.8), 0.8);
        assert_eq!(degrade_confidence(CoinJoinProtocol::UnknownMix, 0, 0.8), 0.8);
    }

    #[test]
    fn test_privacy_rating_bands() {
        assert_eq!(privacy_rating(100.0), "good");
        assert_eq!(privacy_rating(70.0), "good");
        assert_eq!(privacy_rating(69.9), "moderate");
        assert_eq!(privacy_rating(50.0), "moderate");
        assert_eq!(privacy_rating(30.0), "poor");
        assert_eq!(privacy_rating(29.9), "very_poor");
    }
}
