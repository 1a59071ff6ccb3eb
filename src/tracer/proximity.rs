//! Exchange proximity analysis
//!
//! Bidirectional bounded BFS from a seed address, following both where
//! funds came from (inputs) and where they went (outputs), checking every
//! visited address against the known-exchange registry. The search does
//! NOT stop at the first exchange found - it keeps collecting candidate
//! paths within its limits so alternative connections can be reported and
//! scored.

use crate::config::TracePolicy;
use crate::detection::classify_coinjoin;
use crate::errors::AppResult;
use crate::registry::ExchangeRegistry;
use crate::tracer::TraceLimits;
use crate::traits::{AddressIndex, NodeQuery};
use crate::types::{
    ExchangeConnection, ExchangeHop, ExchangePath, ExchangeProximityResult, PathStrength,
    TraceDirection, TxInput,
};
use crate::utils::time::block_age_days;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Addresses examined per analysis
const MAX_ADDRESSES_TO_VISIT: usize = 10;

/// Wall-clock budget for one analysis
const MAX_ANALYSIS_SECONDS: u64 = 15;

/// Default hop radius when the caller passes none
const DEFAULT_MAX_HOPS: u32 = 6;

/// History transactions examined per address
const MAX_TXS_PER_ADDRESS: usize = 5;

/// Inputs/outputs examined per transaction
const MAX_IO_PER_TX: usize = 5;

/// Alternative paths reported
const MAX_ALTERNATIVE_PATHS: usize = 5;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum SearchDirection {
    Backward,
    Forward,
}

impl SearchDirection {
    fn hop_direction(self) -> TraceDirection {
        match self {
            SearchDirection::Backward => TraceDirection::ReceivedFrom,
            SearchDirection::Forward => TraceDirection::SentTo,
        }
    }
}

struct FoundPath {
    hops: Vec<ExchangeHop>,
    exchange: String,
    exchange_kind: String,
    hop_count: u32,
    direction: TraceDirection,
}

/// Exchange proximity analyzer over injected collaborators and a registry
pub struct ExchangeProximityAnalyzer {
    node: Arc<dyn NodeQuery>,
    index: Option<Arc<dyn AddressIndex>>,
    registry: ExchangeRegistry,
    policy: TracePolicy,
    limits: TraceLimits,
}

impl ExchangeProximityAnalyzer {
    pub fn new(
        node: Arc<dyn NodeQuery>,
        index: Option<Arc<dyn AddressIndex>>,
        registry: ExchangeRegistry,
    ) -> Self {
        Self {
            node,
            index,
            registry,
            policy: TracePolicy::default(),
            limits: TraceLimits {
                max_transactions: 200,
                max_queue_size: 1000,
                max_trace_seconds: MAX_ANALYSIS_SECONDS,
                max_consecutive_index_failures: 3,
            },
        }
    }

    pub fn with_policy(mut self, policy: TracePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Analyze how close an address is to known exchange addresses
    pub async fn analyze_exchange_proximity(
        &self,
        address: &str,
        max_hops: Option<u32>,
    ) -> AppResult<ExchangeProximityResult> {
        let start_time = Instant::now();
        let max_hops = max_hops.unwrap_or(DEFAULT_MAX_HOPS);

        info!("Analyzing exchange proximity for {}", address);

        let mut result = ExchangeProximityResult::new(address);

        // The seed itself being an exchange short-circuits the whole search
        if let Some(entry) = self.registry.lookup(address) {
            result.nearest_exchange = Some(entry.exchange.clone());
            result.nearest_exchange_kind = Some(entry.wallet_kind.clone());
            result.hops_to_exchange = Some(0);
            result.direction = Some(TraceDirection::IsExchange);
            result.proximity_score = 100;
            result.risk_level = "critical".to_string();
            result.path_quality_score = 100;
            result.path_quality_factors =
                vec!["This IS a known exchange address".to_string()];
            result.path_strength = PathStrength::Strong;
            result.all_exchange_connections.push(ExchangeConnection {
                exchange_name: entry.exchange.clone(),
                exchange_kind: entry.wallet_kind.clone(),
                hops: 0,
                direction: TraceDirection::IsExchange,
                path_quality: 100,
                path_strength: PathStrength::Strong,
            });
            result
                .warnings
                .push("This address is a known exchange address".to_string());
            result
                .recommendations
                .push("Do not use exchange addresses for personal storage".to_string());
            result.execution_time_ms = start_time.elapsed().as_millis() as u64;
            return Ok(result);
        }

        if self.index.is_none() {
            result
                .warnings
                .push("Address index not available - proximity search is limited".to_string());
        }

        // Tip height for path-age estimation; a failure degrades to
        // "age unknown" rather than erroring
        let current_height = match self.node.get_block_height().await {
            Ok(height) => height,
            Err(e) => {
                warn!("Could not get block height: {}", e);
                result
                    .warnings
                    .push(format!("Could not get block height: {}", e));
                0
            }
        };

        let mut queue: VecDeque<(String, u32, SearchDirection, Vec<ExchangeHop>)> =
            VecDeque::new();
        queue.push_back((address.to_string(), 0, SearchDirection::Backward, Vec::new()));
        queue.push_back((address.to_string(), 0, SearchDirection::Forward, Vec::new()));

        let mut visited: HashSet<(String, SearchDirection)> = HashSet::new();
        let mut addresses_checked = 0usize;
        let mut search_exhausted = false;

        let mut all_paths: Vec<FoundPath> = Vec::new();
        let mut connections_map: HashMap<String, FoundPath> = HashMap::new();

        let mut nearest_exchange: Option<String> = None;
        let mut nearest_exchange_kind: Option<String> = None;
        let mut nearest_hops: Option<u32> = None;
        let mut nearest_direction: Option<TraceDirection> = None;
        let mut nearest_path: Vec<ExchangeHop> = Vec::new();

        'search: while let Some((current_addr, depth, direction, current_path)) =
            queue.pop_front()
        {
            if addresses_checked >= MAX_ADDRESSES_TO_VISIT {
                break;
            }
            if start_time.elapsed() >= self.limits.time_budget() {
                result.warnings.push(format!(
                    "Analysis timed out after {} seconds",
                    start_time.elapsed().as_secs()
                ));
                search_exhausted = true;
                break;
            }

            if depth >= max_hops {
                continue;
            }

            if !visited.insert((current_addr.clone(), direction)) {
                continue;
            }
            addresses_checked += 1;

            let history = match &self.index {
                Some(index) => match index.get_history(&current_addr).await {
                    Ok(history) => history,
                    Err(e) => {
                        debug!("History lookup failed for {}: {}", current_addr, e);
                        continue;
                    }
                },
                None => continue,
            };

            if history.is_empty() {
                continue;
            }

            // Newest transactions matter for the backward direction,
            // oldest for forward
            let txs_to_check: Vec<_> = match direction {
                SearchDirection::Backward => {
                    let skip = history.len().saturating_sub(MAX_TXS_PER_ADDRESS);
                    history.into_iter().skip(skip).collect()
                }
                SearchDirection::Forward => {
                    history.into_iter().take(MAX_TXS_PER_ADDRESS).collect()
                }
            };

            for tx_info in txs_to_check {
                if start_time.elapsed() >= self.limits.time_budget() {
                    result.warnings.push(format!(
                        "Analysis timed out after {} seconds",
                        start_time.elapsed().as_secs()
                    ));
                    search_exhausted = true;
                    break 'search;
                }

                let tx = match self.node.get_transaction(&tx_info.txid).await {
                    Ok(Some(tx)) => tx,
                    _ => continue,
                };

                let is_coinjoin_tx =
                    classify_coinjoin(&tx).score >= self.policy.coinjoin_threshold;
                let block_height = if tx_info.height > 0 {
                    Some(tx_info.height)
                } else {
                    tx.block_height
                };

                match direction {
                    SearchDirection::Backward => {
                        for input in tx.inputs.iter().take(MAX_IO_PER_TX) {
                            let (prev_txid, prev_vout) = match input {
                                TxInput::Outpoint { txid, vout, .. } => (txid, *vout),
                                TxInput::Coinbase => continue,
                            };

                            let prev_tx = match self.node.get_transaction(prev_txid).await {
                                Ok(Some(prev_tx)) => prev_tx,
                                _ => continue,
                            };
                            let prev_out = match prev_tx.outputs.get(prev_vout as usize) {
                                Some(out) => out,
                                None => continue,
                            };
                            let prev_addr = match &prev_out.address {
                                Some(addr) => addr.clone(),
                                None => continue,
                            };

                            let hop = ExchangeHop {
                                txid: tx_info.txid.clone(),
                                address: prev_addr.clone(),
                                value_sats: prev_out.value_sats,
                                direction: direction.hop_direction(),
                                hop_number: depth + 1,
                                is_coinjoin: is_coinjoin_tx,
                                block_height,
                            };

                            if let Some(entry) = self.registry.lookup(&prev_addr) {
                                let mut new_path = current_path.clone();
                                new_path.push(hop);
                                self.record_found_path(
                                    entry.exchange.clone(),
                                    entry.wallet_kind.clone(),
                                    new_path,
                                    depth + 1,
                                    direction.hop_direction(),
                                    &mut all_paths,
                                    &mut connections_map,
                                    &mut nearest_exchange,
                                    &mut nearest_exchange_kind,
                                    &mut nearest_hops,
                                    &mut nearest_direction,
                                    &mut nearest_path,
                                );
                            } else if addresses_checked < MAX_ADDRESSES_TO_VISIT {
                                let mut new_path = current_path.clone();
                                new_path.push(hop);
                                queue.push_back((
                                    prev_addr,
                                    depth + 1,
                                    SearchDirection::Backward,
                                    new_path,
                                ));
                            }
                        }
                    }
                    SearchDirection::Forward => {
                        for out in tx.outputs.iter().take(MAX_IO_PER_TX) {
                            let out_addr = match &out.address {
                                Some(addr) if *addr != current_addr => addr.clone(),
                                _ => continue,
                            };

                            let hop = ExchangeHop {
                                txid: tx_info.txid.clone(),
                                address: out_addr.clone(),
                                value_sats: out.value_sats,
                                direction: direction.hop_direction(),
                                hop_number: depth + 1,
                                is_coinjoin: is_coinjoin_tx,
                                block_height,
                            };

                            if let Some(entry) = self.registry.lookup(&out_addr) {
                                let mut new_path = current_path.clone();
                                new_path.push(hop);
                                self.record_found_path(
                                    entry.exchange.clone(),
                                    entry.wallet_kind.clone(),
                                    new_path,
                                    depth + 1,
                                    direction.hop_direction(),
                                    &mut all_paths,
                                    &mut connections_map,
                                    &mut nearest_exchange,
                                    &mut nearest_exchange_kind,
                                    &mut nearest_hops,
                                    &mut nearest_direction,
                                    &mut nearest_path,
                                );
                            } else if addresses_checked < MAX_ADDRESSES_TO_VISIT {
                                let mut new_path = current_path.clone();
                                new_path.push(hop);
                                queue.push_back((
                                    out_addr,
                                    depth + 1,
                                    SearchDirection::Forward,
                                    new_path,
                                ));
                            }
                        }
                    }
                }
            }
        }

        if addresses_checked >= MAX_ADDRESSES_TO_VISIT {
            result.warnings.push(format!(
                "Analysis limited to {} addresses",
                MAX_ADDRESSES_TO_VISIT
            ));
            search_exhausted = true;
        }

        info!(
            "Found {} paths to {} unique exchange connections",
            all_paths.len(),
            connections_map.len()
        );

        // Score the nearest path
        if !nearest_path.is_empty() {
            let quality = score_path(&nearest_path, current_height);
            result.path_quality_score = quality.score;
            result.path_quality_factors = quality.factors;
            result.coinjoin_count_in_path = quality.coinjoin_count;
            result.path_age_days = quality.age_days;
            result.path_strength = quality.strength;
        }

        // Alternative paths: fewest hops first, quality breaks ties
        let mut scored: Vec<(ExchangePath, u32)> = all_paths
            .iter()
            .map(|p| {
                let quality = score_path(&p.hops, current_height);
                (
                    ExchangePath {
                        path_hops: p.hops.clone(),
                        total_hops: p.hop_count,
                        exchange_name: p.exchange.clone(),
                        exchange_kind: p.exchange_kind.clone(),
                        direction: p.direction,
                        path_quality_score: quality.score,
                        path_strength: quality.strength,
                        coinjoin_count: quality.coinjoin_count,
                        path_age_days: quality.age_days,
                    },
                    p.hop_count,
                )
            })
            .collect();
        scored.sort_by(|a, b| {
            a.1.cmp(&b.1)
                .then(b.0.path_quality_score.cmp(&a.0.path_quality_score))
        });

        let mut added_keys: HashSet<String> = HashSet::new();
        for (path, _) in scored {
            if result.alternative_paths.len() >= MAX_ALTERNATIVE_PATHS {
                break;
            }
            let key = format!(
                "{}-{:?}-{}",
                path.exchange_name, path.direction, path.total_hops
            );
            if added_keys.insert(key) {
                result.alternative_paths.push(path);
            }
        }

        // All unique exchange connections
        for found in connections_map.values() {
            let quality = score_path(&found.hops, current_height);
            result.all_exchange_connections.push(ExchangeConnection {
                exchange_name: found.exchange.clone(),
                exchange_kind: found.exchange_kind.clone(),
                hops: found.hop_count,
                direction: found.direction,
                path_quality: quality.score,
                path_strength: quality.strength,
            });
        }
        result
            .all_exchange_connections
            .sort_by(|a, b| a.hops.cmp(&b.hops).then(b.path_quality.cmp(&a.path_quality)));

        // Proximity score and risk level from the nearest connection
        match nearest_hops {
            None => {
                result.proximity_score = 0;
                result.risk_level = "low".to_string();
                if search_exhausted {
                    result
                        .recommendations
                        .push("No exchange found within analysis limits".to_string());
                    result.recommendations.push(
                        "This may indicate good privacy or require deeper analysis".to_string(),
                    );
                } else {
                    result.recommendations.push(
                        "No direct exchange connection found within analysis depth".to_string(),
                    );
                }
            }
            Some(1) => {
                result.proximity_score = 90;
                result.risk_level = "critical".to_string();
                result.warnings.push(format!(
                    "Direct transaction with {} detected",
                    nearest_exchange.as_deref().unwrap_or("exchange")
                ));
                if result.path_quality_score < 30 {
                    result.recommendations.push(format!(
                        "Direct link to exchange but path quality is BROKEN ({}/100)",
                        result.path_quality_score
                    ));
                } else {
                    result
                        .recommendations
                        .push("This address is directly KYC-linked".to_string());
                    result.recommendations.push(
                        "Any funds here can be trivially traced to the owner identity"
                            .to_string(),
                    );
                }
            }
            Some(2) => {
                result.proximity_score = 70;
                result.risk_level = "high".to_string();
                result.warnings.push(format!(
                    "Only 2 hops from {}",
                    nearest_exchange.as_deref().unwrap_or("exchange")
                ));
                result.recommendations.push(
                    "High traceability - chain analysis can easily link to KYC records"
                        .to_string(),
                );
            }
            Some(hops) if hops <= 4 => {
                result.proximity_score = 50;
                result.risk_level = "medium".to_string();
                result.recommendations.push(format!(
                    "Moderate distance ({} hops) from {}",
                    hops,
                    nearest_exchange.as_deref().unwrap_or("exchange")
                ));
            }
            Some(hops) => {
                result.proximity_score = 30;
                result.risk_level = "low".to_string();
                result.recommendations.push(format!(
                    "Good distance ({} hops) from known exchanges",
                    hops
                ));
            }
        }

        if result.coinjoin_count_in_path > 0 {
            result.recommendations.push(format!(
                "Detected {} CoinJoin(s) in path - privacy-positive",
                result.coinjoin_count_in_path
            ));
        }

        result.nearest_exchange = nearest_exchange;
        result.nearest_exchange_kind = nearest_exchange_kind;
        result.hops_to_exchange = nearest_hops;
        result.direction = nearest_direction;
        result.execution_time_ms = start_time.elapsed().as_millis() as u64;

        info!(
            "Proximity analysis complete: hops={:?}, quality={}, strength={:?} in {}ms",
            result.hops_to_exchange,
            result.path_quality_score,
            result.path_strength,
            result.execution_time_ms
        );

        Ok(result)
    }

    #[allow(clippy::too_many_arguments)]
    fn record_found_path(
        &self,
        exchange: String,
        exchange_kind: String,
        new_path: Vec<ExchangeHop>,
        hops: u32,
        direction: TraceDirection,
        all_paths: &mut Vec<FoundPath>,
        connections_map: &mut HashMap<String, FoundPath>,
        nearest_exchange: &mut Option<String>,
        nearest_exchange_kind: &mut Option<String>,
        nearest_hops: &mut Option<u32>,
        nearest_direction: &mut Option<TraceDirection>,
        nearest_path: &mut Vec<ExchangeHop>,
    ) {
        debug!("Exchange path found: {} at {} hop(s)", exchange, hops);

        all_paths.push(FoundPath {
            hops: new_path.clone(),
            exchange: exchange.clone(),
            exchange_kind: exchange_kind.clone(),
            hop_count: hops,
            direction,
        });

        let key = format!("{}-{:?}-{}", exchange, direction, hops);
        connections_map.entry(key).or_insert_with(|| FoundPath {
            hops: new_path.clone(),
            exchange: exchange.clone(),
            exchange_kind: exchange_kind.clone(),
            hop_count: hops,
            direction,
        });

        if nearest_hops.map_or(true, |n| hops < n) {
            *nearest_exchange = Some(exchange);
            *nearest_exchange_kind = Some(exchange_kind);
            *nearest_hops = Some(hops);
            *nearest_direction = Some(direction);
            *nearest_path = new_path;
        }
    }
}

struct PathQuality {
    score: i32,
    factors: Vec<String>,
    coinjoin_count: u32,
    age_days: Option<f64>,
    strength: PathStrength,
}

/// Path quality score (0-100): higher = stronger/clearer link
///
/// Starts at 100 (perfect traceability) and deducts for privacy-enhancing
/// factors: 30 per CoinJoin, 40/20 for old paths, 10 for long paths.
fn score_path(hops: &[ExchangeHop], current_height: u64) -> PathQuality {
    let mut score: i32 = 100;
    let mut factors: Vec<String> = Vec::new();
    let mut coinjoin_count: u32 = 0;

    for hop in hops {
        if hop.is_coinjoin {
            score -= 30;
            coinjoin_count += 1;
            factors.push(format!(
                "CoinJoin detected at hop {} (-30 points)",
                hop.hop_number
            ));
        }
    }

    // Age estimated from block-height delta, 10 minutes per block
    let age_days = hops
        .first()
        .and_then(|h| h.block_height)
        .and_then(|height| block_age_days(height, current_height));
    if let Some(days) = age_days {
        if days > 365.0 {
            score -= 40;
            factors.push(format!("Path age > 1 year ({:.0} days) (-40 points)", days));
        } else if days > 180.0 {
            score -= 20;
            factors.push(format!(
                "Path age > 6 months ({:.0} days) (-20 points)",
                days
            ));
        } else {
            factors.push(format!("Recent path ({:.0} days old)", days));
        }
    }

    let path_length = hops.len();
    if path_length > 6 {
        score -= 10;
        factors.push(format!("Long path ({} hops) (-10 points)", path_length));
    } else if path_length == 1 {
        factors.push("Direct connection (1 hop)".to_string());
    } else {
        factors.push(format!("{} hops to exchange", path_length));
    }

    let score = score.clamp(0, 100);

    PathQuality {
        score,
        factors,
        coinjoin_count,
        age_days,
        strength: PathStrength::from_quality(score),
    }
}
