//! CoinJoin detection heuristics
//!
//! Classifies a transaction's shape against known mixing protocols:
//! fixed-denomination pools, many-equal-output rounds, variable-amount
//! many-party rounds, maker/taker markets and two-party disguised mixes.
//!
//! Variable-amount protocols are deliberately scored with lower confidence:
//! they are designed to look like ordinary transactions, and many
//! sophisticated mixes will go undetected entirely. Treat every score as a
//! heuristic estimate, never ground truth.

use crate::types::TransactionRecord;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

/// Canonical fixed-denomination pool sizes in satoshis (0.001/0.01/0.05/0.5 BTC)
const POOL_DENOMINATIONS_SATS: [u64; 4] = [100_000, 1_000_000, 5_000_000, 50_000_000];

/// Tolerance around a canonical denomination (0.0001 BTC)
const DENOMINATION_TOLERANCE_SATS: u64 = 10_000;

/// Score at or above which a transaction counts as a CoinJoin
pub const IS_COINJOIN_THRESHOLD: f64 = 0.5;

/// Known CoinJoin protocol families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoinJoinProtocol {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "fixed-denomination-mix")]
    FixedDenomination,
    #[serde(rename = "many-equal-output-mix")]
    ManyEqualOutput,
    #[serde(rename = "variable-amount-many-party-mix")]
    VariableAmount,
    #[serde(rename = "maker-taker-mix")]
    MakerTaker,
    #[serde(rename = "unknown-mix")]
    UnknownMix,
}

impl CoinJoinProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoinJoinProtocol::None => "none",
            CoinJoinProtocol::FixedDenomination => "fixed-denomination-mix",
            CoinJoinProtocol::ManyEqualOutput => "many-equal-output-mix",
            CoinJoinProtocol::VariableAmount => "variable-amount-many-party-mix",
            CoinJoinProtocol::MakerTaker => "maker-taker-mix",
            CoinJoinProtocol::UnknownMix => "unknown-mix",
        }
    }

    /// Real-world mixing-quality multiplier applied on top of the naive
    /// 1/anonymity-set model (higher = assumed worse mixing quality)
    pub fn degradation_multiplier(&self) -> f64 {
        match self {
            CoinJoinProtocol::FixedDenomination => 1.5,
            CoinJoinProtocol::ManyEqualOutput => 1.3,
            CoinJoinProtocol::VariableAmount => 1.8,
            CoinJoinProtocol::MakerTaker => 2.0,
            CoinJoinProtocol::UnknownMix | CoinJoinProtocol::None => 2.5,
        }
    }
}

/// Result of CoinJoin detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    pub txid: String,
    /// 0.0-1.0 likelihood the transaction is a mix
    pub score: f64,
    pub protocol: CoinJoinProtocol,
    pub confidence: f64,
    pub heuristics_matched: Vec<String>,
    pub heuristics_failed: Vec<String>,
    pub details: HashMap<String, serde_json::Value>,
}

impl DetectionResult {
    pub fn is_coinjoin(&self) -> bool {
        self.score >= IS_COINJOIN_THRESHOLD
    }
}

/// Shape statistics extracted once per transaction
#[derive(Debug, Clone)]
pub struct TransactionStats {
    pub input_count: usize,
    pub output_count: usize,
    pub unique_output_values: usize,
    pub max_equal_outputs: usize,
    pub equal_output_value_sats: Option<u64>,
    pub input_script_types: Vec<String>,
    pub is_coinbase: bool,
}

impl TransactionStats {
    pub fn from_record(tx: &TransactionRecord) -> Self {
        let mut value_counts: HashMap<u64, usize> = HashMap::new();
        for out in &tx.outputs {
            *value_counts.entry(out.value_sats).or_insert(0) += 1;
        }

        let max_equal_outputs = value_counts.values().copied().max().unwrap_or(0);
        let equal_output_value_sats = if max_equal_outputs >= 2 {
            value_counts
                .iter()
                .max_by_key(|(_, count)| **count)
                .map(|(value, _)| *value)
        } else {
            None
        };

        Self {
            input_count: tx.inputs.len(),
            output_count: tx.outputs.len(),
            unique_output_values: value_counts.len(),
            max_equal_outputs,
            equal_output_value_sats,
            input_script_types: tx
                .input_script_types()
                .into_iter()
                .map(|s| s.to_string())
                .collect(),
            is_coinbase: tx.is_coinbase(),
        }
    }

    /// Ratio of unique output values to output count (low = repetitive values)
    fn uniqueness_ratio(&self) -> f64 {
        if self.output_count == 0 {
            1.0
        } else {
            self.unique_output_values as f64 / self.output_count as f64
        }
    }
}

/// Intermediate per-protocol verdict
struct HeuristicOutcome {
    score: f64,
    confidence: f64,
    matched: Vec<String>,
    failed: Vec<String>,
    details: serde_json::Value,
}

/// Classify one transaction against all known CoinJoin protocols
///
/// Pure function of the transaction shape: the same record always produces
/// the same result. Protocols are tried in priority order and the best
/// scoring match wins; a generic fallback applies only when no specific
/// protocol reaches 0.5.
pub fn classify_coinjoin(tx: &TransactionRecord) -> DetectionResult {
    let stats = TransactionStats::from_record(tx);

    // Coinbase transactions are never mixes
    if stats.is_coinbase {
        return DetectionResult {
            txid: tx.txid.clone(),
            score: 0.0,
            protocol: CoinJoinProtocol::None,
            confidence: 1.0,
            heuristics_matched: Vec::new(),
            heuristics_failed: vec!["is_coinbase".to_string()],
            details: HashMap::new(),
        };
    }

    let candidates: [(CoinJoinProtocol, &str, HeuristicOutcome); 5] = [
        (
            CoinJoinProtocol::FixedDenomination,
            "fixed_denomination",
            detect_fixed_denomination(&stats),
        ),
        (
            CoinJoinProtocol::ManyEqualOutput,
            "many_equal_output",
            detect_many_equal_output(&stats),
        ),
        (
            CoinJoinProtocol::VariableAmount,
            "variable_amount",
            detect_variable_amount(&stats),
        ),
        (
            CoinJoinProtocol::MakerTaker,
            "maker_taker",
            detect_maker_taker(&stats),
        ),
        (
            CoinJoinProtocol::UnknownMix,
            "two_party_disguised",
            detect_two_party_disguised(&stats),
        ),
    ];

    let mut best_protocol = CoinJoinProtocol::None;
    let mut best_score = 0.0;
    let mut best_confidence = 0.0;
    let mut matched = Vec::new();
    let mut failed = Vec::new();
    let mut strong_match_found = false;
    let mut details: HashMap<String, serde_json::Value> = HashMap::new();

    // Priority order: the first protocol reaching the coinjoin line wins
    // outright; below the line the best partial score is kept.
    for (protocol, name, outcome) in candidates {
        details.insert(
            name.to_string(),
            json!({
                "score": outcome.score,
                "confidence": outcome.confidence,
                "matched": outcome.matched,
                "failed": outcome.failed,
                "details": outcome.details,
            }),
        );

        if strong_match_found {
            continue;
        }

        if outcome.score >= IS_COINJOIN_THRESHOLD {
            best_score = outcome.score;
            best_confidence = outcome.confidence;
            best_protocol = protocol;
            matched = outcome.matched;
            failed = outcome.failed;
            strong_match_found = true;
        } else if outcome.score > best_score {
            best_score = outcome.score;
            best_confidence = outcome.confidence;
            best_protocol = protocol;
            matched = outcome.matched;
            failed = outcome.failed;
        }
    }

    // Generic fallback only if nothing specific reached the coinjoin line
    if best_score < IS_COINJOIN_THRESHOLD {
        let (generic_score, generic_confidence) = detect_generic(&stats);
        if generic_score > best_score {
            best_score = generic_score;
            best_confidence = generic_confidence;
            best_protocol = if generic_score >= IS_COINJOIN_THRESHOLD {
                CoinJoinProtocol::UnknownMix
            } else {
                CoinJoinProtocol::None
            };
            matched = vec![
                "generic_equal_outputs".to_string(),
                "generic_multiple_participants".to_string(),
            ];
            failed = Vec::new();
        }
    }

    details.insert(
        "stats".to_string(),
        json!({
            "input_count": stats.input_count,
            "output_count": stats.output_count,
            "max_equal_outputs": stats.max_equal_outputs,
            "unique_output_values": stats.unique_output_values,
            "equal_output_value_sats": stats.equal_output_value_sats,
        }),
    );

    DetectionResult {
        txid: tx.txid.clone(),
        score: best_score,
        protocol: best_protocol,
        confidence: best_confidence,
        heuristics_matched: matched,
        heuristics_failed: failed,
        details,
    }
}

/// Estimate the anonymity set a mix provides for one hop
///
/// Conservative structural estimates: a fixed-denomination pool always has
/// 5 participants; equal-output counts bound the others; an unrecognised
/// mix defaults to 2 (the smallest set that is still a mix).
pub fn estimate_anonymity_set(protocol: CoinJoinProtocol, tx: &TransactionRecord) -> u32 {
    let stats = TransactionStats::from_record(tx);
    match protocol {
        CoinJoinProtocol::FixedDenomination => 5,
        CoinJoinProtocol::ManyEqualOutput => stats.max_equal_outputs as u32,
        CoinJoinProtocol::VariableAmount => stats.input_count.min(stats.output_count) as u32,
        CoinJoinProtocol::MakerTaker => stats.max_equal_outputs as u32,
        CoinJoinProtocol::UnknownMix | CoinJoinProtocol::None => 2,
    }
}

/// Exactly 5 outputs, all equal; canonical pool denominations score highest
fn detect_fixed_denomination(stats: &TransactionStats) -> HeuristicOutcome {
    let mut matched = Vec::new();
    let mut failed = Vec::new();

    if stats.output_count != 5 {
        failed.push(format!("output_count_{}_not_5", stats.output_count));
        return HeuristicOutcome {
            score: 0.0,
            confidence: 0.0,
            matched,
            failed,
            details: json!({}),
        };
    }
    matched.push("exactly_5_outputs".to_string());

    if stats.max_equal_outputs != 5 {
        failed.push("outputs_not_all_equal".to_string());
        return HeuristicOutcome {
            score: 0.1,
            confidence: 0.3,
            matched,
            failed,
            details: json!({}),
        };
    }
    matched.push("all_outputs_equal".to_string());

    let equal_value = stats.equal_output_value_sats.unwrap_or(0);
    let is_canonical = POOL_DENOMINATIONS_SATS
        .iter()
        .any(|d| equal_value.abs_diff(*d) < DENOMINATION_TOLERANCE_SATS);

    if is_canonical {
        matched.push(format!("valid_denomination_{}", equal_value));
        HeuristicOutcome {
            score: 0.95,
            confidence: 0.95,
            matched,
            failed,
            details: json!({ "denomination_sats": equal_value }),
        }
    } else {
        matched.push("non_standard_denomination".to_string());
        HeuristicOutcome {
            score: 0.80,
            confidence: 0.70,
            matched,
            failed,
            details: json!({ "denomination_sats": equal_value }),
        }
    }
}

/// Many equal outputs (10+); score scales with the equal-output count
fn detect_many_equal_output(stats: &TransactionStats) -> HeuristicOutcome {
    let mut matched = Vec::new();
    let mut failed = Vec::new();

    if stats.max_equal_outputs < 10 {
        failed.push(format!(
            "equal_outputs_{}_below_threshold",
            stats.max_equal_outputs
        ));
        return HeuristicOutcome {
            score: 0.0,
            confidence: 0.0,
            matched,
            failed,
            details: json!({}),
        };
    }
    matched.push(format!("many_equal_outputs_{}", stats.max_equal_outputs));

    let change_count = stats.output_count - stats.max_equal_outputs;
    if change_count > 0 {
        matched.push(format!("has_change_outputs_{}", change_count));
    }

    let extra = (stats.max_equal_outputs - 10) as f64;
    let score = (0.5 + extra * 0.05).min(0.85);
    let confidence = (0.6 + extra * 0.03).min(0.9);

    HeuristicOutcome {
        score,
        confidence,
        matched,
        failed,
        details: json!({
            "equal_outputs": stats.max_equal_outputs,
            "change_outputs": change_count,
        }),
    }
}

/// Variable amounts with many participants (10+ inputs and outputs)
///
/// Confidence is deliberately lower: this pattern is designed to be
/// indistinguishable from ordinary batching.
fn detect_variable_amount(stats: &TransactionStats) -> HeuristicOutcome {
    let mut matched = Vec::new();
    let mut failed = Vec::new();

    if stats.input_count < 10 {
        failed.push(format!("inputs_{}_below_10", stats.input_count));
        return HeuristicOutcome {
            score: 0.0,
            confidence: 0.0,
            matched,
            failed,
            details: json!({}),
        };
    }
    if stats.output_count < 10 {
        failed.push(format!("outputs_{}_below_10", stats.output_count));
        return HeuristicOutcome {
            score: 0.0,
            confidence: 0.0,
            matched,
            failed,
            details: json!({}),
        };
    }

    matched.push(format!(
        "many_participants_{}_inputs_{}_outputs",
        stats.input_count, stats.output_count
    ));

    if stats.uniqueness_ratio() > 0.5 {
        matched.push("high_output_diversity".to_string());
    } else {
        failed.push("low_output_diversity".to_string());
    }

    let extra = (stats.input_count - 10) as f64;
    let mut score = 0.50 + (extra * 0.02).min(0.20);
    let mut confidence = 0.40 + (extra * 0.02).min(0.25);

    // Hybrid signal: some equal outputs alongside the variable amounts
    if stats.max_equal_outputs >= 5 {
        matched.push(format!("some_equal_outputs_{}", stats.max_equal_outputs));
        score += 0.10;
        confidence += 0.10;
    }

    HeuristicOutcome {
        score,
        confidence,
        matched,
        failed,
        details: json!({
            "inputs": stats.input_count,
            "outputs": stats.output_count,
            "uniqueness_ratio": stats.uniqueness_ratio(),
        }),
    }
}

/// Maker/taker market structure: several inputs, equal maker outputs
fn detect_maker_taker(stats: &TransactionStats) -> HeuristicOutcome {
    let mut matched = Vec::new();
    let mut failed = Vec::new();

    if stats.input_count < 3 {
        failed.push(format!("inputs_{}_below_minimum", stats.input_count));
        return HeuristicOutcome {
            score: 0.0,
            confidence: 0.0,
            matched,
            failed,
            details: json!({}),
        };
    }
    matched.push(format!("sufficient_inputs_{}", stats.input_count));

    if stats.output_count < 4 {
        failed.push(format!("outputs_{}_below_minimum", stats.output_count));
        return HeuristicOutcome {
            score: 0.1,
            confidence: 0.2,
            matched,
            failed,
            details: json!({}),
        };
    }
    matched.push(format!("sufficient_outputs_{}", stats.output_count));

    if stats.max_equal_outputs < 2 {
        failed.push("no_equal_outputs".to_string());
        return HeuristicOutcome {
            score: 0.2,
            confidence: 0.3,
            matched,
            failed,
            details: json!({}),
        };
    }
    matched.push(format!("has_equal_outputs_{}", stats.max_equal_outputs));

    let mut score = 0.60;
    let mut confidence = 0.55;

    if stats.uniqueness_ratio() <= 0.5 {
        matched.push("typical_value_distribution".to_string());
        score += 0.1;
        confidence += 0.1;
    }

    HeuristicOutcome {
        score,
        confidence,
        matched,
        failed,
        details: json!({ "maker_outputs": stats.max_equal_outputs }),
    }
}

/// Two-party mix disguised as a normal payment
///
/// Capped at 0.40: the receiver contributing an input is designed to be
/// indistinguishable from an ordinary two-input spend.
fn detect_two_party_disguised(stats: &TransactionStats) -> HeuristicOutcome {
    let mut matched = Vec::new();
    let mut failed = Vec::new();

    let unique_input_types = stats
        .input_script_types
        .iter()
        .collect::<std::collections::HashSet<_>>()
        .len();

    if unique_input_types < 2 || stats.input_count < 2 || stats.input_count > 5 {
        failed.push("no_mixed_inputs_or_wrong_count".to_string());
        return HeuristicOutcome {
            score: 0.0,
            confidence: 0.0,
            matched,
            failed,
            details: json!({}),
        };
    }
    matched.push("mixed_input_types".to_string());

    if stats.output_count < 2 || stats.output_count > 4 {
        failed.push(format!("unusual_output_count_{}", stats.output_count));
        return HeuristicOutcome {
            score: 0.1,
            confidence: 0.2,
            matched,
            failed,
            details: json!({}),
        };
    }
    matched.push("typical_output_count".to_string());

    HeuristicOutcome {
        score: 0.40,
        confidence: 0.35,
        matched,
        failed,
        details: json!({ "input_script_types": stats.input_script_types }),
    }
}

/// Weighted generic pattern when no specific protocol matched
fn detect_generic(stats: &TransactionStats) -> (f64, f64) {
    let mut score = 0.0;

    if stats.max_equal_outputs >= 5 {
        score += 0.3;
    } else if stats.max_equal_outputs >= 3 {
        score += 0.15;
    }

    if stats.input_count >= 5 {
        score += 0.2;
    } else if stats.input_count >= 3 {
        score += 0.1;
    }

    if stats.output_count >= 10 {
        score += 0.2;
    } else if stats.output_count >= 5 {
        score += 0.1;
    }

    if stats.output_count > 0 {
        let ratio = stats.uniqueness_ratio();
        if ratio < 0.3 {
            score += 0.2;
        } else if ratio < 0.5 {
            score += 0.1;
        }
    }

    (score, score.min(0.7))
}
