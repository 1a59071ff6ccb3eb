//! Change-output heuristics
//!
//! Two cooperating analyses lifted from common-input-ownership practice:
//! - **unnecessary inputs**: a transaction funded with more inputs than the
//!   outputs require strongly suggests all inputs share one wallet, and the
//!   surplus usually lands in the change output
//! - **change detection**: address reuse dominates; otherwise weaker shape
//!   signals (script type, non-round value, relative size, position)
//!   accumulate into a probability
//!
//! Pure functions of the transaction record - no I/O.

use crate::types::TransactionRecord;
use serde::{Deserialize, Serialize};

/// Flat fee allowance for a minimal transaction, in satoshis
const BASE_FEE_ALLOWANCE_SATS: u64 = 20_000;

/// Additional fee allowance per resolved input, in satoshis
const PER_INPUT_FEE_ALLOWANCE_SATS: u64 = 10_000;

/// Matching tolerance between the unnecessary-input sum and a candidate
/// change output (0.001 BTC)
const CHANGE_MATCH_TOLERANCE_SATS: u64 = 100_000;

/// Result of the unnecessary-input analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnnecessaryInputAnalysis {
    pub has_unnecessary: bool,
    pub unnecessary_indices: Vec<usize>,
    pub minimum_inputs_needed: usize,
    pub total_inputs_used: usize,
    /// Confidence that all inputs belong to the same wallet
    pub confidence: f64,
    pub likely_change_output: Option<usize>,
}

/// Result of the change-output heuristic for one output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeAnalysis {
    pub is_change: bool,
    pub probability: f64,
}

/// Detect whether a transaction used more inputs than necessary
///
/// Sorts resolved inputs largest-first and finds the minimum prefix that
/// covers total outputs plus an estimated fee. Surplus inputs are strong
/// common-ownership evidence, and the output closest to their sum is the
/// likely change output.
pub fn detect_unnecessary_inputs(tx: &TransactionRecord) -> UnnecessaryInputAnalysis {
    let input_values = tx.input_values();
    let output_values: Vec<(usize, u64)> = tx
        .outputs
        .iter()
        .enumerate()
        .map(|(idx, o)| (idx, o.value_sats))
        .collect();

    if input_values.is_empty() || output_values.is_empty() {
        return UnnecessaryInputAnalysis {
            has_unnecessary: false,
            unnecessary_indices: Vec::new(),
            minimum_inputs_needed: 0,
            total_inputs_used: tx.inputs.len(),
            confidence: 0.0,
            likely_change_output: None,
        };
    }

    let total_output: u64 = output_values.iter().map(|(_, v)| v).sum();
    let estimated_fee =
        BASE_FEE_ALLOWANCE_SATS + input_values.len() as u64 * PER_INPUT_FEE_ALLOWANCE_SATS;
    let target_amount = total_output + estimated_fee;

    let mut sorted_inputs = input_values.clone();
    sorted_inputs.sort_by(|a, b| b.1.cmp(&a.1));

    let mut cumulative = 0u64;
    let mut minimum_needed = 0usize;
    for (_, value) in &sorted_inputs {
        cumulative += value;
        minimum_needed += 1;
        if cumulative >= target_amount {
            break;
        }
    }

    let total_used = input_values.len();
    let unnecessary_count = total_used - minimum_needed;
    let has_unnecessary = unnecessary_count > 0;

    let unnecessary_indices: Vec<usize> = if has_unnecessary {
        sorted_inputs[minimum_needed..]
            .iter()
            .map(|(idx, _)| *idx)
            .collect()
    } else {
        Vec::new()
    };

    let confidence = if has_unnecessary {
        if unnecessary_count >= 2 {
            0.90
        } else {
            0.75
        }
    } else {
        0.30
    };

    // Change output often receives roughly the sum of the surplus inputs
    let mut likely_change_output = None;
    if has_unnecessary && output_values.len() >= 2 {
        let unnecessary_sum: u64 = input_values
            .iter()
            .filter(|(idx, _)| unnecessary_indices.contains(idx))
            .map(|(_, v)| v)
            .sum();

        let mut min_diff = u64::MAX;
        for (out_idx, out_value) in &output_values {
            let diff = out_value.abs_diff(unnecessary_sum);
            if diff < min_diff {
                min_diff = diff;
                likely_change_output = Some(*out_idx);
            }
        }

        if min_diff > CHANGE_MATCH_TOLERANCE_SATS {
            likely_change_output = None;
        }
    }

    UnnecessaryInputAnalysis {
        has_unnecessary,
        unnecessary_indices,
        minimum_inputs_needed: minimum_needed,
        total_inputs_used: total_used,
        confidence,
        likely_change_output,
    }
}

/// Decide whether one output of a transaction is likely change
///
/// Address reuse (paying back to an input address) dominates at 0.95.
/// Otherwise weaker signals accumulate, clipped at 0.85, with "is change"
/// declared above 0.35.
pub fn detect_change_output(tx: &TransactionRecord, output_idx: usize) -> ChangeAnalysis {
    let output = match tx.outputs.get(output_idx) {
        Some(o) => o,
        None => {
            return ChangeAnalysis {
                is_change: false,
                probability: 0.0,
            }
        }
    };

    let input_addresses = tx.input_addresses();

    // Address reuse is the dominant signal
    if let Some(addr) = output.address.as_deref() {
        if input_addresses.contains(&addr) {
            return ChangeAnalysis {
                is_change: true,
                probability: 0.95,
            };
        }
    }

    let mut probability: f64 = 0.0;

    let unnecessary = detect_unnecessary_inputs(tx);
    if unnecessary.likely_change_output == Some(output_idx) {
        probability += 0.30;
    }

    if tx
        .input_script_types()
        .contains(&output.script_type.as_str())
    {
        probability += 0.15;
    }

    // Change tends to be a non-round amount (not a multiple of 0.001 BTC)
    if output.value_sats % 100_000 != 0 {
        probability += 0.20;
    }

    let max_output = tx.outputs.iter().map(|o| o.value_sats).max().unwrap_or(0);
    if output.value_sats < max_output {
        probability += 0.15;
    }

    if output_idx == tx.outputs.len() - 1 {
        probability += 0.10;
    }

    let probability = probability.min(0.85);

    ChangeAnalysis {
        is_change: probability > 0.35,
        probability,
    }
}
