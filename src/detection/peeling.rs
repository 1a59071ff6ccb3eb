//! Peeling-chain detection over a forward trace result
//!
//! A peeling chain is a sequential spend-down pattern: one large UTXO is
//! repeatedly split into a small payment output and a smaller change output,
//! carried across many transactions. The pattern links every transaction in
//! the chain to one owner with high confidence.

use crate::types::{TraceResult, UtxoNode, UtxoStatus};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Hard cap on chain walk length
const MAX_CHAIN_STEPS: usize = 20;

/// Minimum transactions before a peeling verdict is considered
const MIN_CHAIN_LENGTH: usize = 3;

/// Result of peeling-chain detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeelingChainResult {
    pub is_peeling_chain: bool,
    pub chain_length: usize,
    pub transactions: Vec<String>,
    pub confidence: f64,
    pub confidence_factors: Vec<String>,
    pub payment_amounts_sats: Vec<u64>,
    pub total_peeled_sats: u64,
    pub remaining_sats: u64,
    /// "critical", "high", "low" or "none"
    pub privacy_impact: String,
    pub explanation: String,
}

impl PeelingChainResult {
    fn negative(chain_length: usize, transactions: Vec<String>, explanation: &str) -> Self {
        Self {
            is_peeling_chain: false,
            chain_length,
            transactions,
            confidence: 0.0,
            confidence_factors: Vec::new(),
            payment_amounts_sats: Vec::new(),
            total_peeled_sats: 0,
            remaining_sats: 0,
            privacy_impact: "none".to_string(),
            explanation: explanation.to_string(),
        }
    }
}

/// Detect a peeling chain in a forward trace result
///
/// Walks the spend edges from the traced start output, at each spending
/// transaction treating the smallest output as the peeled payment and the
/// largest as the change to keep following.
pub fn detect_peeling_chain(trace: &TraceResult) -> PeelingChainResult {
    debug!("Starting peeling chain detection");

    if trace.edges.len() < 2 {
        return PeelingChainResult::negative(
            0,
            Vec::new(),
            "Insufficient transaction chain for peeling detection",
        );
    }

    // (txid, vout) -> spending edge
    let spend_map: HashMap<(&str, u32), &crate::types::TraceEdge> = trace
        .edges
        .iter()
        .map(|e| ((e.from_txid.as_str(), e.from_vout), e))
        .collect();

    let node_map: HashMap<(&str, u32), &UtxoNode> = trace
        .nodes
        .iter()
        .map(|n| ((n.txid.as_str(), n.vout), n))
        .collect();

    let start_key = (trace.start_txid.as_str(), trace.start_vout);
    if !node_map.contains_key(&start_key) {
        return PeelingChainResult::negative(0, Vec::new(), "Start UTXO not found in trace");
    }

    // Walk the chain following the change output each step
    let mut chain_txids: Vec<String> = Vec::new();
    let mut payments: Vec<u64> = Vec::new();
    let mut current_key = start_key;
    let mut visited: HashSet<(&str, u32)> = HashSet::new();

    while let Some(edge) = spend_map.get(&current_key) {
        if !visited.insert(current_key) {
            break;
        }
        let spending_txid = edge.to_txid.as_str();
        chain_txids.push(spending_txid.to_string());

        let mut spending_outputs: Vec<&UtxoNode> = trace
            .nodes
            .iter()
            .filter(|n| n.txid == spending_txid)
            .collect();

        if spending_outputs.is_empty() {
            break;
        }
        spending_outputs.sort_by_key(|n| n.value_sats);

        if spending_outputs.len() >= 2 {
            // Smallest output is the peeled payment, largest is the change
            let payment = spending_outputs[0];
            let change = spending_outputs[spending_outputs.len() - 1];
            payments.push(payment.value_sats);
            current_key = (change.txid.as_str(), change.vout);
        } else {
            payments.push(spending_outputs[0].value_sats);
            break;
        }

        if chain_txids.len() > MAX_CHAIN_STEPS {
            break;
        }
    }

    let chain_length = chain_txids.len();
    if chain_length < MIN_CHAIN_LENGTH {
        let total_peeled: u64 = payments.iter().sum();
        let mut result = PeelingChainResult::negative(
            chain_length,
            chain_txids,
            &format!(
                "Chain too short ({} transactions) - need {}+ for peeling pattern",
                chain_length, MIN_CHAIN_LENGTH
            ),
        );
        result.payment_amounts_sats = payments;
        result.total_peeled_sats = total_peeled;
        return result;
    }

    let mut confidence: f64 = 0.5;
    let mut factors: Vec<String> = Vec::new();

    if chain_length >= 5 {
        confidence += 0.2;
        factors.push(format!("Long chain ({} transactions)", chain_length));
    } else {
        confidence += 0.1;
        factors.push(format!("Chain of {} transactions", chain_length));
    }

    if !payments.is_empty() {
        let avg = payments.iter().sum::<u64>() as f64 / payments.len() as f64;
        let similar = payments
            .iter()
            .filter(|p| (**p as f64 - avg).abs() / avg < 0.5)
            .count();
        let similarity_ratio = similar as f64 / payments.len() as f64;

        if similarity_ratio > 0.7 {
            confidence += 0.2;
            factors.push(format!(
                "Similar payment amounts ({}% within 50% of average)",
                (similarity_ratio * 100.0) as u32
            ));
        } else if similarity_ratio > 0.5 {
            confidence += 0.1;
            factors.push("Moderately similar payment amounts".to_string());
        }
    }

    confidence += 0.1;
    factors.push("Sequential spend-down pattern".to_string());

    let confidence = confidence.min(0.95);
    let is_peeling_chain = confidence >= 0.6;

    let total_peeled: u64 = payments.iter().sum();

    // Remaining value is the last change output, when it is unspent
    let remaining = node_map
        .get(&current_key)
        .filter(|n| n.status == UtxoStatus::Unspent)
        .map(|n| n.value_sats)
        .unwrap_or(0);

    let (privacy_impact, explanation) = if is_peeling_chain {
        if confidence >= 0.8 {
            (
                "critical".to_string(),
                format!(
                    "High-confidence peeling chain detected ({}% confidence). \
                     All {} transactions are linkable with high certainty. \
                     Factors: {}.",
                    (confidence * 100.0) as u32,
                    chain_length,
                    factors.join(", ")
                ),
            )
        } else {
            (
                "high".to_string(),
                format!(
                    "Likely peeling chain detected ({}% confidence). \
                     {} transactions show peeling pattern. Factors: {}.",
                    (confidence * 100.0) as u32,
                    chain_length,
                    factors.join(", ")
                ),
            )
        }
    } else {
        (
            "low".to_string(),
            format!(
                "Possible peeling pattern ({}% confidence), but not conclusive with {} transactions.",
                (confidence * 100.0) as u32,
                chain_length
            ),
        )
    };

    debug!(
        "Peeling chain detection: is_chain={}, length={}, confidence={:.2}",
        is_peeling_chain, chain_length, confidence
    );

    PeelingChainResult {
        is_peeling_chain,
        chain_length,
        transactions: chain_txids,
        confidence,
        confidence_factors: factors,
        payment_amounts_sats: payments,
        total_peeled_sats: total_peeled,
        remaining_sats: remaining,
        privacy_impact,
        explanation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, TraceEdge, TraceResult, UtxoNode, UtxoStatus};

    fn node(txid: &str, vout: u32, value_sats: u64, status: UtxoStatus, depth: u32) -> UtxoNode {
        UtxoNode {
            txid: txid.to_string(),
            vout,
            value_sats,
            address: Some(format!("{}_{}", txid, vout)),
            script_type: "witness_v0_keyhash".to_string(),
            status,
            block_height: Some(800_000),
            block_time: Some(1_700_000_000),
            spent_by_txid: None,
            spent_by_vin: None,
            depth,
            coinjoin_score: 0.0,
        }
    }

    /// Build a synthetic peeling chain of `steps` transactions: each spends
    /// the previous change into one ~1 BTC payment and a shrinking change.
    fn build_peeling_trace(steps: usize) -> TraceResult {
        let mut result = TraceResult::new("start", 0, Direction::Forward, 10);
        let mut change_value: u64 = 10 * 100_000_000;
        let payment: u64 = 100_000_000;

        result
            .nodes
            .push(node("start", 0, change_value, UtxoStatus::Spent, 0));

        let mut prev = ("start".to_string(), 0u32);
        for i in 0..steps {
            let txid = format!("peel{}", i);
            change_value -= payment + 10_000;

            result.edges.push(TraceEdge {
                from_txid: prev.0.clone(),
                from_vout: prev.1,
                to_txid: txid.clone(),
                to_vin: 0,
                value_sats: change_value + payment,
            });

            // payment at vout 0, change at vout 1
            result
                .nodes
                .push(node(&txid, 0, payment, UtxoStatus::Spent, (i + 1) as u32));
            let change_status = if i == steps - 1 {
                UtxoStatus::Unspent
            } else {
                UtxoStatus::Spent
            };
            result
                .nodes
                .push(node(&txid, 1, change_value, change_status, (i + 1) as u32));

            prev = (txid, 1);
        }

        result
    }

    #[test]
    fn test_six_step_chain_detected() {
        let trace = build_peeling_trace(6);
        let result = detect_peeling_chain(&trace);

        assert!(result.is_peeling_chain);
        assert_eq!(result.chain_length, 6);
        assert!(result.confidence >= 0.6);
        assert_eq!(result.payment_amounts_sats.len(), 6);
        assert!(result
            .payment_amounts_sats
            .iter()
            .all(|p| *p == 100_000_000));
        assert_eq!(result.total_peeled_sats, 6 * 100_000_000);
    }

    #[test]
    fn test_long_similar_chain_is_critical() {
        let trace = build_peeling_trace(6);
        let result = detect_peeling_chain(&trace);
        // 0.5 + 0.2 (length>=5) + 0.2 (identical payments) + 0.1 = capped 0.95... = 1.0 -> 0.95
        assert!(result.confidence >= 0.8);
        assert_eq!(result.privacy_impact, "critical");
    }

    #[test]
    fn test_remaining_change_reported_when_unspent() {
        let trace = build_peeling_trace(4);
        let result = detect_peeling_chain(&trace);
        assert!(result.remaining_sats > 0);
    }

    #[test]
    fn test_short_chain_rejected() {
        let trace = build_peeling_trace(2);
        let result = detect_peeling_chain(&trace);
        assert!(!result.is_peeling_chain);
        assert_eq!(result.chain_length, 2);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.privacy_impact, "none");
    }

    #[test]
    fn test_empty_trace_rejected() {
        let trace = TraceResult::new("start", 0, Direction::Forward, 10);
        let result = detect_peeling_chain(&trace);
        assert!(!result.is_peeling_chain);
        assert_eq!(result.chain_length, 0);
    }

    #[test]
    fn test_missing_start_node_rejected() {
        let mut trace = TraceResult::new("start", 0, Direction::Forward, 10);
        trace.edges.push(TraceEdge {
            from_txid: "other".to_string(),
            from_vout: 0,
            to_txid: "next".to_string(),
            to_vin: 0,
            value_sats: 1,
        });
        trace.edges.push(TraceEdge {
            from_txid: "next".to_string(),
            from_vout: 0,
            to_txid: "third".to_string(),
            to_vin: 0,
            value_sats: 1,
        });
        let result = detect_peeling_chain(&trace);
        assert!(!result.is_peeling_chain);
        assert!(result.explanation.contains("Start UTXO not found"));
    }

    #[test]
    fn test_cyclic_edges_terminate() {
        // Two nodes spending into each other must not loop forever
        let mut trace = TraceResult::new("a", 0, Direction::Forward, 10);
        trace.nodes.push(node("a", 0, 1_000_000, UtxoStatus::Spent, 0));
        trace.nodes.push(node("b", 0, 900_000, UtxoStatus::Spent, 1));
        trace.edges.push(TraceEdge {
            from_txid: "a".to_string(),
            from_vout: 0,
            to_txid: "b".to_string(),
            to_vin: 0,
            value_sats: 1_000_000,
        });
        trace.edges.push(TraceEdge {
            from_txid: "b".to_string(),
            from_vout: 0,
            to_txid: "a".to_string(),
            to_vin: 0,
            value_sats: 900_000,
        });
        let result = detect_peeling_chain(&trace);
        assert!(result.chain_length <= 3);
    }
}
