//! Traversal engine integration tests
//!
//! Drives the forward, backward, KYC and proximity engines against
//! synthetic in-memory transaction graphs, covering the termination,
//! de-duplication and confidence invariants the engines guarantee.

mod common;

use common::*;
use std::sync::Arc;
use utxo_tracer::registry::ExchangeRegistry;
use utxo_tracer::tracer::{
    BackwardTracer, DepthPreset, ExchangeProximityAnalyzer, ForwardTracer, KycPrivacyTracer,
    TraceLimits,
};
use utxo_tracer::types::{
    PathStrength, TraceDirection, TrailStatus, UtxoStatus,
};

// ---------------------------------------------------------------------------
// Forward tracer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn forward_trace_stops_at_unspent_output() {
    let mut chain = MockChain::new();
    let t1 = txid(1);
    chain.add_tx(record(
        &t1,
        vec![outpoint(&txid(9), 0)],
        vec![output(1_000_000, "addr_a")],
        800_000,
    ));
    chain.mark_unspent(&t1, 0);

    let tracer = ForwardTracer::new(Arc::new(chain), None);
    let result = tracer.trace_forward(&t1, 0, 5, None).await.unwrap();

    assert_eq!(result.nodes.len(), 1);
    assert_eq!(result.nodes[0].status, UtxoStatus::Unspent);
    assert_eq!(result.unspent_endpoints.len(), 1);
    assert!(result.edges.is_empty());
    assert_eq!(result.total_transactions, 1);
    assert!(!result.hit_limit);
    assert!(!result.index_enabled);
    // degraded mode is announced
    assert!(result
        .warnings
        .iter()
        .any(|w| w.contains("Address index not available")));
}

#[tokio::test]
async fn forward_trace_follows_spend_through_index() {
    let mut chain = MockChain::new();
    let t1 = txid(1);
    let t2 = txid(2);
    chain.add_tx(record(
        &t1,
        vec![outpoint(&txid(9), 0)],
        vec![output(1_000_000, "addr_a")],
        800_000,
    ));
    chain.add_tx(record(
        &t2,
        vec![outpoint(&t1, 0)],
        vec![output(600_000, "addr_b"), output(390_000, "addr_c")],
        800_001,
    ));
    chain.mark_unspent(&t2, 0);
    chain.mark_unspent(&t2, 1);

    let mut index = MockIndex::new();
    index.add_spend(&t1, 0, &t2);

    let tracer = ForwardTracer::new(Arc::new(chain), Some(Arc::new(index)));
    let result = tracer.trace_forward(&t1, 0, 5, None).await.unwrap();

    assert_eq!(result.nodes.len(), 3);
    assert_eq!(result.edges.len(), 1);
    assert_eq!(result.edges[0].to_txid, t2);
    assert_eq!(result.edges[0].to_vin, 0);
    assert_eq!(result.unspent_endpoints.len(), 2);
    assert!(result.index_enabled);

    let spent_node = result.nodes.iter().find(|n| n.txid == t1).unwrap();
    assert_eq!(spent_node.status, UtxoStatus::Spent);
    assert_eq!(spent_node.spent_by_txid.as_deref(), Some(t2.as_str()));
    assert_eq!(spent_node.spent_by_vin, Some(0));

    // children discovered one hop deeper
    assert!(result
        .nodes
        .iter()
        .filter(|n| n.txid == t2)
        .all(|n| n.depth == 1));

    assert_unique_nodes(&result);
}

#[tokio::test]
async fn forward_trace_disables_index_after_three_failures() {
    let mut chain = MockChain::new();
    let t1 = txid(1);
    let t2 = txid(2);
    chain.add_tx(record(
        &t1,
        vec![outpoint(&txid(9), 0)],
        vec![output(4_000_000, "addr_a")],
        800_000,
    ));
    chain.add_tx(record(
        &t2,
        vec![outpoint(&t1, 0)],
        vec![
            output(1_000_001, "addr_b"),
            output(1_000_002, "addr_c"),
            output(1_000_003, "addr_d"),
            output(999_991, "addr_e"),
        ],
        800_001,
    ));
    // all four outputs of t2 are spent, but the index knows none of them

    let mut index = MockIndex::new();
    index.add_spend(&t1, 0, &t2);

    let tracer = ForwardTracer::new(Arc::new(chain), Some(Arc::new(index)));
    let result = tracer.trace_forward(&t1, 0, 5, None).await.unwrap();

    // breaker message after the third consecutive failure
    assert!(result
        .warnings
        .iter()
        .any(|w| w.contains("disabled after 3 consecutive failures")));

    // every t2 output is recorded as a dead-end SPENT node, not an error
    let t2_nodes: Vec<_> = result.nodes.iter().filter(|n| n.txid == t2).collect();
    assert_eq!(t2_nodes.len(), 4);
    assert!(t2_nodes
        .iter()
        .all(|n| n.status == UtxoStatus::Spent && n.spent_by_txid.is_none()));

    assert_unique_nodes(&result);
}

#[tokio::test]
async fn forward_trace_survives_erroring_index() {
    let mut chain = MockChain::new();
    let t1 = txid(1);
    chain.add_tx(record(
        &t1,
        vec![outpoint(&txid(9), 0)],
        vec![output(1_000_000, "addr_a")],
        800_000,
    ));
    // spent output, index errors on every call

    let tracer = ForwardTracer::new(Arc::new(chain), Some(Arc::new(MockIndex::failing())));
    let result = tracer.trace_forward(&t1, 0, 5, None).await.unwrap();

    // the collaborator error degrades the branch, it never aborts the trace
    assert_eq!(result.nodes.len(), 1);
    assert_eq!(result.nodes[0].status, UtxoStatus::Spent);
    assert!(result.nodes[0].spent_by_txid.is_none());
}

#[tokio::test]
async fn forward_trace_terminates_on_cyclic_graph() {
    let mut chain = MockChain::new();
    let t1 = txid(1);
    let t2 = txid(2);
    chain.add_tx(record(
        &t1,
        vec![outpoint(&t2, 0)],
        vec![output(1_000_000, "addr_a")],
        800_000,
    ));
    chain.add_tx(record(
        &t2,
        vec![outpoint(&t1, 0)],
        vec![output(900_000, "addr_b")],
        800_001,
    ));

    let mut index = MockIndex::new();
    index.add_spend(&t1, 0, &t2);
    index.add_spend(&t2, 0, &t1);

    let tracer = ForwardTracer::new(Arc::new(chain), Some(Arc::new(index)));
    let result = tracer.trace_forward(&t1, 0, 10, None).await.unwrap();

    // the visited-set breaks the cycle
    assert_eq!(result.nodes.len(), 2);
    assert_unique_nodes(&result);
}

#[tokio::test]
async fn forward_trace_respects_depth_limit() {
    let mut chain = MockChain::new();
    let mut index = MockIndex::new();

    // chain of 6 single-output transactions, each spent by the next
    for i in 1..=6u32 {
        let inputs = if i == 1 {
            vec![outpoint(&txid(99), 0)]
        } else {
            vec![outpoint(&txid(i - 1), 0)]
        };
        chain.add_tx(record(
            &txid(i),
            inputs,
            vec![output(1_000_000 - i as u64 * 1000, "addr")],
            800_000 + i as u64,
        ));
        if i < 6 {
            index.add_spend(&txid(i), 0, &txid(i + 1));
        }
    }

    let tracer = ForwardTracer::new(Arc::new(chain), Some(Arc::new(index)));
    let result = tracer.trace_forward(&txid(1), 0, 2, None).await.unwrap();

    assert!(result.nodes.iter().all(|n| n.depth <= 2));
    // depth 0, 1 and 2 nodes only
    assert_eq!(result.nodes.len(), 3);
}

#[tokio::test]
async fn forward_trace_transaction_cap_terminates_wide_graph() {
    let mut chain = MockChain::new();
    let mut index = MockIndex::new();

    for i in 1..=50u32 {
        let inputs = if i == 1 {
            vec![outpoint(&txid(99), 0)]
        } else {
            vec![outpoint(&txid(i - 1), 0)]
        };
        chain.add_tx(record(
            &txid(i),
            inputs,
            vec![output(10_000_000, "addr")],
            800_000,
        ));
        index.add_spend(&txid(i), 0, &txid(i + 1));
        chain.add_tx(record(
            &txid(i + 1),
            vec![outpoint(&txid(i), 0)],
            vec![output(10_000_000, "addr")],
            800_000,
        ));
    }

    let limits = TraceLimits {
        max_transactions: 5,
        ..TraceLimits::standard()
    };
    let tracer =
        ForwardTracer::new(Arc::new(chain), Some(Arc::new(index))).with_limits(limits);
    let result = tracer.trace_forward(&txid(1), 0, 50, None).await.unwrap();

    assert!(result.hit_limit);
    assert_eq!(result.total_transactions, 5);
    assert!(result
        .warnings
        .iter()
        .any(|w| w.contains("Transaction limit")));
}

#[tokio::test]
async fn forward_trace_rejects_malformed_txid() {
    let chain = MockChain::new();
    let tracer = ForwardTracer::new(Arc::new(chain), None);
    let result = tracer.trace_forward("nothex", 0, 5, None).await;
    assert!(result.is_err());
}

// ---------------------------------------------------------------------------
// Backward tracer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn backward_trace_stops_at_coinbase_origin() {
    let mut chain = MockChain::new();
    let cb = txid(1);
    let t2 = txid(2);
    let t3 = txid(3);

    chain.add_tx(record(
        &cb,
        vec![coinbase_input()],
        vec![output(5_000_000_000, "miner")],
        700_000,
    ));
    chain.add_tx(record(
        &t2,
        vec![outpoint(&cb, 0)],
        vec![output(4_999_000_000, "addr_a")],
        700_010,
    ));
    chain.add_tx(record(
        &t3,
        vec![outpoint(&t2, 0)],
        vec![output(4_998_000_000, "addr_b")],
        700_020,
    ));

    let tracer = BackwardTracer::new(Arc::new(chain));
    let result = tracer.trace_backward(&t3, 5, None).await.unwrap();

    assert_eq!(result.coinbase_origins.len(), 1);
    assert_eq!(result.coinbase_origins[0].txid, cb);
    assert_eq!(result.coinbase_origins[0].status, UtxoStatus::Coinbase);
    assert_eq!(result.total_transactions, 3);
    // one edge per non-coinbase input
    assert_eq!(result.edges.len(), 2);
    assert_unique_nodes(&result);
}

#[tokio::test]
async fn backward_trace_respects_transaction_cap() {
    let mut chain = MockChain::new();
    for i in 1..=10u32 {
        let inputs = if i == 1 {
            vec![coinbase_input()]
        } else {
            vec![outpoint(&txid(i - 1), 0)]
        };
        chain.add_tx(record(
            &txid(i),
            inputs,
            vec![output(1_000_000, "addr")],
            700_000 + i as u64,
        ));
    }

    let limits = TraceLimits {
        max_transactions: 2,
        ..TraceLimits::standard()
    };
    let tracer = BackwardTracer::new(Arc::new(chain)).with_limits(limits);
    let result = tracer.trace_backward(&txid(10), 9, None).await.unwrap();

    assert!(result.hit_limit);
    assert_eq!(result.total_transactions, 2);
}

#[tokio::test]
async fn backward_trace_respects_depth_limit() {
    let mut chain = MockChain::new();
    for i in 1..=8u32 {
        let inputs = if i == 1 {
            vec![coinbase_input()]
        } else {
            vec![outpoint(&txid(i - 1), 0)]
        };
        chain.add_tx(record(
            &txid(i),
            inputs,
            vec![output(1_000_000, "addr")],
            700_000,
        ));
    }

    let tracer = BackwardTracer::new(Arc::new(chain));
    let result = tracer.trace_backward(&txid(8), 3, None).await.unwrap();

    assert!(result.nodes.iter().all(|n| n.depth <= 3));
    // start + 3 parents
    assert_eq!(result.total_transactions, 4);
}

// ---------------------------------------------------------------------------
// KYC privacy tracer
// ---------------------------------------------------------------------------

/// A fixed-denomination mix: 5 inputs, 5 equal 0.001 BTC outputs
fn add_mix(
    chain: &mut MockChain,
    mix_txid: &str,
    funding: Vec<(&str, u32)>,
    out_prefix: &str,
    height: u64,
) {
    let mut inputs: Vec<_> = funding
        .into_iter()
        .map(|(prev, vout)| outpoint(prev, vout))
        .collect();
    while inputs.len() < 5 {
        let filler = txid(900 + inputs.len() as u32);
        inputs.push(outpoint(&filler, 0));
    }
    let outputs = (0..5)
        .map(|i| output(100_000, &format!("{}_{}", out_prefix, i)))
        .collect();
    chain.add_tx(record(mix_txid, inputs, outputs, height));
}

#[tokio::test]
async fn kyc_trace_unspent_withdrawal_is_high_confidence() {
    let mut chain = MockChain::new();
    let exchange_tx = txid(1);
    chain.add_tx(record(
        &exchange_tx,
        vec![outpoint_resolved(&txid(9), 0, 210_000_000, "exchange_hot")],
        vec![
            output(100_000_000, "addr_dest"),
            output(109_000_000, "exchange_change"),
        ],
        800_000,
    ));
    chain.mark_unspent(&exchange_tx, 0);

    let tracer = KycPrivacyTracer::new(Arc::new(chain), None);
    let result = tracer
        .trace_kyc_withdrawal(&exchange_tx, "addr_dest", DepthPreset::Standard, None)
        .await
        .unwrap();

    assert_eq!(result.original_value_sats, 100_000_000);
    assert_eq!(result.probable_destinations.len(), 1);

    let dest = &result.probable_destinations[0];
    assert_eq!(dest.trail_status, TrailStatus::DeadEnd);
    assert_eq!(dest.address, "addr_dest");
    assert_eq!(dest.coinjoins_passed, 0);
    // one non-CoinJoin hop: 1.0 * 0.95
    assert!((dest.confidence_score - 0.95).abs() < 1e-9);

    assert_eq!(result.coinjoins_encountered, 0);
    assert_eq!(result.total_traced_sats, 100_000_000);
    // single high-confidence destination, no mixing: poor privacy
    assert!(result.overall_privacy_score < 30.0);
    assert_eq!(result.privacy_rating, "very_poor");
}

#[tokio::test]
async fn kyc_trace_cold_pruning_after_three_mixes() {
    let mut chain = MockChain::new();
    let mut index = MockIndex::new();

    let exchange_tx = txid(1);
    let mix1 = txid(2);
    let mix2 = txid(3);
    let mix3 = txid(4);

    chain.add_tx(record(
        &exchange_tx,
        vec![outpoint_resolved(&txid(9), 0, 60_000_000, "exchange_hot")],
        vec![
            output(100_000, "addr_dest"),
            output(59_800_000, "exchange_change"),
        ],
        800_000,
    ));

    add_mix(&mut chain, &mix1, vec![(&exchange_tx, 0)], "m1", 800_010);
    add_mix(&mut chain, &mix2, vec![(&mix1, 0)], "m2", 800_020);
    add_mix(&mut chain, &mix3, vec![(&mix2, 0)], "m3", 800_030);

    index.add_spend(&exchange_tx, 0, &mix1);
    index.add_spend(&mix1, 0, &mix2);
    index.add_spend(&mix2, 0, &mix3);

    // mix1/mix2 outputs 1-4 stay put; output 0 feeds the next mix
    for k in 1..5u32 {
        chain.mark_unspent(&mix1, k);
        chain.mark_unspent(&mix2, k);
    }

    let tracer = KycPrivacyTracer::new(Arc::new(chain), Some(Arc::new(index)));
    let result = tracer
        .trace_kyc_withdrawal(&exchange_tx, "addr_dest", DepthPreset::Deep, None)
        .await
        .unwrap();

    assert_eq!(result.coinjoins_encountered, 3);

    let cold: Vec<_> = result
        .probable_destinations
        .iter()
        .filter(|d| d.trail_status == TrailStatus::Cold)
        .collect();
    assert!(!cold.is_empty(), "expected cold trails after three mixes");

    for dest in &result.probable_destinations {
        let path = &dest.path;

        // cold-trail pruning: a sub-threshold node is always terminal
        for node in &path[..path.len().saturating_sub(1)] {
            assert!(
                node.cumulative_confidence >= 0.05,
                "non-terminal node below the cold threshold in path of {}",
                dest.address
            );
        }

        // confidence monotonicity: only the bounded change-nudge may raise it
        for pair in path.windows(2) {
            assert!(
                pair[1].cumulative_confidence
                    <= pair[0].cumulative_confidence * 1.1 + 1e-9
            );
            assert!(pair[1].cumulative_confidence >= 0.001);
        }
    }

    // cold value counts as untraceable
    assert!(result.total_untraceable_sats >= 100_000);
    // mixes that actually went cold score well
    assert!(result.overall_privacy_score >= 70.0);
    assert_eq!(result.privacy_rating, "good");
}

#[tokio::test]
async fn kyc_trace_missing_destination_address() {
    let mut chain = MockChain::new();
    let exchange_tx = txid(1);
    chain.add_tx(record(
        &exchange_tx,
        vec![outpoint(&txid(9), 0)],
        vec![output(100_000_000, "someone_else")],
        800_000,
    ));

    let tracer = KycPrivacyTracer::new(Arc::new(chain), None);
    let result = tracer
        .trace_kyc_withdrawal(&exchange_tx, "addr_dest", DepthPreset::Quick, None)
        .await
        .unwrap();

    assert!(result.probable_destinations.is_empty());
    assert_eq!(result.original_value_sats, 0);
    assert!(result
        .warnings
        .iter()
        .any(|w| w.contains("not found in transaction outputs")));
}

#[tokio::test]
async fn kyc_trace_spent_without_index_is_lost() {
    let mut chain = MockChain::new();
    let exchange_tx = txid(1);
    chain.add_tx(record(
        &exchange_tx,
        vec![outpoint(&txid(9), 0)],
        vec![output(100_000_000, "addr_dest")],
        800_000,
    ));
    // output 0 is spent but there is no index to follow it

    let tracer = KycPrivacyTracer::new(Arc::new(chain), None);
    let result = tracer
        .trace_kyc_withdrawal(&exchange_tx, "addr_dest", DepthPreset::Standard, None)
        .await
        .unwrap();

    assert!(!result.index_enabled);
    assert_eq!(result.probable_destinations.len(), 1);
    let dest = &result.probable_destinations[0];
    assert_eq!(dest.trail_status, TrailStatus::Lost);
    assert!(dest
        .reasoning
        .iter()
        .any(|r| r.contains("address index required")));
}

#[tokio::test]
async fn kyc_trace_visited_outputs_never_duplicate() {
    let mut chain = MockChain::new();
    let mut index = MockIndex::new();

    let exchange_tx = txid(1);
    let spender = txid(2);
    chain.add_tx(record(
        &exchange_tx,
        vec![outpoint(&txid(9), 0)],
        vec![output(50_000_000, "addr_dest")],
        800_000,
    ));
    chain.add_tx(record(
        &spender,
        vec![outpoint(&exchange_tx, 0)],
        vec![output(25_000_000, "a"), output(24_000_000, "b")],
        800_001,
    ));
    chain.mark_unspent(&spender, 0);
    chain.mark_unspent(&spender, 1);
    index.add_spend(&exchange_tx, 0, &spender);

    let tracer = KycPrivacyTracer::new(Arc::new(chain), Some(Arc::new(index)));
    let result = tracer
        .trace_kyc_withdrawal(&exchange_tx, "addr_dest", DepthPreset::Standard, None)
        .await
        .unwrap();

    let mut seen = std::collections::HashSet::new();
    for dest in &result.probable_destinations {
        let last = dest.path.last().unwrap();
        assert!(
            seen.insert((last.txid.clone(), last.vout)),
            "terminal output visited twice"
        );
    }
    assert_eq!(result.probable_destinations.len(), 2);
}

// ---------------------------------------------------------------------------
// Exchange proximity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn proximity_seed_address_is_exchange() {
    let mut registry = ExchangeRegistry::empty();
    registry.insert("exch_addr", "TestExchange", "hot_wallet");

    let analyzer =
        ExchangeProximityAnalyzer::new(Arc::new(MockChain::new()), None, registry);
    let result = analyzer
        .analyze_exchange_proximity("exch_addr", None)
        .await
        .unwrap();

    assert_eq!(result.hops_to_exchange, Some(0));
    assert_eq!(result.nearest_exchange.as_deref(), Some("TestExchange"));
    assert_eq!(result.direction, Some(TraceDirection::IsExchange));
    assert_eq!(result.proximity_score, 100);
    assert_eq!(result.path_quality_score, 100);
    assert_eq!(result.path_strength, PathStrength::Strong);
    assert_eq!(result.risk_level, "critical");
    // no graph search happened
    assert!(result.alternative_paths.is_empty());
}

#[tokio::test]
async fn proximity_direct_payment_to_exchange() {
    let mut chain = MockChain::new().with_tip(800_100);
    let mut index = MockIndex::new();
    let mut registry = ExchangeRegistry::empty();
    registry.insert("exchange_addr", "TestExchange", "hot_wallet");

    let funding = txid(9);
    let payment = txid(5);
    chain.add_tx(record(
        &funding,
        vec![coinbase_input()],
        vec![output(2_000_000, "funder_addr")],
        799_000,
    ));
    chain.add_tx(record(
        &payment,
        vec![outpoint(&funding, 0)],
        vec![output(1_900_000, "exchange_addr")],
        800_000,
    ));
    index.add_history("addr_user", vec![(payment.clone(), 800_000)]);

    let analyzer =
        ExchangeProximityAnalyzer::new(Arc::new(chain), Some(Arc::new(index)), registry);
    let result = analyzer
        .analyze_exchange_proximity("addr_user", None)
        .await
        .unwrap();

    assert_eq!(result.hops_to_exchange, Some(1));
    assert_eq!(result.nearest_exchange.as_deref(), Some("TestExchange"));
    assert_eq!(result.direction, Some(TraceDirection::SentTo));
    assert_eq!(result.proximity_score, 90);
    assert_eq!(result.risk_level, "critical");
    assert_eq!(result.path_quality_score, 100);
    assert_eq!(result.path_strength, PathStrength::Strong);
    assert_eq!(result.all_exchange_connections.len(), 1);
    assert!(!result.alternative_paths.is_empty());
}

#[tokio::test]
async fn proximity_no_connection_found() {
    let mut chain = MockChain::new();
    let mut index = MockIndex::new();
    let registry = ExchangeRegistry::empty();

    let payment = txid(5);
    chain.add_tx(record(
        &payment,
        vec![coinbase_input()],
        vec![output(1_000_000, "plain_addr")],
        800_000,
    ));
    index.add_history("addr_user", vec![(payment.clone(), 800_000)]);

    let analyzer =
        ExchangeProximityAnalyzer::new(Arc::new(chain), Some(Arc::new(index)), registry);
    let result = analyzer
        .analyze_exchange_proximity("addr_user", None)
        .await
        .unwrap();

    assert_eq!(result.hops_to_exchange, None);
    assert_eq!(result.proximity_score, 0);
    assert_eq!(result.risk_level, "low");
    assert!(result.all_exchange_connections.is_empty());
}

#[tokio::test]
async fn proximity_without_index_degrades_gracefully() {
    let registry = ExchangeRegistry::empty();
    let analyzer = ExchangeProximityAnalyzer::new(Arc::new(MockChain::new()), None, registry);
    let result = analyzer
        .analyze_exchange_proximity("addr_user", Some(3))
        .await
        .unwrap();

    assert_eq!(result.hops_to_exchange, None);
    assert!(result
        .warnings
        .iter()
        .any(|w| w.contains("Address index not available")));
}
