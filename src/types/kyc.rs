//! Result types for the KYC withdrawal privacy tracer

use serde::{Deserialize, Serialize};

/// Terminal status of one traced branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailStatus {
    /// Trail is clear and traceable (still in the queue)
    Active,
    /// Confidence dropped below the cold threshold
    Cold,
    /// Trail hit an unspent UTXO (current holding)
    DeadEnd,
    /// Hit the configured max depth
    DepthLimit,
    /// Spent but the spending transaction could not be resolved
    Lost,
}

/// Attribution confidence bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
    Negligible,
}

impl ConfidenceLevel {
    /// Band a 0.0-1.0 confidence score
    pub fn from_score(score: f64) -> Self {
        if score >= 0.7 {
            ConfidenceLevel::High
        } else if score >= 0.4 {
            ConfidenceLevel::Medium
        } else if score >= 0.2 {
            ConfidenceLevel::Low
        } else {
            ConfidenceLevel::Negligible
        }
    }
}

/// A node in a KYC trace path
///
/// `cumulative_confidence` is the estimated probability that this output
/// still belongs to the original withdrawer. It only ever decreases along a
/// path (CoinJoin degradation or the flat per-hop decay), except for the
/// bounded change-following nudge applied at path finalisation, and is
/// floored at 0.001.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathNode {
    pub txid: String,
    pub vout: u32,
    pub value_sats: u64,
    pub address: Option<String>,
    pub block_height: Option<u64>,
    pub block_time: Option<i64>,
    pub is_coinjoin: bool,
    pub coinjoin_score: f64,
    pub coinjoin_count_in_path: u32,
    pub coinjoin_protocol: String,
    pub anonymity_set_size: u32,
    pub depth: u32,
    pub is_change: bool,
    pub change_probability: f64,
    pub cumulative_confidence: f64,
}

/// A probable final destination for the traced funds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbableDestination {
    pub address: String,
    pub value_sats: u64,
    pub confidence_score: f64,
    pub confidence_level: ConfidenceLevel,
    pub path_length: usize,
    pub coinjoins_passed: u32,
    pub trail_status: TrailStatus,
    pub reasoning: Vec<String>,
    pub path: Vec<PathNode>,
}

/// Complete result of a KYC privacy trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KycTraceResult {
    pub exchange_txid: String,
    pub destination_address: String,
    pub original_value_sats: u64,
    pub trace_depth: u32,
    pub probable_destinations: Vec<ProbableDestination>,
    pub total_traced_sats: u64,
    pub total_untraceable_sats: u64,
    pub coinjoins_encountered: usize,
    /// 0-100, higher = more private
    pub overall_privacy_score: f64,
    pub privacy_rating: String,
    pub summary: String,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub execution_time_ms: u64,
    pub index_enabled: bool,
}

impl KycTraceResult {
    pub fn new(exchange_txid: &str, destination_address: &str, trace_depth: u32) -> Self {
        Self {
            exchange_txid: exchange_txid.to_string(),
            destination_address: destination_address.to_string(),
            original_value_sats: 0,
            trace_depth,
            probable_destinations: Vec::new(),
            total_traced_sats: 0,
            total_untraceable_sats: 0,
            coinjoins_encountered: 0,
            overall_privacy_score: 0.0,
            privacy_rating: "unknown".to_string(),
            summary: String::new(),
            warnings: Vec::new(),
            recommendations: Vec::new(),
            execution_time_ms: 0,
            index_enabled: false,
        }
    }

    /// Destinations at or above the given confidence level
    pub fn destinations_at_level(&self, level: ConfidenceLevel) -> usize {
        self.probable_destinations
            .iter()
            .filter(|d| d.confidence_level == level)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_level_bands() {
        assert_eq!(ConfidenceLevel::from_score(1.0), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(0.7), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(0.69), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.4), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.39), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_score(0.2), ConfidenceLevel::Low);
        assert_eq!(
            ConfidenceLevel::from_score(0.19),
            ConfidenceLevel::Negligible
        );
    }

    #[test]
    fn test_trail_status_serialises_snake_case() {
        let json = serde_json::to_string(&TrailStatus::DepthLimit).unwrap();
        assert_eq!(json, "\"depth_limit\"");
        let json = serde_json::to_string(&TrailStatus::DeadEnd).unwrap();
        assert_eq!(json, "\"dead_end\"");
    }

    #[test]
    fn test_new_result_defaults() {
        let result = KycTraceResult::new("tx", "addr", 6);
        assert_eq!(result.trace_depth, 6);
        assert_eq!(result.original_value_sats, 0);
        assert_eq!(result.privacy_rating, "unknown");
        assert!(result.probable_destinations.is_empty());
    }
}
