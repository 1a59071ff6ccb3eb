//! Result types for the exchange proximity analyzer

use serde::{Deserialize, Serialize};

/// Which way a proximity hop was discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceDirection {
    /// Funds arrived at the seed from this hop (input side)
    ReceivedFrom,
    /// Funds left the seed towards this hop (output side)
    SentTo,
    /// The seed address itself is a registry entry
    IsExchange,
}

/// Strength band for a path quality score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PathStrength {
    Strong,
    Moderate,
    Weak,
    Broken,
    Unknown,
}

impl PathStrength {
    /// Band a 0-100 path quality score
    pub fn from_quality(score: i32) -> Self {
        if score >= 85 {
            PathStrength::Strong
        } else if score >= 60 {
            PathStrength::Moderate
        } else if score >= 30 {
            PathStrength::Weak
        } else {
            PathStrength::Broken
        }
    }
}

/// A hop in a path to/from an exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeHop {
    pub txid: String,
    pub address: String,
    pub value_sats: u64,
    pub direction: TraceDirection,
    pub hop_number: u32,
    pub is_coinjoin: bool,
    pub block_height: Option<u64>,
}

/// A complete path to an exchange with quality metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangePath {
    pub path_hops: Vec<ExchangeHop>,
    pub total_hops: u32,
    pub exchange_name: String,
    pub exchange_kind: String,
    pub direction: TraceDirection,
    pub path_quality_score: i32,
    pub path_strength: PathStrength,
    pub coinjoin_count: u32,
    pub path_age_days: Option<f64>,
}

/// One unique exchange connection found during the search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConnection {
    pub exchange_name: String,
    pub exchange_kind: String,
    pub hops: u32,
    pub direction: TraceDirection,
    pub path_quality: i32,
    pub path_strength: PathStrength,
}

/// Result of exchange proximity analysis with path quality scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeProximityResult {
    pub address: String,
    pub nearest_exchange: Option<String>,
    pub nearest_exchange_kind: Option<String>,
    pub hops_to_exchange: Option<u32>,
    pub direction: Option<TraceDirection>,
    /// 0-100, 100 = directly connected
    pub proximity_score: i32,
    pub risk_level: String,
    /// 0-100, higher = stronger/clearer link along the nearest path
    pub path_quality_score: i32,
    pub path_quality_factors: Vec<String>,
    pub coinjoin_count_in_path: u32,
    pub path_age_days: Option<f64>,
    pub path_strength: PathStrength,
    pub alternative_paths: Vec<ExchangePath>,
    pub all_exchange_connections: Vec<ExchangeConnection>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub execution_time_ms: u64,
}

impl ExchangeProximityResult {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            nearest_exchange: None,
            nearest_exchange_kind: None,
            hops_to_exchange: None,
            direction: None,
            proximity_score: 0,
            risk_level: "low".to_string(),
            path_quality_score: 0,
            path_quality_factors: Vec::new(),
            coinjoin_count_in_path: 0,
            path_age_days: None,
            path_strength: PathStrength::Unknown,
            alternative_paths: Vec::new(),
            all_exchange_connections: Vec::new(),
            warnings: Vec::new(),
            recommendations: Vec::new(),
            execution_time_ms: 0,
        }
    }
}
