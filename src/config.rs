use config::{Config, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration loaded from config.toml or environment variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub bitcoin_rpc: BitcoinRpcConfig,
    pub address_index: AddressIndexConfig,
    pub trace: TracePolicy,
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// Bitcoin Core RPC connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitcoinRpcConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub timeout_seconds: u64,
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_seconds: u64,
    pub concurrent_requests: usize,
}

impl Default for BitcoinRpcConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8332".to_string(),
            username: "bitcoin".to_string(),
            password: "password".to_string(),
            timeout_seconds: 30,
            max_retries: 3,
            initial_backoff_ms: 100,
            backoff_multiplier: 2.0,
            max_backoff_seconds: 30,
            concurrent_requests: 10,
        }
    }
}

/// Address index (Esplora-compatible HTTP API) settings
///
/// Optional collaborator: an empty URL means forward tracing runs in
/// degraded mode (spent outputs are identified but not followed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressIndexConfig {
    pub url: String,
    pub timeout_seconds: u64,
}

impl Default for AddressIndexConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_seconds: 20,
        }
    }
}

/// Traversal policy constants
///
/// The confidence-model numbers are heuristic calibrations, not physical
/// constants, so they are exposed here rather than hard-coded in the
/// tracers. The defaults are the calibrated production values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracePolicy {
    /// Depth used when a caller passes none
    pub default_depth: u32,
    /// Hard ceiling on any requested depth
    pub max_depth: u32,
    /// CoinJoin score at or above which a hop counts as mixed
    pub coinjoin_threshold: f64,
    /// Cumulative confidence below which a KYC trail is cold
    pub confidence_cold_threshold: f64,
    /// Flat per-hop confidence decay for non-CoinJoin hops
    pub hop_decay: f64,
}

impl Default for TracePolicy {
    fn default() -> Self {
        Self {
            default_depth: 10,
            max_depth: 50,
            coinjoin_threshold: 0.7,
            confidence_cold_threshold: 0.05,
            hop_decay: 0.95,
        }
    }
}

/// Exchange registry settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegistryConfig {
    /// Optional CSV of additional exchange addresses (address,exchange,wallet_kind)
    pub csv_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from config.toml and environment variables
    ///
    /// Environment variables take precedence over file configuration:
    /// `BITCOIN_RPC_*`, `ADDRESS_INDEX_*` and `TRACE_*` prefixes map onto
    /// the corresponding sections.
    pub fn load() -> Result<Self, ConfigError> {
        let rpc = BitcoinRpcConfig::default();
        let index = AddressIndexConfig::default();
        let trace = TracePolicy::default();

        let config = Config::builder()
            .set_default("bitcoin_rpc.url", rpc.url)?
            .set_default("bitcoin_rpc.username", rpc.username)?
            .set_default("bitcoin_rpc.password", rpc.password)?
            .set_default("bitcoin_rpc.timeout_seconds", rpc.timeout_seconds)?
            .set_default("bitcoin_rpc.max_retries", rpc.max_retries as i64)?
            .set_default("bitcoin_rpc.initial_backoff_ms", rpc.initial_backoff_ms)?
            .set_default("bitcoin_rpc.backoff_multiplier", rpc.backoff_multiplier)?
            .set_default("bitcoin_rpc.max_backoff_seconds", rpc.max_backoff_seconds)?
            .set_default(
                "bitcoin_rpc.concurrent_requests",
                rpc.concurrent_requests as i64,
            )?
            .set_default("address_index.url", index.url)?
            .set_default("address_index.timeout_seconds", index.timeout_seconds)?
            .set_default("trace.default_depth", trace.default_depth as i64)?
            .set_default("trace.max_depth", trace.max_depth as i64)?
            .set_default("trace.coinjoin_threshold", trace.coinjoin_threshold)?
            .set_default(
                "trace.confidence_cold_threshold",
                trace.confidence_cold_threshold,
            )?
            .set_default("trace.hop_decay", trace.hop_decay)?
            .add_source(File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("BITCOIN_RPC").separator("__"))
            .add_source(config::Environment::with_prefix("ADDRESS_INDEX").separator("__"))
            .add_source(config::Environment::with_prefix("TRACE").separator("__"))
            .build()?;

        let mut app_config: AppConfig = config.try_deserialize()?;

        // Single env override kept for docker-compose compatibility
        if let Ok(url) = std::env::var("BITCOIN_RPC_URL") {
            app_config.bitcoin_rpc.url = url;
        }
        if let Ok(url) = std::env::var("ADDRESS_INDEX_URL") {
            app_config.address_index.url = url;
        }

        Ok(app_config)
    }

    /// Defaults without touching the filesystem or environment
    pub fn defaults() -> Self {
        Self {
            bitcoin_rpc: BitcoinRpcConfig::default(),
            address_index: AddressIndexConfig::default(),
            trace: TracePolicy::default(),
            registry: RegistryConfig::default(),
        }
    }

    /// True when an address index endpoint is configured
    pub fn has_address_index(&self) -> bool {
        !self.address_index.url.is_empty()
    }
}
