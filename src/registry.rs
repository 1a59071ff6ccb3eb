//! Known-exchange address registry
//!
//! Maps addresses to the exchange entity controlling them. Ships with a
//! small built-in table of publicly attributed wallets and can be extended
//! from a CSV file with `address,exchange,wallet_kind` rows.
//!
//! Attribution here is public-information heuristics, never ground truth.

use crate::errors::{AppError, AppResult};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// One registry entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeEntry {
    pub exchange: String,
    /// "hot_wallet" or "cold_wallet"
    pub wallet_kind: String,
}

lazy_static! {
    /// Publicly attributed exchange wallets used when no CSV is supplied
    static ref BUILTIN_EXCHANGES: Vec<(&'static str, &'static str, &'static str)> = vec![
        ("34xp4vRoCGJym3xR7yCVPFHoCNxv4Twseo", "Binance", "cold_wallet"),
        ("bc1qgdjqv0av3q56jvd82tkdjpy7gdp9ut8tlqmgrpmv24sq90ecnvqqjwvw97", "Binance", "hot_wallet"),
        ("3Kzh9qAqVWQhEsfQz7zEQL1EuSx5tyNLNS", "Coinbase", "cold_wallet"),
        ("36n452uGq1x4mK7bfyZR8wgE47AnBb2pzi", "Coinbase", "hot_wallet"),
        ("3E1jkR1PJ8hFUqCkDjimwPoF2bZVrkqnpv", "Kraken", "cold_wallet"),
        ("3AfP9N7KNq2pYXiGQdgNJy8SD2Mo7pQKUR", "Kraken", "hot_wallet"),
        ("3QW95MafxER9W7kWDcosQNdLk4Z36TYJZL", "Gemini", "hot_wallet"),
        ("bc1qm34lsc65zpw79lxes69zkqmk6ee3ewf0j77s3h", "Bitfinex", "cold_wallet"),
    ];
}

/// Address -> exchange lookup table
#[derive(Debug, Clone, Default)]
pub struct ExchangeRegistry {
    entries: HashMap<String, ExchangeEntry>,
}

impl ExchangeRegistry {
    /// Empty registry (tests and fully-custom setups)
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registry seeded with the built-in table
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for (address, exchange, kind) in BUILTIN_EXCHANGES.iter() {
            registry.insert(address, exchange, kind);
        }
        registry
    }

    /// Add one entry, replacing any previous attribution for the address
    pub fn insert(&mut self, address: &str, exchange: &str, wallet_kind: &str) {
        self.entries.insert(
            address.to_string(),
            ExchangeEntry {
                exchange: exchange.to_string(),
                wallet_kind: wallet_kind.to_string(),
            },
        );
    }

    /// Look up an address
    pub fn lookup(&self, address: &str) -> Option<&ExchangeEntry> {
        self.entries.get(address)
    }

    /// Number of known addresses
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge entries from a CSV file with `address,exchange,wallet_kind` rows
    ///
    /// Rows with a missing address or exchange are skipped with a warning
    /// rather than failing the whole load.
    pub fn load_csv(&mut self, path: &Path) -> AppResult<usize> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let mut loaded = 0usize;
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let address = record.get(0).unwrap_or("").trim();
            let exchange = record.get(1).unwrap_or("").trim();
            let wallet_kind = record.get(2).unwrap_or("hot_wallet").trim();

            if address.is_empty() || exchange.is_empty() {
                warn!("Skipping registry row {}: missing address or exchange", line + 2);
                continue;
            }

            self.insert(address, exchange, wallet_kind);
            loaded += 1;
        }

        info!("Loaded {} exchange addresses from {}", loaded, path.display());
        Ok(loaded)
    }

    /// Built-in table plus an optional CSV overlay
    pub fn from_config(csv_path: Option<&Path>) -> AppResult<Self> {
        let mut registry = Self::builtin();
        if let Some(path) = csv_path {
            if !path.exists() {
                return Err(AppError::Config(format!(
                    "exchange registry CSV not found: {}",
                    path.display()
                )));
            }
            registry.load_csv(path)?;
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_registry_lookup() {
        let registry = ExchangeRegistry::builtin();
        assert!(!registry.is_empty());

        let entry = registry
            .lookup("34xp4vRoCGJym3xR7yCVPFHoCNxv4Twseo")
            .expect("builtin address should resolve");
        assert_eq!(entry.exchange, "Binance");
        assert_eq!(entry.wallet_kind, "cold_wallet");

        assert!(registry.lookup("bc1qunknownaddress").is_none());
    }

    #[test]
    fn test_insert_replaces_existing() {
        let mut registry = ExchangeRegistry::empty();
        registry.insert("addr1", "ExchangeA", "hot_wallet");
        registry.insert("addr1", "ExchangeB", "cold_wallet");

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("addr1").unwrap().exchange, "ExchangeB");
    }

    #[test]
    fn test_load_csv_skips_bad_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "address,exchange,wallet_kind").unwrap();
        writeln!(file, "addr_good,TestExchange,hot_wallet").unwrap();
        writeln!(file, ",MissingAddress,hot_wallet").unwrap();
        writeln!(file, "addr_minimal,OtherExchange").unwrap();
        file.flush().unwrap();

        let mut registry = ExchangeRegistry::empty();
        let loaded = registry.load_csv(file.path()).unwrap();

        assert_eq!(loaded, 2);
        assert_eq!(
            registry.lookup("addr_good").unwrap().exchange,
            "TestExchange"
        );
        // wallet_kind column missing falls back to hot_wallet
        assert_eq!(
            registry.lookup("addr_minimal").unwrap().wallet_kind,
            "hot_wallet"
        );
    }

    #[test]
    fn test_from_config_missing_file_is_config_error() {
        let result =
            ExchangeRegistry::from_config(Some(Path::new("/nonexistent/registry.csv")));
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
