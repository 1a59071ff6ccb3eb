//! CLI command implementations

pub mod classify;
pub mod kyc;
pub mod proximity;
pub mod test_rpc;
pub mod trace;

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::index::EsploraIndexClient;
use crate::registry::ExchangeRegistry;
use crate::rpc::BitcoinRpcClient;
use crate::traits::{AddressIndex, NodeQuery};
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

/// Load configuration, falling back to defaults when no file exists
pub fn load_config() -> AppResult<AppConfig> {
    AppConfig::load().map_err(|e| AppError::Config(e.to_string()))
}

/// Build the node collaborator from configuration
pub fn build_node(config: &AppConfig) -> AppResult<Arc<dyn NodeQuery>> {
    let client = BitcoinRpcClient::new(config.bitcoin_rpc.clone())?;
    Ok(Arc::new(client))
}

/// Build the optional address-index collaborator from configuration
pub fn build_index(config: &AppConfig) -> Option<Arc<dyn AddressIndex>> {
    if !config.has_address_index() {
        return None;
    }
    match EsploraIndexClient::new(&config.address_index) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!("Address index unavailable: {}", e);
            None
        }
    }
}

/// Build the exchange registry (built-in table plus optional CSV)
pub fn build_registry(config: &AppConfig) -> AppResult<ExchangeRegistry> {
    ExchangeRegistry::from_config(config.registry.csv_path.as_deref())
}

/// Validate a mainnet address at the CLI boundary
///
/// The core engines compare addresses as opaque strings; format errors are
/// rejected here, before any traversal work begins.
pub fn validate_address(address: &str) -> AppResult<()> {
    bitcoin::Address::from_str(address)
        .map_err(|e| AppError::InvalidInput(format!("invalid address {}: {}", address, e)))?
        .require_network(bitcoin::Network::Bitcoin)
        .map_err(|_| {
            AppError::InvalidInput(format!("address {} is not a mainnet address", address))
        })?;
    Ok(())
}

/// Print a serialisable result as pretty JSON
pub fn print_json<T: serde::Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
