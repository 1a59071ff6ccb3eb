use crate::config::AddressIndexConfig;
use crate::errors::{IndexError, IndexResult};
use crate::traits::{AddressIndex, HistoryEntry};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Esplora-compatible HTTP address index client
///
/// Uses two endpoints:
/// - `GET /address/{address}/txs` for address history
/// - `GET /tx/{txid}/outspend/{vout}` for spending-transaction lookup
///
/// Every call carries its own timeout; a timeout is treated as a
/// connection-health signal by the caller's circuit breaker, not retried
/// per item.
pub struct EsploraIndexClient {
    http: reqwest::Client,
    base_url: String,
    timeout_seconds: u64,
}

impl EsploraIndexClient {
    /// Create a client for the configured endpoint
    pub fn new(config: &AddressIndexConfig) -> IndexResult<Self> {
        if config.url.is_empty() {
            return Err(IndexError::ConnectionFailed(
                "address index URL not configured".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                IndexError::ConnectionFailed(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            timeout_seconds: config.timeout_seconds,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        operation: &str,
    ) -> IndexResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                IndexError::Timeout {
                    timeout_seconds: self.timeout_seconds,
                    operation: operation.to_string(),
                }
            } else {
                IndexError::ConnectionFailed(format!("{}: {}", operation, e))
            }
        })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(IndexError::NotFound(operation.to_string()));
        }
        if !response.status().is_success() {
            return Err(IndexError::InvalidResponse(format!(
                "{}: HTTP {}",
                operation,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| IndexError::InvalidResponse(format!("{}: {}", operation, e)))
    }
}

#[async_trait]
impl AddressIndex for EsploraIndexClient {
    async fn get_history(&self, address: &str) -> IndexResult<Vec<HistoryEntry>> {
        let operation = format!("get_history({})", address);
        let txs: Vec<EsploraTx> = self
            .get_json(&format!("/address/{}/txs", address), &operation)
            .await?;

        debug!("Index history for {}: {} transactions", address, txs.len());

        Ok(txs
            .into_iter()
            .map(|tx| HistoryEntry {
                txid: tx.txid,
                height: tx.status.block_height.unwrap_or(0),
            })
            .collect())
    }

    async fn find_spending_transaction(
        &self,
        txid: &str,
        vout: u32,
    ) -> IndexResult<Option<String>> {
        let operation = format!("find_spending_transaction({}:{})", txid, vout);
        let outspend: EsploraOutspend = self
            .get_json(&format!("/tx/{}/outspend/{}", txid, vout), &operation)
            .await?;

        if !outspend.spent {
            debug!("Index reports {}:{} unspent", txid, vout);
            return Ok(None);
        }

        match outspend.txid {
            Some(spender) => Ok(Some(spender)),
            None => {
                warn!("Index reports {}:{} spent but gave no spender", txid, vout);
                Ok(None)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct EsploraTx {
    txid: String,
    #[serde(default)]
    status: EsploraTxStatus,
}

#[derive(Debug, Default, Deserialize)]
struct EsploraTxStatus {
    #[serde(default)]
    block_height: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct EsploraOutspend {
    spent: bool,
    #[serde(default)]
    txid: Option<String>,
}
