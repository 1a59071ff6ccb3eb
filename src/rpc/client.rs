use crate::config::BitcoinRpcConfig;
use crate::errors::{RpcError, RpcResult};
use crate::rpc::{calculate_next_backoff, execute_with_timeout, TransactionCache};
use crate::traits::NodeQuery;
use crate::types::{OutputStatus, PrevOut, TransactionRecord, TxInput, TxOutput};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Satoshis per BTC, for converting the node's decimal amounts
const SATS_PER_BTC: f64 = 100_000_000.0;

/// Error substrings Bitcoin Core returns for missing transactions.
/// These are terminal answers, not transient faults - never retried.
const NOT_FOUND_MARKERS: [&str; 2] = [
    "No such mempool or blockchain transaction",
    "Invalid or non-wallet transaction id",
];

/// Bitcoin Core JSON-RPC client with retry logic and per-session caching
///
/// Speaks verbose `getrawtransaction` (verbosity 2) so transaction records
/// arrive with per-output addresses and prevout-annotated inputs - the data
/// every traversal heuristic needs. Implements the `NodeQuery` collaborator
/// contract.
pub struct BitcoinRpcClient {
    http: reqwest::Client,
    config: BitcoinRpcConfig,
    semaphore: Arc<Semaphore>,
    cache: TransactionCache,
    request_id: AtomicU64,
    error_count: Arc<AtomicU64>,
}

impl BitcoinRpcClient {
    /// Create a new RPC client
    ///
    /// Does not touch the network; call `test_connection` to verify the node
    /// is reachable before starting a long traversal.
    pub fn new(config: BitcoinRpcConfig) -> RpcResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| RpcError::ConnectionFailed(format!("Failed to build HTTP client: {}", e)))?;

        let semaphore = Arc::new(Semaphore::new(config.concurrent_requests));

        Ok(Self {
            http,
            config,
            semaphore,
            cache: TransactionCache::new(),
            request_id: AtomicU64::new(0),
            error_count: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Test RPC connection via getblockchaininfo
    pub async fn test_connection(&self) -> RpcResult<()> {
        let info = self.call_with_retry("getblockchaininfo", json!([])).await?;
        debug!(
            "Bitcoin Core connection test successful - chain: {}, blocks: {}",
            info.get("chain").and_then(|v| v.as_str()).unwrap_or("?"),
            info.get("blocks").and_then(|v| v.as_u64()).unwrap_or(0)
        );
        info!("Bitcoin RPC connection established successfully");
        Ok(())
    }

    /// Get the current error count from RPC operations
    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Get cache statistics
    pub fn cache_stats(&self) -> crate::rpc::CacheStats {
        self.cache.stats()
    }

    /// Fetch several transactions concurrently, `None` per failed lookup
    pub async fn batch_get_transactions(
        &self,
        txids: &[String],
    ) -> Vec<Option<TransactionRecord>> {
        let futures = txids.iter().map(|txid| self.get_transaction_impl(txid));
        futures::future::join_all(futures)
            .await
            .into_iter()
            .enumerate()
            .map(|(i, result)| match result {
                Ok(tx) => tx,
                Err(e) => {
                    warn!("Failed to fetch tx {}: {}", txids[i], e);
                    None
                }
            })
            .collect()
    }

    /// Single JSON-RPC call without retry
    async fn call_once(&self, method: &str, params: Value) -> RpcResult<Value> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "1.0",
            "id": format!("utxo-tracer-{}", id),
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.config.url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(&payload)
            .send()
            .await
            .map_err(|e| RpcError::ConnectionFailed(format!("{} request failed: {}", method, e)))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(RpcError::ConnectionFailed(
                "Authentication failed - check RPC credentials".to_string(),
            ));
        }

        let envelope: RpcEnvelope = response
            .json()
            .await
            .map_err(|e| RpcError::DeserialisationFailed(format!("{}: {}", method, e)))?;

        if let Some(err) = envelope.error {
            return Err(RpcError::CallFailed {
                method: method.to_string(),
                message: format!("code {}: {}", err.code, err.message),
            });
        }

        Ok(envelope.result.unwrap_or(Value::Null))
    }

    /// JSON-RPC call with the standard retry discipline
    ///
    /// Retries connection failures and timeouts with exponential backoff;
    /// RPC-level "not found" answers are returned immediately.
    async fn call_with_retry(&self, method: &str, params: Value) -> RpcResult<Value> {
        let _permit = self.semaphore.acquire().await.map_err(|e| {
            RpcError::ConnectionFailed(format!("Failed to acquire semaphore: {}", e))
        })?;

        let mut attempts = 0;
        let mut backoff = Duration::from_millis(self.config.initial_backoff_ms);

        loop {
            match execute_with_timeout(
                self.config.timeout_seconds,
                self.call_once(method, params.clone()),
            )
            .await
            {
                Ok(Ok(result)) => {
                    if attempts > 0 {
                        debug!("{} succeeded after {} attempts", method, attempts + 1);
                    }
                    return Ok(result);
                }
                Ok(Err(e)) => {
                    attempts += 1;
                    self.error_count.fetch_add(1, Ordering::Relaxed);

                    let message = e.to_string();
                    if NOT_FOUND_MARKERS.iter().any(|m| message.contains(m)) {
                        debug!("{} returned not-found (non-retryable): {}", method, e);
                        return Err(e);
                    }

                    if attempts >= self.config.max_retries {
                        error!("{} failed after {} attempts: {}", method, attempts, e);
                        return Err(RpcError::MaxRetriesExceeded {
                            operation: method.to_string(),
                        });
                    }

                    warn!(
                        "RPC attempt {} failed for {}, retrying in {:?}: {}",
                        attempts, method, backoff, e
                    );
                    sleep(backoff).await;
                    backoff = calculate_next_backoff(
                        backoff,
                        self.config.backoff_multiplier,
                        self.config.max_backoff_seconds,
                    );
                }
                Err(_) => {
                    attempts += 1;
                    self.error_count.fetch_add(1, Ordering::Relaxed);

                    if attempts >= self.config.max_retries {
                        error!(
                            "RPC timeout for {} after {} attempts ({}s timeout)",
                            method, attempts, self.config.timeout_seconds
                        );
                        return Err(RpcError::Timeout {
                            timeout_seconds: self.config.timeout_seconds,
                            operation: method.to_string(),
                        });
                    }

                    warn!(
                        "RPC timeout for {} on attempt {}, retrying in {:?}",
                        method, attempts, backoff
                    );
                    sleep(backoff).await;
                    backoff = calculate_next_backoff(
                        backoff,
                        self.config.backoff_multiplier,
                        self.config.max_backoff_seconds,
                    );
                }
            }
        }
    }

    async fn get_transaction_impl(&self, txid: &str) -> RpcResult<Option<TransactionRecord>> {
        if let Some(cached) = self.cache.get(txid) {
            return Ok(Some(cached));
        }

        let result = self
            .call_with_retry("getrawtransaction", json!([txid, 2]))
            .await;

        let value = match result {
            Ok(v) => v,
            Err(e) => {
                let message = e.to_string();
                if NOT_FOUND_MARKERS.iter().any(|m| message.contains(m)) {
                    return Ok(None);
                }
                return Err(e);
            }
        };

        if value.is_null() {
            return Ok(None);
        }

        let raw: RawTx = serde_json::from_value(value).map_err(|e| {
            RpcError::DeserialisationFailed(format!("getrawtransaction({}): {}", txid, e))
        })?;

        let record = raw.into_record();
        self.cache.put(record.clone());
        Ok(Some(record))
    }
}

#[async_trait]
impl NodeQuery for BitcoinRpcClient {
    async fn get_transaction(&self, txid: &str) -> RpcResult<Option<TransactionRecord>> {
        self.get_transaction_impl(txid).await
    }

    async fn get_output_status(&self, txid: &str, vout: u32) -> RpcResult<OutputStatus> {
        let value = self
            .call_with_retry("gettxout", json!([txid, vout, true]))
            .await?;

        if value.is_null() {
            return Ok(OutputStatus::Spent);
        }

        let value_sats = value
            .get("value")
            .and_then(Value::as_f64)
            .map(btc_to_sats)
            .unwrap_or(0);
        let confirmations = value
            .get("confirmations")
            .and_then(Value::as_u64)
            .unwrap_or(0);

        Ok(OutputStatus::Unspent {
            value_sats,
            confirmations,
        })
    }

    async fn get_block_height(&self) -> RpcResult<u64> {
        let value = self.call_with_retry("getblockcount", json!([])).await?;
        value
            .as_u64()
            .ok_or_else(|| RpcError::InvalidResponse(format!("getblockcount: {}", value)))
    }

    async fn get_block_time(&self, height: u64) -> RpcResult<i64> {
        let hash = self
            .call_with_retry("getblockhash", json!([height]))
            .await?;
        let hash = hash
            .as_str()
            .ok_or_else(|| RpcError::InvalidResponse(format!("getblockhash: {}", hash)))?
            .to_string();

        let header = self
            .call_with_retry("getblockheader", json!([hash, true]))
            .await?;
        header
            .get("time")
            .and_then(Value::as_i64)
            .ok_or_else(|| RpcError::InvalidResponse("getblockheader missing time".to_string()))
    }
}

/// JSON-RPC response envelope
#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// Verbose transaction payload from getrawtransaction
#[derive(Debug, Deserialize)]
struct RawTx {
    txid: String,
    #[serde(default)]
    vin: Vec<RawVin>,
    #[serde(default)]
    vout: Vec<RawVout>,
    #[serde(default)]
    blockheight: Option<u64>,
    #[serde(default)]
    height: Option<u64>,
    #[serde(default)]
    blocktime: Option<i64>,
    #[serde(default)]
    confirmations: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawVin {
    #[serde(default)]
    coinbase: Option<String>,
    #[serde(default)]
    txid: Option<String>,
    #[serde(default)]
    vout: Option<u32>,
    #[serde(default)]
    prevout: Option<RawPrevOut>,
}

#[derive(Debug, Deserialize)]
struct RawPrevOut {
    value: f64,
    #[serde(rename = "scriptPubKey", default)]
    script_pub_key: RawScriptPubKey,
}

#[derive(Debug, Deserialize)]
struct RawVout {
    value: f64,
    #[serde(rename = "scriptPubKey", default)]
    script_pub_key: RawScriptPubKey,
}

#[derive(Debug, Default, Deserialize)]
struct RawScriptPubKey {
    #[serde(default)]
    address: Option<String>,
    #[serde(rename = "type", default)]
    script_type: Option<String>,
}

impl RawTx {
    fn into_record(self) -> TransactionRecord {
        let inputs = self
            .vin
            .into_iter()
            .map(|vin| {
                if vin.coinbase.is_some() {
                    TxInput::Coinbase
                } else {
                    TxInput::Outpoint {
                        txid: vin.txid.unwrap_or_default(),
                        vout: vin.vout.unwrap_or(0),
                        prevout: vin.prevout.map(|p| PrevOut {
                            value_sats: btc_to_sats(p.value),
                            address: p.script_pub_key.address,
                            script_type: p
                                .script_pub_key
                                .script_type
                                .unwrap_or_else(|| "unknown".to_string()),
                        }),
                    }
                }
            })
            .collect();

        let outputs = self
            .vout
            .into_iter()
            .map(|vout| TxOutput {
                value_sats: btc_to_sats(vout.value),
                address: vout.script_pub_key.address,
                script_type: vout
                    .script_pub_key
                    .script_type
                    .unwrap_or_else(|| "unknown".to_string()),
            })
            .collect();

        TransactionRecord {
            txid: self.txid,
            inputs,
            outputs,
            block_height: self.blockheight.or(self.height),
            block_time: self.blocktime,
            confirmations: self.confirmations,
        }
    }
}

/// Convert the node's decimal BTC amount to integer satoshis
fn btc_to_sats(btc: f64) -> u64 {
    (btc * SATS_PER_BTC).round() as u64
}
