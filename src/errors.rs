use thiserror::Error;

/// Application-wide error type - single point of truth
#[derive(Error, Debug)]
pub enum AppError {
    /// Bitcoin RPC operations
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// Address index operations
    #[error("Address index error: {0}")]
    Index(#[from] IndexError),

    /// File I/O operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV processing (exchange registry files)
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration issues
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller-supplied input rejected before any traversal work
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Data validation/parsing
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// RPC error types
#[derive(Error, Debug)]
pub enum RpcError {
    /// Failed to establish connection to Bitcoin Core RPC server
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// TXID string format is invalid (not valid hex or wrong length)
    #[error("Invalid txid: {txid}")]
    InvalidTxid { txid: String },

    /// RPC method call failed (covers network errors, authentication, etc.)
    #[error("RPC call failed: {method} - {message}")]
    CallFailed { method: String, message: String },

    /// Failed to deserialise RPC response data
    #[error("Deserialisation failed: {0}")]
    DeserialisationFailed(String),

    /// Retry limit exceeded for RPC operation
    #[error("Max retries exceeded: {operation}")]
    MaxRetriesExceeded { operation: String },

    /// RPC request timed out
    #[error("Request timeout: {timeout_seconds}s for {operation}")]
    Timeout {
        timeout_seconds: u64,
        operation: String,
    },

    /// RPC returned unexpected or malformed response data
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Transaction exists in valid format but not found in blockchain/mempool
    #[error("Transaction not found: {txid}")]
    TransactionNotFound { txid: String },
}

/// Address index (Esplora-style service) error types
///
/// Traversals treat every variant as a collaborator failure that degrades
/// forward resolution - none of these may abort a trace.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Index endpoint unreachable or connection dropped
    #[error("Index connection failed: {0}")]
    ConnectionFailed(String),

    /// Index request timed out
    #[error("Index request timeout: {timeout_seconds}s for {operation}")]
    Timeout {
        timeout_seconds: u64,
        operation: String,
    },

    /// Index returned unexpected or malformed response data
    #[error("Invalid index response: {0}")]
    InvalidResponse(String),

    /// Index has no record of the requested address/outpoint
    #[error("Not found in index: {0}")]
    NotFound(String),
}

/// Application-wide result type - single point of truth
pub type AppResult<T> = Result<T, AppError>;

/// Result type for RPC operations
pub type RpcResult<T> = Result<T, RpcError>;

/// Result type for address index operations
pub type IndexResult<T> = Result<T, IndexError>;

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidData(format!("JSON error: {}", err))
    }
}

/// Validate a transaction id string (64 hex characters)
///
/// Returns `AppError::InvalidInput` so malformed ids are rejected before
/// any traversal work begins.
pub fn validate_txid(txid: &str) -> AppResult<()> {
    if txid.len() != 64 || hex::decode(txid).is_err() {
        return Err(AppError::InvalidInput(format!(
            "txid must be 64 hex characters: {}",
            txid
        )));
    }
    Ok(())
}
