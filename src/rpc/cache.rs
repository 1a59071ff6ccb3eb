use crate::types::TransactionRecord;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Thread-safe transaction cache for avoiding duplicate RPC calls
///
/// One instance is created per traversal session, never shared across
/// concurrent requests, so a trace always sees a consistent snapshot.
#[derive(Clone)]
pub struct TransactionCache {
    cache: Arc<Mutex<HashMap<String, TransactionRecord>>>,
    hits: Arc<Mutex<u64>>,
    misses: Arc<Mutex<u64>>,
}

impl TransactionCache {
    /// Create a new empty transaction cache
    pub fn new() -> Self {
        Self {
            cache: Arc::new(Mutex::new(HashMap::new())),
            hits: Arc::new(Mutex::new(0)),
            misses: Arc::new(Mutex::new(0)),
        }
    }

    /// Get a transaction from cache if it exists
    pub fn get(&self, txid: &str) -> Option<TransactionRecord> {
        let cache = self.cache.lock().unwrap();
        match cache.get(txid) {
            Some(record) => {
                *self.hits.lock().unwrap() += 1;
                debug!("Cache hit for transaction: {}", txid);
                Some(record.clone())
            }
            None => {
                *self.misses.lock().unwrap() += 1;
                None
            }
        }
    }

    /// Store a transaction in the cache
    pub fn put(&self, record: TransactionRecord) {
        let mut cache = self.cache.lock().unwrap();
        cache.insert(record.txid.clone(), record);
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let hits = *self.hits.lock().unwrap();
        let misses = *self.misses.lock().unwrap();
        CacheStats { hits, misses }
    }

    /// Current number of cached transactions
    pub fn size(&self) -> usize {
        self.cache.lock().unwrap().len()
    }
}

impl Default for TransactionCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache performance statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            (self.hits as f64 / (self.hits + self.misses) as f64) * 100.0
        }
    }

    /// Get total cache requests
    pub fn total_requests(&self) -> u64 {
        self.hits + self.misses
    }
}
