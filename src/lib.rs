//! Bitcoin UTXO Privacy Trace Engine
//!
//! Bounded transaction-graph exploration for estimating the privacy
//! exposure of a UTXO: forward/backward tracing, KYC-withdrawal path
//! finding with confidence decay, CoinJoin classification, peeling-chain
//! detection and exchange proximity scoring.
//!
//! All results use one units convention: satoshis for values, 0.0-1.0 for
//! probabilities/confidences, 0-100 for privacy and path-quality scores.
//! Everything produced here is a probabilistic forensic estimate, never
//! ground truth.

pub mod cli;
pub mod config;
pub mod detection;
pub mod errors;
pub mod index;
pub mod registry;
pub mod rpc;
pub mod tracer;
pub mod traits;
pub mod types;
pub mod utils;
