//! Core data model shared across all traversal engines
//!
//! Units convention, held throughout the crate and at the API boundary:
//! - monetary values are integer satoshis (`*_sats` fields)
//! - probabilities and confidences are floats in 0.0-1.0
//! - privacy / path-quality / proximity scores are 0-100

pub mod kyc;
pub mod proximity;
pub mod trace;
pub mod transaction;

pub use kyc::{ConfidenceLevel, KycTraceResult, PathNode, ProbableDestination, TrailStatus};
pub use proximity::{
    ExchangeConnection, ExchangeHop, ExchangePath, ExchangeProximityResult, PathStrength,
    TraceDirection,
};
pub use trace::{Direction, TraceEdge, TraceResult, TraceSummary, UtxoNode, UtxoStatus};
pub use transaction::{OutputStatus, PrevOut, TransactionRecord, TxInput, TxOutput};
