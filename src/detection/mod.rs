//! Transaction-structure heuristics
//!
//! Pure, deterministic analysis of transaction shape - no I/O. The
//! traversal engines layer these detectors on top of the graph search:
//! - **coinjoin** - CoinJoin protocol classification and anonymity-set
//!   estimation
//! - **change** - change-output and unnecessary-input heuristics
//! - **peeling** - peeling-chain detection over a forward trace result

pub mod change;
pub mod coinjoin;
pub mod peeling;

pub use change::{
    detect_change_output, detect_unnecessary_inputs, ChangeAnalysis, UnnecessaryInputAnalysis,
};
pub use coinjoin::{
    classify_coinjoin, estimate_anonymity_set, CoinJoinProtocol, DetectionResult, TransactionStats,
};
pub use peeling::{detect_peeling_chain, PeelingChainResult};
