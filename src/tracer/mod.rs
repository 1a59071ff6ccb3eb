//! Bounded transaction-graph traversal engines
//!
//! All traversals are single-task cooperative BFS searches: queue and
//! visited-set mutation happens synchronously between awaits, the only
//! suspension points are collaborator calls, and every loop iteration
//! starts with a wall-clock check. Termination is guaranteed by four
//! independent caps (depth, transaction count, wall clock, queue size).

pub mod backward;
pub mod forward;
pub mod kyc;
pub mod limits;
pub mod proximity;

pub use backward::BackwardTracer;
pub use forward::ForwardTracer;
pub use kyc::{DepthPreset, KycPrivacyTracer};
pub use limits::TraceLimits;
pub use proximity::ExchangeProximityAnalyzer;
