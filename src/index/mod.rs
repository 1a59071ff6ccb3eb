//! Address index integration module
//!
//! Wraps an Esplora-compatible HTTP API behind the `AddressIndex`
//! collaborator contract. The index is optional: when it is unconfigured or
//! failing, forward-direction tracing degrades to "identify spent, cannot
//! follow further" instead of erroring.

pub mod client;

pub use client::EsploraIndexClient;
