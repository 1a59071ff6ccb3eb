//! Currency formatting utilities for Bitcoin and satoshi values
//!
//! This module provides standardised formatting for displaying Bitcoin
//! amounts in both BTC and satoshi units for better readability and
//! precision.

/// Satoshis per Bitcoin
const SATS_PER_BTC: f64 = 100_000_000.0;

/// Format a satoshi amount as dual BTC + sats display
///
/// # Examples
/// ```
/// use utxo_tracer::utils::currency::format_sats_as_btc;
///
/// assert_eq!(
///     format_sats_as_btc(28125351850),
///     "281.25351850 BTC (28125351850 sats)"
/// );
/// assert_eq!(
///     format_sats_as_btc(5471),
///     "0.00005471 BTC (5471 sats)"
/// );
/// ```
pub fn format_sats_as_btc(sats: u64) -> String {
    let btc = sats as f64 / SATS_PER_BTC;
    format!("{:.8} BTC ({} sats)", btc, sats)
}
