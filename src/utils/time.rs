//! Time and block-age helpers

use chrono::{DateTime, Utc};

/// Minutes per block assumed for age estimation
const MINUTES_PER_BLOCK: f64 = 10.0;

/// Estimate the age in days between two block heights
///
/// Returns `None` when the tip is unknown or behind the reference height.
pub fn block_age_days(block_height: u64, tip_height: u64) -> Option<f64> {
    if tip_height == 0 || tip_height < block_height {
        return None;
    }
    let blocks = (tip_height - block_height) as f64;
    Some(blocks * MINUTES_PER_BLOCK / (60.0 * 24.0))
}

/// Render a unix timestamp as an RFC 3339 string, if valid
pub fn format_block_time(timestamp: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).map(|dt| dt.to_rfc3339())
}
