//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Batch identifier derived from a creation timestamp
///
/// Unix epoch milliseconds rendered as a decimal string. Unique only at
/// millisecond resolution; writers are serialized by the caller.
pub fn batch_id_at(timestamp: DateTime<Utc>) -> String {
    timestamp.timestamp_millis().to_string()
}
