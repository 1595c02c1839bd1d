//! Database access for roster-lists
//!
//! Tables are created by `roster_common::db::init_database`; this module
//! only reads and writes rows.

pub mod agents;
pub mod lists;

use chrono::{DateTime, Utc};
use roster_common::{Error, Result};

/// Parse an RFC 3339 timestamp column
pub(crate) fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}
