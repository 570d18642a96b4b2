//! Timestamp helpers.

use chrono::{DateTime, Utc};

/// A UTC instant, serialized as RFC3339.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}
