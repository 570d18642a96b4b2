//! Small helpers for ids, timestamps and text shaping.

mod text;
pub mod timestamps;

pub use text::{slugify, truncate_for_display};
pub use timestamps::{now_utc, Timestamp};

use uuid::Uuid;

/// Generates a new time-ordered (v7) identifier.
#[must_use]
pub fn generate_uuid_v7() -> Uuid {
    Uuid::now_v7()
}
