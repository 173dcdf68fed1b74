//! Shared id utilities.

use std::time::{SystemTime, UNIX_EPOCH};

/// Generate a simple unique id based on current time in nanoseconds.
/// Sufficient for tagging outbound event messages.
#[inline]
pub fn gen_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("{:x}", nanos)
}
