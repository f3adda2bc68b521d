//! Wall-clock timestamps.
//!
//! Timestamps are Unix milliseconds. The engine takes `now` as an argument on
//! every time-dependent operation, so only the server reads the clock.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Current wall-clock time in Unix milliseconds.
///
/// A clock set before the epoch reads as `0`.
pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
