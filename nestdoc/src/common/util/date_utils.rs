use chrono::{DateTime, SubsecRound, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current time truncated to millisecond precision, the
/// resolution document timestamps are stored with.
#[inline]
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

// returns 0 on any clock error instead of failing
#[inline]
pub fn get_current_time_or_zero() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
