//! Expiry timestamps
//!
//! TTLs are converted to absolute unix-millisecond deadlines at write time.
//! An entry is visible while `now < expires_at`, so a zero TTL is expired
//! as soon as it is written.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current wall-clock time in unix milliseconds
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Absolute deadline for a TTL starting now
pub fn deadline(ttl: Duration) -> u64 {
    deadline_from(now_millis(), ttl)
}

/// Absolute deadline for a TTL starting at `now`
pub fn deadline_from(now: u64, ttl: Duration) -> u64 {
    now.saturating_add(ttl.as_millis().min(u64::MAX as u128) as u64)
}

/// Whether a deadline has passed at `now`
#[inline]
pub fn is_expired(expires_at: Option<u64>, now: u64) -> bool {
    expires_at.map(|exp| now >= exp).unwrap_or(false)
}
