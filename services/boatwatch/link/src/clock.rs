//! Time sources for the periodic tasks.
//!
//! State machines take time as plain milliseconds so tests can drive them
//! directly; the running tasks read it from here.

use chrono::Utc;
use once_cell::sync::Lazy;
use std::time::Instant;

static START: Lazy<Instant> = Lazy::new(Instant::now);

/// Monotonic milliseconds since the process first asked for the time
pub fn now_ms() -> u64 {
    START.elapsed().as_millis() as u64
}

/// Wall-clock seconds since the Unix epoch, as carried in time sync packets
pub fn unix_seconds() -> u32 {
    Utc::now().timestamp().clamp(0, u32::MAX as i64) as u32
}
