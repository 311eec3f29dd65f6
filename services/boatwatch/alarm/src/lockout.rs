//! Failed PIN attempt limiter.
//!
//! Counts failures inside a sliding window that starts at the first failure. Once
//! the count reaches the threshold, further attempts are refused until the window
//! that started at the first failure has passed.

use std::time::Duration;
use tracing::{debug, warn};

/// Default failures allowed per window
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default window length
pub const DEFAULT_LOCKOUT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct FailureInfo {
    count: u32,
    first_failure_ms: u64,
}

/// Tracks failed PIN attempts
#[derive(Debug, Clone)]
pub struct PinLockout {
    max_attempts: u32,
    window_ms: u64,
    failures: Option<FailureInfo>,
}

impl PinLockout {
    /// Create a limiter allowing `max_attempts` failures per `window`
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            window_ms: window.as_millis() as u64,
            failures: None,
        }
    }

    fn expired(&self, info: &FailureInfo, now_ms: u64) -> bool {
        now_ms.saturating_sub(info.first_failure_ms) > self.window_ms
    }

    /// Remaining lockout time, or `None` if attempts are accepted
    pub fn locked_for(&self, now_ms: u64) -> Option<u64> {
        let info = self.failures.as_ref()?;
        if info.count < self.max_attempts || self.expired(info, now_ms) {
            return None;
        }
        Some((info.first_failure_ms + self.window_ms).saturating_sub(now_ms) + 1)
    }

    /// Record a failed attempt; returns attempts left before lockout
    pub fn record_failure(&mut self, now_ms: u64) -> u32 {
        let info = match self.failures {
            Some(info) if !self.expired(&info, now_ms) => FailureInfo {
                count: info.count + 1,
                ..info
            },
            _ => FailureInfo {
                count: 1,
                first_failure_ms: now_ms,
            },
        };
        self.failures = Some(info);

        let remaining = self.max_attempts.saturating_sub(info.count);
        if remaining == 0 {
            warn!("PIN entry locked after {} failed attempts", info.count);
        } else {
            debug!("Recorded PIN failure (count: {})", info.count);
        }
        remaining
    }

    /// Clear failures after a successful attempt
    pub fn record_success(&mut self) {
        if self.failures.take().is_some() {
            debug!("PIN accepted, failure count cleared");
        }
    }

    /// Failures counted in the current window
    pub fn failure_count(&self, now_ms: u64) -> u32 {
        match &self.failures {
            Some(info) if !self.expired(info, now_ms) => info.count,
            _ => 0,
        }
    }
}

impl Default for PinLockout {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_LOCKOUT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locks_after_threshold() {
        let mut lockout = PinLockout::new(3, Duration::from_secs(60));
        assert_eq!(lockout.record_failure(0), 2);
        assert_eq!(lockout.record_failure(1_000), 1);
        assert!(lockout.locked_for(1_000).is_none());
        assert_eq!(lockout.record_failure(2_000), 0);

        assert_eq!(lockout.locked_for(2_000), Some(58_001));
        assert!(lockout.locked_for(60_000).is_some());
        assert!(lockout.locked_for(60_001).is_none());
    }

    #[test]
    fn test_window_resets_count() {
        let mut lockout = PinLockout::new(3, Duration::from_secs(10));
        lockout.record_failure(0);
        lockout.record_failure(5_000);
        assert_eq!(lockout.failure_count(5_000), 2);

        // First failure of a new window
        assert_eq!(lockout.record_failure(20_000), 2);
        assert_eq!(lockout.failure_count(20_000), 1);
    }

    #[test]
    fn test_success_clears() {
        let mut lockout = PinLockout::default();
        lockout.record_failure(0);
        lockout.record_failure(1);
        lockout.record_success();
        assert_eq!(lockout.failure_count(2), 0);
        assert_eq!(lockout.record_failure(3), DEFAULT_MAX_ATTEMPTS - 1);
    }
}
