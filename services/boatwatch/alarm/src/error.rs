//! Alarm error types.

use thiserror::Error;

/// Errors returned by credential-guarded alarm operations.
///
/// None of them change alarm state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlarmError {
    /// PIN did not match
    #[error("authorization failed: PIN mismatch ({remaining} attempts left)")]
    Authorization {
        /// Attempts left before lockout
        remaining: u32,
    },

    /// Too many failed attempts inside the window
    #[error("locked out after repeated PIN failures, retry in {retry_after_ms} ms")]
    LockedOut {
        /// Time until attempts are accepted again
        retry_after_ms: u64,
    },

    /// Rejected new PIN
    #[error("invalid PIN: {0}")]
    InvalidPin(&'static str),
}
