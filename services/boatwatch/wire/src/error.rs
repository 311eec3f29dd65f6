//! Wire protocol error types.

use crate::envelope::Profile;
use thiserror::Error;

/// Wire protocol errors
///
/// Every variant is local to the packet being decoded: the receive path logs it,
/// drops the packet, and waits for the next one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Integrity trailer does not match the recomputed value
    #[error("checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    Checksum {
        /// Value recomputed over the packet body
        expected: u8,
        /// Value carried in the trailer
        actual: u8,
    },

    /// Packet size does not match what its kind requires
    #[error("length mismatch for {kind}: expected {expected} bytes, got {actual}")]
    Length {
        /// Kind being decoded (or "packet" before the kind is known)
        kind: &'static str,
        /// Required size
        expected: usize,
        /// Received size
        actual: usize,
    },

    /// Kind tag not recognized
    #[error("unknown kind {0:#04x}")]
    UnknownKind(u8),

    /// Unsupported header version
    #[error("version unsupported: {0}")]
    Version(u8),

    /// Output buffer too small or payload exceeds the frame limit
    #[error("size limit exceeded: {0}")]
    Size(usize),

    /// Decoded as one profile where another was required
    #[error("expected a {expected} packet, got {found}")]
    Profile {
        /// Profile the receiver speaks
        expected: Profile,
        /// Profile of the decoded envelope
        found: Profile,
    },
}

impl WireError {
    /// Short label for log fields and counters
    pub fn label(&self) -> &'static str {
        match self {
            WireError::Checksum { .. } => "checksum",
            WireError::Length { .. } => "length",
            WireError::UnknownKind(_) => "unknown_kind",
            WireError::Version(_) => "version",
            WireError::Size(_) => "size",
            WireError::Profile { .. } => "profile",
        }
    }
}
