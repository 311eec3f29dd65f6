//! Link error types.

use boatwatch_alarm::AlarmError;
use boatwatch_wire::{NodeId, WireError};
use thiserror::Error;

/// Errors from the transport adapters and the dispatchers
#[derive(Error, Debug)]
pub enum LinkError {
    /// Socket failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No address known for the destination
    #[error("unknown peer {0}")]
    UnknownPeer(NodeId),

    /// Acknowledged delivery did not reach the peer
    #[error("delivery to {0} not acknowledged")]
    NotAcknowledged(NodeId),

    /// The transport has shut down
    #[error("transport closed")]
    Closed,

    /// Outbound packet could not be encoded
    #[error("encode failed: {0}")]
    Encode(#[from] WireError),

    /// Operator command refused
    #[error("command refused: {0}")]
    Alarm(#[from] AlarmError),
}
