//! Telemetry frame header.
//!
//! This module defines the 9-byte header that prefixes every telemetry frame sent
//! between sensor nodes and the gateway. Multi-byte fields use the sensor
//! platform's native little-endian order.

use bitflags::bitflags;
use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

/// Telemetry protocol version
pub const TELEMETRY_VERSION: u8 = 1;

/// Telemetry header size in bytes
pub const TELEMETRY_HEADER_SIZE: usize = 9;

/// Telemetry frame kinds
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TelemetryKind {
    /// Environment reading
    Env = 0,
    /// Motion detected
    Motion = 1,
    /// Liveness ping
    Ping = 2,
    /// Supply voltage and current
    Power = 3,
    /// Acknowledgment of a sequence number
    Ack = 4,
    /// Wind and boat motion
    Wind = 5,
}

impl TryFrom<u8> for TelemetryKind {
    type Error = crate::WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TelemetryKind::Env),
            1 => Ok(TelemetryKind::Motion),
            2 => Ok(TelemetryKind::Ping),
            3 => Ok(TelemetryKind::Power),
            4 => Ok(TelemetryKind::Ack),
            5 => Ok(TelemetryKind::Wind),
            _ => Err(crate::WireError::UnknownKind(value)),
        }
    }
}

impl TelemetryKind {
    /// Payload size for this kind
    pub fn payload_size(self) -> usize {
        match self {
            TelemetryKind::Env => 12,
            TelemetryKind::Motion => 4,
            TelemetryKind::Ping => 0,
            TelemetryKind::Power => 8,
            TelemetryKind::Ack => 4,
            TelemetryKind::Wind => 13,
        }
    }

    /// Name used in errors and logs
    pub fn name(self) -> &'static str {
        match self {
            TelemetryKind::Env => "env",
            TelemetryKind::Motion => "motion",
            TelemetryKind::Ping => "ping",
            TelemetryKind::Power => "power",
            TelemetryKind::Ack => "ack",
            TelemetryKind::Wind => "wind",
        }
    }
}

bitflags! {
    /// Telemetry header flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct TelemetryFlags: u8 {
        /// Sender wants an Ack for this sequence number
        const ACK_REQUESTED = 1 << 0;
        /// Sender marks the frame as critical
        const CRITICAL = 1 << 1;
    }
}

/// Telemetry header (9 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryHeader {
    /// Protocol version (must be 1)
    pub version: u8,
    /// Frame kind
    pub kind: TelemetryKind,
    /// Sending node
    pub node_id: u16,
    /// Per-sender sequence number
    pub sequence: u32,
    /// Flags
    pub flags: TelemetryFlags,
}

impl TelemetryHeader {
    /// Create a header with no flags set
    pub fn new(kind: TelemetryKind, node_id: u16, sequence: u32) -> Self {
        Self {
            version: TELEMETRY_VERSION,
            kind,
            node_id,
            sequence,
            flags: TelemetryFlags::empty(),
        }
    }

    /// Set flags
    pub fn with_flags(mut self, flags: TelemetryFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Whether the sender asked for an Ack
    pub fn ack_requested(&self) -> bool {
        self.flags.contains(TelemetryFlags::ACK_REQUESTED)
    }

    /// Encode the header (little-endian multi-byte fields)
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.version);
        buf.put_u8(self.kind as u8);
        buf.put_u16_le(self.node_id);
        buf.put_u32_le(self.sequence);
        buf.put_u8(self.flags.bits());
    }

    /// Decode the header.
    ///
    /// The caller has already checked the trailer; this only validates version
    /// and kind. Unassigned flag bits are ignored.
    pub fn decode(buf: &mut &[u8]) -> Result<Self, crate::WireError> {
        if buf.len() < TELEMETRY_HEADER_SIZE {
            return Err(crate::WireError::Length {
                kind: "header",
                expected: TELEMETRY_HEADER_SIZE,
                actual: buf.len(),
            });
        }

        let version = buf.get_u8();
        if version != TELEMETRY_VERSION {
            return Err(crate::WireError::Version(version));
        }

        let kind = TelemetryKind::try_from(buf.get_u8())?;
        let node_id = buf.get_u16_le();
        let sequence = buf.get_u32_le();
        let flags = TelemetryFlags::from_bits_truncate(buf.get_u8());

        Ok(Self {
            version,
            kind,
            node_id,
            sequence,
            flags,
        })
    }
}
