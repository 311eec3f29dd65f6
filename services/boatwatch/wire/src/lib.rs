//! Radio packet formats, checksums, and encoding/decoding for boatwatch.
//!
//! This crate provides the two wire formats spoken on the boat's sensor network:
//! compact packets between the hub and its nodes, and telemetry frames between
//! sensor nodes and the gateway. Both are fixed-size per kind, carry an integrity
//! trailer, and decode into closed sum types.
//!
//! ## Features
//!
//! - **Checksum-first validation**: the trailer is verified before anything else
//! - **Zero-Copy I/O**: Uses `Bytes`/`BytesMut` for encoding
//! - **Bit-exact layouts**: big-endian compact packets, little-endian telemetry
//! - **Explicit profiles**: an [`Envelope`] decodes whichever format a link declares
//!
//! ## Compact Format
//!
//! ```text
//! +----------------------+----------------------------+
//! | u8 source            | node id (0x00 = hub)       |
//! +----------------------+----------------------------+
//! | u8 kind              | message tag                |
//! +----------------------+----------------------------+
//! | fields               | big-endian, fixed per kind |
//! +----------------------+----------------------------+
//! | u8 xor               | xor of all previous bytes  |
//! +----------------------+----------------------------+
//! ```
//!
//! ## Telemetry Format
//!
//! ```text
//! +----------------------+----------------------------+
//! | u8 version           | always 1                   |
//! +----------------------+----------------------------+
//! | u8 kind              | Env, Motion, Ping, ...     |
//! +----------------------+----------------------------+
//! | u16 node (LE)        | sender                     |
//! +----------------------+----------------------------+
//! | u32 sequence (LE)    | per-sender counter         |
//! +----------------------+----------------------------+
//! | u8 flags             | ack requested, critical    |
//! +----------------------+----------------------------+
//! | payload              | little-endian, fixed size  |
//! +----------------------+----------------------------+
//! | u8 crc8              | poly 0x31, seed 0xFF       |
//! +----------------------+----------------------------+
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checksum;
pub mod compact;
pub mod envelope;
pub mod error;
pub mod frame;
pub mod header;
pub mod types;

// Re-export main types
pub use checksum::{crc8, crc8_update, xor_checksum, CRC8_POLY, CRC8_SEED};
pub use compact::{
    AlarmFrame, CompactKind, CompactMessage, CompactPacket, Detection, EnvironmentalReading,
    MAX_COMPACT_PACKET_SIZE, MIN_COMPACT_PACKET_SIZE,
};
pub use envelope::{Envelope, Profile};
pub use error::WireError;
pub use frame::{
    EnvSample, PowerSample, TelemetryFrame, TelemetryPayload, MIN_TELEMETRY_FRAME_SIZE,
};
pub use header::{
    TelemetryFlags, TelemetryHeader, TelemetryKind, TELEMETRY_HEADER_SIZE, TELEMETRY_VERSION,
};
pub use types::{
    AlarmCommand, AlarmMode, DetectionKind, NodeId, WindReading, Zone, BROADCAST_ADDRESS,
    HUB_ADDRESS,
};
