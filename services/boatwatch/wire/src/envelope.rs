//! Profile-tagged envelope over both wire formats.
//!
//! The two formats cannot be told apart from their bytes alone, so the receive
//! path declares which [`Profile`] it speaks and the envelope decodes accordingly.

use crate::compact::CompactPacket;
use crate::frame::TelemetryFrame;
use crate::types::NodeId;
use crate::WireError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

/// Which wire format a link speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Hub and node traffic (XOR trailer, big-endian fields)
    Compact,
    /// Gateway and sensor traffic (9-byte header, CRC-8 trailer)
    Telemetry,
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::Compact => f.write_str("compact"),
            Profile::Telemetry => f.write_str("telemetry"),
        }
    }
}

/// A decoded packet of either format
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Compact packet
    Compact(CompactPacket),
    /// Telemetry frame
    Telemetry(TelemetryFrame),
}

impl Envelope {
    /// Decode `bytes` as the given profile
    pub fn decode(profile: Profile, bytes: &[u8]) -> Result<Self, WireError> {
        let envelope = match profile {
            Profile::Compact => Envelope::Compact(CompactPacket::decode(bytes)?),
            Profile::Telemetry => Envelope::Telemetry(TelemetryFrame::decode(bytes)?),
        };
        trace!(
            "Decoded {} {} from {}",
            profile,
            envelope.kind_name(),
            envelope.source()
        );
        Ok(envelope)
    }

    /// The compact packet, or `WireError::Profile` for a telemetry frame
    pub fn into_compact(self) -> Result<CompactPacket, WireError> {
        match self {
            Envelope::Compact(packet) => Ok(packet),
            Envelope::Telemetry(_) => Err(WireError::Profile {
                expected: Profile::Compact,
                found: Profile::Telemetry,
            }),
        }
    }

    /// The telemetry frame, or `WireError::Profile` for a compact packet
    pub fn into_telemetry(self) -> Result<TelemetryFrame, WireError> {
        match self {
            Envelope::Telemetry(frame) => Ok(frame),
            Envelope::Compact(_) => Err(WireError::Profile {
                expected: Profile::Telemetry,
                found: Profile::Compact,
            }),
        }
    }

    /// Encode with the format's own trailer
    pub fn encode(&self) -> Result<Bytes, WireError> {
        match self {
            Envelope::Compact(packet) => packet.encode(),
            Envelope::Telemetry(frame) => Ok(frame.encode()),
        }
    }

    /// Profile of this envelope
    pub fn profile(&self) -> Profile {
        match self {
            Envelope::Compact(_) => Profile::Compact,
            Envelope::Telemetry(_) => Profile::Telemetry,
        }
    }

    /// Sending node
    pub fn source(&self) -> NodeId {
        match self {
            Envelope::Compact(packet) => NodeId::from(packet.source),
            Envelope::Telemetry(frame) => frame.source(),
        }
    }

    /// Kind name for logs
    pub fn kind_name(&self) -> &'static str {
        match self {
            Envelope::Compact(packet) => packet.kind().name(),
            Envelope::Telemetry(frame) => frame.payload.kind().name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compact::CompactMessage;
    use crate::frame::TelemetryPayload;

    #[test]
    fn test_profile_selects_decoder() {
        let heartbeat = CompactPacket::new(0x04, CompactMessage::Heartbeat { battery_mv: 3600 });
        let bytes = heartbeat.encode().unwrap();

        let envelope = Envelope::decode(Profile::Compact, &bytes).unwrap();
        assert_eq!(envelope.profile(), Profile::Compact);
        assert_eq!(envelope.source(), NodeId(0x04));
        assert_eq!(envelope.kind_name(), "heartbeat");

        // The same bytes are not a telemetry frame
        assert!(Envelope::decode(Profile::Telemetry, &bytes).is_err());
    }

    #[test]
    fn test_telemetry_envelope() {
        let frame = TelemetryFrame::new(0x0A0B, 3, TelemetryPayload::Motion { age_ms: 5 });
        let envelope = Envelope::Telemetry(frame);
        let bytes = envelope.encode().unwrap();
        let decoded = Envelope::decode(Profile::Telemetry, &bytes).unwrap();
        assert_eq!(decoded, envelope);
        assert_eq!(decoded.source(), NodeId(0x0A0B));
        assert_eq!(decoded.kind_name(), "motion");
    }

    #[test]
    fn test_profile_mismatch() {
        let frame = TelemetryFrame::new(0x0102, 1, TelemetryPayload::Ping);
        let err = Envelope::Telemetry(frame.clone()).into_compact().unwrap_err();
        assert_eq!(
            err,
            WireError::Profile {
                expected: Profile::Compact,
                found: Profile::Telemetry,
            }
        );
        assert_eq!(err.label(), "profile");
        assert_eq!(Envelope::Telemetry(frame.clone()).into_telemetry(), Ok(frame));
    }
}
