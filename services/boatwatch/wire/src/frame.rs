//! Telemetry framing between sensor nodes and the gateway.
//!
//! ```text
//! +----------------------+----------------------------+
//! | Header (9B)          | version, kind, node, seq,  |
//! |                      | flags                      |
//! +----------------------+----------------------------+
//! | payload              | kind-specific, fixed size  |
//! +----------------------+----------------------------+
//! | crc8                 | over header + payload      |
//! +----------------------+----------------------------+
//! ```

use crate::checksum::{crc8, verify_trailer, CRC8_SEED};
use crate::header::{TelemetryFlags, TelemetryHeader, TelemetryKind, TELEMETRY_HEADER_SIZE};
use crate::types::{NodeId, WindReading};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

/// Smallest frame: header plus trailer
pub const MIN_TELEMETRY_FRAME_SIZE: usize = TELEMETRY_HEADER_SIZE + 1;

/// Environment reading as sent by sensor nodes
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EnvSample {
    /// Temperature (°C)
    pub temperature_c: f32,
    /// Relative humidity (%)
    pub humidity_pct: f32,
    /// Pressure (hPa)
    pub pressure_hpa: f32,
}

/// Supply measurement
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PowerSample {
    /// Bus voltage (V)
    pub volts: f32,
    /// Current draw (A)
    pub amps: f32,
}

/// Typed telemetry payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TelemetryPayload {
    /// Environment reading
    Env(EnvSample),
    /// Motion seen `age_ms` milliseconds before sending
    Motion {
        /// Age of the detection (ms)
        age_ms: u32,
    },
    /// Liveness ping
    Ping,
    /// Supply measurement
    Power(PowerSample),
    /// Acknowledges the frame with this sequence number
    Ack {
        /// Sequence being acknowledged
        acked_sequence: u32,
    },
    /// Wind telemetry
    Wind(WindReading),
}

impl TelemetryPayload {
    /// Kind of this payload
    pub fn kind(&self) -> TelemetryKind {
        match self {
            TelemetryPayload::Env(_) => TelemetryKind::Env,
            TelemetryPayload::Motion { .. } => TelemetryKind::Motion,
            TelemetryPayload::Ping => TelemetryKind::Ping,
            TelemetryPayload::Power(_) => TelemetryKind::Power,
            TelemetryPayload::Ack { .. } => TelemetryKind::Ack,
            TelemetryPayload::Wind(_) => TelemetryKind::Wind,
        }
    }

    fn encode(&self, buf: &mut BytesMut) {
        match self {
            TelemetryPayload::Env(env) => {
                buf.put_f32_le(env.temperature_c);
                buf.put_f32_le(env.humidity_pct);
                buf.put_f32_le(env.pressure_hpa);
            }
            TelemetryPayload::Motion { age_ms } => buf.put_u32_le(*age_ms),
            TelemetryPayload::Ping => {}
            TelemetryPayload::Power(power) => {
                buf.put_f32_le(power.volts);
                buf.put_f32_le(power.amps);
            }
            TelemetryPayload::Ack { acked_sequence } => buf.put_u32_le(*acked_sequence),
            TelemetryPayload::Wind(wind) => {
                buf.put_u16_le(wind.apparent_speed_mms);
                buf.put_u16_le(wind.apparent_dir_deg10);
                buf.put_u16_le(wind.true_speed_mms);
                buf.put_u16_le(wind.true_dir_deg10);
                buf.put_u16_le(wind.boat_speed_mms);
                buf.put_u16_le(wind.boat_heading_deg10);
                buf.put_u8(wind.fix_quality);
            }
        }
    }

    fn decode(kind: TelemetryKind, mut buf: &[u8]) -> Self {
        match kind {
            TelemetryKind::Env => TelemetryPayload::Env(EnvSample {
                temperature_c: buf.get_f32_le(),
                humidity_pct: buf.get_f32_le(),
                pressure_hpa: buf.get_f32_le(),
            }),
            TelemetryKind::Motion => TelemetryPayload::Motion {
                age_ms: buf.get_u32_le(),
            },
            TelemetryKind::Ping => TelemetryPayload::Ping,
            TelemetryKind::Power => TelemetryPayload::Power(PowerSample {
                volts: buf.get_f32_le(),
                amps: buf.get_f32_le(),
            }),
            TelemetryKind::Ack => TelemetryPayload::Ack {
                acked_sequence: buf.get_u32_le(),
            },
            TelemetryKind::Wind => TelemetryPayload::Wind(WindReading {
                apparent_speed_mms: buf.get_u16_le(),
                apparent_dir_deg10: buf.get_u16_le(),
                true_speed_mms: buf.get_u16_le(),
                true_dir_deg10: buf.get_u16_le(),
                boat_speed_mms: buf.get_u16_le(),
                boat_heading_deg10: buf.get_u16_le(),
                fix_quality: buf.get_u8(),
            }),
        }
    }
}

/// Complete telemetry frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryFrame {
    /// Sending node
    pub node_id: u16,
    /// Per-sender sequence number
    pub sequence: u32,
    /// Header flags
    pub flags: TelemetryFlags,
    /// Typed payload
    pub payload: TelemetryPayload,
}

impl TelemetryFrame {
    /// Create a frame with no flags set
    pub fn new(node_id: u16, sequence: u32, payload: TelemetryPayload) -> Self {
        Self {
            node_id,
            sequence,
            flags: TelemetryFlags::empty(),
            payload,
        }
    }

    /// Set flags
    pub fn with_flags(mut self, flags: TelemetryFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Sender as a [`NodeId`]
    pub fn source(&self) -> NodeId {
        NodeId(self.node_id)
    }

    /// Header describing this frame
    pub fn header(&self) -> TelemetryHeader {
        TelemetryHeader::new(self.payload.kind(), self.node_id, self.sequence)
            .with_flags(self.flags)
    }

    /// Size of the encoded frame
    pub fn encoded_size(&self) -> usize {
        TELEMETRY_HEADER_SIZE + self.payload.kind().payload_size() + 1
    }

    /// Encode header, payload and CRC-8 trailer
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_size());
        self.header().encode(&mut buf);
        self.payload.encode(&mut buf);
        let crc = crc8(&buf, CRC8_SEED);
        buf.put_u8(crc);
        buf.freeze()
    }

    /// Decode and validate a received frame
    pub fn decode(frame: &[u8]) -> Result<Self, crate::WireError> {
        if frame.len() < MIN_TELEMETRY_FRAME_SIZE {
            return Err(crate::WireError::Length {
                kind: "frame",
                expected: MIN_TELEMETRY_FRAME_SIZE,
                actual: frame.len(),
            });
        }

        let body = verify_trailer(frame, |data| crc8(data, CRC8_SEED))?;
        let mut cursor = body;
        let header = TelemetryHeader::decode(&mut cursor)?;

        let expected = header.kind.payload_size();
        if cursor.len() != expected {
            return Err(crate::WireError::Length {
                kind: header.kind.name(),
                expected,
                actual: cursor.len(),
            });
        }

        Ok(Self {
            node_id: header.node_id,
            sequence: header.sequence,
            flags: header.flags,
            payload: TelemetryPayload::decode(header.kind, cursor),
        })
    }

    /// Ack frame answering this one, sent from `responder`
    pub fn ack_from(&self, responder: u16, sequence: u32) -> TelemetryFrame {
        TelemetryFrame::new(
            responder,
            sequence,
            TelemetryPayload::Ack {
                acked_sequence: self.sequence,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WireError;

    fn sample_frames() -> Vec<TelemetryFrame> {
        vec![
            TelemetryFrame::new(
                0x0101,
                1,
                TelemetryPayload::Env(EnvSample {
                    temperature_c: 18.75,
                    humidity_pct: 62.5,
                    pressure_hpa: 1009.25,
                }),
            ),
            TelemetryFrame::new(0xB032, 2, TelemetryPayload::Motion { age_ms: 120 })
                .with_flags(TelemetryFlags::ACK_REQUESTED | TelemetryFlags::CRITICAL),
            TelemetryFrame::new(0x0003, 3, TelemetryPayload::Ping),
            TelemetryFrame::new(
                0x0004,
                u32::MAX,
                TelemetryPayload::Power(PowerSample {
                    volts: 12.6,
                    amps: 0.35,
                }),
            ),
            TelemetryFrame::new(0x0000, 9, TelemetryPayload::Ack { acked_sequence: 2 }),
            TelemetryFrame::new(
                0x0005,
                10,
                TelemetryPayload::Wind(WindReading {
                    apparent_speed_mms: 7000,
                    apparent_dir_deg10: 300,
                    true_speed_mms: 6500,
                    true_dir_deg10: 1800,
                    boat_speed_mms: 2000,
                    boat_heading_deg10: 900,
                    fix_quality: 1,
                }),
            ),
        ]
    }

    #[test]
    fn test_encode_decode_all_kinds() {
        for frame in sample_frames() {
            let bytes = frame.encode();
            assert_eq!(bytes.len(), frame.encoded_size());
            assert_eq!(TelemetryFrame::decode(&bytes).unwrap(), frame);
        }
    }

    #[test]
    fn test_ping_layout_is_bit_exact() {
        let bytes = TelemetryFrame::new(0x0102, 7, TelemetryPayload::Ping).encode();
        let header = [0x01, 0x02, 0x02, 0x01, 0x07, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(&bytes[..9], &header);
        assert_eq!(bytes[9], crc8(&header, CRC8_SEED));
        assert_eq!(bytes.len(), 10);
    }

    #[test]
    fn test_single_bit_flip_is_checksum_error() {
        for frame in sample_frames() {
            let bytes = frame.encode();
            for byte in 0..bytes.len() {
                for bit in 0..8 {
                    let mut corrupted = bytes.to_vec();
                    corrupted[byte] ^= 1 << bit;
                    assert!(matches!(
                        TelemetryFrame::decode(&corrupted),
                        Err(WireError::Checksum { .. })
                    ));
                }
            }
        }
    }

    #[test]
    fn test_truncation_fails() {
        for frame in sample_frames() {
            let bytes = frame.encode();
            assert!(TelemetryFrame::decode(&bytes[..bytes.len() - 1]).is_err());
        }
    }

    fn with_crc(mut body: Vec<u8>) -> Vec<u8> {
        let crc = crc8(&body, CRC8_SEED);
        body.push(crc);
        body
    }

    #[test]
    fn test_version_rejected_after_crc() {
        let frame = with_crc(vec![0x02, 0x02, 0x01, 0x00, 0, 0, 0, 0, 0]);
        assert_eq!(TelemetryFrame::decode(&frame), Err(WireError::Version(2)));
    }

    #[test]
    fn test_unknown_kind() {
        let frame = with_crc(vec![0x01, 0x09, 0x01, 0x00, 0, 0, 0, 0, 0]);
        assert_eq!(TelemetryFrame::decode(&frame), Err(WireError::UnknownKind(9)));
    }

    #[test]
    fn test_payload_size_mismatch() {
        // Motion with a 3-byte payload
        let frame = with_crc(vec![0x01, 0x01, 0x01, 0x00, 0, 0, 0, 0, 0, 1, 2, 3]);
        assert_eq!(
            TelemetryFrame::decode(&frame),
            Err(WireError::Length {
                kind: "motion",
                expected: 4,
                actual: 3,
            })
        );
    }

    #[test]
    fn test_too_short() {
        assert!(matches!(
            TelemetryFrame::decode(&[0x01; 9]),
            Err(WireError::Length { kind: "frame", .. })
        ));
    }

    #[test]
    fn test_ack_from() {
        let motion = TelemetryFrame::new(0xB032, 41, TelemetryPayload::Motion { age_ms: 0 });
        let ack = motion.ack_from(0x0000, 5);
        assert_eq!(ack.payload, TelemetryPayload::Ack { acked_sequence: 41 });
        assert_eq!(ack.header().kind, TelemetryKind::Ack);
    }
}
