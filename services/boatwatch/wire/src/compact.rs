//! Compact fixed-size packets exchanged between the hub and its nodes.
//!
//! ```text
//! +---------+---------+-----------------------------+----------+
//! | src id  | kind    | fields (big-endian)         | xor      |
//! | 1 byte  | 1 byte  | kind-specific, fixed length | 1 byte   |
//! +---------+---------+-----------------------------+----------+
//! ```
//!
//! The trailer is the XOR of every preceding byte. The trailer is verified before
//! the kind or length is looked at, so any single-bit corruption is reported as
//! [`WireError::Checksum`].

use crate::checksum::{verify_trailer, xor_checksum};
use crate::types::{AlarmCommand, AlarmMode, DetectionKind, WindReading, Zone};
use crate::WireError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

/// Environmental packet size
pub const ENV_PACKET_SIZE: usize = 12;
/// Detection packet size
pub const DETECTION_PACKET_SIZE: usize = 8;
/// Alarm packet size
pub const ALARM_PACKET_SIZE: usize = 6;
/// Heartbeat packet size
pub const HEARTBEAT_PACKET_SIZE: usize = 5;
/// Time sync packet size
pub const TIME_SYNC_PACKET_SIZE: usize = 7;
/// Wind packet size
pub const WIND_PACKET_SIZE: usize = 16;
/// Ack packet size
pub const ACK_PACKET_SIZE: usize = 4;

/// Smallest well-formed packet: id, kind, trailer
pub const MIN_COMPACT_PACKET_SIZE: usize = 3;

/// Largest packet the radio carries in one datagram
pub const MAX_COMPACT_PACKET_SIZE: usize = 251;

/// Compact message kinds
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompactKind {
    /// Temperature, humidity, pressure, battery, signal
    Environmental = 0x01,
    /// Presence detector event
    Detection = 0x02,
    /// Alarm command or trigger
    Alarm = 0x03,
    /// Battery heartbeat
    Heartbeat = 0x04,
    /// Node configuration update (opaque)
    Config = 0x20,
    /// Hub clock broadcast
    TimeSync = 0x21,
    /// Wind and boat motion telemetry
    Wind = 0x22,
    /// Application-level acknowledgment
    Ack = 0xFF,
}

impl TryFrom<u8> for CompactKind {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(CompactKind::Environmental),
            0x02 => Ok(CompactKind::Detection),
            0x03 => Ok(CompactKind::Alarm),
            0x04 => Ok(CompactKind::Heartbeat),
            0x20 => Ok(CompactKind::Config),
            0x21 => Ok(CompactKind::TimeSync),
            0x22 => Ok(CompactKind::Wind),
            0xFF => Ok(CompactKind::Ack),
            _ => Err(WireError::UnknownKind(value)),
        }
    }
}

impl CompactKind {
    /// Total packet size, or `None` for variable-length kinds
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            CompactKind::Environmental => Some(ENV_PACKET_SIZE),
            CompactKind::Detection => Some(DETECTION_PACKET_SIZE),
            CompactKind::Alarm => Some(ALARM_PACKET_SIZE),
            CompactKind::Heartbeat => Some(HEARTBEAT_PACKET_SIZE),
            CompactKind::Config => None,
            CompactKind::TimeSync => Some(TIME_SYNC_PACKET_SIZE),
            CompactKind::Wind => Some(WIND_PACKET_SIZE),
            CompactKind::Ack => Some(ACK_PACKET_SIZE),
        }
    }

    /// Name used in errors and logs
    pub fn name(self) -> &'static str {
        match self {
            CompactKind::Environmental => "environmental",
            CompactKind::Detection => "detection",
            CompactKind::Alarm => "alarm",
            CompactKind::Heartbeat => "heartbeat",
            CompactKind::Config => "config",
            CompactKind::TimeSync => "time_sync",
            CompactKind::Wind => "wind",
            CompactKind::Ack => "ack",
        }
    }
}

/// Environmental reading in its on-wire fixed-point form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnvironmentalReading {
    /// Temperature in hundredths of a degree Celsius
    pub temperature_centi_c: i16,
    /// Relative humidity in hundredths of a percent
    pub humidity_centi_pct: u16,
    /// Pressure in tenths of a hectopascal
    pub pressure_deci_hpa: u16,
    /// Battery voltage (mV)
    pub battery_mv: u16,
    /// Signal strength reported by the node (dBm)
    pub rssi_dbm: i8,
}

impl EnvironmentalReading {
    /// Quantize physical measurements into the wire representation.
    ///
    /// Values are rounded to the nearest step and saturate at the field limits.
    pub fn from_measurements(
        temperature_c: f32,
        humidity_pct: f32,
        pressure_hpa: f32,
        battery_mv: u16,
        rssi_dbm: i8,
    ) -> Self {
        Self {
            temperature_centi_c: (temperature_c * 100.0).round() as i16,
            humidity_centi_pct: (humidity_pct * 100.0).round() as u16,
            pressure_deci_hpa: (pressure_hpa * 10.0).round() as u16,
            battery_mv,
            rssi_dbm,
        }
    }

    /// Temperature in °C
    pub fn temperature_c(&self) -> f32 {
        self.temperature_centi_c as f32 / 100.0
    }

    /// Relative humidity in %
    pub fn humidity_pct(&self) -> f32 {
        self.humidity_centi_pct as f32 / 100.0
    }

    /// Pressure in hPa
    pub fn pressure_hpa(&self) -> f32 {
        self.pressure_deci_hpa as f32 / 10.0
    }
}

/// Presence detector event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    /// What was seen
    pub kind: DetectionKind,
    /// Detector confidence (0-100)
    pub confidence: u8,
    /// Distance to target (cm)
    pub distance_cm: u16,
    /// Distance band
    pub zone: Zone,
}

/// Alarm command packet body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmFrame {
    /// Command
    pub command: AlarmCommand,
    /// Raw mode byte; see [`AlarmFrame::mode`]
    pub mode_raw: u8,
    /// Addressed node, or broadcast
    pub target: u8,
}

impl AlarmFrame {
    /// Build an alarm frame
    pub fn new(command: AlarmCommand, mode: AlarmMode, target: u8) -> Self {
        Self {
            command,
            mode_raw: mode as u8,
            target,
        }
    }

    /// The carried mode, if it is a known value
    pub fn mode(&self) -> Option<AlarmMode> {
        AlarmMode::try_from(self.mode_raw).ok()
    }

    /// Whether this frame is addressed to `node` (directly or by broadcast)
    pub fn is_for(&self, node: u8) -> bool {
        self.target == node || self.target == crate::types::BROADCAST_ADDRESS
    }
}

/// Typed body of a compact packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompactMessage {
    /// Environmental telemetry
    Environmental(EnvironmentalReading),
    /// Presence detection
    Detection(Detection),
    /// Alarm command
    Alarm(AlarmFrame),
    /// Battery heartbeat
    Heartbeat {
        /// Battery voltage (mV)
        battery_mv: u16,
    },
    /// Opaque configuration bytes
    Config(Bytes),
    /// Hub clock (seconds)
    TimeSync {
        /// Timestamp carried by the hub
        timestamp: u32,
    },
    /// Wind telemetry
    Wind(WindReading),
    /// Acknowledgment of a packet kind
    Ack {
        /// Kind tag being acknowledged
        acked_kind: u8,
    },
}

impl CompactMessage {
    /// Kind tag of this message
    pub fn kind(&self) -> CompactKind {
        match self {
            CompactMessage::Environmental(_) => CompactKind::Environmental,
            CompactMessage::Detection(_) => CompactKind::Detection,
            CompactMessage::Alarm(_) => CompactKind::Alarm,
            CompactMessage::Heartbeat { .. } => CompactKind::Heartbeat,
            CompactMessage::Config(_) => CompactKind::Config,
            CompactMessage::TimeSync { .. } => CompactKind::TimeSync,
            CompactMessage::Wind(_) => CompactKind::Wind,
            CompactMessage::Ack { .. } => CompactKind::Ack,
        }
    }
}

/// A compact packet: source node plus typed body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactPacket {
    /// Sending node
    pub source: u8,
    /// Typed body
    pub message: CompactMessage,
}

impl CompactPacket {
    /// Create a new packet
    pub fn new(source: u8, message: CompactMessage) -> Self {
        Self { source, message }
    }

    /// Kind tag
    pub fn kind(&self) -> CompactKind {
        self.message.kind()
    }

    /// Size of the encoded packet
    pub fn encoded_len(&self) -> usize {
        match &self.message {
            CompactMessage::Config(payload) => MIN_COMPACT_PACKET_SIZE + payload.len(),
            other => other
                .kind()
                .fixed_size()
                .unwrap_or(MIN_COMPACT_PACKET_SIZE),
        }
    }

    /// Encode to bytes with the XOR trailer appended
    pub fn encode(&self) -> Result<Bytes, WireError> {
        let total = self.encoded_len();
        if total > MAX_COMPACT_PACKET_SIZE {
            return Err(WireError::Size(total));
        }

        let mut buf = BytesMut::with_capacity(total);
        buf.put_u8(self.source);
        buf.put_u8(self.kind() as u8);

        match &self.message {
            CompactMessage::Environmental(env) => {
                buf.put_i16(env.temperature_centi_c);
                buf.put_u16(env.humidity_centi_pct);
                buf.put_u16(env.pressure_deci_hpa);
                buf.put_u16(env.battery_mv);
                buf.put_i8(env.rssi_dbm);
            }
            CompactMessage::Detection(det) => {
                buf.put_u8(det.kind.into());
                buf.put_u8(det.confidence);
                buf.put_u16(det.distance_cm);
                buf.put_u8(det.zone.into());
            }
            CompactMessage::Alarm(alarm) => {
                buf.put_u8(alarm.command.into());
                buf.put_u8(alarm.mode_raw);
                buf.put_u8(alarm.target);
            }
            CompactMessage::Heartbeat { battery_mv } => {
                buf.put_u16(*battery_mv);
            }
            CompactMessage::Config(payload) => {
                buf.put_slice(payload);
            }
            CompactMessage::TimeSync { timestamp } => {
                buf.put_u32(*timestamp);
            }
            CompactMessage::Wind(wind) => {
                buf.put_u16(wind.apparent_speed_mms);
                buf.put_u16(wind.apparent_dir_deg10);
                buf.put_u16(wind.true_speed_mms);
                buf.put_u16(wind.true_dir_deg10);
                buf.put_u16(wind.boat_speed_mms);
                buf.put_u16(wind.boat_heading_deg10);
                buf.put_u8(wind.fix_quality);
            }
            CompactMessage::Ack { acked_kind } => {
                buf.put_u8(*acked_kind);
            }
        }

        let checksum = xor_checksum(&buf);
        buf.put_u8(checksum);
        debug_assert_eq!(buf.len(), total);

        Ok(buf.freeze())
    }

    /// Decode and validate a received packet
    pub fn decode(packet: &[u8]) -> Result<Self, WireError> {
        if packet.len() < MIN_COMPACT_PACKET_SIZE {
            return Err(WireError::Length {
                kind: "packet",
                expected: MIN_COMPACT_PACKET_SIZE,
                actual: packet.len(),
            });
        }

        let body = verify_trailer(packet, xor_checksum)?;
        let kind = CompactKind::try_from(body[1])?;

        if let Some(expected) = kind.fixed_size() {
            if packet.len() != expected {
                return Err(WireError::Length {
                    kind: kind.name(),
                    expected,
                    actual: packet.len(),
                });
            }
        }

        let source = body[0];
        let mut fields = &body[2..];

        let message = match kind {
            CompactKind::Environmental => CompactMessage::Environmental(EnvironmentalReading {
                temperature_centi_c: fields.get_i16(),
                humidity_centi_pct: fields.get_u16(),
                pressure_deci_hpa: fields.get_u16(),
                battery_mv: fields.get_u16(),
                rssi_dbm: fields.get_i8(),
            }),
            CompactKind::Detection => CompactMessage::Detection(Detection {
                kind: fields.get_u8().into(),
                confidence: fields.get_u8(),
                distance_cm: fields.get_u16(),
                zone: fields.get_u8().into(),
            }),
            CompactKind::Alarm => CompactMessage::Alarm(AlarmFrame {
                command: fields.get_u8().into(),
                mode_raw: fields.get_u8(),
                target: fields.get_u8(),
            }),
            CompactKind::Heartbeat => CompactMessage::Heartbeat {
                battery_mv: fields.get_u16(),
            },
            CompactKind::Config => CompactMessage::Config(Bytes::copy_from_slice(fields)),
            CompactKind::TimeSync => CompactMessage::TimeSync {
                timestamp: fields.get_u32(),
            },
            CompactKind::Wind => CompactMessage::Wind(WindReading {
                apparent_speed_mms: fields.get_u16(),
                apparent_dir_deg10: fields.get_u16(),
                true_speed_mms: fields.get_u16(),
                true_dir_deg10: fields.get_u16(),
                boat_speed_mms: fields.get_u16(),
                boat_heading_deg10: fields.get_u16(),
                fix_quality: fields.get_u8(),
            }),
            CompactKind::Ack => CompactMessage::Ack {
                acked_kind: fields.get_u8(),
            },
        };

        Ok(Self { source, message })
    }
}
