//! Identifiers and enumerations shared by both wire formats.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of the hub
pub const HUB_ADDRESS: u8 = 0x00;

/// Broadcast address
pub const BROADCAST_ADDRESS: u8 = 0xFF;

/// Node identifier.
///
/// Compact packets carry 8-bit ids, telemetry frames carry 16-bit ids; both map
/// onto the same value space.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u16);

impl NodeId {
    /// The hub
    pub const HUB: NodeId = NodeId(HUB_ADDRESS as u16);
    /// All nodes
    pub const BROADCAST: NodeId = NodeId(BROADCAST_ADDRESS as u16);

    /// Whether this id is the hub address
    pub fn is_hub(self) -> bool {
        self == Self::HUB
    }

    /// Whether this id is the broadcast address
    pub fn is_broadcast(self) -> bool {
        self == Self::BROADCAST
    }

    /// The 8-bit form used by compact packets, if the id fits
    pub fn as_compact(self) -> Option<u8> {
        u8::try_from(self.0).ok()
    }
}

impl From<u8> for NodeId {
    fn from(value: u8) -> Self {
        NodeId(value as u16)
    }
}

impl From<u16> for NodeId {
    fn from(value: u16) -> Self {
        NodeId(value)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 <= 0xFF {
            write!(f, "0x{:02X}", self.0)
        } else {
            write!(f, "0x{:04X}", self.0)
        }
    }
}

/// System-wide arming mode
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmMode {
    /// Nothing triggers
    #[default]
    Disarmed = 0,
    /// Only doorbell events are reported
    Doorbell = 1,
    /// Approach and entry events trigger
    Perimeter = 2,
    /// Every detection triggers
    Full = 3,
    /// Armed, but alerts are recorded without audible response
    Quiet = 4,
}

impl AlarmMode {
    /// Display label
    pub fn label(self) -> &'static str {
        match self {
            AlarmMode::Disarmed => "DISARMED",
            AlarmMode::Doorbell => "DOORBELL",
            AlarmMode::Perimeter => "PERIMETER",
            AlarmMode::Full => "FULL ARMED",
            AlarmMode::Quiet => "QUIET MODE",
        }
    }

    /// Whether any arming is in effect
    pub fn is_armed(self) -> bool {
        self != AlarmMode::Disarmed
    }
}

impl TryFrom<u8> for AlarmMode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AlarmMode::Disarmed),
            1 => Ok(AlarmMode::Doorbell),
            2 => Ok(AlarmMode::Perimeter),
            3 => Ok(AlarmMode::Full),
            4 => Ok(AlarmMode::Quiet),
            other => Err(other),
        }
    }
}

impl fmt::Display for AlarmMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for AlarmMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disarmed" | "off" => Ok(AlarmMode::Disarmed),
            "doorbell" => Ok(AlarmMode::Doorbell),
            "perimeter" => Ok(AlarmMode::Perimeter),
            "full" => Ok(AlarmMode::Full),
            "quiet" => Ok(AlarmMode::Quiet),
            other => Err(format!("unknown alarm mode '{}'", other)),
        }
    }
}

/// Alarm command carried in compact alarm packets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlarmCommand {
    /// Arm in the carried mode
    Arm,
    /// Disarm
    Disarm,
    /// Alarm tripped
    Trigger,
    /// Silence an active alarm without changing the mode
    Silence,
    /// Value not assigned in this protocol revision
    Other(u8),
}

impl From<u8> for AlarmCommand {
    fn from(value: u8) -> Self {
        match value {
            0x01 => AlarmCommand::Arm,
            0x02 => AlarmCommand::Disarm,
            0x03 => AlarmCommand::Trigger,
            0x04 => AlarmCommand::Silence,
            other => AlarmCommand::Other(other),
        }
    }
}

impl From<AlarmCommand> for u8 {
    fn from(value: AlarmCommand) -> Self {
        match value {
            AlarmCommand::Arm => 0x01,
            AlarmCommand::Disarm => 0x02,
            AlarmCommand::Trigger => 0x03,
            AlarmCommand::Silence => 0x04,
            AlarmCommand::Other(raw) => raw,
        }
    }
}

/// What a presence detector saw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectionKind {
    /// Someone approaching the boat
    Approach,
    /// Someone coming aboard
    Entry,
    /// Someone waiting at the entrance
    Doorbell,
    /// Value not assigned in this protocol revision
    Other(u8),
}

impl From<u8> for DetectionKind {
    fn from(value: u8) -> Self {
        match value {
            0x01 => DetectionKind::Approach,
            0x02 => DetectionKind::Entry,
            0x03 => DetectionKind::Doorbell,
            other => DetectionKind::Other(other),
        }
    }
}

impl From<DetectionKind> for u8 {
    fn from(value: DetectionKind) -> Self {
        match value {
            DetectionKind::Approach => 0x01,
            DetectionKind::Entry => 0x02,
            DetectionKind::Doorbell => 0x03,
            DetectionKind::Other(raw) => raw,
        }
    }
}

/// Detection distance band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
    /// Closest band
    Near,
    /// Middle band
    Middle,
    /// Furthest band
    Far,
    /// Value not assigned in this protocol revision
    Other(u8),
}

impl From<u8> for Zone {
    fn from(value: u8) -> Self {
        match value {
            0 => Zone::Near,
            1 => Zone::Middle,
            2 => Zone::Far,
            other => Zone::Other(other),
        }
    }
}

impl From<Zone> for u8 {
    fn from(value: Zone) -> Self {
        match value {
            Zone::Near => 0,
            Zone::Middle => 1,
            Zone::Far => 2,
            Zone::Other(raw) => raw,
        }
    }
}

/// Wind and boat motion telemetry.
///
/// Carried by both formats with the same fields but different byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindReading {
    /// Apparent wind speed (mm/s)
    pub apparent_speed_mms: u16,
    /// Apparent wind direction (degrees × 10, relative to the bow)
    pub apparent_dir_deg10: u16,
    /// True wind speed (mm/s)
    pub true_speed_mms: u16,
    /// True wind direction (degrees × 10)
    pub true_dir_deg10: u16,
    /// Boat speed (mm/s)
    pub boat_speed_mms: u16,
    /// Boat heading (degrees × 10)
    pub boat_heading_deg10: u16,
    /// GPS fix quality (0-5)
    pub fix_quality: u8,
}

/// Millimetres per second in one knot
const MMS_PER_KNOT: f32 = 514.444;

impl WindReading {
    /// True wind speed in knots
    pub fn true_speed_knots(&self) -> f32 {
        self.true_speed_mms as f32 / MMS_PER_KNOT
    }

    /// True wind direction in whole degrees
    pub fn true_dir_degrees(&self) -> u16 {
        self.true_dir_deg10 / 10
    }
}
