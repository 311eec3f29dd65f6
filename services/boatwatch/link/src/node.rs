//! Sensor-node side of both formats.
//!
//! These build the frames a node transmits and interpret what the hub sends back.
//! They are used by the simulators and by the dispatcher tests.

use crate::transport::RadioFrame;
use boatwatch_alarm::ZoneLimits;
use boatwatch_wire::{
    AlarmCommand, AlarmFrame, AlarmMode, CompactMessage, CompactPacket, Detection, DetectionKind,
    EnvSample, EnvironmentalReading, NodeId, PowerSample, TelemetryFlags, TelemetryFrame,
    TelemetryPayload, WindReading, WireError, Zone, HUB_ADDRESS,
};
use bytes::Bytes;
use std::time::Duration;
use tracing::{debug, info};

/// Default minimum spacing between motion frames
pub const DEFAULT_MOTION_REFRACTORY: Duration = Duration::from_secs(10);

/// Command received from the hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeCommand {
    /// Alarm command addressed to this node or broadcast
    Alarm {
        /// Command
        command: AlarmCommand,
        /// Carried mode, if known
        mode: Option<AlarmMode>,
    },
    /// Hub clock
    TimeSync(u32),
    /// Opaque configuration update
    Config(Bytes),
}

/// Compact-format sensor node
#[derive(Debug, Clone)]
pub struct CompactNode {
    id: u8,
    zones: ZoneLimits,
    mode: AlarmMode,
    last_time_sync: Option<u32>,
}

impl CompactNode {
    /// Create a node with id `id`
    pub fn new(id: u8, zones: ZoneLimits) -> Self {
        Self {
            id,
            zones,
            mode: AlarmMode::Disarmed,
            last_time_sync: None,
        }
    }

    /// Node id
    pub fn id(&self) -> NodeId {
        NodeId::from(self.id)
    }

    /// Mode last announced by the hub
    pub fn mode(&self) -> AlarmMode {
        self.mode
    }

    /// Last hub timestamp received
    pub fn last_time_sync(&self) -> Option<u32> {
        self.last_time_sync
    }

    fn packet(&self, message: CompactMessage) -> Result<Bytes, WireError> {
        CompactPacket::new(self.id, message).encode()
    }

    /// Environmental packet
    pub fn environmental(&self, reading: EnvironmentalReading) -> Result<Bytes, WireError> {
        self.packet(CompactMessage::Environmental(reading))
    }

    /// Detection packet, or `None` when the target is beyond the far band.
    ///
    /// The near band reports an entry, the outer bands an approach.
    pub fn detection(
        &self,
        distance_cm: u16,
        confidence: u8,
    ) -> Option<Result<Bytes, WireError>> {
        let zone = self.zones.classify(distance_cm)?;
        let kind = match zone {
            Zone::Near => DetectionKind::Entry,
            _ => DetectionKind::Approach,
        };
        Some(self.packet(CompactMessage::Detection(Detection {
            kind,
            confidence,
            distance_cm,
            zone,
        })))
    }

    /// Doorbell packet
    pub fn doorbell(&self, distance_cm: u16, confidence: u8) -> Result<Bytes, WireError> {
        let zone = self.zones.classify(distance_cm).unwrap_or(Zone::Far);
        self.packet(CompactMessage::Detection(Detection {
            kind: DetectionKind::Doorbell,
            confidence,
            distance_cm,
            zone,
        }))
    }

    /// Alarm trigger addressed to the hub
    pub fn alarm_trigger(&self) -> Result<Bytes, WireError> {
        self.packet(CompactMessage::Alarm(AlarmFrame::new(
            AlarmCommand::Trigger,
            self.mode,
            HUB_ADDRESS,
        )))
    }

    /// Battery heartbeat
    pub fn heartbeat(&self, battery_mv: u16) -> Result<Bytes, WireError> {
        self.packet(CompactMessage::Heartbeat { battery_mv })
    }

    /// Interpret a frame received from the air.
    ///
    /// Only the hub is obeyed; alarm commands for other nodes are skipped.
    pub fn handle_inbound(&mut self, frame: &RadioFrame) -> Option<NodeCommand> {
        if !frame.from.is_hub() {
            debug!("Node {}: ignoring frame from non-hub source {}", self.id, frame.from);
            return None;
        }

        let packet = match CompactPacket::decode(&frame.bytes) {
            Ok(packet) => packet,
            Err(e) => {
                debug!("Node {}: dropped hub frame: {}", self.id, e);
                return None;
            }
        };

        match packet.message {
            CompactMessage::Alarm(alarm) if alarm.is_for(self.id) => {
                let mode = alarm.mode();
                match (alarm.command, mode) {
                    (AlarmCommand::Arm, Some(mode)) => self.mode = mode,
                    (AlarmCommand::Disarm, _) => self.mode = AlarmMode::Disarmed,
                    _ => {}
                }
                info!(
                    "Node {}: alarm command {:?}, mode {}",
                    self.id, alarm.command, self.mode
                );
                Some(NodeCommand::Alarm {
                    command: alarm.command,
                    mode,
                })
            }
            CompactMessage::Alarm(_) => None,
            CompactMessage::TimeSync { timestamp } => {
                self.last_time_sync = Some(timestamp);
                debug!("Node {}: time sync {}", self.id, timestamp);
                Some(NodeCommand::TimeSync(timestamp))
            }
            CompactMessage::Config(payload) => {
                info!("Node {}: config update ({} bytes)", self.id, payload.len());
                Some(NodeCommand::Config(payload))
            }
            other => {
                debug!("Node {}: unexpected {} from hub", self.id, other.kind().name());
                None
            }
        }
    }
}

/// Telemetry-format sensor node
#[derive(Debug, Clone)]
pub struct TelemetryNode {
    id: u16,
    sequence: u32,
    refractory_ms: u64,
    last_motion_ms: Option<u64>,
}

impl TelemetryNode {
    /// Create a node with the default motion refractory window
    pub fn new(id: u16) -> Self {
        Self::with_refractory(id, DEFAULT_MOTION_REFRACTORY)
    }

    /// Create a node with a custom motion refractory window
    pub fn with_refractory(id: u16, refractory: Duration) -> Self {
        Self {
            id,
            sequence: 0,
            refractory_ms: refractory.as_millis() as u64,
            last_motion_ms: None,
        }
    }

    /// Node id
    pub fn id(&self) -> NodeId {
        NodeId(self.id)
    }

    fn next(&mut self, payload: TelemetryPayload) -> TelemetryFrame {
        self.sequence = self.sequence.wrapping_add(1);
        TelemetryFrame::new(self.id, self.sequence, payload)
    }

    /// Environment frame
    pub fn env(&mut self, sample: EnvSample) -> TelemetryFrame {
        self.next(TelemetryPayload::Env(sample))
    }

    /// Motion frame, or `None` inside the refractory window
    pub fn motion(&mut self, now_ms: u64, age_ms: u32) -> Option<TelemetryFrame> {
        if let Some(last) = self.last_motion_ms {
            if now_ms.saturating_sub(last) < self.refractory_ms {
                return None;
            }
        }
        self.last_motion_ms = Some(now_ms);
        Some(
            self.next(TelemetryPayload::Motion { age_ms })
                .with_flags(TelemetryFlags::ACK_REQUESTED | TelemetryFlags::CRITICAL),
        )
    }

    /// Liveness ping
    pub fn ping(&mut self) -> TelemetryFrame {
        self.next(TelemetryPayload::Ping)
    }

    /// Supply measurement
    pub fn power(&mut self, sample: PowerSample) -> TelemetryFrame {
        self.next(TelemetryPayload::Power(sample))
    }

    /// Wind reading
    pub fn wind(&mut self, reading: WindReading) -> TelemetryFrame {
        self.next(TelemetryPayload::Wind(reading))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_hub(message: CompactMessage) -> RadioFrame {
        RadioFrame {
            from: NodeId::HUB,
            bytes: CompactPacket::new(HUB_ADDRESS, message).encode().unwrap(),
            rssi_dbm: None,
            snr_db: None,
        }
    }

    #[test]
    fn test_detection_zones() {
        let node = CompactNode::new(4, ZoneLimits::default());

        let near = CompactPacket::decode(&node.detection(80, 90).unwrap().unwrap()).unwrap();
        match near.message {
            CompactMessage::Detection(d) => {
                assert_eq!(d.kind, DetectionKind::Entry);
                assert_eq!(d.zone, Zone::Near);
            }
            other => panic!("unexpected {:?}", other),
        }

        let far = CompactPacket::decode(&node.detection(550, 90).unwrap().unwrap()).unwrap();
        assert!(matches!(
            far.message,
            CompactMessage::Detection(Detection {
                kind: DetectionKind::Approach,
                zone: Zone::Far,
                ..
            })
        ));

        assert!(node.detection(601, 90).is_none());
    }

    #[test]
    fn test_inbound_alarm_addressing() {
        let mut node = CompactNode::new(4, ZoneLimits::default());

        let arm_all = AlarmFrame::new(AlarmCommand::Arm, AlarmMode::Perimeter, 0xFF);
        assert_eq!(
            node.handle_inbound(&from_hub(CompactMessage::Alarm(arm_all))),
            Some(NodeCommand::Alarm {
                command: AlarmCommand::Arm,
                mode: Some(AlarmMode::Perimeter),
            })
        );
        assert_eq!(node.mode(), AlarmMode::Perimeter);

        let disarm_other = AlarmFrame::new(AlarmCommand::Disarm, AlarmMode::Disarmed, 5);
        assert_eq!(node.handle_inbound(&from_hub(CompactMessage::Alarm(disarm_other))), None);
        assert_eq!(node.mode(), AlarmMode::Perimeter);

        let disarm_me = AlarmFrame::new(AlarmCommand::Disarm, AlarmMode::Disarmed, 4);
        assert!(node.handle_inbound(&from_hub(CompactMessage::Alarm(disarm_me))).is_some());
        assert_eq!(node.mode(), AlarmMode::Disarmed);
    }

    #[test]
    fn test_inbound_ignores_non_hub() {
        let mut node = CompactNode::new(4, ZoneLimits::default());
        let mut frame = from_hub(CompactMessage::TimeSync { timestamp: 99 });
        frame.from = NodeId(7);
        assert_eq!(node.handle_inbound(&frame), None);
        assert_eq!(node.last_time_sync(), None);

        frame.from = NodeId::HUB;
        assert_eq!(node.handle_inbound(&frame), Some(NodeCommand::TimeSync(99)));
        assert_eq!(node.last_time_sync(), Some(99));
    }

    #[test]
    fn test_trigger_carries_current_mode() {
        let mut node = CompactNode::new(4, ZoneLimits::default());
        let arm = AlarmFrame::new(AlarmCommand::Arm, AlarmMode::Full, 0xFF);
        node.handle_inbound(&from_hub(CompactMessage::Alarm(arm)));

        let packet = CompactPacket::decode(&node.alarm_trigger().unwrap()).unwrap();
        assert_eq!(packet.source, 4);
        assert_eq!(
            packet.message,
            CompactMessage::Alarm(AlarmFrame::new(AlarmCommand::Trigger, AlarmMode::Full, 0))
        );
    }

    #[test]
    fn test_motion_refractory() {
        let mut node = TelemetryNode::new(0xB032);

        let first = node.motion(0, 0).unwrap();
        assert_eq!(first.sequence, 1);
        assert!(first.flags.contains(TelemetryFlags::ACK_REQUESTED));
        assert!(first.flags.contains(TelemetryFlags::CRITICAL));

        assert!(node.motion(9_999, 0).is_none());
        assert_eq!(node.ping().sequence, 2);
        assert_eq!(node.motion(10_000, 250).unwrap().sequence, 3);
    }
}
