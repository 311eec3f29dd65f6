//! Hub-side dispatch of compact packets.
//!
//! Every received datagram is decoded as a compact packet and routed by kind to
//! the node registry and the alarm coordinator. Alarm state changes are pushed
//! back out to the nodes and to the notification queue.

use crate::clock;
use crate::error::LinkError;
use crate::stats::{LinkCounters, LinkStats};
use crate::station::Station;
use crate::transport::{Delivery, RadioFrame, Transport};
use async_trait::async_trait;
use boatwatch_alarm::{AlarmEvent, AlarmState, DetectionDecision, SharedAlarm};
use boatwatch_notify::Notifier;
use boatwatch_registry::{ContactUpdate, NodeRegistry, NodeStatus};
use boatwatch_wire::{
    AlarmCommand, AlarmFrame, AlarmMode, CompactMessage, CompactPacket, Detection, Envelope,
    NodeId, Profile, WireError, BROADCAST_ADDRESS, HUB_ADDRESS,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Hub status for display
#[derive(Debug, Clone, Serialize)]
pub struct HubStatus {
    /// Alarm coordinator state
    pub alarm: AlarmState,
    /// How long the alarm has been sounding (s)
    pub alarm_duration_secs: u64,
    /// Known nodes
    pub nodes: Vec<NodeStatus>,
    /// Traffic counters
    pub link: LinkCounters,
}

impl HubStatus {
    /// Nodes currently online
    pub fn online_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.online).count()
    }
}

/// Central hub: registry, alarm coordinator and radio
#[derive(Debug)]
pub struct Hub {
    transport: Arc<dyn Transport>,
    registry: NodeRegistry,
    alarm: SharedAlarm,
    notifier: Arc<dyn Notifier>,
    stats: LinkStats,
}

impl Hub {
    /// Create a hub
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: NodeRegistry,
        alarm: SharedAlarm,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            transport,
            registry,
            alarm,
            notifier,
            stats: LinkStats::default(),
        }
    }

    /// Node registry
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Alarm coordinator handle
    pub fn alarm(&self) -> &SharedAlarm {
        &self.alarm
    }

    /// Decode and dispatch one datagram.
    ///
    /// Invalid packets are logged and dropped without touching any state.
    pub async fn handle_frame(
        &self,
        frame: &RadioFrame,
        now_ms: u64,
    ) -> Result<CompactPacket, WireError> {
        let decoded =
            Envelope::decode(self.profile(), &frame.bytes).and_then(Envelope::into_compact);
        let packet = match decoded {
            Ok(packet) => packet,
            Err(e) => {
                self.stats.record_dropped();
                debug!("Dropped packet from {} ({}): {}", frame.from, e.label(), e);
                return Err(e);
            }
        };
        self.stats.record_received();

        if packet.source == HUB_ADDRESS || packet.source == BROADCAST_ADDRESS {
            debug!(
                "Ignoring packet from reserved address {:#04x} (via {})",
                packet.source, frame.from
            );
            return Ok(packet);
        }

        let node = NodeId::from(packet.source);
        match &packet.message {
            CompactMessage::Environmental(env) => {
                let mut update = ContactUpdate::environmental(env);
                if let Some(rssi) = frame.rssi_dbm {
                    update = update.with_rssi(rssi);
                }
                info!(
                    "Environmental data from {}: {:.1}C, {:.0}%, {:.0}hPa",
                    node,
                    env.temperature_c(),
                    env.humidity_pct(),
                    env.pressure_hpa()
                );
                self.registry.record_contact(node, update, now_ms).await;
            }
            CompactMessage::Heartbeat { battery_mv } => {
                debug!("Heartbeat from {}: battery {} mV", node, battery_mv);
                let update = self.with_rssi(ContactUpdate::heartbeat(*battery_mv), frame);
                self.registry.record_contact(node, update, now_ms).await;
            }
            CompactMessage::Wind(wind) => {
                info!(
                    "Wind from {}: {:.1}kt {:03}",
                    node,
                    wind.true_speed_knots(),
                    wind.true_dir_degrees()
                );
                self.touch(node, frame, now_ms).await;
            }
            CompactMessage::Detection(detection) => {
                self.touch(node, frame, now_ms).await;
                self.on_detection(node, detection, now_ms).await;
            }
            CompactMessage::Alarm(alarm) => {
                self.touch(node, frame, now_ms).await;
                self.on_node_alarm(node, alarm, now_ms).await;
            }
            CompactMessage::TimeSync { timestamp } => {
                debug!("Ignoring time sync {} from {}", timestamp, node);
                self.touch(node, frame, now_ms).await;
            }
            CompactMessage::Config(payload) => {
                debug!("Config packet from {} ({} bytes)", node, payload.len());
                self.touch(node, frame, now_ms).await;
            }
            CompactMessage::Ack { acked_kind } => {
                debug!("Ack from {} for kind {:#04x}", node, acked_kind);
                self.touch(node, frame, now_ms).await;
            }
        }

        Ok(packet)
    }

    fn with_rssi(&self, update: ContactUpdate, frame: &RadioFrame) -> ContactUpdate {
        match frame.rssi_dbm {
            Some(rssi) => update.with_rssi(rssi),
            None => update,
        }
    }

    async fn touch(&self, node: NodeId, frame: &RadioFrame, now_ms: u64) {
        self.registry
            .record_contact(node, self.with_rssi(ContactUpdate::touch(), frame), now_ms)
            .await;
    }

    async fn display_name(&self, node: NodeId, now_ms: u64) -> String {
        self.registry
            .get(node, now_ms)
            .await
            .map(|status| status.display_name)
            .unwrap_or_else(|| boatwatch_registry::default_display_name(node))
    }

    async fn on_detection(&self, node: NodeId, detection: &Detection, now_ms: u64) {
        info!(
            "Detection from {}: {:?} conf={}% dist={}cm zone={:?}",
            node, detection.kind, detection.confidence, detection.distance_cm, detection.zone
        );

        let outcome = self.alarm.on_detection(node, detection, now_ms).await;
        match outcome.decision {
            DetectionDecision::Chime => {
                let name = self.display_name(node, now_ms).await;
                self.notifier
                    .alert("DOORBELL", &format!("Visitor at {}", name));
            }
            DetectionDecision::Trigger { audible } => {
                if let Some(event) = outcome.event {
                    self.publish(event, audible, now_ms).await;
                }
            }
            DetectionDecision::Ignore => {}
        }
    }

    async fn on_node_alarm(&self, node: NodeId, alarm: &AlarmFrame, now_ms: u64) {
        match alarm.command {
            AlarmCommand::Trigger => {
                if let Some(event) = self.alarm.trigger(node, now_ms).await {
                    let audible = match event {
                        AlarmEvent::Triggered { mode, .. } => mode != AlarmMode::Quiet,
                        _ => true,
                    };
                    self.publish(event, audible, now_ms).await;
                }
            }
            AlarmCommand::Arm | AlarmCommand::Disarm | AlarmCommand::Silence => {
                warn!(
                    "Rejected {:?} from {}: radio commands carry no credential",
                    alarm.command, node
                );
            }
            AlarmCommand::Other(raw) => {
                debug!("Unknown alarm command {:#04x} from {}", raw, node);
            }
        }
    }

    /// Push an alarm state change to the nodes and the notification queue
    async fn publish(&self, event: AlarmEvent, audible: bool, now_ms: u64) {
        match event {
            AlarmEvent::Armed { mode, .. } => {
                self.broadcast_command(AlarmCommand::Arm, mode).await;
                self.notifier
                    .alert("ARMED", &format!("System armed: {}", mode));
            }
            AlarmEvent::Disarmed { was_triggered, .. } => {
                self.broadcast_command(AlarmCommand::Disarm, AlarmMode::Disarmed)
                    .await;
                let body = if was_triggered {
                    "System disarmed, active alarm cleared"
                } else {
                    "System disarmed"
                };
                self.notifier.alert("DISARMED", body);
            }
            AlarmEvent::Triggered { node, mode } => {
                if audible {
                    self.broadcast_command(AlarmCommand::Trigger, mode).await;
                }
                let name = self.display_name(node, now_ms).await;
                self.notifier.alert(
                    "INTRUDER ALERT",
                    &format!("Alarm triggered by {} ({}) in {} mode", name, node, mode),
                );
            }
            AlarmEvent::Silenced { mode } => {
                self.broadcast_command(AlarmCommand::Silence, mode).await;
                self.notifier
                    .alert("ALARM UPDATE", &format!("Alarm silenced, still {}", mode));
            }
            AlarmEvent::AutoTimeout { node, after } => {
                self.broadcast_command(AlarmCommand::Disarm, AlarmMode::Disarmed)
                    .await;
                self.notifier.alert(
                    "ALARM RESET",
                    &format!(
                        "Alarm from {} auto-disarmed after {} s",
                        node,
                        after.as_secs()
                    ),
                );
            }
        }
    }

    async fn broadcast_command(&self, command: AlarmCommand, mode: AlarmMode) {
        if let Err(e) = self.send_alarm_command(command, mode, NodeId::BROADCAST).await {
            warn!("Broadcast of {:?} failed: {}", command, e);
        }
    }

    async fn send_packet(
        &self,
        to: NodeId,
        message: CompactMessage,
        delivery: Delivery,
    ) -> Result<(), LinkError> {
        let bytes = CompactPacket::new(HUB_ADDRESS, message).encode()?;
        match self.transport.send(to, &bytes, delivery).await {
            Ok(()) => {
                self.stats.record_sent();
                Ok(())
            }
            Err(e) => {
                self.stats.record_send_failure();
                Err(e)
            }
        }
    }

    /// Send an alarm command to one node (acknowledged) or to all (best effort)
    pub async fn send_alarm_command(
        &self,
        command: AlarmCommand,
        mode: AlarmMode,
        target: NodeId,
    ) -> Result<(), LinkError> {
        let target_byte = target.as_compact().ok_or(LinkError::UnknownPeer(target))?;
        let delivery = if target.is_broadcast() {
            Delivery::BestEffort
        } else {
            Delivery::Acknowledged
        };
        self.send_packet(
            target,
            CompactMessage::Alarm(AlarmFrame::new(command, mode, target_byte)),
            delivery,
        )
        .await?;
        debug!("Alarm command {:?} ({}) sent to {}", command, mode, target);
        Ok(())
    }

    /// Broadcast the hub clock
    pub async fn broadcast_time_sync(&self, timestamp: u32) -> Result<(), LinkError> {
        self.send_packet(
            NodeId::BROADCAST,
            CompactMessage::TimeSync { timestamp },
            Delivery::BestEffort,
        )
        .await?;
        debug!("Time sync broadcast sent ({})", timestamp);
        Ok(())
    }

    /// Operator arm, PIN checked
    pub async fn arm(&self, mode: AlarmMode, pin: &str, now_ms: u64) -> Result<AlarmEvent, LinkError> {
        let event = self.alarm.arm_with_pin(mode, pin, now_ms).await?;
        self.publish(event, true, now_ms).await;
        Ok(event)
    }

    /// Operator disarm, PIN checked
    pub async fn disarm(&self, pin: &str, now_ms: u64) -> Result<AlarmEvent, LinkError> {
        let event = self.alarm.disarm_with_pin(pin, now_ms).await?;
        self.publish(event, true, now_ms).await;
        Ok(event)
    }

    /// Operator silence, PIN checked; `None` if nothing was sounding
    pub async fn silence(&self, pin: &str, now_ms: u64) -> Result<Option<AlarmEvent>, LinkError> {
        self.alarm.verify_pin(pin, now_ms).await?;
        let event = self.alarm.silence().await;
        if let Some(event) = event {
            self.publish(event, true, now_ms).await;
        }
        Ok(event)
    }

    /// Re-evaluate the safety timeout
    pub async fn tick(&self, now_ms: u64) -> Option<AlarmEvent> {
        let event = self.alarm.tick(now_ms).await?;
        self.publish(event, true, now_ms).await;
        Some(event)
    }

    /// Status snapshot
    pub async fn status(&self, now_ms: u64) -> HubStatus {
        HubStatus {
            alarm: self.alarm.snapshot().await,
            alarm_duration_secs: self.alarm.alarm_duration(now_ms).await.as_secs(),
            nodes: self.registry.snapshot(now_ms).await,
            link: self.stats.snapshot(),
        }
    }

    /// Spawn the periodic time sync broadcast
    pub fn spawn_time_sync(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let hub = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = hub.broadcast_time_sync(clock::unix_seconds()).await {
                    warn!("Time sync broadcast failed: {}", e);
                }
            }
        })
    }
}

#[async_trait]
impl Station for Hub {
    fn name(&self) -> &'static str {
        "hub"
    }

    fn profile(&self) -> Profile {
        Profile::Compact
    }

    fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    async fn on_frame(&self, frame: RadioFrame, now_ms: u64) {
        let _ = self.handle_frame(&frame, now_ms).await;
    }

    async fn on_tick(&self, now_ms: u64) {
        self.tick(now_ms).await;
    }

    async fn report(&self, now_ms: u64) {
        let status = self.status(now_ms).await;
        let alarm = if status.alarm.is_triggered() {
            format!("TRIGGERED {}s", status.alarm_duration_secs)
        } else {
            "quiet".to_string()
        };
        info!(
            "Hub status: {} ({}), nodes {}/{} online, rx {} dropped {} tx {}",
            status.alarm.mode,
            alarm,
            status.online_count(),
            status.nodes.len(),
            status.link.received,
            status.link.dropped,
            status.link.sent
        );
    }
}
