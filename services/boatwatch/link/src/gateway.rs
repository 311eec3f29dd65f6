//! Gateway-side dispatch of telemetry frames.
//!
//! The gateway listens for telemetry frames, feeds motion into the intrusion
//! machine, keeps the latest readings per node and acknowledges frames that ask
//! for it.

use crate::error::LinkError;
use crate::stats::{LinkCounters, LinkStats};
use crate::station::Station;
use crate::transport::{Delivery, RadioFrame, Transport};
use async_trait::async_trait;
use boatwatch_alarm::{IntrusionNotice, IntrusionSnapshot, SharedIntrusion};
use boatwatch_notify::Notifier;
use boatwatch_registry::{ContactUpdate, NodeRegistry, NodeStatus};
use boatwatch_wire::{
    EnvSample, Envelope, NodeId, PowerSample, Profile, TelemetryFlags, TelemetryFrame,
    TelemetryPayload, WindReading, WireError,
};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Latest telemetry held for one node
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NodeReadings {
    /// Node id
    pub node: NodeId,
    /// Last sequence number seen
    pub last_sequence: u32,
    /// Last environment sample
    pub env: Option<EnvSample>,
    /// Last supply measurement
    pub power: Option<PowerSample>,
    /// Last wind reading
    pub wind: Option<WindReading>,
}

impl NodeReadings {
    fn new(node: NodeId) -> Self {
        Self {
            node,
            last_sequence: 0,
            env: None,
            power: None,
            wind: None,
        }
    }

    /// True wind as `"12.3kt 270"`
    pub fn wind_summary(&self) -> Option<String> {
        self.wind.map(|w| {
            format!(
                "{:.1}kt {:03}",
                w.true_speed_knots(),
                w.true_dir_degrees()
            )
        })
    }
}

/// Gateway status for display
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStatus {
    /// Intrusion machine state
    pub intrusion: IntrusionSnapshot,
    /// Known nodes
    pub nodes: Vec<NodeStatus>,
    /// Latest readings, by node id
    pub readings: Vec<NodeReadings>,
    /// Traffic counters
    pub link: LinkCounters,
}

/// Pier gateway: intrusion machine plus telemetry cache
#[derive(Debug)]
pub struct Gateway {
    transport: Arc<dyn Transport>,
    registry: NodeRegistry,
    intrusion: SharedIntrusion,
    notifier: Arc<dyn Notifier>,
    readings: DashMap<NodeId, NodeReadings>,
    ack_sequence: AtomicU32,
    stats: LinkStats,
}

impl Gateway {
    /// Create a gateway
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: NodeRegistry,
        intrusion: SharedIntrusion,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            transport,
            registry,
            intrusion,
            notifier,
            readings: DashMap::new(),
            ack_sequence: AtomicU32::new(0),
            stats: LinkStats::default(),
        }
    }

    /// Node registry
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Intrusion machine handle
    pub fn intrusion(&self) -> &SharedIntrusion {
        &self.intrusion
    }

    /// Latest readings for one node
    pub fn readings(&self, node: NodeId) -> Option<NodeReadings> {
        self.readings.get(&node).map(|r| *r.value())
    }

    /// Decode and dispatch one datagram
    pub async fn handle_frame(
        &self,
        radio: &RadioFrame,
        now_ms: u64,
    ) -> Result<TelemetryFrame, WireError> {
        let decoded =
            Envelope::decode(self.profile(), &radio.bytes).and_then(Envelope::into_telemetry);
        let frame = match decoded {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.record_dropped();
                debug!("Dropped frame from {} ({}): {}", radio.from, e.label(), e);
                return Err(e);
            }
        };
        self.stats.record_received();

        let node = frame.source();
        let mut update = ContactUpdate::touch();
        {
            let mut entry = self
                .readings
                .entry(node)
                .or_insert_with(|| NodeReadings::new(node));
            entry.last_sequence = frame.sequence;
            match frame.payload {
                TelemetryPayload::Env(env) => {
                    entry.env = Some(env);
                    update = ContactUpdate::climate(
                        env.temperature_c,
                        env.humidity_pct,
                        env.pressure_hpa,
                    );
                }
                TelemetryPayload::Power(power) => entry.power = Some(power),
                TelemetryPayload::Wind(wind) => entry.wind = Some(wind),
                _ => {}
            }
        }
        if let Some(rssi) = radio.rssi_dbm {
            update = update.with_rssi(rssi);
        }
        self.registry.record_contact(node, update, now_ms).await;

        match frame.payload {
            TelemetryPayload::Motion { age_ms } => {
                info!("Motion from {} (seen {} ms ago)", node, age_ms);
                if let Some(notice) = self.intrusion.on_motion(now_ms).await {
                    self.notify(notice);
                }
            }
            TelemetryPayload::Env(env) => {
                debug!(
                    "Env from {}: {:.1}C {:.0}% {:.0}hPa",
                    node, env.temperature_c, env.humidity_pct, env.pressure_hpa
                );
            }
            TelemetryPayload::Power(power) => {
                debug!("Power from {}: {:.2}V {:.2}A", node, power.volts, power.amps);
            }
            TelemetryPayload::Wind(wind) => {
                info!(
                    "WIND: {:.1}kt {:03}",
                    wind.true_speed_knots(),
                    wind.true_dir_degrees()
                );
            }
            TelemetryPayload::Ping => debug!("Ping from {} seq {}", node, frame.sequence),
            TelemetryPayload::Ack { acked_sequence } => {
                debug!("Ack from {} for seq {}", node, acked_sequence)
            }
        }

        if frame.flags.contains(TelemetryFlags::ACK_REQUESTED)
            && !matches!(frame.payload, TelemetryPayload::Ack { .. })
        {
            if let Err(e) = self.acknowledge(&frame, radio.from).await {
                warn!("Ack to {} for seq {} failed: {}", node, frame.sequence, e);
            }
        }

        Ok(frame)
    }

    async fn acknowledge(&self, frame: &TelemetryFrame, to: NodeId) -> Result<(), LinkError> {
        let sequence = self.ack_sequence.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        let ack = frame.ack_from(self.transport.local_address().0, sequence);
        match self.transport.send(to, &ack.encode(), Delivery::BestEffort).await {
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

    fn notify(&self, notice: IntrusionNotice) {
        self.notifier.alert(notice.subject_tag(), notice.body());
    }

    /// Re-evaluate the grace and cooldown timers
    pub async fn tick(&self, now_ms: u64) -> Option<IntrusionNotice> {
        let notice = self.intrusion.tick(now_ms).await?;
        self.notify(notice);
        Some(notice)
    }

    /// Operator arm
    pub async fn arm(&self) -> Option<IntrusionNotice> {
        let notice = self.intrusion.arm().await?;
        self.notify(notice);
        Some(notice)
    }

    /// Operator disarm
    pub async fn disarm(&self) -> Option<IntrusionNotice> {
        let notice = self.intrusion.disarm().await?;
        self.notify(notice);
        Some(notice)
    }

    /// Status snapshot
    pub async fn status(&self, now_ms: u64) -> GatewayStatus {
        let mut readings: Vec<NodeReadings> = self.readings.iter().map(|r| *r.value()).collect();
        readings.sort_by_key(|r| r.node);
        GatewayStatus {
            intrusion: self.intrusion.snapshot().await,
            nodes: self.registry.snapshot(now_ms).await,
            readings,
            link: self.stats.snapshot(),
        }
    }
}

#[async_trait]
impl Station for Gateway {
    fn name(&self) -> &'static str {
        "gateway"
    }

    fn profile(&self) -> Profile {
        Profile::Telemetry
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
        let wind = status
            .readings
            .iter()
            .find_map(|r| r.wind_summary())
            .unwrap_or_else(|| "--".to_string());
        info!(
            "Gateway status: {}, wind {}, nodes {}, rx {} dropped {}",
            status.intrusion.state,
            wind,
            status.nodes.len(),
            status.link.received,
            status.link.dropped
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::TelemetryNode;
    use crate::testing::RecordingNotifier;
    use crate::transport::{ChannelAir, ChannelTransport};
    use boatwatch_alarm::{IntrusionConfig, IntrusionMachine, IntrusionState};
    use boatwatch_registry::DEFAULT_OFFLINE_THRESHOLD;

    const PIR: u16 = 0xB032;

    struct Bench {
        gateway: Gateway,
        node: ChannelTransport,
        notifier: Arc<RecordingNotifier>,
    }

    fn bench() -> Bench {
        let air = ChannelAir::new();
        let transport = Arc::new(air.attach(NodeId(0x0001)));
        let node = air.attach(NodeId(PIR));
        let notifier = Arc::new(RecordingNotifier::default());
        let gateway = Gateway::new(
            transport,
            NodeRegistry::new(DEFAULT_OFFLINE_THRESHOLD),
            SharedIntrusion::new(IntrusionMachine::new(IntrusionConfig::default())),
            notifier.clone(),
        );
        Bench {
            gateway,
            node,
            notifier,
        }
    }

    fn radio(frame: TelemetryFrame) -> RadioFrame {
        RadioFrame {
            from: frame.source(),
            bytes: frame.encode(),
            rssi_dbm: Some(-90),
            snr_db: Some(7.0),
        }
    }

    fn motion(sequence: u32) -> RadioFrame {
        radio(TelemetryFrame::new(
            PIR,
            sequence,
            TelemetryPayload::Motion { age_ms: 0 },
        ))
    }

    #[tokio::test]
    async fn test_intrusion_scenario() {
        let b = bench();

        b.gateway.handle_frame(&motion(1), 0).await.unwrap();
        b.gateway.handle_frame(&motion(2), 10_000).await.unwrap();
        assert!(b.gateway.tick(30_000).await.is_none());
        assert_eq!(
            b.gateway.tick(30_001).await,
            Some(IntrusionNotice::IntruderAlert)
        );

        // Within the cooldown extra motion is silent
        b.gateway.handle_frame(&motion(3), 100_000).await.unwrap();
        b.gateway.handle_frame(&motion(4), 331_000).await.unwrap();

        assert_eq!(
            b.notifier.tags(),
            vec!["NOTICE", "VISITOR", "INTRUDER ALERT", "ALARM UPDATE"]
        );
        assert_eq!(
            b.gateway.intrusion().snapshot().await.state,
            IntrusionState::AlarmActive
        );
    }

    #[tokio::test]
    async fn test_ack_requested_is_answered() {
        let b = bench();
        let frame = TelemetryFrame::new(PIR, 42, TelemetryPayload::Ping)
            .with_flags(TelemetryFlags::ACK_REQUESTED);

        b.gateway.handle_frame(&radio(frame), 1_000).await.unwrap();

        let reply = b.node.poll().await.unwrap().unwrap();
        let ack = TelemetryFrame::decode(&reply.bytes).unwrap();
        assert_eq!(ack.node_id, 0x0001);
        assert_eq!(ack.sequence, 1);
        assert_eq!(ack.payload, TelemetryPayload::Ack { acked_sequence: 42 });
        assert_eq!(b.gateway.status(1_000).await.link.sent, 1);

        // No ack without the flag, and never an ack for an ack
        let plain = TelemetryFrame::new(PIR, 43, TelemetryPayload::Ping);
        b.gateway.handle_frame(&radio(plain), 2_000).await.unwrap();
        let ack_in = TelemetryFrame::new(PIR, 44, TelemetryPayload::Ack { acked_sequence: 1 })
            .with_flags(TelemetryFlags::ACK_REQUESTED);
        b.gateway.handle_frame(&radio(ack_in), 3_000).await.unwrap();
        assert!(b.node.poll().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_readings_cached() {
        let b = bench();
        let env = EnvSample {
            temperature_c: 18.25,
            humidity_pct: 71.0,
            pressure_hpa: 1008.5,
        };
        let wind = WindReading {
            true_speed_mms: 6173,
            true_dir_deg10: 2705,
            ..Default::default()
        };

        b.gateway
            .handle_frame(&radio(TelemetryFrame::new(PIR, 1, TelemetryPayload::Env(env))), 1_000)
            .await
            .unwrap();
        b.gateway
            .handle_frame(&radio(TelemetryFrame::new(PIR, 2, TelemetryPayload::Wind(wind))), 2_000)
            .await
            .unwrap();

        let readings = b.gateway.readings(NodeId(PIR)).unwrap();
        assert_eq!(readings.last_sequence, 2);
        assert_eq!(readings.env, Some(env));
        assert_eq!(readings.wind_summary().as_deref(), Some("12.0kt 270"));

        let status = b.gateway.registry().get(NodeId(PIR), 2_000).await.unwrap();
        assert_eq!(status.temperature_c, Some(18.25));
        assert_eq!(status.rssi_dbm, Some(-90));
        assert!(b.notifier.tags().is_empty());
    }

    #[tokio::test]
    async fn test_sensor_node_round_trip() {
        let b = bench();
        let mut sensor = TelemetryNode::new(PIR);

        let env = sensor.env(EnvSample {
            temperature_c: 12.5,
            humidity_pct: 88.0,
            pressure_hpa: 1001.0,
        });
        b.gateway.handle_frame(&radio(env), 1_000).await.unwrap();
        let power = sensor.power(PowerSample { volts: 12.6, amps: 0.4 });
        b.gateway.handle_frame(&radio(power), 1_500).await.unwrap();

        let first = sensor.motion(2_000, 120).unwrap();
        assert_eq!(first.sequence, 3);
        b.gateway.handle_frame(&radio(first), 2_000).await.unwrap();
        // Inside the refractory window the sensor stays quiet
        assert!(sensor.motion(5_000, 0).is_none());

        let reply = b.node.poll().await.unwrap().unwrap();
        let ack = TelemetryFrame::decode(&reply.bytes).unwrap();
        assert_eq!(ack.payload, TelemetryPayload::Ack { acked_sequence: 3 });

        let readings = b.gateway.readings(sensor.id()).unwrap();
        assert_eq!(readings.last_sequence, 3);
        assert_eq!(readings.power, Some(PowerSample { volts: 12.6, amps: 0.4 }));
        assert_eq!(b.notifier.tags(), vec!["NOTICE"]);
    }

    #[tokio::test]
    async fn test_bad_frame_dropped() {
        let b = bench();
        let mut bytes = TelemetryFrame::new(PIR, 1, TelemetryPayload::Ping).encode().to_vec();
        bytes[4] ^= 0x01;
        let frame = RadioFrame {
            from: NodeId(PIR),
            bytes: bytes.into(),
            rssi_dbm: None,
            snr_db: None,
        };

        assert!(b.gateway.handle_frame(&frame, 0).await.is_err());
        assert!(b.gateway.registry().is_empty().await);
        assert_eq!(b.gateway.status(0).await.link.dropped, 1);
    }

    #[tokio::test]
    async fn test_operator_arm_disarm() {
        let b = bench();
        assert_eq!(b.gateway.arm().await, None);
        assert_eq!(b.gateway.disarm().await, Some(IntrusionNotice::SystemDisarmed));

        b.gateway.handle_frame(&motion(1), 0).await.unwrap();
        assert_eq!(
            b.gateway.intrusion().snapshot().await.state,
            IntrusionState::Disarmed
        );
        assert_eq!(b.gateway.arm().await, Some(IntrusionNotice::SystemArmed));
        assert_eq!(b.notifier.tags(), vec!["DISARMED", "ARMED"]);
    }
}
