//! Bench sensor nodes for exercising a hub or gateway without radio hardware.
//!
//! The compact node sends a heartbeat and an environmental reading every
//! heartbeat interval and logs whatever the hub sends back. The telemetry node
//! does the same with env, power and ping frames toward the gateway.

use crate::{component_info, component_warn};
use boatwatch_link::{
    clock, CompactNode, Delivery, NodeCommand, TelemetryNode, Transport, DEFAULT_MOTION_REFRACTORY,
};
use boatwatch_wire::{
    EnvSample, EnvironmentalReading, NodeId, PowerSample, TelemetryFrame, TelemetryPayload,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Spawn the send and receive loops for a simulated compact node
pub fn spawn_compact_node(
    node: CompactNode,
    transport: Arc<dyn Transport>,
    hub: NodeId,
    heartbeat: Duration,
    rx_poll: Duration,
) -> Vec<JoinHandle<()>> {
    let id = node.id();
    let sender = {
        let node = node.clone();
        let transport = transport.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(heartbeat);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut battery_mv: u16 = 4_100;
            loop {
                ticker.tick().await;
                let reading = EnvironmentalReading::from_measurements(18.5, 64.0, 1012.8, battery_mv, -70);
                for packet in [node.heartbeat(battery_mv), node.environmental(reading)] {
                    let sent = match packet {
                        Ok(bytes) => transport.send(hub, &bytes, Delivery::BestEffort).await,
                        Err(e) => Err(e.into()),
                    };
                    if let Err(e) = sent {
                        component_warn!("node", "{} send failed: {}", id, e);
                    }
                }
                battery_mv = battery_mv.saturating_sub(1).max(3_300);
            }
        })
    };

    let receiver = tokio::spawn(async move {
        let mut node = node;
        let mut poll = tokio::time::interval(rx_poll);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            poll.tick().await;
            match transport.poll().await {
                Ok(Some(frame)) => match node.handle_inbound(&frame) {
                    Some(NodeCommand::Alarm { command, mode }) => {
                        component_info!("node", "{} alarm {:?} (mode {:?})", id, command, mode)
                    }
                    Some(NodeCommand::TimeSync(ts)) => {
                        component_info!("node", "{} clock set to {}", id, ts)
                    }
                    Some(NodeCommand::Config(payload)) => {
                        component_info!("node", "{} config update, {} bytes", id, payload.len())
                    }
                    None => {}
                },
                Ok(None) => {}
                Err(e) => {
                    component_warn!("node", "{} receive failed: {}", id, e);
                    return;
                }
            }
        }
    });

    vec![sender, receiver]
}

/// Spawn the send and receive loops for a simulated telemetry sensor.
///
/// A motion frame goes out every `motion_every` heartbeats when non-zero.
pub fn spawn_telemetry_node(
    node: TelemetryNode,
    transport: Arc<dyn Transport>,
    gateway: NodeId,
    heartbeat: Duration,
    motion_every: u32,
    rx_poll: Duration,
) -> Vec<JoinHandle<()>> {
    let id = node.id();
    let sender = {
        let transport = transport.clone();
        tokio::spawn(async move {
            let mut node = node;
            let mut ticker = tokio::time::interval(heartbeat);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut beats: u32 = 0;
            loop {
                ticker.tick().await;
                beats = beats.wrapping_add(1);
                let mut frames: Vec<TelemetryFrame> = vec![
                    node.env(EnvSample {
                        temperature_c: 17.5,
                        humidity_pct: 72.0,
                        pressure_hpa: 1011.0,
                    }),
                    node.power(PowerSample {
                        volts: 12.7,
                        amps: 0.35,
                    }),
                    node.ping(),
                ];
                if motion_every > 0 && beats % motion_every == 0 {
                    frames.extend(node.motion(clock::now_ms(), 0));
                }
                for frame in frames {
                    if let Err(e) = transport.send(gateway, &frame.encode(), Delivery::BestEffort).await {
                        component_warn!("sensor", "{} send of seq {} failed: {}", id, frame.sequence, e);
                    }
                }
            }
        })
    };

    let receiver = tokio::spawn(async move {
        let mut poll = tokio::time::interval(rx_poll);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            poll.tick().await;
            match transport.poll().await {
                Ok(Some(radio)) => match TelemetryFrame::decode(&radio.bytes) {
                    Ok(TelemetryFrame {
                        payload: TelemetryPayload::Ack { acked_sequence },
                        ..
                    }) => component_info!("sensor", "{} seq {} acknowledged", id, acked_sequence),
                    Ok(other) => {
                        component_info!("sensor", "{} ignoring {} frame", id, other.payload.kind().name())
                    }
                    Err(e) => component_warn!("sensor", "{} bad frame from {}: {}", id, radio.from, e),
                },
                Ok(None) => {}
                Err(e) => {
                    component_warn!("sensor", "{} receive failed: {}", id, e);
                    return;
                }
            }
        }
    });

    component_info!(
        "sensor",
        "{} reporting to {} (motion refractory {:?})",
        id,
        gateway,
        DEFAULT_MOTION_REFRACTORY
    );
    vec![sender, receiver]
}
