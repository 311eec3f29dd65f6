//! Boatwatch daemon.
//!
//! Runs one station of the boat sensor network over the UDP stand-in for the
//! radio: the hub (compact packets, node registry, alarm coordinator), the pier
//! gateway (telemetry frames, intrusion machine), or a simulated node of either
//! format.

use anyhow::Context;
use boatwatch_alarm::{AlarmCoordinator, IntrusionMachine, SharedAlarm, SharedIntrusion};
use boatwatch_link::{
    spawn_station, CompactNode, Gateway, Hub, TelemetryNode, Transport, UdpTransport,
};
use boatwatch_notify::{LogMailer, NotificationQueue, Notifier};
use boatwatch_registry::NodeRegistry;
use boatwatch_wire::{AlarmMode, NodeId};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod console;
mod logging;
mod simulate;

use config::BoatwatchConfig;
use logging::BoatwatchLogFormatter;

/// Station role
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Role {
    /// Compact-format hub with the alarm coordinator
    Hub,
    /// Telemetry-format gateway with the intrusion machine
    Gateway,
    /// Simulated compact sensor node
    Node,
    /// Simulated telemetry sensor node
    Sensor,
}

/// Boat sensor network station
#[derive(Parser, Debug)]
#[command(name = "boatwatch", version, about = "Boat sensor network hub and gateway")]
struct Args {
    /// Station role
    #[arg(long, value_enum, default_value_t = Role::Hub)]
    role: Role,

    /// Configuration file path
    #[arg(long, default_value = "boatwatch.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Own node id, overrides the config file
    #[arg(long)]
    node_id: Option<u16>,

    /// UDP bind address, e.g. 0.0.0.0:47100
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Peer address (repeatable), as <id>=<addr>
    #[arg(long, value_parser = parse_peer)]
    peer: Vec<(u16, SocketAddr)>,

    /// Alarm mode at startup
    #[arg(long)]
    mode: Option<AlarmMode>,

    /// State machine tick interval, e.g. 500ms
    #[arg(long)]
    tick_interval: Option<humantime::Duration>,

    /// Status report interval, e.g. 30s
    #[arg(long)]
    status_interval: Option<humantime::Duration>,

    /// Hub time sync broadcast interval, e.g. 1h
    #[arg(long)]
    time_sync_interval: Option<humantime::Duration>,

    /// Simulated sensor: send a motion frame every N heartbeats (0 = never)
    #[arg(long, default_value_t = 0)]
    motion_every: u32,

    /// Read operator commands from stdin
    #[arg(long)]
    console: bool,
}

fn parse_peer(value: &str) -> Result<(u16, SocketAddr), String> {
    let (id, addr) = value
        .split_once('=')
        .ok_or_else(|| format!("expected <id>=<addr>, got '{}'", value))?;
    let id = id
        .trim()
        .parse::<u16>()
        .map_err(|e| format!("invalid node id '{}': {}", id, e))?;
    let addr = addr
        .trim()
        .parse::<SocketAddr>()
        .map_err(|e| format!("invalid address '{}': {}", addr, e))?;
    Ok((id, addr))
}

impl Args {
    fn apply_to(&self, config: &mut BoatwatchConfig) {
        if let Some(id) = self.node_id {
            config.node.id = id;
        }
        if let Some(listen) = self.listen {
            config.transport.listen = listen;
        }
        for (id, addr) in &self.peer {
            config.transport.peers.insert(*id, *addr);
        }
        if let Some(mode) = self.mode {
            config.alarm.initial_mode = mode;
        }
        if let Some(tick) = self.tick_interval {
            config.timing.tick_ms = Duration::from(tick).as_millis() as u64;
        }
        if let Some(status) = self.status_interval {
            config.timing.status_ms = Duration::from(status).as_millis() as u64;
        }
        if let Some(sync) = self.time_sync_interval {
            config.timing.time_sync_s = Duration::from(sync).as_secs();
        }
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = args
        .log_level
        .clone()
        .or_else(|| std::env::var("BOATWATCH_LOG_LEVEL").ok())
        .unwrap_or_else(|| "info".to_string());
    let env_filter = EnvFilter::new("info")
        .add_directive(format!("boatwatch={}", log_level).parse()?)
        .add_directive(format!("boatwatch_link={}", log_level).parse()?)
        .add_directive(format!("boatwatch_alarm={}", log_level).parse()?)
        .add_directive(format!("boatwatch_registry={}", log_level).parse()?)
        .add_directive(format!("boatwatch_notify={}", log_level).parse()?)
        .add_directive(format!("boatwatch_wire={}", log_level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .event_format(BoatwatchLogFormatter::new("boatwatch"))
        .init();

    info!("Starting boatwatch v{} as {:?}", env!("CARGO_PKG_VERSION"), args.role);

    let mut config = BoatwatchConfig::load_from_file(&args.config)?;
    args.apply_to(&mut config);
    config.validate().context("invalid configuration after overrides")?;

    let radio = &config.radio;
    info!(
        "Radio: {:.1} MHz, {} dBm, SF{}, {:.1} kHz, CR 4/{}",
        radio.frequency_mhz,
        radio.tx_power_dbm,
        radio.spreading_factor,
        radio.bandwidth_khz,
        radio.coding_rate
    );

    let transport: Arc<dyn Transport> = Arc::new(
        UdpTransport::bind(config.node_id(), config.transport.listen, config.peers())
            .await
            .with_context(|| format!("binding {}", config.transport.listen))?,
    );

    let (queue, notify_worker) = NotificationQueue::start(config.notify_config(), Arc::new(LogMailer));
    let notifier: Arc<dyn Notifier> = Arc::new(queue.clone());

    let registry = NodeRegistry::new(config.offline_threshold());
    for (id, name) in &config.registry.names {
        registry.set_display_name(NodeId(*id), name.clone()).await;
    }

    let intervals = config.task_intervals();
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    match args.role {
        Role::Hub => {
            let alarm = SharedAlarm::new(AlarmCoordinator::new(config.coordinator_config()));
            let hub = Arc::new(Hub::new(transport, registry, alarm, notifier));
            tasks.extend(spawn_station(hub.clone(), intervals));
            if config.timing.time_sync_s > 0 {
                tasks.push(hub.spawn_time_sync(Duration::from_secs(config.timing.time_sync_s)));
            }
            if args.console {
                tasks.push(console::spawn_hub_console(hub));
            }
        }
        Role::Gateway => {
            let intrusion = SharedIntrusion::new(IntrusionMachine::new(config.intrusion_config()));
            let gateway = Arc::new(Gateway::new(transport, registry, intrusion, notifier));
            tasks.extend(spawn_station(gateway.clone(), intervals));
            if args.console {
                tasks.push(console::spawn_gateway_console(gateway));
            }
        }
        Role::Node => {
            let id = config
                .node_id()
                .as_compact()
                .context("compact node ids must fit in 8 bits")?;
            let node = CompactNode::new(id, config.zones);
            tasks.extend(simulate::spawn_compact_node(
                node,
                transport,
                NodeId(config.node.hub_address),
                Duration::from_secs(config.timing.heartbeat_s.max(1)),
                intervals.rx_poll,
            ));
        }
        Role::Sensor => {
            tasks.extend(simulate::spawn_telemetry_node(
                TelemetryNode::new(config.node.id),
                transport,
                NodeId(config.node.hub_address),
                Duration::from_secs(config.timing.heartbeat_s.max(1)),
                args.motion_every,
                intervals.rx_poll,
            ));
        }
    }

    component_info!("main", "{} running with {} tasks", config.node.name, tasks.len());

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to install SIGTERM handler: {}", e))?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT, shutting down"),
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
    }

    for task in &tasks {
        task.abort();
    }

    let counters = queue.counters();
    if counters.pending() > 0 {
        warn!("{} notifications still undelivered at shutdown", counters.pending());
    }
    drop(queue);
    if tokio::time::timeout(Duration::from_secs(2), notify_worker)
        .await
        .is_err()
    {
        component_error!("main", "Notification worker did not stop in time");
    }

    info!(
        "Shutdown complete ({} notifications delivered)",
        counters.delivered
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_peer() {
        assert_eq!(
            parse_peer("3=10.0.0.3:47100"),
            Ok((3, "10.0.0.3:47100".parse().unwrap()))
        );
        assert!(parse_peer("10.0.0.3:47100").is_err());
        assert!(parse_peer("x=10.0.0.3:47100").is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let args = Args::parse_from([
            "boatwatch",
            "--role",
            "gateway",
            "--node-id",
            "1",
            "--peer",
            "0=127.0.0.1:47100",
            "--mode",
            "full",
            "--tick-interval",
            "500ms",
        ]);
        assert_eq!(args.role, Role::Gateway);

        let mut config = BoatwatchConfig::default();
        args.apply_to(&mut config);
        assert_eq!(config.node.id, 1);
        assert_eq!(config.alarm.initial_mode, AlarmMode::Full);
        assert_eq!(config.timing.tick_ms, 500);
        assert_eq!(config.transport.peers.len(), 1);
    }

    #[test]
    fn test_sensor_role() {
        let args = Args::parse_from(["boatwatch", "--role", "sensor", "--motion-every", "5"]);
        assert_eq!(args.role, Role::Sensor);
        assert_eq!(args.motion_every, 5);
    }
}
