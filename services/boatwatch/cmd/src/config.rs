//! Configuration handling for the boatwatch daemon.
//!
//! Settings come from a YAML file, then environment variables, then command-line
//! overrides. A missing or unparsable file is not fatal: the daemon starts with
//! defaults and says so.

use anyhow::{Context, Result};
use boatwatch_alarm::{
    validate_pin, CoordinatorConfig, IntrusionConfig, ZoneLimits, DEFAULT_PIN,
};
use boatwatch_link::TaskIntervals;
use boatwatch_notify::NotifyConfig;
use boatwatch_wire::{AlarmMode, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Daemon configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoatwatchConfig {
    /// This station
    pub node: NodeSection,
    /// Alarm and intrusion settings
    pub alarm: AlarmSection,
    /// Detection distance bands
    pub zones: ZoneLimits,
    /// Node table
    pub registry: RegistrySection,
    /// Task intervals
    pub timing: TimingSection,
    /// Radio parameters
    pub radio: RadioSection,
    /// Notification delivery
    pub notify: NotifySection,
    /// UDP transport
    pub transport: TransportSection,
}

/// Station identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    /// Own address
    pub id: u16,
    /// Display name
    pub name: String,
    /// Address a simulated node reports to (the hub, or the gateway for sensors)
    pub hub_address: u16,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            id: NodeId::HUB.0,
            name: "Hub".to_string(),
            hub_address: NodeId::HUB.0,
        }
    }
}

/// Alarm coordinator and intrusion machine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmSection {
    /// Mode at startup
    pub initial_mode: AlarmMode,
    /// Operator PIN
    pub pin: String,
    /// Intrusion grace period (s)
    pub grace_period_s: u64,
    /// Intrusion alert cooldown (s)
    pub alert_cooldown_s: u64,
    /// Triggered alarm auto-disarm ceiling (s)
    pub safety_timeout_s: u64,
    /// Detector sensitivity (0-100)
    pub sensitivity: u8,
    /// Failed PIN attempts before lockout
    pub max_pin_attempts: u32,
    /// Lockout window (s)
    pub lockout_window_s: u64,
}

impl Default for AlarmSection {
    fn default() -> Self {
        let coordinator = CoordinatorConfig::default();
        let intrusion = IntrusionConfig::default();
        Self {
            initial_mode: coordinator.initial_mode,
            pin: DEFAULT_PIN.to_string(),
            grace_period_s: intrusion.grace_period.as_secs(),
            alert_cooldown_s: intrusion.alert_cooldown.as_secs(),
            safety_timeout_s: coordinator.safety_timeout.as_secs(),
            sensitivity: coordinator.sensitivity,
            max_pin_attempts: coordinator.max_pin_attempts,
            lockout_window_s: coordinator.lockout_window.as_secs(),
        }
    }
}

/// Node table settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySection {
    /// Silence after which a node is reported offline (s)
    pub offline_threshold_s: u64,
    /// Display names by node id
    pub names: BTreeMap<u16, String>,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            offline_threshold_s: boatwatch_registry::DEFAULT_OFFLINE_THRESHOLD.as_secs(),
            names: BTreeMap::new(),
        }
    }
}

/// Task intervals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSection {
    /// Receive poll (ms)
    pub rx_poll_ms: u64,
    /// State machine tick (ms)
    pub tick_ms: u64,
    /// Status report (ms)
    pub status_ms: u64,
    /// Hub time sync broadcast (s)
    pub time_sync_s: u64,
    /// Simulated node heartbeat (s)
    pub heartbeat_s: u64,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            rx_poll_ms: 10,
            tick_ms: 1_000,
            status_ms: 1_000,
            time_sync_s: 3_600,
            heartbeat_s: 60,
        }
    }
}

/// LoRa radio parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioSection {
    /// Carrier frequency (MHz)
    pub frequency_mhz: f32,
    /// Transmit power (dBm)
    pub tx_power_dbm: i8,
    /// Spreading factor
    pub spreading_factor: u8,
    /// Bandwidth (kHz)
    pub bandwidth_khz: f32,
    /// Coding rate denominator (4/x)
    pub coding_rate: u8,
}

impl Default for RadioSection {
    fn default() -> Self {
        Self {
            frequency_mhz: 915.0,
            tx_power_dbm: 20,
            spreading_factor: 7,
            bandwidth_khz: 125.0,
            coding_rate: 5,
        }
    }
}

/// Notification settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySection {
    /// Subject prefix
    pub site: String,
    /// First retry delay (s)
    pub backoff_floor_s: u64,
    /// Longest retry delay (s)
    pub backoff_cap_s: u64,
}

impl Default for NotifySection {
    fn default() -> Self {
        let defaults = NotifyConfig::default();
        Self {
            site: defaults.site,
            backoff_floor_s: defaults.backoff_floor.as_secs(),
            backoff_cap_s: defaults.backoff_cap.as_secs(),
        }
    }
}

/// UDP stand-in for the radio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSection {
    /// Local bind address
    pub listen: SocketAddr,
    /// Peer address book by node id
    pub peers: BTreeMap<u16, SocketAddr>,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 47100)),
            peers: BTreeMap::new(),
        }
    }
}

impl BoatwatchConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref();
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str::<Self>(&content) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file {:?} ({}), using defaults", path, e);
                    Self::default()
                }
            },
            Err(_) => {
                warn!("Config file {:?} not found, using defaults", path);
                Self::default()
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        info!(
            "Final configuration: node={} ({}), listen={}, peers={}, mode={}",
            config.node.id,
            config.node.name,
            config.transport.listen,
            config.transport.peers.len(),
            config.alarm.initial_mode
        );
        Ok(config)
    }

    /// Apply `BOATWATCH_*` overrides read through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("BOATWATCH_NODE_ID") {
            match value.parse::<u16>() {
                Ok(id) => {
                    self.node.id = id;
                    info!("Node ID overridden by environment: {}", id);
                }
                Err(_) => warn!("Ignoring invalid BOATWATCH_NODE_ID '{}'", value),
            }
        }

        if let Some(value) = lookup("BOATWATCH_LISTEN") {
            match value.parse::<SocketAddr>() {
                Ok(addr) => {
                    self.transport.listen = addr;
                    info!("Listen address overridden by environment: {}", addr);
                }
                Err(_) => warn!("Ignoring invalid BOATWATCH_LISTEN '{}'", value),
            }
        }

        if let Some(pin) = lookup("BOATWATCH_ALARM_PIN") {
            self.alarm.pin = pin;
            info!("Alarm PIN overridden by environment");
        }
    }

    /// Reject settings the daemon cannot run with
    pub fn validate(&self) -> Result<()> {
        validate_pin(&self.alarm.pin).context("alarm.pin")?;
        if self.alarm.sensitivity > 100 {
            anyhow::bail!("alarm.sensitivity must be 0-100, got {}", self.alarm.sensitivity);
        }
        let z = &self.zones;
        if !(z.near_max_cm < z.middle_max_cm && z.middle_max_cm < z.far_max_cm) {
            anyhow::bail!(
                "zones must increase: near {} < middle {} < far {}",
                z.near_max_cm,
                z.middle_max_cm,
                z.far_max_cm
            );
        }
        if self.timing.rx_poll_ms == 0 || self.timing.tick_ms == 0 || self.timing.status_ms == 0 {
            anyhow::bail!("timing intervals must be non-zero");
        }
        if self.notify.backoff_floor_s == 0 {
            anyhow::bail!("notify.backoff_floor_s must be at least 1");
        }
        Ok(())
    }

    /// Own address
    pub fn node_id(&self) -> NodeId {
        NodeId(self.node.id)
    }

    /// Alarm coordinator settings
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            initial_mode: self.alarm.initial_mode,
            safety_timeout: Duration::from_secs(self.alarm.safety_timeout_s),
            pin: self.alarm.pin.clone(),
            sensitivity: self.alarm.sensitivity,
            max_pin_attempts: self.alarm.max_pin_attempts,
            lockout_window: Duration::from_secs(self.alarm.lockout_window_s),
        }
    }

    /// Intrusion machine settings
    pub fn intrusion_config(&self) -> IntrusionConfig {
        IntrusionConfig {
            grace_period: Duration::from_secs(self.alarm.grace_period_s),
            alert_cooldown: Duration::from_secs(self.alarm.alert_cooldown_s),
        }
    }

    /// Notification queue settings
    pub fn notify_config(&self) -> NotifyConfig {
        NotifyConfig {
            site: self.notify.site.clone(),
            backoff_floor: Duration::from_secs(self.notify.backoff_floor_s),
            backoff_cap: Duration::from_secs(self.notify.backoff_cap_s),
        }
    }

    /// Periodic task intervals
    pub fn task_intervals(&self) -> TaskIntervals {
        TaskIntervals {
            rx_poll: Duration::from_millis(self.timing.rx_poll_ms),
            tick: Duration::from_millis(self.timing.tick_ms),
            status: Duration::from_millis(self.timing.status_ms),
        }
    }

    /// Registry offline threshold
    pub fn offline_threshold(&self) -> Duration {
        Duration::from_secs(self.registry.offline_threshold_s)
    }

    /// Peer address book keyed by node id
    pub fn peers(&self) -> std::collections::HashMap<NodeId, SocketAddr> {
        self.transport
            .peers
            .iter()
            .map(|(id, addr)| (NodeId(*id), *addr))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = BoatwatchConfig::default();
        assert_eq!(config.node.id, 0);
        assert_eq!(config.alarm.pin, "1234");
        assert_eq!(config.alarm.grace_period_s, 30);
        assert_eq!(config.alarm.alert_cooldown_s, 300);
        assert_eq!(config.alarm.safety_timeout_s, 600);
        assert_eq!(config.zones, ZoneLimits::default());
        assert_eq!(config.registry.offline_threshold_s, 180);
        assert_eq!(config.notify.site, "Boatwatch");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let yaml_content = r#"
node:
  id: 1
  name: Pier gateway
alarm:
  initial_mode: perimeter
  pin: "86420"
  grace_period_s: 45
zones:
  near_max_cm: 80
  middle_max_cm: 250
  far_max_cm: 500
registry:
  names:
    3: Bow
    4: Cockpit
notify:
  site: Bristol32
transport:
  listen: 127.0.0.1:47101
  peers:
    0: 127.0.0.1:47100
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let config = BoatwatchConfig::load_from_file(temp_file.path()).unwrap();

        assert_eq!(config.node.id, 1);
        assert_eq!(config.node.name, "Pier gateway");
        assert_eq!(config.alarm.initial_mode, AlarmMode::Perimeter);
        assert_eq!(config.alarm.grace_period_s, 45);
        // Unspecified fields keep their defaults
        assert_eq!(config.alarm.alert_cooldown_s, 300);
        assert_eq!(config.zones.near_max_cm, 80);
        assert_eq!(config.registry.names.get(&4).map(String::as_str), Some("Cockpit"));
        assert_eq!(config.notify.site, "Bristol32");
        assert_eq!(
            config.peers().get(&NodeId::HUB),
            Some(&"127.0.0.1:47100".parse().unwrap())
        );
        assert_eq!(
            config.intrusion_config().grace_period,
            Duration::from_secs(45)
        );
    }

    #[test]
    fn test_missing_and_malformed_files_fall_back() {
        let config = BoatwatchConfig::load_from_file("/nonexistent/boatwatch.yaml").unwrap();
        assert_eq!(config.transport.listen, TransportSection::default().listen);

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"alarm: [not, a, map").unwrap();
        let config = BoatwatchConfig::load_from_file(temp_file.path()).unwrap();
        assert_eq!(config.alarm, AlarmSection::default());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("BOATWATCH_NODE_ID", "7"),
            ("BOATWATCH_LISTEN", "not-an-address"),
            ("BOATWATCH_ALARM_PIN", "9999"),
        ]
        .into_iter()
        .collect();

        let mut config = BoatwatchConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.node.id, 7);
        assert_eq!(config.transport.listen, TransportSection::default().listen);
        assert_eq!(config.alarm.pin, "9999");
    }

    #[test]
    fn test_validation() {
        let mut config = BoatwatchConfig::default();
        config.alarm.pin = "12a4".to_string();
        assert!(config.validate().is_err());

        let mut config = BoatwatchConfig::default();
        config.zones.middle_max_cm = config.zones.far_max_cm;
        assert!(config.validate().is_err());

        let mut config = BoatwatchConfig::default();
        config.timing.tick_ms = 0;
        assert!(config.validate().is_err());

        let mut config = BoatwatchConfig::default();
        config.notify.backoff_floor_s = 0;
        assert!(config.validate().is_err());
    }
}
