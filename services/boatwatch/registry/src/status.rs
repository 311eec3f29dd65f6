//! Per-node status records and the partial updates applied to them.

use boatwatch_wire::{EnvironmentalReading, NodeId};
use serde::{Deserialize, Serialize};

/// Fields carried by one received packet.
///
/// `None` leaves the stored value untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContactUpdate {
    /// Temperature (°C)
    pub temperature_c: Option<f32>,
    /// Relative humidity (%)
    pub humidity_pct: Option<f32>,
    /// Pressure (hPa)
    pub pressure_hpa: Option<f32>,
    /// Battery voltage (mV)
    pub battery_mv: Option<u16>,
    /// Signal strength (dBm)
    pub rssi_dbm: Option<i16>,
}

impl ContactUpdate {
    /// Contact with no new fields
    pub fn touch() -> Self {
        Self::default()
    }

    /// All fields of a compact environmental packet
    pub fn environmental(reading: &EnvironmentalReading) -> Self {
        Self {
            temperature_c: Some(reading.temperature_c()),
            humidity_pct: Some(reading.humidity_pct()),
            pressure_hpa: Some(reading.pressure_hpa()),
            battery_mv: Some(reading.battery_mv),
            rssi_dbm: Some(reading.rssi_dbm as i16),
        }
    }

    /// Battery level from a heartbeat
    pub fn heartbeat(battery_mv: u16) -> Self {
        Self {
            battery_mv: Some(battery_mv),
            ..Self::default()
        }
    }

    /// Climate fields without battery or signal
    pub fn climate(temperature_c: f32, humidity_pct: f32, pressure_hpa: f32) -> Self {
        Self {
            temperature_c: Some(temperature_c),
            humidity_pct: Some(humidity_pct),
            pressure_hpa: Some(pressure_hpa),
            ..Self::default()
        }
    }

    /// Attach the receiver-measured signal strength
    pub fn with_rssi(mut self, rssi_dbm: i16) -> Self {
        self.rssi_dbm = Some(rssi_dbm);
        self
    }
}

/// Stored state for one node
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeRecord {
    pub(crate) last_contact_ms: u64,
    pub(crate) temperature_c: Option<f32>,
    pub(crate) humidity_pct: Option<f32>,
    pub(crate) pressure_hpa: Option<f32>,
    pub(crate) battery_mv: Option<u16>,
    pub(crate) rssi_dbm: Option<i16>,
}

impl NodeRecord {
    pub(crate) fn apply(&mut self, update: &ContactUpdate, now_ms: u64) {
        self.last_contact_ms = now_ms;
        if let Some(value) = update.temperature_c {
            self.temperature_c = Some(value);
        }
        if let Some(value) = update.humidity_pct {
            self.humidity_pct = Some(value);
        }
        if let Some(value) = update.pressure_hpa {
            self.pressure_hpa = Some(value);
        }
        if let Some(value) = update.battery_mv {
            self.battery_mv = Some(value);
        }
        if let Some(value) = update.rssi_dbm {
            self.rssi_dbm = Some(value);
        }
    }
}

/// Immutable view of one node, with `online` derived at snapshot time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
    /// Node id
    pub id: NodeId,
    /// Display name
    pub display_name: String,
    /// Time of the last valid packet (ms)
    pub last_contact_ms: u64,
    /// Last temperature (°C)
    pub temperature_c: Option<f32>,
    /// Last relative humidity (%)
    pub humidity_pct: Option<f32>,
    /// Last pressure (hPa)
    pub pressure_hpa: Option<f32>,
    /// Last battery voltage (mV)
    pub battery_mv: Option<u16>,
    /// Last signal strength (dBm)
    pub rssi_dbm: Option<i16>,
    /// Heard from within the offline threshold
    pub online: bool,
}

/// What `record_contact` did to the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactOutcome {
    /// First packet ever from this node
    New,
    /// Node was already online
    Refreshed,
    /// Node had gone offline and is back
    Recovered {
        /// How long it was silent (ms)
        silent_for_ms: u64,
    },
}

/// Default name for a node with no configured name
pub fn default_display_name(id: NodeId) -> String {
    format!("Node {}", id.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_update_keeps_previous_fields() {
        let mut record = NodeRecord::default();
        record.apply(&ContactUpdate::climate(20.0, 50.0, 1000.0), 10);
        record.apply(&ContactUpdate::heartbeat(3600).with_rssi(-90), 20);

        assert_eq!(record.last_contact_ms, 20);
        assert_eq!(record.temperature_c, Some(20.0));
        assert_eq!(record.battery_mv, Some(3600));
        assert_eq!(record.rssi_dbm, Some(-90));
    }

    #[test]
    fn test_environmental_update() {
        let reading = EnvironmentalReading::from_measurements(12.5, 70.0, 1015.0, 3800, -77);
        let update = ContactUpdate::environmental(&reading);
        assert_eq!(update.temperature_c, Some(12.5));
        assert_eq!(update.rssi_dbm, Some(-77));
        assert_eq!(default_display_name(NodeId(3)), "Node 3");
    }
}
