//! Node table shared by the receive path and the status reporter.

use crate::status::{default_display_name, ContactOutcome, ContactUpdate, NodeRecord, NodeStatus};
use boatwatch_wire::NodeId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Default offline threshold: three missed 60 s heartbeats
pub const DEFAULT_OFFLINE_THRESHOLD: Duration = Duration::from_secs(180);

#[derive(Debug, Default)]
struct Table {
    records: HashMap<NodeId, NodeRecord>,
    names: HashMap<NodeId, String>,
}

/// Tracks every node heard on the network.
///
/// Entries are created by the first valid packet and never removed; a silent node
/// simply reports `online == false`.
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    table: Arc<RwLock<Table>>,
    offline_threshold_ms: u64,
}

impl NodeRegistry {
    /// Create a registry with the given offline threshold
    pub fn new(offline_threshold: Duration) -> Self {
        Self {
            table: Arc::new(RwLock::new(Table::default())),
            offline_threshold_ms: offline_threshold.as_millis() as u64,
        }
    }

    /// Offline threshold in effect
    pub fn offline_threshold(&self) -> Duration {
        Duration::from_millis(self.offline_threshold_ms)
    }

    fn online_at(&self, last_contact_ms: u64, now_ms: u64) -> bool {
        now_ms.saturating_sub(last_contact_ms) < self.offline_threshold_ms
    }

    /// Record a valid packet from `id`, creating the entry if needed
    pub async fn record_contact(
        &self,
        id: NodeId,
        update: ContactUpdate,
        now_ms: u64,
    ) -> ContactOutcome {
        let mut table = self.table.write().await;

        let outcome = match table.records.get(&id) {
            None => ContactOutcome::New,
            Some(record) if self.online_at(record.last_contact_ms, now_ms) => {
                ContactOutcome::Refreshed
            }
            Some(record) => ContactOutcome::Recovered {
                silent_for_ms: now_ms.saturating_sub(record.last_contact_ms),
            },
        };

        table.records.entry(id).or_default().apply(&update, now_ms);

        match outcome {
            ContactOutcome::New => info!("Discovered node {}", id),
            ContactOutcome::Recovered { silent_for_ms } => {
                info!("Node {} back online after {} ms silence", id, silent_for_ms)
            }
            ContactOutcome::Refreshed => debug!("Contact from node {}", id),
        }

        outcome
    }

    /// Whether `id` has been heard within the threshold
    pub async fn is_online(&self, id: NodeId, now_ms: u64) -> bool {
        let table = self.table.read().await;
        table
            .records
            .get(&id)
            .map(|record| self.online_at(record.last_contact_ms, now_ms))
            .unwrap_or(false)
    }

    /// Set the name shown for `id`; applies whether or not it has been heard yet
    pub async fn set_display_name(&self, id: NodeId, name: impl Into<String>) {
        let mut table = self.table.write().await;
        table.names.insert(id, name.into());
    }

    /// Status of one node
    pub async fn get(&self, id: NodeId, now_ms: u64) -> Option<NodeStatus> {
        let table = self.table.read().await;
        table
            .records
            .get(&id)
            .map(|record| self.status_of(&table, id, record, now_ms))
    }

    /// Status of every known node, ordered by id
    pub async fn snapshot(&self, now_ms: u64) -> Vec<NodeStatus> {
        let table = self.table.read().await;
        let mut nodes: Vec<NodeStatus> = table
            .records
            .iter()
            .map(|(id, record)| self.status_of(&table, *id, record, now_ms))
            .collect();
        nodes.sort_by_key(|status| status.id);
        nodes
    }

    /// Number of known nodes
    pub async fn len(&self) -> usize {
        self.table.read().await.records.len()
    }

    /// Whether no node has been heard yet
    pub async fn is_empty(&self) -> bool {
        self.table.read().await.records.is_empty()
    }

    fn status_of(&self, table: &Table, id: NodeId, record: &NodeRecord, now_ms: u64) -> NodeStatus {
        NodeStatus {
            id,
            display_name: table
                .names
                .get(&id)
                .cloned()
                .unwrap_or_else(|| default_display_name(id)),
            last_contact_ms: record.last_contact_ms,
            temperature_c: record.temperature_c,
            humidity_pct: record.humidity_pct,
            pressure_hpa: record.pressure_hpa,
            battery_mv: record.battery_mv,
            rssi_dbm: record.rssi_dbm,
            online: self.online_at(record.last_contact_ms, now_ms),
        }
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_OFFLINE_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: u64 = 1_000_000;
    const THRESHOLD: u64 = 180_000;

    #[tokio::test]
    async fn test_online_boundary() {
        let registry = NodeRegistry::default();
        let id = NodeId(1);

        assert_eq!(
            registry.record_contact(id, ContactUpdate::touch(), T0).await,
            ContactOutcome::New
        );

        assert!(registry.is_online(id, T0).await);
        assert!(registry.is_online(id, T0 + THRESHOLD - 1).await);
        assert!(!registry.is_online(id, T0 + THRESHOLD).await);
        assert!(!registry.is_online(id, T0 + THRESHOLD + 60_000).await);
    }

    #[tokio::test]
    async fn test_contact_restores_online() {
        let registry = NodeRegistry::default();
        let id = NodeId(2);
        registry.record_contact(id, ContactUpdate::heartbeat(3500), T0).await;

        let later = T0 + THRESHOLD + 5_000;
        assert!(!registry.is_online(id, later).await);

        let outcome = registry.record_contact(id, ContactUpdate::touch(), later).await;
        assert_eq!(
            outcome,
            ContactOutcome::Recovered {
                silent_for_ms: THRESHOLD + 5_000
            }
        );
        assert!(registry.is_online(id, later).await);

        let status = registry.get(id, later).await.unwrap();
        assert_eq!(status.battery_mv, Some(3500));
        assert_eq!(status.last_contact_ms, later);
    }

    #[tokio::test]
    async fn test_refresh_within_threshold() {
        let registry = NodeRegistry::default();
        let id = NodeId(3);
        registry.record_contact(id, ContactUpdate::touch(), T0).await;
        assert_eq!(
            registry.record_contact(id, ContactUpdate::touch(), T0 + 60_000).await,
            ContactOutcome::Refreshed
        );
    }

    #[tokio::test]
    async fn test_unknown_node_is_offline() {
        let registry = NodeRegistry::default();
        assert!(!registry.is_online(NodeId(9), T0).await);
        assert!(registry.get(NodeId(9), T0).await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_snapshot_names_and_order() {
        let registry = NodeRegistry::new(Duration::from_secs(10));
        registry.set_display_name(NodeId(2), "Cockpit").await;
        registry.record_contact(NodeId(2), ContactUpdate::touch(), T0).await;
        registry
            .record_contact(NodeId(1), ContactUpdate::climate(19.5, 60.0, 1012.0), T0 + 9_000)
            .await;

        let snapshot = registry.snapshot(T0 + 10_000).await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id, NodeId(1));
        assert_eq!(snapshot[0].display_name, "Node 1");
        assert!(snapshot[0].online);
        assert_eq!(snapshot[1].display_name, "Cockpit");
        assert!(!snapshot[1].online);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_never_removed() {
        let registry = NodeRegistry::default();
        registry.record_contact(NodeId(4), ContactUpdate::touch(), 0).await;
        let snapshot = registry.snapshot(u64::MAX).await;
        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot[0].online);
    }
}
