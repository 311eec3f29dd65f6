//! Shared handles for the concurrent tasks.
//!
//! Each state machine sits behind one `RwLock`; mutations take the write lock for
//! the duration of a single operation and readers receive copies.

use crate::coordinator::{AlarmCoordinator, AlarmEvent, AlarmState, DetectionOutcome};
use crate::error::AlarmError;
use crate::intrusion::{IntrusionMachine, IntrusionNotice, IntrusionSnapshot};
use boatwatch_wire::{AlarmMode, Detection, NodeId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Cloneable handle to the hub's alarm coordinator
#[derive(Debug, Clone)]
pub struct SharedAlarm {
    inner: Arc<RwLock<AlarmCoordinator>>,
}

impl SharedAlarm {
    /// Wrap a coordinator
    pub fn new(coordinator: AlarmCoordinator) -> Self {
        Self {
            inner: Arc::new(RwLock::new(coordinator)),
        }
    }

    /// State copy
    pub async fn snapshot(&self) -> AlarmState {
        self.inner.read().await.state()
    }

    /// See [`AlarmCoordinator::arm`]
    pub async fn arm(&self, mode: AlarmMode) -> AlarmEvent {
        self.inner.write().await.arm(mode)
    }

    /// See [`AlarmCoordinator::disarm`]
    pub async fn disarm(&self) -> AlarmEvent {
        self.inner.write().await.disarm()
    }

    /// See [`AlarmCoordinator::trigger`]
    pub async fn trigger(&self, node: NodeId, now_ms: u64) -> Option<AlarmEvent> {
        self.inner.write().await.trigger(node, now_ms)
    }

    /// See [`AlarmCoordinator::silence`]
    pub async fn silence(&self) -> Option<AlarmEvent> {
        self.inner.write().await.silence()
    }

    /// See [`AlarmCoordinator::tick`]
    pub async fn tick(&self, now_ms: u64) -> Option<AlarmEvent> {
        self.inner.write().await.tick(now_ms)
    }

    /// See [`AlarmCoordinator::alarm_duration`]
    pub async fn alarm_duration(&self, now_ms: u64) -> Duration {
        self.inner.read().await.alarm_duration(now_ms)
    }

    /// See [`AlarmCoordinator::verify_pin`]
    pub async fn verify_pin(&self, pin: &str, now_ms: u64) -> Result<(), AlarmError> {
        self.inner.write().await.verify_pin(pin, now_ms)
    }

    /// See [`AlarmCoordinator::arm_with_pin`]
    pub async fn arm_with_pin(
        &self,
        mode: AlarmMode,
        pin: &str,
        now_ms: u64,
    ) -> Result<AlarmEvent, AlarmError> {
        self.inner.write().await.arm_with_pin(mode, pin, now_ms)
    }

    /// See [`AlarmCoordinator::disarm_with_pin`]
    pub async fn disarm_with_pin(&self, pin: &str, now_ms: u64) -> Result<AlarmEvent, AlarmError> {
        self.inner.write().await.disarm_with_pin(pin, now_ms)
    }

    /// See [`AlarmCoordinator::change_pin`]
    pub async fn change_pin(&self, old: &str, new: &str, now_ms: u64) -> Result<(), AlarmError> {
        self.inner.write().await.change_pin(old, new, now_ms)
    }

    /// See [`AlarmCoordinator::on_detection`]
    pub async fn on_detection(
        &self,
        node: NodeId,
        detection: &Detection,
        now_ms: u64,
    ) -> DetectionOutcome {
        self.inner.write().await.on_detection(node, detection, now_ms)
    }
}

/// Cloneable handle to the gateway's intrusion machine
#[derive(Debug, Clone)]
pub struct SharedIntrusion {
    inner: Arc<RwLock<IntrusionMachine>>,
}

impl SharedIntrusion {
    /// Wrap a machine
    pub fn new(machine: IntrusionMachine) -> Self {
        Self {
            inner: Arc::new(RwLock::new(machine)),
        }
    }

    /// Display copy
    pub async fn snapshot(&self) -> IntrusionSnapshot {
        self.inner.read().await.snapshot()
    }

    /// See [`IntrusionMachine::on_motion`]
    pub async fn on_motion(&self, now_ms: u64) -> Option<IntrusionNotice> {
        self.inner.write().await.on_motion(now_ms)
    }

    /// See [`IntrusionMachine::tick`]
    pub async fn tick(&self, now_ms: u64) -> Option<IntrusionNotice> {
        self.inner.write().await.tick(now_ms)
    }

    /// See [`IntrusionMachine::arm`]
    pub async fn arm(&self) -> Option<IntrusionNotice> {
        self.inner.write().await.arm()
    }

    /// See [`IntrusionMachine::disarm`]
    pub async fn disarm(&self) -> Option<IntrusionNotice> {
        self.inner.write().await.disarm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intrusion::IntrusionState;

    #[tokio::test]
    async fn test_shared_alarm_clones_see_same_state() {
        let alarm = SharedAlarm::new(AlarmCoordinator::default());
        let other = alarm.clone();

        alarm.arm(AlarmMode::Full).await;
        assert!(other.trigger(NodeId(1), 10).await.is_some());
        assert_eq!(alarm.snapshot().await.triggering_node(), Some(NodeId(1)));
        assert_eq!(alarm.alarm_duration(1_010).await, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_concurrent_triggers_record_one() {
        let alarm = SharedAlarm::new(AlarmCoordinator::default());
        alarm.arm(AlarmMode::Full).await;

        let mut handles = Vec::new();
        for node in 1..=8u16 {
            let alarm = alarm.clone();
            handles.push(tokio::spawn(async move {
                alarm.trigger(NodeId(node), node as u64).await
            }));
        }

        let mut events = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                events += 1;
            }
        }
        assert_eq!(events, 1);
        assert!(alarm.snapshot().await.is_triggered());
    }

    #[tokio::test]
    async fn test_shared_intrusion() {
        let intrusion = SharedIntrusion::new(IntrusionMachine::default());
        assert_eq!(intrusion.on_motion(0).await, Some(IntrusionNotice::GraceStarted));
        assert_eq!(intrusion.snapshot().await.state, IntrusionState::GracePeriod);
        assert_eq!(intrusion.disarm().await, Some(IntrusionNotice::SystemDisarmed));
    }
}
