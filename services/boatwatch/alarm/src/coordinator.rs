//! Hub-side alarm coordinator.
//!
//! Owns the system arming mode and the triggered flag. Every mutation returns an
//! [`AlarmEvent`] so the caller can broadcast the new mode to the nodes and raise
//! notifications; the coordinator itself performs no I/O.

use crate::error::AlarmError;
use crate::lockout::{PinLockout, DEFAULT_LOCKOUT_WINDOW, DEFAULT_MAX_ATTEMPTS};
use crate::policy::{DetectionDecision, DetectionPolicy, DEFAULT_SENSITIVITY};
use boatwatch_wire::{AlarmMode, Detection, NodeId};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Triggered alarm auto-disarms after this long
pub const DEFAULT_SAFETY_TIMEOUT: Duration = Duration::from_secs(600);

/// Factory PIN
pub const DEFAULT_PIN: &str = "1234";

/// Coordinator settings
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Mode at startup
    pub initial_mode: AlarmMode,
    /// Auto-disarm ceiling for a triggered alarm
    pub safety_timeout: Duration,
    /// PIN for remote arm/disarm
    pub pin: String,
    /// Detector sensitivity (0-100)
    pub sensitivity: u8,
    /// Failed PIN attempts before lockout
    pub max_pin_attempts: u32,
    /// Lockout window
    pub lockout_window: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            initial_mode: AlarmMode::Disarmed,
            safety_timeout: DEFAULT_SAFETY_TIMEOUT,
            pin: DEFAULT_PIN.to_string(),
            sensitivity: DEFAULT_SENSITIVITY,
            max_pin_attempts: DEFAULT_MAX_ATTEMPTS,
            lockout_window: DEFAULT_LOCKOUT_WINDOW,
        }
    }
}

/// Who tripped the alarm and when
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerInfo {
    /// Node that reported the event
    pub node: NodeId,
    /// Time of the first trigger (ms)
    pub at_ms: u64,
}

/// Snapshot of the coordinator state.
///
/// `trigger` is `Some` only while triggered, which is never the case in
/// [`AlarmMode::Disarmed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AlarmState {
    /// Current mode
    pub mode: AlarmMode,
    /// Active trigger, if any
    pub trigger: Option<TriggerInfo>,
}

impl AlarmState {
    /// Whether the alarm is sounding
    pub fn is_triggered(&self) -> bool {
        self.trigger.is_some()
    }

    /// Node that tripped the alarm
    pub fn triggering_node(&self) -> Option<NodeId> {
        self.trigger.map(|t| t.node)
    }

    /// Time the alarm tripped (ms)
    pub fn triggered_at_ms(&self) -> Option<u64> {
        self.trigger.map(|t| t.at_ms)
    }
}

/// State change produced by a coordinator operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmEvent {
    /// System armed (or re-armed) in `mode`
    Armed {
        /// New mode
        mode: AlarmMode,
        /// Mode before the change
        previous: AlarmMode,
    },
    /// System disarmed
    Disarmed {
        /// Mode before the change
        previous: AlarmMode,
        /// Whether an alarm was sounding
        was_triggered: bool,
    },
    /// Alarm tripped for the first time since arming
    Triggered {
        /// Node that reported the event
        node: NodeId,
        /// Mode in effect
        mode: AlarmMode,
    },
    /// Sounding alarm silenced, mode kept
    Silenced {
        /// Mode in effect
        mode: AlarmMode,
    },
    /// Triggered alarm exceeded the safety ceiling and was disarmed
    AutoTimeout {
        /// Node that had tripped it
        node: NodeId,
        /// How long it had been sounding
        after: Duration,
    },
}

/// Result of feeding a detection through the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionOutcome {
    /// Policy decision
    pub decision: DetectionDecision,
    /// State change, when the detection tripped the alarm
    pub event: Option<AlarmEvent>,
}

/// Alarm coordinator state machine
#[derive(Debug)]
pub struct AlarmCoordinator {
    state: AlarmState,
    safety_timeout_ms: u64,
    pin: String,
    lockout: PinLockout,
    policy: DetectionPolicy,
}

impl AlarmCoordinator {
    /// Create a coordinator
    pub fn new(config: CoordinatorConfig) -> Self {
        info!("Alarm coordinator initialized in {}", config.initial_mode);
        Self {
            state: AlarmState {
                mode: config.initial_mode,
                trigger: None,
            },
            safety_timeout_ms: config.safety_timeout.as_millis() as u64,
            pin: config.pin,
            lockout: PinLockout::new(config.max_pin_attempts, config.lockout_window),
            policy: DetectionPolicy::new(config.sensitivity),
        }
    }

    /// Immutable copy of the state
    pub fn state(&self) -> AlarmState {
        self.state
    }

    /// Current mode
    pub fn mode(&self) -> AlarmMode {
        self.state.mode
    }

    /// Detection policy in effect
    pub fn policy(&self) -> DetectionPolicy {
        self.policy
    }

    /// Arm in `mode`; re-arming silences a sounding alarm.
    ///
    /// Arming in [`AlarmMode::Disarmed`] is a disarm.
    pub fn arm(&mut self, mode: AlarmMode) -> AlarmEvent {
        if mode == AlarmMode::Disarmed {
            return self.disarm();
        }

        let previous = self.state.mode;
        self.state = AlarmState {
            mode,
            trigger: None,
        };
        info!("System armed: {}", mode);
        AlarmEvent::Armed { mode, previous }
    }

    /// Disarm and clear any trigger
    pub fn disarm(&mut self) -> AlarmEvent {
        let previous = self.state.mode;
        let was_triggered = self.state.is_triggered();
        self.state = AlarmState::default();
        info!("System disarmed");
        AlarmEvent::Disarmed {
            previous,
            was_triggered,
        }
    }

    /// Trip the alarm.
    ///
    /// No-op while disarmed. Only the first trigger after arming is recorded;
    /// later ones return `None` and keep the original node and timestamp.
    pub fn trigger(&mut self, node: NodeId, now_ms: u64) -> Option<AlarmEvent> {
        if self.state.mode == AlarmMode::Disarmed {
            debug!("Ignoring trigger from node {} while disarmed", node);
            return None;
        }
        if self.state.is_triggered() {
            return None;
        }

        self.state.trigger = Some(TriggerInfo { node, at_ms: now_ms });
        warn!("ALARM TRIGGERED by node {}", node);
        Some(AlarmEvent::Triggered {
            node,
            mode: self.state.mode,
        })
    }

    /// Silence a sounding alarm without changing the mode
    pub fn silence(&mut self) -> Option<AlarmEvent> {
        self.state.trigger.take()?;
        info!("Alarm silenced, staying in {}", self.state.mode);
        Some(AlarmEvent::Silenced {
            mode: self.state.mode,
        })
    }

    /// Periodic re-evaluation; disarms once the safety ceiling is exceeded
    pub fn tick(&mut self, now_ms: u64) -> Option<AlarmEvent> {
        let trigger = self.state.trigger?;
        let elapsed = now_ms.saturating_sub(trigger.at_ms);
        if elapsed <= self.safety_timeout_ms {
            return None;
        }

        warn!("Alarm auto-timeout after {} ms", elapsed);
        self.state = AlarmState::default();
        Some(AlarmEvent::AutoTimeout {
            node: trigger.node,
            after: Duration::from_millis(elapsed),
        })
    }

    /// How long the alarm has been sounding; zero when not triggered
    pub fn alarm_duration(&self, now_ms: u64) -> Duration {
        self.state
            .trigger
            .map(|t| Duration::from_millis(now_ms.saturating_sub(t.at_ms)))
            .unwrap_or_default()
    }

    /// Check a PIN against the stored one, honoring the attempt limiter
    pub fn verify_pin(&mut self, pin: &str, now_ms: u64) -> Result<(), AlarmError> {
        if let Some(retry_after_ms) = self.lockout.locked_for(now_ms) {
            warn!("PIN attempt refused, locked for {} ms", retry_after_ms);
            return Err(AlarmError::LockedOut { retry_after_ms });
        }

        if pin != self.pin {
            let remaining = self.lockout.record_failure(now_ms);
            warn!("PIN mismatch ({} attempts left)", remaining);
            return Err(AlarmError::Authorization { remaining });
        }

        self.lockout.record_success();
        Ok(())
    }

    /// Arm after checking the PIN
    pub fn arm_with_pin(
        &mut self,
        mode: AlarmMode,
        pin: &str,
        now_ms: u64,
    ) -> Result<AlarmEvent, AlarmError> {
        self.verify_pin(pin, now_ms)?;
        Ok(self.arm(mode))
    }

    /// Disarm after checking the PIN
    pub fn disarm_with_pin(&mut self, pin: &str, now_ms: u64) -> Result<AlarmEvent, AlarmError> {
        self.verify_pin(pin, now_ms)?;
        Ok(self.disarm())
    }

    /// Replace the PIN; the new one must be 4 to 8 digits
    pub fn change_pin(&mut self, old: &str, new: &str, now_ms: u64) -> Result<(), AlarmError> {
        self.verify_pin(old, now_ms)?;
        validate_pin(new)?;
        self.pin = new.to_string();
        info!("Alarm PIN changed");
        Ok(())
    }

    /// Apply the detection policy to an event reported by `node`
    pub fn on_detection(
        &mut self,
        node: NodeId,
        detection: &Detection,
        now_ms: u64,
    ) -> DetectionOutcome {
        let decision = self.policy.decide(self.state.mode, detection);
        let event = match decision {
            DetectionDecision::Trigger { .. } => self.trigger(node, now_ms),
            DetectionDecision::Chime => {
                info!("Doorbell at node {}", node);
                None
            }
            DetectionDecision::Ignore => {
                debug!(
                    "Detection from node {} ignored (confidence {}, mode {})",
                    node, detection.confidence, self.state.mode
                );
                None
            }
        };
        DetectionOutcome { decision, event }
    }
}

impl Default for AlarmCoordinator {
    fn default() -> Self {
        Self::new(CoordinatorConfig::default())
    }
}

/// Check that a PIN is 4 to 8 ASCII digits
pub fn validate_pin(pin: &str) -> Result<(), AlarmError> {
    if !(4..=8).contains(&pin.len()) {
        return Err(AlarmError::InvalidPin("must be 4 to 8 digits"));
    }
    if !pin.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AlarmError::InvalidPin("must contain digits only"));
    }
    Ok(())
}
