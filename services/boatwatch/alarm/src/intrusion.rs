//! Gateway-side intrusion state machine.
//!
//! Motion while armed opens a grace period for a visitor to be recognized. If the
//! grace period runs out the machine raises an intruder alert, then returns to
//! armed once the alert cooldown has passed with no new alert.
//!
//! Transitions (anything not listed is a no-op):
//!
//! ```text
//! Armed        --motion-->                          GracePeriod  "grace period started"
//! GracePeriod  --motion-->                          GracePeriod  "visitor confirmed"
//! GracePeriod  --tick, now-lastMotion > grace-->    AlarmActive  "intruder alert"
//! AlarmActive  --motion, now-lastAlert > cooldown-> AlarmActive  "additional motion"
//! AlarmActive  --tick, now-lastAlert > cooldown-->  Armed        "alarm reset"
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default grace period before motion becomes an intruder alert
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Default minimum spacing between alerts
pub const DEFAULT_ALERT_COOLDOWN: Duration = Duration::from_secs(300);

/// Intrusion machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntrusionState {
    /// Motion is ignored
    Disarmed,
    /// Waiting for motion
    Armed,
    /// Motion seen, waiting to see if it was a visitor
    GracePeriod,
    /// Intruder alert raised
    AlarmActive,
}

impl fmt::Display for IntrusionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntrusionState::Disarmed => f.write_str("DISARMED"),
            IntrusionState::Armed => f.write_str("ARMED"),
            IntrusionState::GracePeriod => f.write_str("GRACE"),
            IntrusionState::AlarmActive => f.write_str("ALARM"),
        }
    }
}

/// Notification raised by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntrusionNotice {
    /// Armed → GracePeriod
    GraceStarted,
    /// More motion during the grace period
    VisitorConfirmed,
    /// Grace period expired
    IntruderAlert,
    /// Motion during an active alarm, past the cooldown
    AdditionalMotion,
    /// Cooldown expired, back to armed
    AlarmReset,
    /// Operator armed the system
    SystemArmed,
    /// Operator disarmed the system
    SystemDisarmed,
}

impl IntrusionNotice {
    /// Subject tag, shown after the site prefix
    pub fn subject_tag(&self) -> &'static str {
        match self {
            IntrusionNotice::GraceStarted => "NOTICE",
            IntrusionNotice::VisitorConfirmed => "VISITOR",
            IntrusionNotice::IntruderAlert => "INTRUDER ALERT",
            IntrusionNotice::AdditionalMotion => "ALARM UPDATE",
            IntrusionNotice::AlarmReset => "ALARM RESET",
            IntrusionNotice::SystemArmed => "ARMED",
            IntrusionNotice::SystemDisarmed => "DISARMED",
        }
    }

    /// Message body
    pub fn body(&self) -> &'static str {
        match self {
            IntrusionNotice::GraceStarted => "Motion detected - grace period started",
            IntrusionNotice::VisitorConfirmed => "Visitor detected at entrance",
            IntrusionNotice::IntruderAlert => {
                "Motion detected without visitor confirmation - possible intruder!"
            }
            IntrusionNotice::AdditionalMotion => "Additional motion detected during active alarm",
            IntrusionNotice::AlarmReset => "Alarm system reset to armed state",
            IntrusionNotice::SystemArmed => "Intrusion monitoring armed by operator",
            IntrusionNotice::SystemDisarmed => "Intrusion monitoring disarmed by operator",
        }
    }
}

/// Timing settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntrusionConfig {
    /// Time after the first motion before the alert is raised
    pub grace_period: Duration,
    /// Minimum spacing between alerts; also the auto-reset delay
    pub alert_cooldown: Duration,
}

impl Default for IntrusionConfig {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            alert_cooldown: DEFAULT_ALERT_COOLDOWN,
        }
    }
}

/// Immutable view for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrusionSnapshot {
    /// Current state
    pub state: IntrusionState,
    /// Motion that opened the current grace period (ms)
    pub last_motion_ms: Option<u64>,
    /// Last alert raised (ms)
    pub last_alert_ms: Option<u64>,
    /// Most recent motion of any kind (ms)
    pub latest_motion_ms: Option<u64>,
}

/// Motion → grace → intruder state machine
#[derive(Debug, Clone)]
pub struct IntrusionMachine {
    state: IntrusionState,
    last_motion_ms: u64,
    last_alert_ms: u64,
    latest_motion_ms: Option<u64>,
    has_motion: bool,
    has_alert: bool,
    grace_ms: u64,
    cooldown_ms: u64,
}

impl IntrusionMachine {
    /// Create a machine in the `Armed` state
    pub fn new(config: IntrusionConfig) -> Self {
        Self {
            state: IntrusionState::Armed,
            last_motion_ms: 0,
            last_alert_ms: 0,
            latest_motion_ms: None,
            has_motion: false,
            has_alert: false,
            grace_ms: config.grace_period.as_millis() as u64,
            cooldown_ms: config.alert_cooldown.as_millis() as u64,
        }
    }

    /// Current state
    pub fn state(&self) -> IntrusionState {
        self.state
    }

    /// Immutable copy for display
    pub fn snapshot(&self) -> IntrusionSnapshot {
        IntrusionSnapshot {
            state: self.state,
            last_motion_ms: self.has_motion.then_some(self.last_motion_ms),
            last_alert_ms: self.has_alert.then_some(self.last_alert_ms),
            latest_motion_ms: self.latest_motion_ms,
        }
    }

    fn record_alert(&mut self, now_ms: u64) {
        self.last_alert_ms = now_ms;
        self.has_alert = true;
    }

    fn cooldown_passed(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_alert_ms) > self.cooldown_ms
    }

    /// Feed a motion event
    pub fn on_motion(&mut self, now_ms: u64) -> Option<IntrusionNotice> {
        self.latest_motion_ms = Some(now_ms);

        match self.state {
            IntrusionState::Armed => {
                self.state = IntrusionState::GracePeriod;
                self.last_motion_ms = now_ms;
                self.has_motion = true;
                info!("Motion detected - entering grace period");
                Some(IntrusionNotice::GraceStarted)
            }
            IntrusionState::GracePeriod => {
                info!("Visitor confirmed during grace period");
                Some(IntrusionNotice::VisitorConfirmed)
            }
            IntrusionState::AlarmActive if self.cooldown_passed(now_ms) => {
                self.record_alert(now_ms);
                warn!("Additional motion during active alarm");
                Some(IntrusionNotice::AdditionalMotion)
            }
            IntrusionState::AlarmActive | IntrusionState::Disarmed => {
                debug!("Motion ignored in {}", self.state);
                None
            }
        }
    }

    /// Periodic re-evaluation of the grace and cooldown timers
    pub fn tick(&mut self, now_ms: u64) -> Option<IntrusionNotice> {
        match self.state {
            IntrusionState::GracePeriod
                if now_ms.saturating_sub(self.last_motion_ms) > self.grace_ms =>
            {
                self.state = IntrusionState::AlarmActive;
                self.record_alert(now_ms);
                warn!("Grace period expired - INTRUDER ALERT triggered");
                Some(IntrusionNotice::IntruderAlert)
            }
            IntrusionState::AlarmActive if self.cooldown_passed(now_ms) => {
                self.state = IntrusionState::Armed;
                info!("Alarm system reset to armed state");
                Some(IntrusionNotice::AlarmReset)
            }
            _ => None,
        }
    }

    /// Operator arm; clears any grace period or active alarm
    pub fn arm(&mut self) -> Option<IntrusionNotice> {
        if self.state == IntrusionState::Armed {
            return None;
        }
        self.state = IntrusionState::Armed;
        info!("Intrusion monitoring armed");
        Some(IntrusionNotice::SystemArmed)
    }

    /// Operator disarm
    pub fn disarm(&mut self) -> Option<IntrusionNotice> {
        if self.state == IntrusionState::Disarmed {
            return None;
        }
        self.state = IntrusionState::Disarmed;
        info!("Intrusion monitoring disarmed");
        Some(IntrusionNotice::SystemDisarmed)
    }
}

impl Default for IntrusionMachine {
    fn default() -> Self {
        Self::new(IntrusionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOLDOWN: u64 = 300_000;

    #[test]
    fn test_full_scenario() {
        let mut machine = IntrusionMachine::default();
        assert_eq!(machine.state(), IntrusionState::Armed);

        assert_eq!(machine.on_motion(0), Some(IntrusionNotice::GraceStarted));
        assert_eq!(machine.state(), IntrusionState::GracePeriod);

        assert_eq!(machine.tick(29_999), None);
        assert_eq!(machine.state(), IntrusionState::GracePeriod);

        assert_eq!(machine.tick(30_001), Some(IntrusionNotice::IntruderAlert));
        assert_eq!(machine.state(), IntrusionState::AlarmActive);
        assert_eq!(machine.snapshot().last_alert_ms, Some(30_001));

        assert_eq!(machine.tick(30_001 + COOLDOWN), None);
        assert_eq!(
            machine.tick(30_001 + COOLDOWN + 1),
            Some(IntrusionNotice::AlarmReset)
        );
        assert_eq!(machine.state(), IntrusionState::Armed);
    }

    #[test]
    fn test_grace_timer_not_restarted_by_motion() {
        let mut machine = IntrusionMachine::default();
        machine.on_motion(0);
        assert_eq!(machine.on_motion(20_000), Some(IntrusionNotice::VisitorConfirmed));

        let snapshot = machine.snapshot();
        assert_eq!(snapshot.last_motion_ms, Some(0));
        assert_eq!(snapshot.latest_motion_ms, Some(20_000));

        // Measured from the first motion
        assert_eq!(machine.tick(30_001), Some(IntrusionNotice::IntruderAlert));
    }

    #[test]
    fn test_alarm_active_motion_respects_cooldown() {
        let mut machine = IntrusionMachine::default();
        machine.on_motion(0);
        machine.tick(31_000);

        assert_eq!(machine.on_motion(100_000), None);
        assert_eq!(machine.snapshot().last_alert_ms, Some(31_000));

        let later = 31_000 + COOLDOWN + 1;
        assert_eq!(machine.on_motion(later), Some(IntrusionNotice::AdditionalMotion));
        assert_eq!(machine.snapshot().last_alert_ms, Some(later));
        assert_eq!(machine.state(), IntrusionState::AlarmActive);

        // The refreshed alert postpones the reset
        assert_eq!(machine.tick(later + COOLDOWN), None);
        assert_eq!(machine.tick(later + COOLDOWN + 1), Some(IntrusionNotice::AlarmReset));
    }

    #[test]
    fn test_noop_pairs() {
        let mut machine = IntrusionMachine::default();
        assert_eq!(machine.tick(1_000_000), None);
        assert_eq!(machine.state(), IntrusionState::Armed);

        machine.disarm();
        assert_eq!(machine.on_motion(5), None);
        assert_eq!(machine.tick(10_000_000), None);
        assert_eq!(machine.state(), IntrusionState::Disarmed);
        assert_eq!(machine.snapshot().latest_motion_ms, Some(5));
    }

    #[test]
    fn test_operator_transitions() {
        let mut machine = IntrusionMachine::default();
        assert_eq!(machine.arm(), None);
        assert_eq!(machine.disarm(), Some(IntrusionNotice::SystemDisarmed));
        assert_eq!(machine.disarm(), None);
        assert_eq!(machine.arm(), Some(IntrusionNotice::SystemArmed));

        machine.on_motion(0);
        assert_eq!(machine.arm(), Some(IntrusionNotice::SystemArmed));
        assert_eq!(machine.tick(60_000), None);
    }

    #[test]
    fn test_notice_text() {
        assert_eq!(IntrusionNotice::IntruderAlert.subject_tag(), "INTRUDER ALERT");
        assert_eq!(
            IntrusionNotice::GraceStarted.body(),
            "Motion detected - grace period started"
        );
        assert_eq!(IntrusionState::GracePeriod.to_string(), "GRACE");
    }

    #[test]
    fn test_custom_timing() {
        let mut machine = IntrusionMachine::new(IntrusionConfig {
            grace_period: Duration::from_secs(5),
            alert_cooldown: Duration::from_secs(10),
        });
        machine.on_motion(1_000);
        assert_eq!(machine.tick(6_001), Some(IntrusionNotice::IntruderAlert));
        assert_eq!(machine.tick(16_002), Some(IntrusionNotice::AlarmReset));
    }
}
