//! Alarm state for the boatwatch network.
//!
//! Two independent state machines live here:
//!
//! - **Alarm Coordinator**: the hub's system-wide arming mode, triggered flag,
//!   auto-disarm safety timeout, PIN checks, and detection policy
//! - **Intrusion Machine**: the gateway's motion → grace period → intruder alert
//!   sequence with alert cooldown
//!
//! Both take the current time as an argument and return what changed, leaving
//! broadcasts and notifications to the caller. [`SharedAlarm`] and
//! [`SharedIntrusion`] put them behind a lock for use from concurrent tasks.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod coordinator;
pub mod error;
pub mod intrusion;
pub mod lockout;
pub mod policy;
pub mod shared;

// Re-export main types
pub use coordinator::{
    validate_pin, AlarmCoordinator, AlarmEvent, AlarmState, CoordinatorConfig, DetectionOutcome,
    TriggerInfo, DEFAULT_PIN, DEFAULT_SAFETY_TIMEOUT,
};
pub use error::AlarmError;
pub use intrusion::{
    IntrusionConfig, IntrusionMachine, IntrusionNotice, IntrusionSnapshot, IntrusionState,
    DEFAULT_ALERT_COOLDOWN, DEFAULT_GRACE_PERIOD,
};
pub use lockout::{PinLockout, DEFAULT_LOCKOUT_WINDOW, DEFAULT_MAX_ATTEMPTS};
pub use policy::{DetectionDecision, DetectionPolicy, ZoneLimits, DEFAULT_SENSITIVITY};
pub use shared::{SharedAlarm, SharedIntrusion};
