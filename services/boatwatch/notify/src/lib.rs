//! Notification dispatch for boatwatch.
//!
//! Alarm transitions submit notifications without waiting; a background worker
//! delivers them through a pluggable [`Mailer`], retrying with exponential
//! backoff (10 s floor, doubling, 10 min cap) until each one goes through.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod mailer;
pub mod queue;

// Re-export main types
pub use mailer::{DeliveryError, LogMailer, Mailer, Notification};
pub use queue::{
    Backoff, DeliveryCounters, DeliveryStats, NotificationQueue, Notifier, NotifyConfig,
    DEFAULT_BACKOFF_CAP, DEFAULT_BACKOFF_FLOOR, MIN_BACKOFF_FLOOR,
};
