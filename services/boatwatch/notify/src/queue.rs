//! Notification queue with a single retrying delivery worker.
//!
//! Submissions go into an unbounded channel and return immediately. One worker
//! takes them in order and keeps retrying the head item with exponential backoff
//! until the mailer accepts it, so nothing is dropped once submitted.

use crate::mailer::{Mailer, Notification};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// First retry delay
pub const DEFAULT_BACKOFF_FLOOR: Duration = Duration::from_secs(10);

/// Shortest floor a [`Backoff`] accepts
pub const MIN_BACKOFF_FLOOR: Duration = Duration::from_secs(1);

/// Retry delay ceiling
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(600);

/// Queue settings
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// Site name used as the subject prefix
    pub site: String,
    /// First retry delay
    pub backoff_floor: Duration,
    /// Retry delay ceiling
    pub backoff_cap: Duration,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            site: "Boatwatch".to_string(),
            backoff_floor: DEFAULT_BACKOFF_FLOOR,
            backoff_cap: DEFAULT_BACKOFF_CAP,
        }
    }
}

/// Doubling retry delay between a floor and a cap
#[derive(Debug, Clone)]
pub struct Backoff {
    floor: Duration,
    cap: Duration,
    current: Duration,
}

impl Backoff {
    /// Create a backoff starting at `floor`, raised to [`MIN_BACKOFF_FLOOR`]
    pub fn new(floor: Duration, cap: Duration) -> Self {
        let floor = floor.max(MIN_BACKOFF_FLOOR);
        let cap = cap.max(floor);
        Self {
            floor,
            cap,
            current: floor,
        }
    }

    /// Delay to wait now; the following delay doubles up to the cap
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self
            .current
            .checked_mul(2)
            .map_or(self.cap, |doubled| doubled.min(self.cap));
        delay
    }

    /// Back to the floor after a success
    pub fn reset(&mut self) {
        self.current = self.floor;
    }
}

/// Delivery counters
#[derive(Debug, Default)]
pub struct DeliveryStats {
    submitted: AtomicU64,
    attempts: AtomicU64,
    delivered: AtomicU64,
    failed_attempts: AtomicU64,
}

/// Point-in-time copy of [`DeliveryStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryCounters {
    /// Notifications accepted by `submit`
    pub submitted: u64,
    /// Calls to the mailer
    pub attempts: u64,
    /// Notifications delivered
    pub delivered: u64,
    /// Mailer calls that failed
    pub failed_attempts: u64,
}

impl DeliveryCounters {
    /// Submitted but not yet delivered
    pub fn pending(&self) -> u64 {
        self.submitted.saturating_sub(self.delivered)
    }
}

impl DeliveryStats {
    /// Copy the counters
    pub fn snapshot(&self) -> DeliveryCounters {
        DeliveryCounters {
            submitted: self.submitted.load(Ordering::SeqCst),
            attempts: self.attempts.load(Ordering::SeqCst),
            delivered: self.delivered.load(Ordering::SeqCst),
            failed_attempts: self.failed_attempts.load(Ordering::SeqCst),
        }
    }
}

/// Anything that accepts notifications without blocking
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Queue a notification with a full subject line
    fn submit(&self, subject: &str, body: &str);

    /// Queue a notification whose subject is `"[<site>] <tag>"`
    fn alert(&self, tag: &str, body: &str);
}

/// Handle to the notification queue
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    site: Arc<str>,
    tx: mpsc::UnboundedSender<Notification>,
    stats: Arc<DeliveryStats>,
}

impl NotificationQueue {
    /// Start the delivery worker and return the queue handle.
    ///
    /// The worker runs until every handle is dropped and the queue is drained.
    pub fn start(config: NotifyConfig, mailer: Arc<dyn Mailer>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(DeliveryStats::default());
        let backoff = Backoff::new(config.backoff_floor, config.backoff_cap);

        info!(
            "Starting notification worker (mailer: {}, backoff {:?}..{:?})",
            mailer.name(),
            config.backoff_floor,
            config.backoff_cap
        );
        let worker = tokio::spawn(run_worker(rx, mailer, backoff, stats.clone()));

        let queue = Self {
            site: Arc::from(config.site.as_str()),
            tx,
            stats,
        };
        (queue, worker)
    }

    /// Subject line for a tag
    pub fn subject_for(&self, tag: &str) -> String {
        format!("[{}] {}", self.site, tag)
    }

    /// Counter snapshot
    pub fn counters(&self) -> DeliveryCounters {
        self.stats.snapshot()
    }

    fn enqueue(&self, notification: Notification) {
        self.stats.submitted.fetch_add(1, Ordering::SeqCst);
        debug!("Queued notification '{}'", notification.subject);
        if let Err(e) = self.tx.send(notification) {
            // Only possible after the worker task has panicked or been aborted
            error!("Notification worker gone, '{}' not queued", e.0.subject);
        }
    }
}

impl Notifier for NotificationQueue {
    fn submit(&self, subject: &str, body: &str) {
        self.enqueue(Notification::new(subject, body));
    }

    fn alert(&self, tag: &str, body: &str) {
        self.enqueue(Notification::new(self.subject_for(tag), body));
    }
}

async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<Notification>,
    mailer: Arc<dyn Mailer>,
    mut backoff: Backoff,
    stats: Arc<DeliveryStats>,
) {
    while let Some(notification) = rx.recv().await {
        loop {
            stats.attempts.fetch_add(1, Ordering::SeqCst);
            match mailer.deliver(&notification).await {
                Ok(()) => {
                    stats.delivered.fetch_add(1, Ordering::SeqCst);
                    backoff.reset();
                    debug!("Delivered notification '{}'", notification.subject);
                    break;
                }
                Err(e) => {
                    stats.failed_attempts.fetch_add(1, Ordering::SeqCst);
                    let delay = backoff.next_delay();
                    warn!(
                        "Delivery of '{}' failed: {} (retrying in {:?})",
                        notification.subject, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    info!("Notification worker stopped");
}
