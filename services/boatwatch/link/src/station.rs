//! Periodic tasks shared by the hub and the gateway.
//!
//! A [`Station`] is polled for radio traffic, ticked for timer re-evaluation, and
//! asked for a status report, each on its own interval and in its own task.

use crate::clock;
use crate::error::LinkError;
use crate::transport::{RadioFrame, Transport};
use async_trait::async_trait;
use boatwatch_wire::Profile;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Intervals for the periodic tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskIntervals {
    /// Radio receive poll
    pub rx_poll: Duration,
    /// State machine tick
    pub tick: Duration,
    /// Status report
    pub status: Duration,
}

impl Default for TaskIntervals {
    fn default() -> Self {
        Self {
            rx_poll: Duration::from_millis(10),
            tick: Duration::from_secs(1),
            status: Duration::from_secs(1),
        }
    }
}

/// Something that consumes radio traffic and has timers to re-evaluate
#[async_trait]
pub trait Station: Send + Sync + 'static {
    /// Name for logs
    fn name(&self) -> &'static str;

    /// Wire format received datagrams are decoded as
    fn profile(&self) -> Profile;

    /// Transport the station listens on
    fn transport(&self) -> Arc<dyn Transport>;

    /// Handle one received datagram
    async fn on_frame(&self, frame: RadioFrame, now_ms: u64);

    /// Re-evaluate timers
    async fn on_tick(&self, now_ms: u64);

    /// Emit a status report
    async fn report(&self, now_ms: u64);
}

/// Spawn the receive, tick and status tasks for `station`
pub fn spawn_station<S: Station>(station: Arc<S>, intervals: TaskIntervals) -> Vec<JoinHandle<()>> {
    info!(
        "Starting {} tasks ({} profile, rx {:?}, tick {:?}, status {:?})",
        station.name(),
        station.profile(),
        intervals.rx_poll,
        intervals.tick,
        intervals.status
    );

    let rx_station = station.clone();
    let receive = tokio::spawn(async move {
        let transport = rx_station.transport();
        let mut poll = tokio::time::interval(intervals.rx_poll);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            poll.tick().await;
            // Drain everything that arrived since the last poll, in arrival order
            loop {
                match transport.poll().await {
                    Ok(Some(frame)) => rx_station.on_frame(frame, clock::now_ms()).await,
                    Ok(None) => break,
                    Err(LinkError::Closed) => {
                        error!("{} transport closed, receive task stopping", rx_station.name());
                        return;
                    }
                    Err(e) => {
                        warn!("{} receive error: {}", rx_station.name(), e);
                        break;
                    }
                }
            }
        }
    });

    let tick_station = station.clone();
    let tick = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(intervals.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            tick_station.on_tick(clock::now_ms()).await;
        }
    });

    let status = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(intervals.status);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            station.report(clock::now_ms()).await;
        }
    });

    debug!("Spawned receive, tick and status tasks");
    vec![receive, tick, status]
}
