//! Radio plumbing for the boatwatch network.
//!
//! This crate connects the wire formats to the state machines:
//!
//! - [`Transport`]: send and poll datagrams keyed by node address, with an
//!   in-memory ([`ChannelAir`]) and a UDP ([`UdpTransport`]) adapter
//! - [`Hub`]: compact-format dispatch into the registry and alarm coordinator
//! - [`Gateway`]: telemetry-format dispatch into the intrusion machine
//! - [`CompactNode`] and [`TelemetryNode`]: the sensor side of both formats
//! - [`spawn_station`]: receive, tick and status tasks for a hub or gateway
//!
//! ## Example
//!
//! ```rust
//! use boatwatch_link::{ChannelAir, CompactNode, Delivery, Transport};
//! use boatwatch_alarm::ZoneLimits;
//! use boatwatch_wire::NodeId;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let air = ChannelAir::new();
//! let hub = air.attach(NodeId::HUB);
//! let radio = air.attach(NodeId(3));
//!
//! let node = CompactNode::new(3, ZoneLimits::default());
//! radio.send(NodeId::HUB, &node.heartbeat(3650)?, Delivery::BestEffort).await?;
//!
//! let frame = hub.poll().await?.expect("heartbeat delivered");
//! assert_eq!(frame.from, NodeId(3));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod error;
pub mod gateway;
pub mod hub;
pub mod node;
pub mod station;
pub mod stats;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export main types
pub use error::LinkError;
pub use gateway::{Gateway, GatewayStatus, NodeReadings};
pub use hub::{Hub, HubStatus};
pub use node::{CompactNode, NodeCommand, TelemetryNode, DEFAULT_MOTION_REFRACTORY};
pub use station::{spawn_station, Station, TaskIntervals};
pub use stats::{LinkCounters, LinkStats};
pub use transport::{
    ChannelAir, ChannelTransport, Delivery, RadioFrame, Transport, UdpTransport,
    MAX_DATAGRAM_SIZE,
};
