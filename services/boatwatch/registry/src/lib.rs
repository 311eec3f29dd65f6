//! Known-node table for the boatwatch network.
//!
//! Every valid packet attributed to a node refreshes its entry; online status is
//! derived from the time since that node's last contact and is never stored.
//!
//! ## Example
//!
//! ```rust
//! use boatwatch_registry::{ContactUpdate, NodeRegistry};
//! use boatwatch_wire::NodeId;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let registry = NodeRegistry::new(Duration::from_secs(180));
//! registry.record_contact(NodeId(1), ContactUpdate::heartbeat(3700), 0).await;
//!
//! assert!(registry.is_online(NodeId(1), 179_999).await);
//! assert!(!registry.is_online(NodeId(1), 180_000).await);
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod registry;
pub mod status;

// Re-export main types
pub use registry::{NodeRegistry, DEFAULT_OFFLINE_THRESHOLD};
pub use status::{default_display_name, ContactOutcome, ContactUpdate, NodeStatus};
