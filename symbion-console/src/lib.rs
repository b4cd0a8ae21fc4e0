//! Symbion Console - live view of the cluster node inventory
//!
//! Consumes full-state node snapshots pushed over MQTT, keeps the latest one
//! as the single source of truth, derives cluster CPU utilisation from it and
//! repaints the node table on every accepted snapshot. Capacity changes are
//! requested through the node API; their effect shows up only through the
//! stream.

pub mod aggregate;
pub mod commands;
pub mod config;
pub mod console;
pub mod contracts;
pub mod error;
pub mod health;
pub mod listener;
pub mod models;
pub mod mqtt;
pub mod registry;
pub mod render;
pub mod snapshot;

pub use aggregate::aggregate;
pub use commands::{AddNodeInteraction, AddNodeState, AddedNode, CommandClient, ServerStatus};
pub use console::{Console, ConsoleEvent, Flow};
pub use error::{AddNodeError, CommandError, SnapshotValidationError, TransportError, ValidationError};
pub use listener::{ListenerOutcome, StreamEvent, StreamListener};
pub use models::{AggregateMetrics, ClusterSnapshot, NodeSnapshot, NodeStatus};
pub use render::{RecordingSurface, RenderFrame, RenderSurface, Renderer, TerminalSurface};
pub use snapshot::parse_cluster_snapshot;
