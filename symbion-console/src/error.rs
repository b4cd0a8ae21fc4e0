//! Error taxonomy of the console.
//!
//! Snapshot and input validation errors are recovered locally; command and
//! transport errors are reported and never retried here.

use reqwest::StatusCode;

/// A snapshot event that does not describe a valid cluster state.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotValidationError {
    #[error("snapshot payload is not valid JSON: {0}")]
    Malformed(String),
    #[error("snapshot payload must be a JSON object keyed by node id")]
    NotAnObject,
    #[error("snapshot contains an empty node id")]
    EmptyNodeId,
    #[error("node {0} appears more than once in the snapshot")]
    DuplicateNode(String),
    #[error("node {node}: {reason}")]
    InvalidNode { node: String, reason: String },
    #[error("node {node}: {field} must be a finite non-negative number, got {value}")]
    NegativeValue {
        node: String,
        field: &'static str,
        value: f64,
    },
    #[error("node {node}: available_cpu {available_cpu} is outside [0, {cpu}]")]
    AvailableOutOfRange {
        node: String,
        cpu: f64,
        available_cpu: f64,
    },
}

/// Add-node input rejected before any request is issued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("cpu cores must be a positive integer, got {0}")]
    NonPositiveCores(i64),
    #[error("cpu cores must be at most {max}, got {value}", max = u32::MAX)]
    TooManyCores { value: i64 },
    #[error("cpu cores must be an integer, got {0:?}")]
    NotAnInteger(String),
}

/// Failure talking to the node API.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("node API unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("node API rejected the request ({status}): {message}")]
    Rejected { status: StatusCode, message: String },
    #[error("node API returned an unreadable response: {0}")]
    InvalidResponse(String),
    #[error("node API reported success without a node id")]
    MissingNodeId,
    #[error("node API returned an invalid node list: {0}")]
    InvalidNodeList(#[from] SnapshotValidationError),
}

/// Result error of a single add-node interaction.
#[derive(Debug, thiserror::Error)]
pub enum AddNodeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Loss of the inbound event stream.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("event stream connection failed: {0}")]
    Connection(String),
    #[error("event stream subscription failed: {0}")]
    Subscribe(String),
}
