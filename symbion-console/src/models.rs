use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Health reported by the server for one node.
///
/// Anything other than `healthy` / `unhealthy` is kept verbatim so a newer
/// server can introduce states without breaking the console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum NodeStatus {
    Healthy,
    Unhealthy,
    Unknown(String),
}

impl NodeStatus {
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "healthy" => NodeStatus::Healthy,
            "unhealthy" => NodeStatus::Unhealthy,
            other => NodeStatus::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            NodeStatus::Healthy => "healthy",
            NodeStatus::Unhealthy => "unhealthy",
            NodeStatus::Unknown(raw) => raw,
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, NodeStatus::Healthy)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<NodeStatus> for String {
    fn from(status: NodeStatus) -> Self {
        status.as_str().to_string()
    }
}

/// State of one node at the instant of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSnapshot {
    pub id: String,
    pub status: NodeStatus,
    pub cpu: f64,
    pub available_cpu: f64,
    pub pods: Vec<String>,
    /// Seconds since the last heartbeat, as computed by the server.
    pub last_heartbeat: f64,
}

impl NodeSnapshot {
    pub fn used_cpu(&self) -> f64 {
        self.cpu - self.available_cpu
    }

    pub fn pod_count(&self) -> usize {
        self.pods.len()
    }
}

/// Entire cluster state at one instant, keyed by node id.
///
/// Only constructed from a validated payload; a new one always supersedes the
/// previous one as a whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClusterSnapshot {
    nodes: BTreeMap<String, NodeSnapshot>,
}

impl ClusterSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn from_nodes(nodes: BTreeMap<String, NodeSnapshot>) -> Self {
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&NodeSnapshot> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeSnapshot> {
        self.nodes.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn total_cpu(&self) -> f64 {
        self.nodes().map(|n| n.cpu).sum()
    }
}

/// Cluster-wide CPU utilisation derived from one snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AggregateMetrics {
    pub used_cpu: f64,
    pub available_cpu: f64,
}

impl AggregateMetrics {
    pub fn total_cpu(&self) -> f64 {
        self.used_cpu + self.available_cpu
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_wire_strings() {
        assert_eq!(NodeStatus::from_wire("healthy"), NodeStatus::Healthy);
        assert_eq!(NodeStatus::from_wire("unhealthy"), NodeStatus::Unhealthy);
        let draining = NodeStatus::from_wire("draining");
        assert_eq!(draining, NodeStatus::Unknown("draining".into()));
        assert_eq!(draining.as_str(), "draining");
        assert!(!draining.is_healthy());
    }

    #[test]
    fn node_used_cpu() {
        let node = NodeSnapshot {
            id: "n1".into(),
            status: NodeStatus::Healthy,
            cpu: 4.0,
            available_cpu: 1.5,
            pods: vec!["p1".into(), "p2".into()],
            last_heartbeat: 0.5,
        };
        assert_eq!(node.used_cpu(), 2.5);
        assert_eq!(node.pod_count(), 2);
    }
}
