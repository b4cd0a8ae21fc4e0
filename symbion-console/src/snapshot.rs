//! Boundary validation of inbound snapshot payloads.
//!
//! A payload is accepted only as a whole: one invalid node rejects the entire
//! snapshot so the held view is never a mix of two cluster states.

use crate::error::SnapshotValidationError;
use crate::models::{ClusterSnapshot, NodeSnapshot, NodeStatus};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::error::Category;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Node fields as they appear on the wire, keyed by node id in the payload.
#[derive(Debug, Deserialize)]
struct WireNode {
    status: String,
    cpu: f64,
    available_cpu: f64,
    pods: Vec<String>,
    last_heartbeat: f64,
}

/// Top-level entries in payload order, duplicates included.
struct NodeEntries(Vec<(String, Value)>);

impl<'de> Deserialize<'de> for NodeEntries {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = NodeEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of node id to node state")
            }

            fn visit_map<A>(self, mut map: A) -> Result<NodeEntries, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((id, node)) = map.next_entry::<String, Value>()? {
                    entries.push((id, node));
                }
                Ok(NodeEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// Parses and validates a raw snapshot payload.
pub fn parse_cluster_snapshot(payload: &[u8]) -> Result<ClusterSnapshot, SnapshotValidationError> {
    let entries = serde_json::from_slice::<NodeEntries>(payload).map_err(|e| match e.classify() {
        Category::Data => SnapshotValidationError::NotAnObject,
        _ => SnapshotValidationError::Malformed(e.to_string()),
    })?;

    let mut nodes = BTreeMap::new();
    for (id, raw) in entries.0 {
        if id.is_empty() {
            return Err(SnapshotValidationError::EmptyNodeId);
        }
        if nodes.contains_key(&id) {
            return Err(SnapshotValidationError::DuplicateNode(id));
        }
        let node = validate_node(&id, raw)?;
        nodes.insert(id, node);
    }

    Ok(ClusterSnapshot::from_nodes(nodes))
}

fn validate_node(id: &str, raw: Value) -> Result<NodeSnapshot, SnapshotValidationError> {
    let wire: WireNode =
        serde_json::from_value(raw).map_err(|e| SnapshotValidationError::InvalidNode {
            node: id.to_string(),
            reason: e.to_string(),
        })?;

    check_non_negative(id, "cpu", wire.cpu)?;
    check_non_negative(id, "available_cpu", wire.available_cpu)?;
    check_non_negative(id, "last_heartbeat", wire.last_heartbeat)?;

    if wire.available_cpu > wire.cpu {
        return Err(SnapshotValidationError::AvailableOutOfRange {
            node: id.to_string(),
            cpu: wire.cpu,
            available_cpu: wire.available_cpu,
        });
    }

    Ok(NodeSnapshot {
        id: id.to_string(),
        status: NodeStatus::from_wire(&wire.status),
        cpu: wire.cpu,
        available_cpu: wire.available_cpu,
        pods: wire.pods,
        last_heartbeat: wire.last_heartbeat,
    })
}

fn check_non_negative(node: &str, field: &'static str, value: f64) -> Result<(), SnapshotValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SnapshotValidationError::NegativeValue {
            node: node.to_string(),
            field,
            value,
        })
    }
}
