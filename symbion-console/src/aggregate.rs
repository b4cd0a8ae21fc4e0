use crate::models::{AggregateMetrics, ClusterSnapshot};

/// Sums used and available CPU over every node of `snapshot`.
///
/// Recomputed from scratch for each snapshot; an empty cluster yields zeros.
pub fn aggregate(snapshot: &ClusterSnapshot) -> AggregateMetrics {
    snapshot.nodes().fold(AggregateMetrics::default(), |acc, node| AggregateMetrics {
        used_cpu: acc.used_cpu + node.used_cpu(),
        available_cpu: acc.available_cpu + node.available_cpu,
    })
}
