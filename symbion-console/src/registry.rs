use crate::models::ClusterSnapshot;

/// Where the held snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSource {
    Stream,
    Bootstrap,
}

/// Latest known full set of nodes.
///
/// The only mutation is a wholesale [`replace`](NodeRegistryView::replace):
/// ids missing from the new snapshot are gone, nothing is merged.
#[derive(Debug, Default)]
pub struct NodeRegistryView {
    current: Option<ClusterSnapshot>,
    source: Option<SnapshotSource>,
}

impl NodeRegistryView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `snapshot` as the whole cluster state and returns the previous one.
    pub fn replace(&mut self, snapshot: ClusterSnapshot, source: SnapshotSource) -> Option<ClusterSnapshot> {
        self.source = Some(source);
        self.current.replace(snapshot)
    }

    /// Held snapshot, `None` until the first accepted event.
    pub fn current(&self) -> Option<&ClusterSnapshot> {
        self.current.as_ref()
    }

    pub fn has_stream_snapshot(&self) -> bool {
        self.source == Some(SnapshotSource::Stream)
    }

    pub fn node_count(&self) -> usize {
        self.current.as_ref().map_or(0, ClusterSnapshot::len)
    }
}
