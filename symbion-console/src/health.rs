use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Connecting,
    Connected,
    Disconnected,
    Reconnecting,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsoleHealth {
    pub uptime_seconds: u64,
    pub stream_status: StreamStatus,
    pub stream_reconnects: u32,
    pub snapshots_accepted: u64,
    pub snapshots_rejected: u64,
    pub heartbeats_seen: u64,
    pub renders: u64,
    pub nodes_tracked: usize,
}

#[derive(Debug)]
struct Counters {
    status: StreamStatus,
    reconnects: u32,
    accepted: u64,
    rejected: u64,
    heartbeats: u64,
    renders: u64,
    nodes: usize,
}

/// Observability counters shared between the event loop and the transport task.
#[derive(Clone, Debug)]
pub struct StreamHealth {
    start_time: Instant,
    counters: Arc<Mutex<Counters>>,
}

impl Default for StreamHealth {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamHealth {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            counters: Arc::new(Mutex::new(Counters {
                status: StreamStatus::Connecting,
                reconnects: 0,
                accepted: 0,
                rejected: 0,
                heartbeats: 0,
                renders: 0,
                nodes: 0,
            })),
        }
    }

    pub fn mark_connected(&self) {
        self.counters.lock().status = StreamStatus::Connected;
    }

    pub fn mark_disconnected(&self) {
        self.counters.lock().status = StreamStatus::Disconnected;
    }

    pub fn increment_reconnects(&self) {
        let mut c = self.counters.lock();
        c.reconnects += 1;
        c.status = StreamStatus::Reconnecting;
    }

    pub fn record_accepted(&self, nodes: usize) {
        let mut c = self.counters.lock();
        c.accepted += 1;
        c.nodes = nodes;
    }

    pub fn record_rejected(&self) {
        self.counters.lock().rejected += 1;
    }

    pub fn record_heartbeat(&self) {
        self.counters.lock().heartbeats += 1;
    }

    pub fn record_render(&self) {
        self.counters.lock().renders += 1;
    }

    pub fn status(&self) -> StreamStatus {
        self.counters.lock().status
    }

    pub fn report(&self) -> ConsoleHealth {
        let c = self.counters.lock();
        ConsoleHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            stream_status: c.status,
            stream_reconnects: c.reconnects,
            snapshots_accepted: c.accepted,
            snapshots_rejected: c.rejected,
            heartbeats_seen: c.heartbeats,
            renders: c.renders,
            nodes_tracked: c.nodes,
        }
    }
}
