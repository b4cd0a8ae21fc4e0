//! Consumer of the snapshot / heartbeat stream.
//!
//! Each accepted snapshot replaces the registry view and triggers exactly one
//! render. Rejected snapshots leave the view and the surface untouched.

use crate::aggregate::aggregate;
use crate::error::{SnapshotValidationError, TransportError};
use crate::health::StreamHealth;
use crate::models::ClusterSnapshot;
use crate::registry::{NodeRegistryView, SnapshotSource};
use crate::render::{RenderSurface, Renderer};
use crate::snapshot::parse_cluster_snapshot;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

/// Inbound event from the external channel.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Snapshot(Vec<u8>),
    Heartbeat(Vec<u8>),
    Connected,
    Disconnected(TransportError),
}

#[derive(Debug)]
pub enum ListenerOutcome {
    Rendered { nodes: usize },
    Rejected(SnapshotValidationError),
    Heartbeat { node_id: String },
    Ignored,
    TransportUp,
    TransportDown(TransportError),
}

#[derive(Debug, Deserialize)]
struct HeartbeatIn {
    node_id: String,
}

pub struct StreamListener<S: RenderSurface> {
    view: NodeRegistryView,
    renderer: Renderer,
    surface: S,
    health: StreamHealth,
}

impl<S: RenderSurface> StreamListener<S> {
    pub fn new(renderer: Renderer, surface: S, health: StreamHealth) -> Self {
        Self {
            view: NodeRegistryView::new(),
            renderer,
            surface,
            health,
        }
    }

    pub fn handle(&mut self, event: StreamEvent) -> ListenerOutcome {
        match event {
            StreamEvent::Snapshot(payload) => match self.on_snapshot(&payload) {
                Ok(nodes) => ListenerOutcome::Rendered { nodes },
                Err(e) => ListenerOutcome::Rejected(e),
            },
            StreamEvent::Heartbeat(payload) => match self.on_heartbeat(&payload) {
                Some(node_id) => ListenerOutcome::Heartbeat { node_id },
                None => ListenerOutcome::Ignored,
            },
            StreamEvent::Connected => {
                info!("event stream connected");
                self.health.mark_connected();
                ListenerOutcome::TransportUp
            }
            StreamEvent::Disconnected(e) => {
                error!("{e}");
                self.health.mark_disconnected();
                ListenerOutcome::TransportDown(e)
            }
        }
    }

    /// Validates and installs a pushed snapshot, then renders it.
    pub fn on_snapshot(&mut self, payload: &[u8]) -> Result<usize, SnapshotValidationError> {
        match parse_cluster_snapshot(payload) {
            Ok(snapshot) => Ok(self.install(snapshot, SnapshotSource::Stream)),
            Err(e) => {
                warn!("rejected snapshot, keeping previous state: {e}");
                self.health.record_rejected();
                Err(e)
            }
        }
    }

    /// Heartbeats are logged only; staleness comes from the next snapshot.
    pub fn on_heartbeat(&self, payload: &[u8]) -> Option<String> {
        match serde_json::from_slice::<HeartbeatIn>(payload) {
            Ok(hb) => {
                debug!("heartbeat from node: {}", hb.node_id);
                self.health.record_heartbeat();
                Some(hb.node_id)
            }
            Err(e) => {
                debug!("ignoring malformed heartbeat: {e}");
                None
            }
        }
    }

    /// Installs a snapshot loaded over HTTP at startup.
    ///
    /// Returns false, leaving the view alone, once any pushed snapshot has
    /// been accepted.
    pub fn apply_bootstrap(&mut self, snapshot: ClusterSnapshot) -> bool {
        if self.view.has_stream_snapshot() {
            info!("discarding bootstrap node list, stream state is newer");
            return false;
        }
        self.install(snapshot, SnapshotSource::Bootstrap);
        true
    }

    fn install(&mut self, snapshot: ClusterSnapshot, source: SnapshotSource) -> usize {
        let nodes = snapshot.len();
        self.view.replace(snapshot, source);
        self.health.record_accepted(nodes);
        self.render();
        nodes
    }

    fn render(&mut self) {
        let Some(snapshot) = self.view.current() else {
            return;
        };
        let metrics = aggregate(snapshot);
        let frame = self.renderer.project(snapshot, &metrics);
        self.surface.paint(&frame);
        self.health.record_render();
    }

    pub fn view(&self) -> &NodeRegistryView {
        &self.view
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn health(&self) -> &StreamHealth {
        &self.health
    }
}
