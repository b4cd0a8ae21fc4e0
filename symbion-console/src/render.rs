//! Deterministic projection of the held snapshot onto a render surface.
//!
//! The renderer knows nothing about how a frame is drawn. Surfaces receive a
//! complete [`RenderFrame`] on each paint and must drop whatever they showed
//! before.

use crate::config::RenderConf;
use crate::models::{AggregateMetrics, ClusterSnapshot, NodeSnapshot, NodeStatus};
use serde::Serialize;
use std::collections::VecDeque;
use std::io::Write;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::warn;

pub const CHART_LABELS: [&str; 2] = ["Used CPU", "Available CPU"];

/// One table row per node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRow {
    pub node_id: String,
    pub display_id: String,
    pub status: NodeStatus,
    pub badge: &'static str,
    pub cpu: f64,
    pub available_cpu: f64,
    pub pod_count: usize,
    pub last_heartbeat: f64,
    pub heartbeat_age: String,
    pub stale: bool,
}

/// Two-slice chart series: `[used, available]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: [&'static str; 2],
    pub values: [f64; 2],
}

impl ChartData {
    pub fn used(&self) -> f64 {
        self.values[0]
    }

    pub fn available(&self) -> f64 {
        self.values[1]
    }

    /// Share of capacity in use, 0 when the cluster has no capacity.
    pub fn used_ratio(&self) -> f64 {
        let total = self.used() + self.available();
        if total > 0.0 {
            self.used() / total
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderFrame {
    pub rows: Vec<NodeRow>,
    pub chart: ChartData,
    pub node_count: usize,
}

/// User-facing message outside of the node table.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    NodeAdded { node_id: String, simulated: bool },
    AddNodeFailed(String),
    InvalidInput(String),
    Info(String),
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::NodeAdded { node_id, simulated: true } => write!(f, "Node added: {node_id} (simulated)"),
            Notice::NodeAdded { node_id, .. } => write!(f, "Node added: {node_id}"),
            Notice::AddNodeFailed(reason) => write!(f, "Add node failed: {reason}"),
            Notice::InvalidInput(reason) => write!(f, "Invalid input: {reason}"),
            Notice::Info(text) => f.write_str(text),
        }
    }
}

pub trait RenderSurface {
    /// Replaces everything previously painted with `frame`.
    fn paint(&mut self, frame: &RenderFrame);

    fn notify(&mut self, notice: &Notice);
}

#[derive(Debug, Clone)]
pub struct Renderer {
    id_width: usize,
    heartbeat_precision: usize,
    stale_after_secs: f64,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::from(&RenderConf::default())
    }
}

impl From<&RenderConf> for Renderer {
    fn from(conf: &RenderConf) -> Self {
        Self {
            id_width: conf.id_width,
            heartbeat_precision: conf.heartbeat_precision,
            stale_after_secs: conf.stale_after_secs,
        }
    }
}

impl Renderer {
    pub fn project(&self, snapshot: &ClusterSnapshot, metrics: &AggregateMetrics) -> RenderFrame {
        RenderFrame {
            rows: snapshot.nodes().map(|node| self.row(node)).collect(),
            chart: ChartData {
                labels: CHART_LABELS,
                values: [metrics.used_cpu, metrics.available_cpu],
            },
            node_count: snapshot.len(),
        }
    }

    fn row(&self, node: &NodeSnapshot) -> NodeRow {
        NodeRow {
            node_id: node.id.clone(),
            display_id: truncate_id(&node.id, self.id_width),
            status: node.status.clone(),
            badge: badge(&node.status),
            cpu: node.cpu,
            available_cpu: node.available_cpu,
            pod_count: node.pod_count(),
            last_heartbeat: node.last_heartbeat,
            heartbeat_age: format!("{:.*}", self.heartbeat_precision, node.last_heartbeat),
            stale: node.last_heartbeat > self.stale_after_secs,
        }
    }
}

fn truncate_id(id: &str, width: usize) -> String {
    match id.char_indices().nth(width) {
        Some((cut, _)) => format!("{}...", &id[..cut]),
        None => id.to_string(),
    }
}

fn badge(status: &NodeStatus) -> &'static str {
    match status {
        NodeStatus::Healthy => "success",
        NodeStatus::Unhealthy => "danger",
        NodeStatus::Unknown(_) => "secondary",
    }
}

/// Notices kept on screen across repaints.
pub const NOTICE_BACKLOG: usize = 5;

/// Redraws the whole screen on every paint.
///
/// The last [`NOTICE_BACKLOG`] notices are redrawn under the chart so a
/// repaint never hides a command outcome.
pub struct TerminalSurface<W: Write> {
    out: W,
    recent: VecDeque<Notice>,
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            recent: VecDeque::with_capacity(NOTICE_BACKLOG),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn draw(&mut self, frame: &RenderFrame) -> std::io::Result<()> {
        let now = OffsetDateTime::now_utc()
            .format(format_description!("[hour]:[minute]:[second]"))
            .unwrap_or_default();

        write!(self.out, "\x1b[2J\x1b[H")?;
        writeln!(self.out, "Symbion cluster: {} nodes (updated {now} UTC)", frame.node_count)?;
        writeln!(
            self.out,
            "{:<12} {:<12} {:>6} {:>9} {:>5} {:>10}",
            "NODE", "STATUS", "CPU", "AVAIL CPU", "PODS", "HEARTBEAT"
        )?;
        for row in &frame.rows {
            let heartbeat = if row.stale {
                format!("{}s!", row.heartbeat_age)
            } else {
                format!("{}s", row.heartbeat_age)
            };
            writeln!(
                self.out,
                "{:<12} {:<12} {:>6} {:>9} {:>5} {:>10}",
                row.display_id,
                format!("[{}]", row.status),
                row.cpu,
                row.available_cpu,
                row.pod_count,
                heartbeat
            )?;
        }
        writeln!(
            self.out,
            "{}: {}  {}: {}  ({:.1}% used)",
            frame.chart.labels[0],
            frame.chart.used(),
            frame.chart.labels[1],
            frame.chart.available(),
            frame.chart.used_ratio() * 100.0
        )?;
        for notice in &self.recent {
            writeln!(self.out, ">> {notice}")?;
        }
        self.out.flush()
    }
}

impl<W: Write> RenderSurface for TerminalSurface<W> {
    fn paint(&mut self, frame: &RenderFrame) {
        if let Err(e) = self.draw(frame) {
            warn!("failed to draw frame: {e}");
        }
    }

    fn notify(&mut self, notice: &Notice) {
        if self.recent.len() == NOTICE_BACKLOG {
            self.recent.pop_front();
        }
        self.recent.push_back(notice.clone());
        if let Err(e) = writeln!(self.out, ">> {notice}").and_then(|_| self.out.flush()) {
            warn!("failed to write notice: {e}");
        }
    }
}

/// Headless surface keeping every frame and notice it receives.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub frames: Vec<RenderFrame>,
    pub notices: Vec<Notice>,
}

impl RecordingSurface {
    pub fn last_frame(&self) -> Option<&RenderFrame> {
        self.frames.last()
    }

    pub fn paint_count(&self) -> usize {
        self.frames.len()
    }
}

impl RenderSurface for RecordingSurface {
    fn paint(&mut self, frame: &RenderFrame) {
        self.frames.push(frame.clone());
    }

    fn notify(&mut self, notice: &Notice) {
        self.notices.push(notice.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::snapshot::parse_cluster_snapshot;

    fn example() -> ClusterSnapshot {
        parse_cluster_snapshot(
            br#"{
                "3f9a1c7e55aa01": {"cpu": 4, "available_cpu": 1, "status": "healthy", "pods": ["p1"], "last_heartbeat": 0.5},
                "n2": {"cpu": 2, "available_cpu": 2, "status": "unhealthy", "pods": [], "last_heartbeat": 42.126}
            }"#,
        )
        .unwrap()
    }

    fn frame_for(snapshot: &ClusterSnapshot) -> RenderFrame {
        Renderer::default().project(snapshot, &aggregate(snapshot))
    }

    #[test]
    fn one_row_per_node() {
        let snapshot = example();
        let frame = frame_for(&snapshot);
        assert_eq!(frame.rows.len(), 2);
        assert_eq!(frame.node_count, 2);
        assert_eq!(frame.chart.values, [3.0, 3.0]);
        assert_eq!(frame.chart.labels, CHART_LABELS);
    }

    #[test]
    fn empty_cluster_frame() {
        let frame = frame_for(&ClusterSnapshot::empty());
        assert!(frame.rows.is_empty());
        assert_eq!(frame.node_count, 0);
        assert_eq!(frame.chart.values, [0.0, 0.0]);
        assert_eq!(frame.chart.used_ratio(), 0.0);
    }

    #[test]
    fn row_fields() {
        let frame = frame_for(&example());
        let long = frame.rows.iter().find(|r| r.node_id == "3f9a1c7e55aa01").unwrap();
        assert_eq!(long.display_id, "3f9a1c7e...");
        assert_eq!(long.badge, "success");
        assert_eq!(long.pod_count, 1);
        assert_eq!(long.heartbeat_age, "0.50");
        assert!(!long.stale);

        let short = frame.rows.iter().find(|r| r.node_id == "n2").unwrap();
        assert_eq!(short.display_id, "n2");
        assert_eq!(short.badge, "danger");
        assert_eq!(short.heartbeat_age, "42.13");
        assert!(short.stale);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_id("nœud-éphémère-1", 5), "nœud-...");
        assert_eq!(truncate_id("12345678", 8), "12345678");
    }

    #[test]
    fn unknown_status_gets_neutral_badge() {
        let snapshot = parse_cluster_snapshot(
            br#"{"n1": {"cpu": 1, "available_cpu": 0, "status": "draining", "pods": [], "last_heartbeat": 0}}"#,
        )
        .unwrap();
        let frame = frame_for(&snapshot);
        assert_eq!(frame.rows[0].badge, "secondary");
    }

    #[test]
    fn terminal_surface_redraws_everything() {
        let mut surface = TerminalSurface::new(Vec::new());
        surface.paint(&frame_for(&example()));
        surface.notify(&Notice::NodeAdded { node_id: "abc".into(), simulated: false });
        let text = String::from_utf8(surface.into_inner()).unwrap();
        assert!(text.starts_with("\x1b[2J\x1b[H"));
        assert!(text.contains("2 nodes"));
        assert!(text.contains("3f9a1c7e..."));
        assert!(text.contains("[unhealthy]"));
        assert!(text.contains("42.13s!"));
        assert!(text.contains("Used CPU: 3  Available CPU: 3  (50.0% used)"));
        assert!(text.contains(">> Node added: abc"));
    }

    fn last_screen(text: &str) -> &str {
        text.rsplit("\x1b[2J\x1b[H").next().unwrap_or_default()
    }

    #[test]
    fn notices_survive_repaint() {
        let empty = frame_for(&ClusterSnapshot::empty());
        let mut surface = TerminalSurface::new(Vec::new());
        surface.paint(&empty);
        surface.notify(&Notice::AddNodeFailed("docker unavailable".into()));
        surface.paint(&empty);

        let text = String::from_utf8(surface.into_inner()).unwrap();
        let screen = last_screen(&text);
        assert!(screen.contains("0 nodes"));
        assert!(screen.contains(">> Add node failed: docker unavailable"));
    }

    #[test]
    fn notice_backlog_is_bounded() {
        let empty = frame_for(&ClusterSnapshot::empty());
        let mut surface = TerminalSurface::new(Vec::new());
        for i in 0..NOTICE_BACKLOG + 2 {
            surface.notify(&Notice::Info(format!("notice {i}")));
        }
        surface.paint(&empty);

        let text = String::from_utf8(surface.into_inner()).unwrap();
        let screen = last_screen(&text);
        assert_eq!(screen.matches(">> ").count(), NOTICE_BACKLOG);
        assert!(!screen.contains("notice 0"));
        assert!(!screen.contains("notice 1\n"));
        assert!(screen.contains(&format!("notice {}", NOTICE_BACKLOG + 1)));
    }
}
