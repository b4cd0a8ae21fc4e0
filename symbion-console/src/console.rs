//! Single-threaded event loop of the console.
//!
//! Stream events, user input and command completions share one channel and
//! are handled one at a time, so a snapshot replacement and its render never
//! interleave with anything else. Add-node requests run as separate tasks and
//! come back as [`ConsoleEvent::AddNodeFinished`].

use crate::commands::{AddNodeInteraction, AddedNode, CommandClient, ServerStatus};
use crate::error::CommandError;
use crate::listener::{ListenerOutcome, StreamEvent, StreamListener};
use crate::models::ClusterSnapshot;
use crate::render::{Notice, RenderSurface};
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum ConsoleEvent {
    Stream(StreamEvent),
    Bootstrap(Result<ClusterSnapshot, CommandError>),
    /// Raw line typed by the operator.
    Input(String),
    AddNodeFinished {
        request_id: u64,
        result: Result<AddedNode, CommandError>,
    },
    /// Reply of the node API status endpoint, requested by `status`.
    ServerStatus(Result<ServerStatus, CommandError>),
    HealthTick,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    AddNode(String),
    Status,
    Help,
    Quit,
    Unknown(String),
}

pub const HELP: &str = "commands: add <cpu cores> | status | help | quit";

pub fn parse_user_command(line: &str) -> Option<UserCommand> {
    let mut parts = line.split_whitespace();
    let verb = parts.next()?;
    let rest: Vec<&str> = parts.collect();
    let cmd = match (verb, rest.as_slice()) {
        ("add", [cores]) => UserCommand::AddNode(cores.to_string()),
        ("add", _) => UserCommand::Unknown("usage: add <cpu cores>".into()),
        ("status", []) => UserCommand::Status,
        ("help", []) => UserCommand::Help,
        ("quit" | "exit", []) => UserCommand::Quit,
        _ => UserCommand::Unknown(format!("unknown command {:?}", line.trim())),
    };
    Some(cmd)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

pub struct Console<S: RenderSurface> {
    listener: StreamListener<S>,
    client: CommandClient,
    events: UnboundedSender<ConsoleEvent>,
    pending: HashMap<u64, AddNodeInteraction>,
    next_request_id: u64,
}

impl<S: RenderSurface> Console<S> {
    pub fn new(listener: StreamListener<S>, client: CommandClient, events: UnboundedSender<ConsoleEvent>) -> Self {
        Self {
            listener,
            client,
            events,
            pending: HashMap::new(),
            next_request_id: 1,
        }
    }

    /// Drives the loop until `Shutdown`, `quit` or a closed channel, then
    /// hands the console back.
    pub async fn run(mut self, mut rx: UnboundedReceiver<ConsoleEvent>) -> Self {
        while let Some(event) = rx.recv().await {
            if self.dispatch(event) == Flow::Stop {
                break;
            }
        }
        self
    }

    /// Handles one event to completion.
    pub fn dispatch(&mut self, event: ConsoleEvent) -> Flow {
        match event {
            ConsoleEvent::Stream(event) => {
                if let ListenerOutcome::Rendered { nodes } = self.listener.handle(event) {
                    debug!("rendered {nodes} nodes");
                }
            }
            ConsoleEvent::Bootstrap(Ok(snapshot)) => {
                self.listener.apply_bootstrap(snapshot);
            }
            ConsoleEvent::Bootstrap(Err(e)) => warn!("initial node list unavailable: {e}"),
            ConsoleEvent::Input(line) => return self.on_input(&line),
            ConsoleEvent::AddNodeFinished { request_id, result } => self.on_add_node_finished(request_id, result),
            ConsoleEvent::ServerStatus(result) => {
                let text = match result {
                    Ok(status) => format!("node API: {} ({} nodes)", status.status, status.node_count),
                    Err(e) => {
                        warn!("node API status unavailable: {e}");
                        format!("node API status unavailable: {e}")
                    }
                };
                self.notify(Notice::Info(text));
            }
            ConsoleEvent::HealthTick => {
                let report = self.listener.health().report();
                info!(
                    "[health] stream={:?} nodes={} accepted={} rejected={} heartbeats={} renders={} reconnects={}",
                    report.stream_status,
                    report.nodes_tracked,
                    report.snapshots_accepted,
                    report.snapshots_rejected,
                    report.heartbeats_seen,
                    report.renders,
                    report.stream_reconnects
                );
            }
            ConsoleEvent::Shutdown => return Flow::Stop,
        }
        Flow::Continue
    }

    fn on_input(&mut self, line: &str) -> Flow {
        let Some(cmd) = parse_user_command(line) else {
            return Flow::Continue;
        };
        match cmd {
            UserCommand::AddNode(raw) => self.submit_add_node(&raw),
            UserCommand::Status => {
                let report = self.listener.health().report();
                let text = serde_json::to_string(&report).unwrap_or_else(|e| format!("health unavailable: {e}"));
                self.notify(Notice::Info(text));
                self.spawn_server_status();
            }
            UserCommand::Help => self.notify(Notice::Info(HELP.to_string())),
            UserCommand::Quit => return Flow::Stop,
            UserCommand::Unknown(reason) => self.notify(Notice::InvalidInput(reason)),
        }
        Flow::Continue
    }

    /// Validates right away; only valid input leaves the loop as a request.
    fn submit_add_node(&mut self, raw: &str) {
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        let mut interaction = AddNodeInteraction::new(request_id);

        let cores = match interaction.validate_input(raw) {
            Ok(cores) => cores,
            Err(e) => {
                self.notify(Notice::InvalidInput(e.to_string()));
                return;
            }
        };

        info!("add-node request {request_id}: submitting {cores} cores");
        self.pending.insert(request_id, interaction);
        let client = self.client.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = client.submit_add_node(cores).await;
            if events.send(ConsoleEvent::AddNodeFinished { request_id, result }).is_err() {
                debug!("console gone before add-node request {request_id} finished");
            }
        });
    }

    fn on_add_node_finished(&mut self, request_id: u64, result: Result<AddedNode, CommandError>) {
        let Some(mut interaction) = self.pending.remove(&request_id) else {
            warn!("completion for unknown add-node request {request_id}");
            return;
        };
        interaction.complete(&result);
        let notice = match result {
            Ok(added) => Notice::NodeAdded {
                node_id: added.node_id,
                simulated: added.simulated,
            },
            Err(e) => Notice::AddNodeFailed(e.to_string()),
        };
        self.notify(notice);
    }

    fn notify(&mut self, notice: Notice) {
        self.listener.surface_mut().notify(&notice);
    }

    /// Loads the node list once; the result comes back as `Bootstrap`.
    pub fn spawn_bootstrap(&self) -> JoinHandle<()> {
        let client = self.client.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = client.fetch_nodes().await;
            if events.send(ConsoleEvent::Bootstrap(result)).is_err() {
                debug!("console gone before the initial node list arrived");
            }
        })
    }

    /// Asks the node API for its status; the reply comes back as `ServerStatus`.
    pub fn spawn_server_status(&self) -> JoinHandle<()> {
        let client = self.client.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = client.server_status().await;
            if events.send(ConsoleEvent::ServerStatus(result)).is_err() {
                debug!("console gone before the server status arrived");
            }
        })
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    pub fn listener(&self) -> &StreamListener<S> {
        &self.listener
    }
}

/// Forwards stdin lines as [`ConsoleEvent::Input`].
pub fn spawn_input_reader(events: UnboundedSender<ConsoleEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if events.send(ConsoleEvent::Input(line)).is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    debug!("stdin closed, no more commands");
                    break;
                }
                Err(e) => {
                    warn!("stdin read error: {e}");
                    break;
                }
            }
        }
    })
}

pub fn spawn_health_ticker(events: UnboundedSender<ConsoleEvent>, every_secs: u64) -> Option<JoinHandle<()>> {
    if every_secs == 0 {
        return None;
    }
    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(every_secs));
        interval.tick().await;
        loop {
            interval.tick().await;
            if events.send(ConsoleEvent::HealthTick).is_err() {
                break;
            }
        }
    }))
}
