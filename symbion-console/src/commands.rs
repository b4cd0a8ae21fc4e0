//! Client side of the node API (add-node, list-nodes, server status).
//!
//! The client never touches the registry view: a node added here becomes
//! visible only when the stream pushes a snapshot containing it.

use crate::config::ApiConf;
use crate::error::{AddNodeError, CommandError, ValidationError};
use crate::models::ClusterSnapshot;
use crate::snapshot::parse_cluster_snapshot;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedNode {
    pub node_id: String,
    pub cpu_cores: Option<u32>,
    pub simulated: bool,
}

#[derive(Debug, Serialize)]
struct AddNodeRequest {
    cpu_cores: u32,
}

/// Only `status` and `node_id` decide the outcome; the other fields are
/// informational and never fail the decode.
#[derive(Debug, Default, Deserialize)]
struct AddNodeResponse {
    status: Option<String>,
    node_id: Option<String>,
    message: Option<Value>,
    error: Option<Value>,
    cpu_cores: Option<Value>,
    is_simulated: Option<Value>,
}

impl AddNodeResponse {
    fn reason(&self) -> Option<String> {
        [&self.error, &self.message]
            .into_iter()
            .flatten()
            .find_map(|v| v.as_str().map(String::from))
    }

    fn cpu_cores(&self) -> Option<u32> {
        self.cpu_cores
            .as_ref()
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
    }

    fn simulated(&self) -> bool {
        self.is_simulated.as_ref().and_then(Value::as_bool).unwrap_or(false)
    }
}

/// Reply of the server health endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerStatus {
    pub status: String,
    pub node_count: usize,
    pub timestamp: f64,
}

/// Checks that `cpu_cores` is a positive integer representable on the wire.
pub fn validate_cpu_cores(cpu_cores: i64) -> Result<u32, ValidationError> {
    if cpu_cores <= 0 {
        return Err(ValidationError::NonPositiveCores(cpu_cores));
    }
    u32::try_from(cpu_cores).map_err(|_| ValidationError::TooManyCores { value: cpu_cores })
}

/// Parses raw user input such as `"4"`.
pub fn parse_cpu_cores(raw: &str) -> Result<i64, ValidationError> {
    let raw = raw.trim();
    raw.parse::<i64>()
        .map_err(|_| ValidationError::NotAnInteger(raw.to_string()))
}

#[derive(Clone, Debug)]
pub struct CommandClient {
    http: reqwest::Client,
    base_url: String,
    nodes_path: String,
    status_path: String,
    api_key: Option<String>,
}

impl CommandClient {
    pub fn new(conf: &ApiConf) -> Result<Self, CommandError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(conf.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: conf.base_url.trim_end_matches('/').to_string(),
            nodes_path: conf.nodes_path.clone(),
            status_path: conf.status_path.clone(),
            api_key: conf.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_key(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("x-api-key", key),
            None => req,
        }
    }

    /// Asks the server for a new node with `cpu_cores` cores.
    ///
    /// Invalid input fails before any request is made. Failures are returned
    /// as-is, there is no retry.
    pub async fn add_node(&self, cpu_cores: i64) -> Result<AddedNode, AddNodeError> {
        let cores = validate_cpu_cores(cpu_cores)?;
        Ok(self.submit_add_node(cores).await?)
    }

    pub async fn submit_add_node(&self, cpu_cores: u32) -> Result<AddedNode, CommandError> {
        debug!("POST {} cpu_cores={cpu_cores}", self.url(&self.nodes_path));
        let response = self
            .with_key(self.http.post(self.url(&self.nodes_path)))
            .json(&AddNodeRequest { cpu_cores })
            .send()
            .await?;
        let status = response.status();
        let body = response.bytes().await?;
        let result = interpret_add_node(status, &body);
        match &result {
            Ok(added) => info!("node added: {} ({} cores)", added.node_id, cpu_cores),
            Err(e) => warn!("add node failed: {e}"),
        }
        result
    }

    /// Full node list from the API, validated like a pushed snapshot.
    pub async fn fetch_nodes(&self) -> Result<ClusterSnapshot, CommandError> {
        let response = self.with_key(self.http.get(self.url(&self.nodes_path))).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(rejected(status, &body));
        }
        Ok(parse_cluster_snapshot(&body)?)
    }

    pub async fn server_status(&self) -> Result<ServerStatus, CommandError> {
        let response = self.with_key(self.http.get(self.url(&self.status_path))).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(rejected(status, &body));
        }
        serde_json::from_slice(&body).map_err(|e| CommandError::InvalidResponse(e.to_string()))
    }
}

fn interpret_add_node(status: StatusCode, body: &[u8]) -> Result<AddedNode, CommandError> {
    if !status.is_success() {
        return Err(rejected(status, body));
    }
    let reply: AddNodeResponse =
        serde_json::from_slice(body).map_err(|e| CommandError::InvalidResponse(e.to_string()))?;

    if reply.status.as_deref() == Some("error") {
        return Err(CommandError::Rejected {
            status,
            message: reply.reason().unwrap_or_else(|| "server reported an error".into()),
        });
    }

    let cpu_cores = reply.cpu_cores();
    let simulated = reply.simulated();
    match reply.node_id {
        Some(node_id) if !node_id.is_empty() => Ok(AddedNode {
            node_id,
            cpu_cores,
            simulated,
        }),
        _ => Err(CommandError::MissingNodeId),
    }
}

fn rejected(status: StatusCode, body: &[u8]) -> CommandError {
    let parsed = serde_json::from_slice::<AddNodeResponse>(body).unwrap_or_default();
    let message = parsed
        .reason()
        .or_else(|| {
            let text = String::from_utf8_lossy(body).trim().to_string();
            (!text.is_empty()).then(|| text.chars().take(200).collect())
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
    CommandError::Rejected { status, message }
}

/// Step of a single add-node interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddNodeState {
    Idle,
    Validating,
    ValidationFailed,
    Submitting,
    Succeeded,
    Failed,
}

impl AddNodeState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, AddNodeState::Idle | AddNodeState::Validating | AddNodeState::Submitting)
    }

    pub fn can_transition_to(self, next: AddNodeState) -> bool {
        use AddNodeState::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, ValidationFailed)
                | (Validating, Submitting)
                | (Submitting, Succeeded)
                | (Submitting, Failed)
        )
    }
}

/// Tracks one add-node submission from input to outcome.
#[derive(Debug, Clone)]
pub struct AddNodeInteraction {
    pub request_id: u64,
    state: AddNodeState,
}

impl AddNodeInteraction {
    pub fn new(request_id: u64) -> Self {
        Self {
            request_id,
            state: AddNodeState::Idle,
        }
    }

    pub fn state(&self) -> AddNodeState {
        self.state
    }

    /// Moves to `next`; refuses edges the state machine does not have.
    pub fn advance(&mut self, next: AddNodeState) -> bool {
        if self.state.can_transition_to(next) {
            self.state = next;
            true
        } else {
            warn!(
                "add-node request {}: illegal transition {:?} -> {:?}",
                self.request_id, self.state, next
            );
            false
        }
    }

    /// Validating step: lands in `Submitting` or `ValidationFailed`.
    pub fn validate(&mut self, cpu_cores: i64) -> Result<u32, ValidationError> {
        self.validate_with(|| validate_cpu_cores(cpu_cores))
    }

    /// Same as [`validate`](Self::validate) for raw operator input.
    pub fn validate_input(&mut self, raw: &str) -> Result<u32, ValidationError> {
        self.validate_with(|| parse_cpu_cores(raw).and_then(validate_cpu_cores))
    }

    fn validate_with<F>(&mut self, check: F) -> Result<u32, ValidationError>
    where
        F: FnOnce() -> Result<u32, ValidationError>,
    {
        self.advance(AddNodeState::Validating);
        match check() {
            Ok(cores) => {
                self.advance(AddNodeState::Submitting);
                Ok(cores)
            }
            Err(e) => {
                self.advance(AddNodeState::ValidationFailed);
                Err(e)
            }
        }
    }

    pub fn complete(&mut self, result: &Result<AddedNode, CommandError>) {
        if self.state.is_terminal() {
            debug!("add-node request {} already finished as {:?}", self.request_id, self.state);
            return;
        }
        let next = if result.is_ok() {
            AddNodeState::Succeeded
        } else {
            AddNodeState::Failed
        };
        self.advance(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_cores() {
        assert_eq!(validate_cpu_cores(0), Err(ValidationError::NonPositiveCores(0)));
        assert_eq!(validate_cpu_cores(-1), Err(ValidationError::NonPositiveCores(-1)));
        assert_eq!(validate_cpu_cores(4), Ok(4));
        assert!(matches!(
            validate_cpu_cores(i64::from(u32::MAX) + 1),
            Err(ValidationError::TooManyCores { .. })
        ));
    }

    #[test]
    fn parses_user_input() {
        assert_eq!(parse_cpu_cores(" 8 "), Ok(8));
        assert_eq!(parse_cpu_cores("-1"), Ok(-1));
        assert_eq!(parse_cpu_cores("2.5"), Err(ValidationError::NotAnInteger("2.5".into())));
        assert!(parse_cpu_cores("four").is_err());
    }

    #[test]
    fn interprets_success_shapes() {
        let added = interpret_add_node(StatusCode::OK, br#"{"status": "success", "node_id": "abc"}"#).unwrap();
        assert_eq!(added.node_id, "abc");

        let added = interpret_add_node(
            StatusCode::CREATED,
            br#"{"message": "Node added successfully", "node_id": "simulated_node_1700000000", "cpu_cores": 4, "is_simulated": true}"#,
        )
        .unwrap();
        assert_eq!(added.cpu_cores, Some(4));
        assert!(added.simulated);
    }

    #[test]
    fn odd_informational_fields_do_not_fail_success() {
        let added = interpret_add_node(
            StatusCode::OK,
            br#"{"status": "success", "node_id": "abc", "cpu_cores": "4", "is_simulated": null}"#,
        )
        .unwrap();
        assert_eq!(added.node_id, "abc");
        assert_eq!(added.cpu_cores, None);
        assert!(!added.simulated);

        let added = interpret_add_node(
            StatusCode::CREATED,
            br#"{"node_id": "n9", "cpu_cores": -2, "is_simulated": "yes", "message": {"text": "ok"}}"#,
        )
        .unwrap();
        assert_eq!(added.cpu_cores, None);
        assert!(!added.simulated);

        let err = interpret_add_node(StatusCode::BAD_REQUEST, br#"{"error": 42, "message": "too many"}"#).unwrap_err();
        assert!(matches!(err, CommandError::Rejected { ref message, .. } if message == "too many"));
    }

    #[test]
    fn interprets_failures() {
        let err = interpret_add_node(StatusCode::OK, br#"{"status": "error"}"#).unwrap_err();
        assert!(matches!(err, CommandError::Rejected { status: StatusCode::OK, .. }));

        let err = interpret_add_node(StatusCode::BAD_REQUEST, br#"{"error": "CPU cores must be positive"}"#).unwrap_err();
        assert!(matches!(err, CommandError::Rejected { ref message, .. } if message == "CPU cores must be positive"));

        let err = interpret_add_node(StatusCode::INTERNAL_SERVER_ERROR, b"").unwrap_err();
        assert!(matches!(err, CommandError::Rejected { ref message, .. } if message == "Internal Server Error"));

        assert!(matches!(
            interpret_add_node(StatusCode::OK, br#"{"status": "success"}"#).unwrap_err(),
            CommandError::MissingNodeId
        ));
        assert!(matches!(
            interpret_add_node(StatusCode::OK, b"<html>").unwrap_err(),
            CommandError::InvalidResponse(_)
        ));
    }

    #[test]
    fn state_machine_paths() {
        let mut ok = AddNodeInteraction::new(1);
        assert_eq!(ok.validate(4), Ok(4));
        assert_eq!(ok.state(), AddNodeState::Submitting);
        ok.complete(&Ok(AddedNode { node_id: "x".into(), cpu_cores: None, simulated: false }));
        assert_eq!(ok.state(), AddNodeState::Succeeded);
        assert!(ok.state().is_terminal());

        let mut invalid = AddNodeInteraction::new(2);
        assert!(invalid.validate(0).is_err());
        assert_eq!(invalid.state(), AddNodeState::ValidationFailed);

        let mut garbage = AddNodeInteraction::new(4);
        assert_eq!(garbage.validate_input("lots"), Err(ValidationError::NotAnInteger("lots".into())));
        assert_eq!(garbage.state(), AddNodeState::ValidationFailed);

        let mut failed = AddNodeInteraction::new(3);
        failed.validate(2).unwrap();
        failed.complete(&Err(CommandError::MissingNodeId));
        assert_eq!(failed.state(), AddNodeState::Failed);
    }

    #[test]
    fn late_completion_keeps_the_first_outcome() {
        let mut interaction = AddNodeInteraction::new(7);
        interaction.validate(1).unwrap();
        interaction.complete(&Err(CommandError::MissingNodeId));
        interaction.complete(&Ok(AddedNode { node_id: "x".into(), cpu_cores: None, simulated: false }));
        assert_eq!(interaction.state(), AddNodeState::Failed);
    }

    #[test]
    fn terminal_states_have_no_retry_edge() {
        let mut failed = AddNodeInteraction::new(1);
        failed.validate(2).unwrap();
        failed.complete(&Err(CommandError::MissingNodeId));
        assert!(!failed.advance(AddNodeState::Submitting));
        assert!(!failed.advance(AddNodeState::Validating));
        assert_eq!(failed.state(), AddNodeState::Failed);
        assert!(!AddNodeState::Idle.can_transition_to(AddNodeState::Submitting));
    }
}
