/*!
Stub HTTP de l'API des nodes

Serveur axum local (port éphémère) qui imite `POST /nodes`, `GET /nodes` et
`GET /` et compte les requêtes reçues, pour vérifier par exemple qu'une
entrée invalide ne produit aucun appel réseau.
*/

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use anyhow::Result;

/// Réponse renvoyée par le stub sur `POST /nodes`
#[derive(Debug, Clone)]
pub enum StubReply {
    /// 200 `{"status": "success", "node_id": ...}`
    Success { node_id: String },
    /// 201 au format du serveur d'origine, node id `simulated_node_<n>`
    Created,
    /// Code et corps JSON arbitraires
    Json(u16, Value),
    /// Code et corps texte arbitraires
    Text(u16, String),
}

struct StubState {
    reply: Mutex<StubReply>,
    delay: Mutex<Duration>,
    nodes: Mutex<Value>,
    add_requests: Mutex<Vec<Value>>,
    api_keys: Mutex<Vec<Option<String>>>,
    list_calls: AtomicUsize,
    created: AtomicUsize,
}

pub struct StubNodeApi {
    addr: SocketAddr,
    state: Arc<StubState>,
    handle: JoinHandle<()>,
}

impl StubNodeApi {
    pub async fn start(reply: StubReply) -> Result<Self> {
        let state = Arc::new(StubState {
            reply: Mutex::new(reply),
            delay: Mutex::new(Duration::ZERO),
            nodes: Mutex::new(json!({})),
            add_requests: Mutex::new(Vec::new()),
            api_keys: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
            created: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/", get(server_status))
            .route("/nodes", get(list_nodes).post(add_node))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("[stub-api] server error: {}", e);
            }
        });
        log::info!("[stub-api] listening on http://{}", addr);

        Ok(Self { addr, state, handle })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set_reply(&self, reply: StubReply) {
        *self.state.reply.lock().unwrap() = reply;
    }

    /// Délai appliqué avant chaque réponse `POST /nodes`
    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock().unwrap() = delay;
    }

    /// Contenu renvoyé par `GET /nodes`
    pub fn set_nodes(&self, nodes: Value) {
        *self.state.nodes.lock().unwrap() = nodes;
    }

    pub fn add_node_requests(&self) -> Vec<Value> {
        self.state.add_requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.add_requests.lock().unwrap().len()
    }

    pub fn api_keys_seen(&self) -> Vec<Option<String>> {
        self.state.api_keys.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
        self.state.list_calls.load(Ordering::SeqCst)
    }
}

impl Drop for StubNodeApi {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn add_node(
    State(state): State<Arc<StubState>>,
    headers: axum::http::HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    state.api_keys.lock().unwrap().push(key);
    state.add_requests.lock().unwrap().push(body.clone());

    let delay = *state.delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let reply = state.reply.lock().unwrap().clone();
    match reply {
        StubReply::Success { node_id } => {
            (StatusCode::OK, Json(json!({"status": "success", "node_id": node_id}))).into_response()
        }
        StubReply::Created => {
            let n = state.created.fetch_add(1, Ordering::SeqCst) + 1;
            let node_id = format!("simulated_node_{}", n);
            (
                StatusCode::CREATED,
                Json(json!({
                    "message": "Node added successfully",
                    "node_id": node_id,
                    "cpu_cores": body.get("cpu_cores").cloned().unwrap_or(Value::Null),
                    "is_simulated": true,
                })),
            )
                .into_response()
        }
        StubReply::Json(code, value) => (status(code), Json(value)).into_response(),
        StubReply::Text(code, text) => {
            (status(code), [(header::CONTENT_TYPE, "text/plain")], text).into_response()
        }
    }
}

async fn list_nodes(State(state): State<Arc<StubState>>) -> Json<Value> {
    state.list_calls.fetch_add(1, Ordering::SeqCst);
    Json(state.nodes.lock().unwrap().clone())
}

async fn server_status(State(state): State<Arc<StubState>>) -> Json<Value> {
    let count = state.nodes.lock().unwrap().as_object().map_or(0, |m| m.len());
    Json(json!({
        "status": "API Server running",
        "node_count": count,
        "timestamp": chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
    }))
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
