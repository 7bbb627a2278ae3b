//! Mock SLE proxy shared by the integration tests.
//!
//! REST is served by axum on one port and the websocket by a bare
//! tokio-tungstenite listener on another, both on `127.0.0.1:0`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use futures::SinkExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

// ============================================================================
// REST
// ============================================================================

/// One request the mock received.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub body: Option<Value>,
}

#[derive(Clone, Default)]
struct MockState {
    requests: Arc<Mutex<Vec<Recorded>>>,
    responses: Arc<Mutex<HashMap<(Method, String), (StatusCode, Value)>>>,
}

/// REST side of the mock proxy.
pub struct MockProxy {
    pub base_url: String,
    state: MockState,
    _server: JoinHandle<()>,
}

async fn handle(State(state): State<MockState>, method: Method, uri: Uri, body: Bytes) -> Response {
    let path = uri.path().to_string();
    state.requests.lock().push(Recorded {
        method: method.clone(),
        path: path.clone(),
        query: uri.query().map(str::to_string),
        body: serde_json::from_slice(&body).ok(),
    });

    let canned = state.responses.lock().get(&(method.clone(), path)).cloned();
    match canned {
        Some((status, body)) => (status, Json(body)).into_response(),
        None if method == Method::GET => StatusCode::NOT_FOUND.into_response(),
        None => StatusCode::OK.into_response(),
    }
}

impl MockProxy {
    /// Start serving. Unconfigured GETs answer 404, anything else 200.
    pub async fn start() -> Self {
        let state = MockState::default();
        let app = Router::new().fallback(handle).with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            _server: server,
        }
    }

    /// Answer `method path` with `status` and a JSON body.
    pub fn respond(&self, method: Method, path: &str, status: u16, body: Value) {
        self.state.responses.lock().insert(
            (method, path.to_string()),
            (StatusCode::from_u16(status).unwrap(), body),
        );
    }

    /// Every request so far.
    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().clone()
    }

    /// Requests other than GET.
    pub fn mutations(&self) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method != Method::GET)
            .collect()
    }

    /// Number of requests to `method path`.
    pub fn count(&self, method: &Method, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == *method && r.path == path)
            .count()
    }
}

// ============================================================================
// Websocket
// ============================================================================

/// Websocket side of the mock proxy.
pub struct MockSocket {
    listener: TcpListener,
    pub url: String,
}

impl MockSocket {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        Self {
            listener,
            url: format!("ws://{addr}/websocket"),
        }
    }

    pub async fn accept(&self) -> WebSocketStream<TcpStream> {
        let (stream, _) = self.listener.accept().await.unwrap();
        accept_async(stream).await.unwrap()
    }
}

pub async fn send_json(ws: &mut WebSocketStream<TcpStream>, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn forward_profile(name: &str) -> Value {
    json!({
        "profile_name": name,
        "provider_type": "FORWARD",
        "interface_type": "FORWARD",
        "provider_hosts": "localhost:5100",
        "service_instance_id": "sagr=1.spack=VST-PASS0001.fsl-fg=1.cltu=cltu1",
        "user_authentication_mode": "NONE",
        "provider_authentication_mode": "NONE",
    })
}

pub fn unbound_state() -> Value {
    json!({
        "forward_provider": {"state": "UNBOUND", "delivery_mode": ""},
        "return_provider": {"state": "UNBOUND", "delivery_mode": ""},
        "chill_uplink": {"state": "DISABLED"},
        "chill_downlink": {"state": "DISCONNECTED"},
        "forward_config": {},
    })
}

/// Poll `check` until it holds or about two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
