//! Mock attestation service for integration testing.
//!
//! An axum server on an ephemeral local port that answers `/v1/por/run`
//! and `/v1/por/withdraw` from scripted responses and records what it was
//! sent. Fully controllable from test code.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted reply: status code plus JSON body.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
}

impl Reply {
    pub fn fixture(fixture: &str) -> Self {
        Self {
            status: StatusCode::OK,
            body: json!({ "proof_fixture": fixture }),
        }
    }

    pub fn error(status: StatusCode, message: &str, code: Option<&str>) -> Self {
        let body = match code {
            Some(code) => json!({ "message": message, "data": { "code": code } }),
            None => json!({ "message": message }),
        };
        Self { status, body }
    }
}

#[derive(Default)]
struct Inner {
    run_replies: VecDeque<Reply>,
    withdraw_success: bool,
    run_bodies: Vec<Value>,
    auth_headers: Vec<Option<String>>,
    withdraw_calls: usize,
    run_delay: Option<Duration>,
}

/// Handle to a running mock attestor.
#[derive(Clone)]
pub struct MockAttestor {
    inner: Arc<Mutex<Inner>>,
    pub endpoint: String,
}

impl MockAttestor {
    /// Bind to `127.0.0.1:0` and serve in the background.
    pub async fn start() -> Self {
        let inner = Arc::new(Mutex::new(Inner::default()));
        let app = Router::new()
            .route("/v1/por/run", post(run_handler))
            .route("/v1/por/withdraw", post(withdraw_handler))
            .with_state(inner.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            inner,
            endpoint: format!("http://{addr}"),
        }
    }

    /// Queue a reply for the next run call. With the queue empty, runs
    /// answer with an empty fixture.
    pub fn push_run(&self, reply: Reply) {
        self.inner.lock().unwrap().run_replies.push_back(reply);
    }

    /// Delay every run reply, e.g. past the client's request timeout.
    pub fn set_run_delay(&self, delay: Duration) {
        self.inner.lock().unwrap().run_delay = Some(delay);
    }

    pub fn set_withdraw_success(&self, success: bool) {
        self.inner.lock().unwrap().withdraw_success = success;
    }

    pub fn run_bodies(&self) -> Vec<Value> {
        self.inner.lock().unwrap().run_bodies.clone()
    }

    pub fn auth_headers(&self) -> Vec<Option<String>> {
        self.inner.lock().unwrap().auth_headers.clone()
    }

    pub fn withdraw_calls(&self) -> usize {
        self.inner.lock().unwrap().withdraw_calls
    }
}

type Shared = Arc<Mutex<Inner>>;

async fn run_handler(State(shared): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let (reply, delay) = {
        let mut inner = shared.lock().unwrap();
        inner.run_bodies.push(body);
        inner.auth_headers.push(
            headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        );
        let reply = inner.run_replies.pop_front().unwrap_or_else(|| Reply::fixture("{}"));
        (reply, inner.run_delay)
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    (reply.status, Json(reply.body))
}

async fn withdraw_handler(State(inner): State<Shared>) -> Json<Value> {
    let mut inner = inner.lock().unwrap();
    inner.withdraw_calls += 1;
    Json(json!({ "success": inner.withdraw_success }))
}
