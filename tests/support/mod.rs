// Programmable mock judging backend shared by the integration tests.
// Served with axum on an ephemeral port so the reqwest transport goes over
// real sockets.
#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One endpoint's scripted behavior: queued one-shot responses consumed in
/// order, then the default response repeated forever. Counts hits.
pub struct Scripted {
    queue: Mutex<VecDeque<(u16, Value)>>,
    default: Mutex<(u16, Value)>,
    hits: AtomicUsize,
}

impl Scripted {
    fn new(status: u16, body: Value) -> Self {
        Scripted {
            queue: Mutex::new(VecDeque::new()),
            default: Mutex::new((status, body)),
            hits: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, status: u16, body: Value) {
        self.queue.lock().unwrap().push_back((status, body));
    }

    pub fn set_default(&self, status: u16, body: Value) {
        *self.default.lock().unwrap() = (status, body);
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn next(&self) -> (u16, Value) {
        self.hits.fetch_add(1, Ordering::SeqCst);
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.lock().unwrap().clone())
    }
}

pub struct JudgeState {
    /// POST /submissions/run
    pub run_create: Scripted,
    /// POST /submissions
    pub create: Scripted,
    /// GET /submissions/{id}
    pub fetch: Scripted,
    /// GET /problems/{id}/submissions
    pub list: Scripted,
    /// Last Authorization header seen on any request.
    pub last_auth: Mutex<Option<String>>,
    /// Delay applied by GET /slow before answering.
    pub slow_delay: Duration,
}

impl JudgeState {
    pub fn new() -> Arc<Self> {
        Arc::new(JudgeState {
            run_create: Scripted::new(200, json!({"submission_id": "run-1"})),
            create: Scripted::new(200, json!({"submission_id": "sub-1"})),
            fetch: Scripted::new(200, json!({"status": "Pending", "results": []})),
            list: Scripted::new(200, json!([])),
            last_auth: Mutex::new(None),
            slow_delay: Duration::from_secs(2),
        })
    }
}

fn reply((status, body): (u16, Value)) -> impl IntoResponse {
    (
        StatusCode::from_u16(status).expect("scripted status"),
        Json(body),
    )
}

fn record_auth(state: &JudgeState, headers: &HeaderMap) {
    *state.last_auth.lock().unwrap() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
}

async fn run_create(
    State(state): State<Arc<JudgeState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    record_auth(&state, &headers);
    reply(state.run_create.next())
}

async fn create(State(state): State<Arc<JudgeState>>, headers: HeaderMap) -> impl IntoResponse {
    record_auth(&state, &headers);
    reply(state.create.next())
}

async fn fetch(
    State(state): State<Arc<JudgeState>>,
    Path(_id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    record_auth(&state, &headers);
    reply(state.fetch.next())
}

async fn list(
    State(state): State<Arc<JudgeState>>,
    Path(_id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    record_auth(&state, &headers);
    reply(state.list.next())
}

async fn slow(State(state): State<Arc<JudgeState>>) -> impl IntoResponse {
    tokio::time::sleep(state.slow_delay).await;
    reply((200, json!({})))
}

/// Serve the mock backend; returns its base URL.
pub async fn spawn_judge(state: Arc<JudgeState>) -> String {
    let app = Router::new()
        .route("/submissions/run", post(run_create))
        .route("/submissions", post(create))
        .route("/submissions/{id}", get(fetch))
        .route("/problems/{id}/submissions", get(list))
        .route("/slow", get(slow))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve mock judge");
    });
    format!("http://{addr}/")
}

/// A Pending snapshot body.
pub fn pending() -> Value {
    json!({"status": "Pending", "results": []})
}

/// A terminal snapshot body with the given status and outcome rows.
pub fn snapshot(status: &str, results: Value) -> Value {
    json!({"status": status, "results": results})
}
