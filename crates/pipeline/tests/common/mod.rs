//! In-process fake Horde shared by the lifecycle tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use horde_client::HordeApi;
use horde_pipeline::session::PollConfig;

pub const KEY: &str = "test-key";
pub const AGENT: &str = "horde-cli:test:unknown";

/// Switches and counters for the fake server.
#[derive(Default)]
pub struct FakeHorde {
    /// Server root, e.g. `http://127.0.0.1:1234`.
    pub root: OnceLock<String>,
    pub submits: AtomicUsize,
    pub checks: AtomicUsize,
    pub cancels: AtomicUsize,
    pub interrogation_polls: AtomicUsize,
    /// Answer submissions with 401.
    pub reject_submit: AtomicBool,
    /// Report the request as faulted on check.
    pub fault: AtomicBool,
    /// Keep reporting "not done" until `release` is set.
    pub hold: AtomicBool,
    pub release: AtomicBool,
    /// Return `img` as a URL to download instead of base64.
    pub r2: AtomicBool,
    /// Answer checks with a bare 500.
    pub check_error: AtomicBool,
    /// Report that no worker can serve the request.
    pub impossible: AtomicBool,
    /// Never answer checks.
    pub stall_check: AtomicBool,
    /// Add a second generation whose image URL is gone.
    pub broken_second_image: AtomicBool,
    /// Report interrogations as faulted.
    pub fault_interrogation: AtomicBool,
    /// Keep interrogations processing.
    pub hold_interrogation: AtomicBool,
    pub interrogation_cancels: AtomicUsize,
    pub last_submit: std::sync::Mutex<Option<Value>>,
    pub last_rating: std::sync::Mutex<Option<Value>>,
}

impl FakeHorde {
    pub fn api(&self) -> HordeApi {
        HordeApi::new(format!("{}/api", self.root()), KEY, AGENT)
    }

    pub fn root(&self) -> &str {
        self.root.get().map(String::as_str).unwrap_or_default()
    }

    /// Wait (up to a second) until at least `n` checks have been served.
    pub async fn wait_for_checks(&self, n: usize) {
        for _ in 0..200 {
            if self.checks.load(Ordering::SeqCst) >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("fake Horde never saw {n} checks");
    }

    /// Same as [`FakeHorde::wait_for_checks`] for interrogation polls.
    pub async fn wait_for_interrogation_polls(&self, n: usize) {
        for _ in 0..200 {
            if self.interrogation_polls.load(Ordering::SeqCst) >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("fake Horde never saw {n} interrogation polls");
    }
}

pub fn fast_poll() -> PollConfig {
    PollConfig {
        interval: Duration::from_millis(5),
        max_wait: None,
    }
}

/// Start the fake Horde on an ephemeral port.
pub async fn start() -> Arc<FakeHorde> {
    let fake = Arc::new(FakeHorde::default());
    let router = Router::new()
        .route("/api/v2/generate/async", post(submit))
        .route("/api/v2/generate/check/{id}", get(check))
        .route("/api/v2/generate/status/{id}", get(status).delete(cancel))
        .route("/api/v2/generate/rate/{id}", post(rate))
        .route("/api/v2/interrogate/async", post(submit_interrogation))
        .route(
            "/api/v2/interrogate/status/{id}",
            get(interrogation_status).delete(cancel_interrogation),
        )
        .route("/api/v2/find_user", get(find_user))
        .route("/api/v2/users", get(users))
        .route("/api/v2/status/performance", get(performance))
        .route("/api/v2/status/news", get(news))
        .route("/api/v2/workers", get(workers))
        .route("/api/v1/rating/new", get(new_dataset_image))
        .route("/api/v1/rating/{id}", post(rate_dataset_image))
        .route("/img/{name}", get(image))
        .with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    fake.root.set(format!("http://{addr}")).unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    fake
}

type Fake = State<Arc<FakeHorde>>;

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

async fn submit(State(fake): Fake, headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
    fake.submits.fetch_add(1, Ordering::SeqCst);
    *fake.last_submit.lock().unwrap() = Some(body);
    let keyed = headers.get("apikey").and_then(|v| v.to_str().ok()) == Some(KEY);
    if !keyed || fake.reject_submit.load(Ordering::SeqCst) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "Invalid API Key"})));
    }
    (StatusCode::ACCEPTED, Json(json!({"id": "abc", "kudos": 10.0})))
}

async fn check(State(fake): Fake, Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    assert_eq!(id, "abc");
    let n = fake.checks.fetch_add(1, Ordering::SeqCst) + 1;
    if fake.stall_check.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }
    if fake.check_error.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({})));
    }
    if fake.fault.load(Ordering::SeqCst) {
        return (StatusCode::OK, Json(json!({"done": false, "faulted": true})));
    }
    if fake.impossible.load(Ordering::SeqCst) {
        return (StatusCode::OK, Json(json!({"done": false, "is_possible": false})));
    }
    let done = if fake.hold.load(Ordering::SeqCst) {
        fake.release.load(Ordering::SeqCst)
    } else {
        n >= 2
    };
    let body = if done {
        json!({"done": true, "finished": 1})
    } else {
        json!({"done": false, "wait_time": 5, "queue_position": 1})
    };
    (StatusCode::OK, Json(body))
}

async fn status(State(fake): Fake) -> Json<Value> {
    let img = if fake.r2.load(Ordering::SeqCst) {
        format!("{}/img/abc.webp", fake.root())
    } else {
        "aW1n".to_string()
    };
    let mut generations = vec![json!({
        "img": img,
        "seed": "42",
        "id": "gen-1",
        "worker_id": "w-1",
        "worker_name": "worker one",
        "model": "stable_diffusion"
    })];
    if fake.broken_second_image.load(Ordering::SeqCst) {
        generations.push(json!({
            "img": format!("{}/gone/missing.webp", fake.root()),
            "seed": "43",
            "id": "gen-2"
        }));
    }
    Json(json!({"done": true, "generations": generations}))
}

async fn cancel(State(fake): Fake) -> Json<Value> {
    fake.cancels.fetch_add(1, Ordering::SeqCst);
    Json(json!({"done": false, "finished": 0}))
}

async fn rate(State(fake): Fake, Path(id): Path<String>, Json(body): Json<Value>) -> Json<Value> {
    assert_eq!(id, "abc");
    *fake.last_rating.lock().unwrap() = Some(body);
    Json(json!({"reward": 5.0}))
}

async fn image() -> Vec<u8> {
    vec![1, 2, 3]
}

// ---------------------------------------------------------------------------
// Interrogation
// ---------------------------------------------------------------------------

async fn submit_interrogation(Json(body): Json<Value>) -> impl IntoResponse {
    if body["source_image"].as_str().unwrap_or_default().is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({"message": "no image"})));
    }
    (StatusCode::ACCEPTED, Json(json!({"id": "int-1"})))
}

async fn interrogation_status(State(fake): Fake) -> Json<Value> {
    let n = fake.interrogation_polls.fetch_add(1, Ordering::SeqCst) + 1;
    if fake.fault_interrogation.load(Ordering::SeqCst) {
        return Json(json!({"state": "faulted", "forms": []}));
    }
    if n < 2 || fake.hold_interrogation.load(Ordering::SeqCst) {
        Json(json!({"state": "processing", "forms": [{"form": "caption", "state": "processing"}]}))
    } else {
        Json(json!({
            "state": "done",
            "forms": [{"form": "caption", "state": "done", "result": {"caption": "a cat"}}]
        }))
    }
}

async fn cancel_interrogation(State(fake): Fake) -> Json<Value> {
    fake.interrogation_cancels.fetch_add(1, Ordering::SeqCst);
    Json(json!({"state": "cancelled", "forms": []}))
}

// ---------------------------------------------------------------------------
// Users, status, workers
// ---------------------------------------------------------------------------

async fn find_user() -> Json<Value> {
    Json(json!({"id": 99, "username": "me#99", "kudos": 1.0}))
}

async fn users() -> Json<Value> {
    let mut users: Vec<Value> = (1..=11)
        .map(|i| json!({"id": i, "username": format!("user#{i}"), "kudos": 1000.0 - i as f64}))
        .collect();
    users.push(json!({"id": 99, "username": "me#99", "kudos": 1.0}));
    Json(Value::Array(users))
}

async fn performance() -> Json<Value> {
    Json(json!({"queued_requests": 7, "worker_count": 3}))
}

async fn news() -> Json<Value> {
    Json(json!([{"date_published": "2024-01-01", "newspiece": "hello", "importance": "Information"}]))
}

async fn workers() -> Json<Value> {
    Json(json!([
        {"id": "1", "name": "slow", "online": true, "uptime": 10, "models": ["a"]},
        {"id": "2", "name": "offline", "online": false, "uptime": 90, "models": ["a"]},
        {"id": "3", "name": "fast", "online": true, "uptime": 50, "models": ["b"]}
    ]))
}

async fn new_dataset_image() -> Json<Value> {
    Json(json!({"id": "img-1", "url": "https://img.test/1.webp"}))
}

async fn rate_dataset_image(Path(id): Path<String>) -> impl IntoResponse {
    assert_eq!(id, "img-1");
    (StatusCode::CREATED, Json(json!({"reward": 2.0})))
}
