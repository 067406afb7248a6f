// src/network/stub.rs
//! In-process getwork server for tests

use crate::miner::work::encode_data;
use crate::miner::work::tests::{FIXTURE_HEADER, FIXTURE_TARGET};
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// A request as the stub saw it
#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub method: String,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

#[derive(Default)]
struct Inner {
    block: AtomicU32,
    omit_block: AtomicBool,
    failing: AtomicBool,
    accepting: AtomicBool,
    long_poll_delay_ms: AtomicU64,
    long_polling: Mutex<Option<String>>,
    requests: Mutex<Vec<Recorded>>,
}

/// Configurable getwork endpoint on `127.0.0.1:0`
///
/// `POST /` and `POST /lp` answer getwork calls, `GET /` and `GET /lp`
/// answer long polls after the configured delay.
#[derive(Clone, Default)]
pub(crate) struct StubPool {
    inner: Arc<Inner>,
}

impl StubPool {
    pub fn new() -> Self {
        let stub = StubPool::default();
        stub.inner.accepting.store(true, Ordering::SeqCst);
        stub
    }

    pub fn set_block(&self, block: u32) {
        self.inner.block.store(block, Ordering::SeqCst);
    }

    pub fn set_omit_block(&self, omit: bool) {
        self.inner.omit_block.store(omit, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_accepting(&self, accepting: bool) {
        self.inner.accepting.store(accepting, Ordering::SeqCst);
    }

    pub fn set_long_poll_delay(&self, delay: Duration) {
        self.inner
            .long_poll_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_long_polling(&self, value: Option<&str>) {
        *self.inner.long_polling.lock() = value.map(str::to_string);
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.inner.requests.lock().clone()
    }

    pub fn last_request(&self) -> Option<Recorded> {
        self.inner.requests.lock().last().cloned()
    }

    /// Binds and serves on the current runtime
    pub async fn serve(&self) -> SocketAddr {
        let app = Router::new()
            .route("/", post(handle).get(handle))
            .route("/lp", post(handle).get(handle))
            .with_state(self.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn work_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if !self.inner.omit_block.load(Ordering::SeqCst) {
            let block = self.inner.block.load(Ordering::SeqCst).to_string();
            headers.insert("X-Blocknum", HeaderValue::from_str(&block).unwrap());
        }
        if let Some(lp) = self.inner.long_polling.lock().as_deref() {
            headers.insert("X-Long-Polling", HeaderValue::from_str(lp).unwrap());
        }
        headers
    }
}

async fn handle(
    State(stub): State<StubPool>,
    method: Method,
    headers: HeaderMap,
    body: String,
) -> Response {
    let body: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    stub.inner.requests.lock().push(Recorded {
        method: method.to_string(),
        headers,
        body: body.clone(),
    });

    if method == Method::GET {
        let delay = stub.inner.long_poll_delay_ms.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    if stub.inner.failing.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let submitted = body["params"]
        .as_array()
        .is_some_and(|params| !params.is_empty());
    if submitted {
        let accepted = stub.inner.accepting.load(Ordering::SeqCst);
        return Json(json!({"id": "json", "result": accepted, "error": null})).into_response();
    }

    let result = json!({
        "data": encode_data(&FIXTURE_HEADER),
        "target": hex::encode(FIXTURE_TARGET),
        "midstate": "00".repeat(32),
        "hash1": "00".repeat(64),
    });
    (
        stub.work_headers(),
        Json(json!({"id": "json", "result": result, "error": null})),
    )
        .into_response()
}
