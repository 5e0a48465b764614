//! In-process stand-in for the OpenAI HTTP API.
//!
//! `/v1/embeddings` answers with hashing-embedder vectors (in reverse index
//! order) after failing the first `embed_failures` requests with 429.
//! `/v1/chat/completions` answers "The sky is blue." when the prompt
//! contains that sentence and "There is no data." otherwise.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use docchat::core::embedding::{Embedder, HashEmbedder};
use serde_json::{json, Value};

#[derive(Default)]
pub struct MockState {
    pub embed_failures: AtomicUsize,
    pub embed_calls: AtomicUsize,
    pub chat_calls: AtomicUsize,
    pub auth_headers: Mutex<Vec<String>>,
    pub chat_status: Mutex<Option<u16>>,
}

pub struct MockOpenAi {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

impl MockOpenAi {
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }
}

fn record_auth(state: &MockState, headers: &HeaderMap) {
    if let Some(value) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        state.auth_headers.lock().unwrap().push(value.to_string());
    }
}

async fn embeddings(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.embed_calls.fetch_add(1, Ordering::SeqCst);
    record_auth(&state, &headers);
    if state
        .embed_failures
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
    {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": { "message": "slow down" } })),
        );
    }

    let inputs: Vec<String> = body["input"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    let vectors = HashEmbedder::new(64).embed(&inputs).await.unwrap();
    let data: Vec<Value> = vectors
        .into_iter()
        .enumerate()
        .rev()
        .map(|(i, v)| json!({ "object": "embedding", "index": i, "embedding": v }))
        .collect();
    (
        StatusCode::OK,
        Json(json!({ "object": "list", "data": data, "model": body["model"] })),
    )
}

async fn chat(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.chat_calls.fetch_add(1, Ordering::SeqCst);
    record_auth(&state, &headers);
    if let Some(status) = *state.chat_status.lock().unwrap() {
        return (
            StatusCode::from_u16(status).unwrap(),
            Json(json!({ "error": { "message": "rejected" } })),
        );
    }

    let prompt = body["messages"][0]["content"].as_str().unwrap_or_default();
    let answer = if prompt.contains("The sky is blue.") {
        "1. **Summary:** The sky is blue."
    } else {
        "1. **Summary:** There is no data."
    };
    (
        StatusCode::OK,
        Json(json!({
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": answer } }]
        })),
    )
}

pub async fn start_mock() -> MockOpenAi {
    let state = Arc::new(MockState::default());
    let app = Router::new()
        .route("/v1/embeddings", post(embeddings))
        .route("/v1/chat/completions", post(chat))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    MockOpenAi { addr, state }
}
