//! Multi-session HTTP server.
//!
//! Every client creates its own session; sessions never share history,
//! index, or warnings. Each session sits behind its own
//! [`tokio::sync::Mutex`]. Uploads mark the session as ingesting, build the
//! new pipeline without holding the lock, then swap it in, so a question
//! that arrives mid-upload is rejected with `not_ready` instead of being
//! answered from a half-built index.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/sessions` | Create a session, returns `{ "id": … }` |
//! | `DELETE` | `/sessions/{id}` | Drop a session and everything it holds |
//! | `POST` | `/sessions/{id}/files` | Upload a batch (base64 file contents) |
//! | `POST` | `/sessions/{id}/ask` | Ask a question |
//! | `GET`  | `/sessions/{id}/messages` | Conversation history |
//! | `GET`  | `/sessions/{id}/warnings` | Warnings from the latest upload |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_ready", "message": "Please upload documents first." } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `not_ready` (409),
//! `busy` (409), `no_segments` (422), `embedding_failed` (502),
//! `internal` (500).

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use base64::Engine as _;
use docchat_core::models::{ChatMessage, UploadedFile};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::ingest::{IngestError, IngestReport, Ingestor};
use crate::session::{AskError, ChatSession, SessionState};

type SharedSession = Arc<Mutex<ChatSession>>;

#[derive(Clone)]
pub struct AppState {
    ingestor: Arc<Ingestor>,
    sessions: Arc<RwLock<HashMap<Uuid, SharedSession>>>,
}

impl AppState {
    pub fn new(ingestor: Arc<Ingestor>) -> Self {
        Self {
            ingestor,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn session(&self, id: &str) -> Result<SharedSession, AppError> {
        let id = Uuid::parse_str(id).map_err(|_| not_found(format!("no session {}", id)))?;
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(format!("no session {}", id)))
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/sessions", post(handle_create_session))
        .route("/sessions/{id}", delete(handle_delete_session))
        .route("/sessions/{id}/files", post(handle_upload))
        .route("/sessions/{id}/ask", post(handle_ask))
        .route("/sessions/{id}/messages", get(handle_messages))
        .route("/sessions/{id}/warnings", get(handle_warnings))
        .layer(cors)
        .with_state(state)
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config, ingestor: Arc<Ingestor>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "docchat server listening");
    serve(listener, ingestor).await
}

/// Serve on an already-bound listener.
pub async fn serve(listener: TcpListener, ingestor: Arc<Ingestor>) -> anyhow::Result<()> {
    axum::serve(listener, router(AppState::new(ingestor))).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn app_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code,
        message: message.into(),
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    app_error(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    app_error(StatusCode::NOT_FOUND, "not_found", message)
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        let (status, code) = match err {
            IngestError::NoUsableSegments => (StatusCode::UNPROCESSABLE_ENTITY, "no_segments"),
            IngestError::Embedding(_) => (StatusCode::BAD_GATEWAY, "embedding_failed"),
            IngestError::Busy => (StatusCode::CONFLICT, "busy"),
        };
        app_error(status, code, err.user_message())
    }
}

impl From<AskError> for AppError {
    fn from(err: AskError) -> Self {
        match err {
            AskError::NotReady(_) => {
                app_error(StatusCode::CONFLICT, "not_ready", err.user_message())
            }
            AskError::EmptyQuestion => bad_request(err.user_message()),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /sessions ============

#[derive(Serialize)]
struct CreateSessionResponse {
    id: Uuid,
}

async fn handle_create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let id = Uuid::new_v4();
    state
        .sessions
        .write()
        .await
        .insert(id, Arc::new(Mutex::new(ChatSession::new())));
    info!(session = %id, "session created");
    (StatusCode::CREATED, Json(CreateSessionResponse { id }))
}

// ============ DELETE /sessions/{id} ============

async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let missing = || not_found(format!("no session {}", id));
    let key = Uuid::parse_str(&id).map_err(|_| missing())?;
    state
        .sessions
        .write()
        .await
        .remove(&key)
        .ok_or_else(missing)?;
    info!(session = %key, "session deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ============ POST /sessions/{id}/files ============

#[derive(Deserialize)]
struct UploadRequest {
    files: Vec<UploadPayload>,
}

#[derive(Deserialize)]
struct UploadPayload {
    name: String,
    content_base64: String,
}

fn decode_uploads(payloads: Vec<UploadPayload>) -> Result<Vec<UploadedFile>, AppError> {
    if payloads.is_empty() {
        return Err(bad_request("files must not be empty"));
    }
    payloads
        .into_iter()
        .map(|p| {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(p.content_base64.as_bytes())
                .map_err(|e| bad_request(format!("{}: invalid base64 ({})", p.name, e)))?;
            Ok(UploadedFile::new(p.name, bytes))
        })
        .collect()
}

const INGEST_CRASHED: &str = "Document processing failed unexpectedly. Please try again.";

async fn handle_upload(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<IngestReport>, AppError> {
    let session = state.session(&id).await?;
    let files = decode_uploads(req.files)?;

    session.lock().await.begin_ingest()?;

    // Runs detached so a dropped connection cannot leave the session stuck
    // in the ingesting state.
    let ingestor = state.ingestor.clone();
    let task_session = session.clone();
    let handle = tokio::spawn(async move {
        let batch = ingestor.prepare(files).await;
        task_session.lock().await.finish_ingest(batch)
    });

    match handle.await {
        Ok(result) => Ok(Json(result?)),
        Err(e) => {
            warn!(session = %id, error = %e, "ingestion task failed");
            session.lock().await.abort_ingest(INGEST_CRASHED);
            Err(app_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                INGEST_CRASHED,
            ))
        }
    }
}

// ============ POST /sessions/{id}/ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AskRequest>,
) -> Result<Json<ChatMessage>, AppError> {
    let session = state.session(&id).await?;
    let reply = session.lock().await.ask(&req.question).await?;
    Ok(Json(reply))
}

// ============ GET /sessions/{id}/messages ============

async fn handle_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    let session = state.session(&id).await?;
    let messages = session.lock().await.messages().to_vec();
    Ok(Json(messages))
}

// ============ GET /sessions/{id}/warnings ============

#[derive(Serialize)]
struct WarningsResponse {
    state: SessionState,
    warnings: Vec<String>,
    last_failure: Option<String>,
}

async fn handle_warnings(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WarningsResponse>, AppError> {
    let session = state.session(&id).await?;
    let session = session.lock().await;
    Ok(Json(WarningsResponse {
        state: session.state(),
        warnings: session.ingest_warnings().to_vec(),
        last_failure: session.last_failure().map(str::to_string),
    }))
}
