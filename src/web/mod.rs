//! Web chat server.
//!
//! Routes:
//! - `GET /` - single-page chat UI
//! - `POST /api/chat` - answer one question in a session
//! - `DELETE /api/sessions/{id}` - drop a session's history
//! - `GET /api/health` - liveness and configuration summary
//!
//! Turns are serialised through an inference lock, so one inference runs at a
//! time. The session map is only locked briefly around each turn, never
//! across inference. A failed turn returns a JSON error and the session stays
//! usable.

mod page;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;

use crate::llm::LlmError;
use crate::query::{Conversation, QueryError, QueryPipeline};

/// Shared server state.
pub struct AppState {
    pipeline: Arc<QueryPipeline>,
    sessions: Mutex<HashMap<String, Conversation>>,
    inference: Mutex<()>,
    next_session: AtomicU64,
}

impl AppState {
    pub fn new(pipeline: Arc<QueryPipeline>) -> Self {
        Self {
            pipeline,
            sessions: Mutex::new(HashMap::new()),
            inference: Mutex::new(()),
            next_session: AtomicU64::new(1),
        }
    }

    fn new_session_id(&self) -> String {
        let n = self.next_session.fetch_add(1, Ordering::Relaxed);
        format!("{:x}-{n}", chrono::Utc::now().timestamp_millis())
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub answer: String,
    /// Answer with the sources line, as shown in the CLI.
    pub text: String,
    pub sources: Vec<String>,
    pub latency_secs: f64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

fn error_status(error: &QueryError) -> StatusCode {
    match error {
        QueryError::EmptyQuestion => StatusCode::BAD_REQUEST,
        QueryError::Llm(LlmError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn index_page() -> Html<&'static str> {
    Html(page::INDEX_HTML)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "chain_type": state.pipeline.chain_type().as_str(),
        "sessions": state.session_count().await,
    }))
}

async fn chat(State(state): State<Arc<AppState>>, Json(request): Json<ChatRequest>) -> Response {
    let session_id = request
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| state.new_session_id());

    let _turn = state.inference.lock().await;

    // Work on a copy so the map is free while the model runs
    let mut conversation = state
        .sessions
        .lock()
        .await
        .entry(session_id.clone())
        .or_default()
        .clone();

    let result = state.pipeline.ask(&request.question, &mut conversation).await;

    // A session deleted mid-turn stays deleted
    if let Some(slot) = state.sessions.lock().await.get_mut(&session_id) {
        *slot = conversation;
    }

    match result {
        Ok(turn) => {
            let response = ChatResponse {
                session_id,
                text: state.pipeline.render_answer(&turn),
                sources: turn.sources.into_iter().collect(),
                latency_secs: turn.latency.as_secs_f64(),
                answer: turn.answer,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            crate::log_event!("web", "turn failed", "session {session_id}: {e}");
            let status = error_status(&e);
            let body = ErrorResponse {
                error: e.to_string(),
                session_id: Some(session_id),
            };
            (status, Json(body)).into_response()
        }
    }
}

async fn delete_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> StatusCode {
    if state.sessions.lock().await.remove(&id).is_some() {
        crate::debug_event!("web", "session closed", "{id}");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/api/chat", post(chat))
        .route("/api/sessions/{id}", delete(delete_session))
        .route("/api/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until Ctrl+C.
pub async fn serve(state: Arc<AppState>, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    let local = listener.local_addr()?;
    crate::log_event!("web", "listening", "http://{local}");
    eprintln!("Web chat listening on http://{local}");
    eprintln!("Press Ctrl+C to stop the server");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    eprintln!("Web server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(target: "web", "failed to listen for ctrl+c: {e}");
        std::future::pending::<()>().await;
    }
    eprintln!("Received shutdown signal");
}
