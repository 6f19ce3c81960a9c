//! Chat assistant HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | The assistant page (`[server].index_file`) |
//! | `POST` | `/api/chat` | Send a message, get the model's reply |
//! | `POST` | `/api/reset` | Forget a session's history |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Failures answer HTTP 500 with an `error` message. Chat failures also
//! carry a user-facing `response`:
//!
//! ```json
//! { "error": "Gemini API error 403", "response": "I apologize, but I encountered an error. Please try again." }
//! ```
//!
//! # Sessions
//!
//! Conversation history is kept in memory per `session_id` (default
//! `"default"`) and lost on restart. The session lock is released while
//! the model is generating, so concurrent turns on one session may
//! interleave.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeFile;

use crate::chat::{create_model, ChatModel, ChatTurn};
use crate::config::Config;

pub const APOLOGY: &str = "I apologize, but I encountered an error. Please try again.";
pub const DEFAULT_SESSION: &str = "default";

type Sessions = Arc<Mutex<HashMap<String, Vec<ChatTurn>>>>;

#[derive(Clone)]
struct AppState {
    model: Arc<dyn ChatModel>,
    sessions: Sessions,
    system_prompt: Arc<str>,
}

/// Starts the server with the model configured in `[chat]`.
///
/// Runs until the process is terminated. Fails if the model cannot be
/// created (for example a missing API key) or the bind address is taken.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let model = create_model(&config.chat)?;
    run_server_with_model(config, model).await
}

/// Like [`run_server`] with an explicit model.
pub async fn run_server_with_model(
    config: &Config,
    model: Arc<dyn ChatModel>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(config, model);

    tracing::info!(
        "chat server listening on http://{} (provider: {}, model: {})",
        bind_addr,
        config.chat.provider,
        config.chat.model
    );

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the application router.
pub fn router(config: &Config, model: Arc<dyn ChatModel>) -> Router {
    let state = AppState {
        model,
        sessions: Arc::new(Mutex::new(HashMap::new())),
        system_prompt: Arc::from(config.chat.system_prompt.as_str()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route_service("/", ServeFile::new(&config.server.index_file))
        .route("/api/chat", post(handle_chat))
        .route("/api/reset", post(handle_reset))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    response: Option<&'static str>,
}

/// Internal error type that converts into a 500 JSON response.
#[derive(Debug)]
struct AppError {
    message: String,
    apology: bool,
}

impl AppError {
    fn chat(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            apology: true,
        }
    }

    fn plain(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            apology: false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            response: self.apology.then_some(APOLOGY),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

fn default_session() -> String {
    DEFAULT_SESSION.to_string()
}

// ============ POST /api/chat ============

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: String,
    #[serde(default = "default_session")]
    session_id: String,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
    session_id: String,
}

async fn handle_chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(req) = body.map_err(|e| AppError::chat(e.body_text()))?;

    let history = {
        let mut sessions = state
            .sessions
            .lock()
            .map_err(|_| AppError::chat("session store poisoned"))?;
        sessions.entry(req.session_id.clone()).or_default().clone()
    };

    let reply = state
        .model
        .generate(&state.system_prompt, &history, &req.message)
        .await
        .map_err(|e| {
            tracing::error!("chat failed for session {}: {:#}", req.session_id, e);
            AppError::chat(e.to_string())
        })?;

    {
        let mut sessions = state
            .sessions
            .lock()
            .map_err(|_| AppError::chat("session store poisoned"))?;
        let turns = sessions.entry(req.session_id.clone()).or_default();
        turns.push(ChatTurn::user(req.message));
        turns.push(ChatTurn::model(reply.clone()));
    }

    Ok(Json(ChatResponse {
        response: reply,
        session_id: req.session_id,
    }))
}

// ============ POST /api/reset ============

#[derive(Deserialize)]
struct ResetRequest {
    #[serde(default = "default_session")]
    session_id: String,
}

#[derive(Serialize)]
struct ResetResponse {
    status: &'static str,
    message: &'static str,
}

async fn handle_reset(
    State(state): State<AppState>,
    body: Result<Json<ResetRequest>, JsonRejection>,
) -> Result<Json<ResetResponse>, AppError> {
    let Json(req) = body.map_err(|e| AppError::plain(e.body_text()))?;
    let removed = state
        .sessions
        .lock()
        .map_err(|_| AppError::plain("session store poisoned"))?
        .remove(&req.session_id)
        .is_some();
    tracing::debug!("reset session {} (existed: {})", req.session_id, removed);

    Ok(Json(ResetResponse {
        status: "success",
        message: "Conversation reset",
    }))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
