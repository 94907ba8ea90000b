//! HTTP surfaces for the stock analyst
//!
//! Two routers share the response wrapper and middleware stack:
//! - the chat surface serves the browser page and forwards each message to
//!   the conversation orchestrator
//! - the playground lists the capability agents and runs one of them directly

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::Html,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::agents::{AgentDescriptor, CapabilityAgent, GREETING};
use crate::conversation::{ConversationOrchestrator, Transcript};
use crate::error::AnalystError;

const CHAT_PAGE: &str = include_str!("static/chat.html");

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub transcript: Transcript,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatExchange {
    pub transcript: Transcript,
    pub display: String,
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub message: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Failure that still carries data (the unchanged transcript)
    pub fn error_with<T: Serialize>(message: String, data: T) -> Self {
        Self {
            data: serde_json::to_value(data).ok(),
            ..Self::error(message)
        }
    }
}

type ApiResult = (StatusCode, Json<ApiResponse>);

fn status_for(err: &AnalystError) -> StatusCode {
    match err {
        AnalystError::AgentNotFound(_) => StatusCode::NOT_FOUND,
        AnalystError::InvalidToolInput(_) => StatusCode::BAD_REQUEST,
        AnalystError::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_GATEWAY,
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ChatState {
    pub orchestrator: Arc<ConversationOrchestrator>,
    pub submit_timeout: Duration,
}

#[derive(Clone)]
pub struct PlaygroundState {
    pub agents: Vec<Arc<dyn CapabilityAgent>>,
    pub platform_api_key: Option<String>,
}

impl PlaygroundState {
    fn agent(&self, agent_id: &str) -> Result<&Arc<dyn CapabilityAgent>, AnalystError> {
        self.agents
            .iter()
            .find(|agent| agent.descriptor().id == agent_id)
            .ok_or_else(|| AnalystError::AgentNotFound(agent_id.to_string()))
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiResult> {
        let Some(expected) = self.platform_api_key.as_deref() else {
            return Ok(());
        };

        let presented = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));

        if presented == Some(expected) {
            Ok(())
        } else {
            warn!("Rejected playground request with missing or invalid bearer token");
            Err((
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::error("Missing or invalid API key".into())),
            ))
        }
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Chat Endpoints
/// =============================

async fn chat_page() -> Html<String> {
    let greeting = GREETING
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    Html(CHAT_PAGE.replace("{{GREETING}}", &greeting))
}

fn invalid_body(rejection: JsonRejection) -> ApiResult {
    warn!("Rejected request body: {}", rejection.body_text());
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::error(format!(
            "Invalid request body: {}",
            rejection.body_text()
        ))),
    )
}

async fn chat_handler(
    State(state): State<ChatState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return invalid_body(rejection),
    };
    let mut transcript = req.transcript;
    info!(turns = transcript.len(), "Received chat message");

    let outcome = tokio::time::timeout(
        state.submit_timeout,
        state.orchestrator.submit(&mut transcript, &req.message),
    )
    .await;

    match outcome {
        Ok(Ok(display)) => (
            StatusCode::OK,
            Json(ApiResponse::success(ChatExchange { transcript, display })),
        ),
        Ok(Err(e)) => {
            error!("Chat submission failed: {}", e);
            let display = transcript.render();
            (
                status_for(&e),
                Json(ApiResponse::error_with(
                    format!("Analysis failed: {}", e),
                    ChatExchange { transcript, display },
                )),
            )
        }
        Err(_) => {
            warn!(timeout_secs = state.submit_timeout.as_secs(), "Chat submission timed out");
            let display = transcript.render();
            (
                StatusCode::GATEWAY_TIMEOUT,
                Json(ApiResponse::error_with(
                    format!(
                        "Analysis timed out after {} seconds",
                        state.submit_timeout.as_secs()
                    ),
                    ChatExchange { transcript, display },
                )),
            )
        }
    }
}

/// =============================
/// Playground Endpoints
/// =============================

async fn list_agents(State(state): State<PlaygroundState>, headers: HeaderMap) -> ApiResult {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }

    let descriptors: Vec<&AgentDescriptor> =
        state.agents.iter().map(|agent| agent.descriptor()).collect();
    (StatusCode::OK, Json(ApiResponse::success(descriptors)))
}

async fn run_agent(
    State(state): State<PlaygroundState>,
    Path(agent_id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> ApiResult {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }

    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return invalid_body(rejection),
    };

    let agent = match state.agent(&agent_id) {
        Ok(agent) => agent,
        Err(e) => return (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    };

    if req.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Message must not be empty".into())),
        );
    }

    info!(agent = %agent_id, "Playground run requested");
    match agent.answer(&req.message).await {
        Ok(reply) => (StatusCode::OK, Json(ApiResponse::success(reply))),
        Err(e) => {
            error!(agent = %agent_id, "Playground run failed: {}", e);
            (
                status_for(&e),
                Json(ApiResponse::error(format!("Agent run failed: {}", e))),
            )
        }
    }
}

/// =============================
/// Routers
/// =============================

pub fn chat_router(state: ChatState) -> Router {
    Router::new()
        .route("/", get(chat_page))
        .route("/health", get(health))
        .route("/api/chat", post(chat_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

pub fn playground_router(state: PlaygroundState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/agents", get(list_agents))
        .route("/api/agents/:agent_id/runs", post(run_agent))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    router: Router,
    host: &str,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;

    info!("Server listening on http://{}:{}", host, port);

    axum::serve(listener, router).await?;

    Ok(())
}
