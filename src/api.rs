//! REST API server for the support desk router
//!
//! Every request runs one independent turn; nothing is kept between requests.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::error::RouterError;
use crate::graph::{TurnOutcome, TurnRouter};

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TurnRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessageIn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessageIn>,
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
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub router: Arc<TurnRouter>,
}

fn status_for(error: &RouterError) -> StatusCode {
    match error {
        RouterError::EmptyMessage => StatusCode::BAD_REQUEST,
        e if e.is_external_failure() || e.is_out_of_contract() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn bad_request(rejection: JsonRejection) -> (StatusCode, Json<ApiResponse>) {
    warn!("Rejected request body: {}", rejection.body_text());
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::error(format!(
            "Invalid request body: {}",
            rejection.body_text()
        ))),
    )
}

fn turn_payload(outcome: &TurnOutcome) -> serde_json::Value {
    serde_json::json!({
        "route": outcome.route_decision(),
        "domain": outcome.domain_label(),
        "reply": outcome.reply(),
        "trace": outcome.record.trace,
        "turn_id": outcome.record.turn_id,
        "state_hash": outcome.record.state_hash,
        "elapsed_ms": outcome.record.elapsed_ms,
    })
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
/// Turn Endpoint
/// =============================

async fn run_turn(
    State(state): State<ApiState>,
    payload: Result<Json<TurnRequest>, JsonRejection>,
) -> (StatusCode, Json<ApiResponse>) {
    let Json(req) = match payload {
        Ok(req) => req,
        Err(rejection) => return bad_request(rejection),
    };

    execute_turn(&state, &req.message).await
}

async fn execute_turn(state: &ApiState, message: &str) -> (StatusCode, Json<ApiResponse>) {
    info!(chars = message.len(), "Received turn request");

    match state.router.run_turn(message).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(ApiResponse::success(turn_payload(&outcome))),
        ),
        Err(e) => {
            warn!("Turn failed: {}", e);
            (
                status_for(&e),
                Json(ApiResponse::error(format!("Turn failed: {}", e))),
            )
        }
    }
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> (StatusCode, Json<ApiResponse>) {
    let Json(req) = match payload {
        Ok(req) => req,
        Err(rejection) => return bad_request(rejection),
    };

    // Only the latest user message drives the turn; earlier entries are
    // transcript the client keeps for itself.
    let Some(user_msg) = req
        .messages
        .iter()
        .rev()
        .find(|m| m.role.eq_ignore_ascii_case("user"))
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("No user message found".into())),
        );
    };

    execute_turn(&state, &user_msg.content).await
}

/// =============================
/// Router
/// =============================

pub fn create_router(router: Arc<TurnRouter>) -> Router {
    let state = ApiState { router };

    Router::new()
        .route("/health", get(health))
        .route("/api/turn", post(run_turn))
        .route("/api/chat", post(chat_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    router: Arc<TurnRouter>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let app = create_router(router);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}
