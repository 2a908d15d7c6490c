//! REST API server for the banking assistant
//!
//! Exposes the turn orchestrator via HTTP. Channel adapters post one
//! message per turn and receive the reply text.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::error::AgentError;
use crate::models::{ActivityType, TurnMessage};
use crate::orchestrator::TurnOrchestrator;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub conversation_id: Option<String>,
    pub text: String,
    pub activity_type: Option<String>,
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
    pub orchestrator: Arc<TurnOrchestrator>,
}

/// =============================
/// Helpers — Conversation Ids
/// =============================

fn stable_uuid_from_string(input: &str) -> uuid::Uuid {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    uuid::Uuid::from_bytes(bytes)
}

/// Channels hand us arbitrary conversation-id strings; anything that is not
/// already a UUID is mapped to a stable one so state lookups stay keyed
/// consistently across turns.
fn parse_or_stable_uuid(value: Option<&str>, fallback_seed: &str) -> uuid::Uuid {
    match value {
        Some(v) if !v.trim().is_empty() => {
            uuid::Uuid::parse_str(v).unwrap_or_else(|_| stable_uuid_from_string(v))
        }
        _ => stable_uuid_from_string(fallback_seed),
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
/// Message Endpoint
/// =============================

async fn post_message(
    State(state): State<ApiState>,
    Json(req): Json<MessageRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let conversation_id =
        parse_or_stable_uuid(req.conversation_id.as_deref(), "anonymous-conversation");
    let activity_type = ActivityType::parse(req.activity_type.as_deref().unwrap_or("message"));

    info!(%conversation_id, ?activity_type, "Received message");

    let message = TurnMessage {
        conversation_id,
        text: req.text,
        activity_type,
    };

    match state.orchestrator.handle_message(message).await {
        Ok(reply) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "conversation_id": conversation_id,
                "reply": reply,
            }))),
        ),
        Err(error @ AgentError::Parse { .. }) => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(error.to_string())),
        ),
        Err(error) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Turn failed: {}", error))),
        ),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<TurnOrchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", axum::routing::get(health))
        .route("/api/message", post(post_message))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: Arc<TurnOrchestrator>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_uuid_is_deterministic() {
        let a = stable_uuid_from_string("teams-channel-42");
        let b = stable_uuid_from_string("teams-channel-42");
        let c = stable_uuid_from_string("teams-channel-43");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_parse_or_stable_uuid_accepts_real_uuids() {
        let id = uuid::Uuid::new_v4();
        let parsed = parse_or_stable_uuid(Some(&id.to_string()), "fallback");
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_blank_conversation_id_uses_fallback_seed() {
        let a = parse_or_stable_uuid(Some("   "), "anonymous-conversation");
        let b = parse_or_stable_uuid(None, "anonymous-conversation");
        assert_eq!(a, b);
    }
}
