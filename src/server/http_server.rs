//! Axum application behind the `plm-mcp-http` binary.

use crate::config::GatewayConfig;
use crate::gateway::ApiGateway;
use crate::protocol::{McpServer, PARSE_ERROR, SERVER_NAME, SERVER_VERSION};
use crate::tools::tool_definitions;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub const DEFAULT_PORT: u16 = 8123;

#[derive(Clone)]
pub struct AppState {
    server: McpServer,
    config: GatewayConfig,
}

impl AppState {
    /// One shared gateway serves every `/mcp` request
    pub fn new(config: GatewayConfig) -> crate::errors::GatewayResult<Self> {
        let gateway = Arc::new(ApiGateway::new(config.clone())?);
        Ok(Self {
            server: McpServer::new(gateway),
            config,
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/mcp", post(mcp_endpoint))
        .route("/health", get(health_check))
        .route("/status", get(status_check))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn mcp_endpoint(State(state): State<AppState>, body: String) -> Response {
    match state.server.handle_text(&body).await {
        Some(response) => {
            let parse_failed = response
                .error
                .as_ref()
                .is_some_and(|error| error.code == PARSE_ERROR);
            if parse_failed {
                (StatusCode::BAD_REQUEST, Json(response)).into_response()
            } else {
                Json(response).into_response()
            }
        }
        // Notifications are accepted without a reply
        None => StatusCode::ACCEPTED.into_response(),
    }
}

// Liveness only; never touches the backend
async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVER_NAME,
        "version": SERVER_VERSION,
        "backend_url": state.config.credentials.base_url,
        "timestamp": Utc::now().to_rfc3339()
    }))
}

/// Authenticate with a throwaway gateway so the shared token cache is untouched.
async fn status_check(State(state): State<AppState>) -> Json<Value> {
    let available_tools: Vec<String> = tool_definitions().into_iter().map(|t| t.name).collect();
    let mut status = json!({
        "service": SERVER_NAME,
        "version": SERVER_VERSION,
        "backend_url": state.config.credentials.base_url,
        "available_tools": available_tools,
    });

    match ApiGateway::new(state.config.clone()) {
        Ok(gateway) => {
            let result = gateway.test_connection().await;
            if result.ok {
                status["authentication"] = json!("connected");
            } else {
                status["authentication"] = json!("failed");
                status["error"] = json!(result.error_message);
            }
        }
        Err(e) => {
            tracing::error!("Cannot build gateway for status check: {e}");
            status["authentication"] = json!("error");
            status["error"] = json!(e.to_string());
        }
    }

    Json(status)
}
