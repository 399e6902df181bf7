//! JSON-RPC 2.0 handling shared by the stdio and HTTP transports.

use crate::gateway::ApiGateway;
use crate::tools::ToolDispatcher;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "plm-mcp";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

// JSON-RPC 2.0 message types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: Option<Value>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id,
            method: method.into(),
            params,
        }
    }

    /// A `notifications/*` message without an id; anything with an id is a request.
    pub fn is_notification(&self) -> bool {
        self.id.is_none() && self.method.starts_with("notifications/")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }

    /// Reply for input that is not JSON at all; the id is unknown.
    pub fn parse_error() -> Self {
        Self::failure(None, PARSE_ERROR, "Parse error")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct CallToolParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

fn jsonrpc_version() -> String {
    "2.0".to_string()
}

/// Answers MCP requests against one shared gateway
#[derive(Clone)]
pub struct McpServer {
    dispatcher: ToolDispatcher,
}

impl McpServer {
    pub fn new(gateway: Arc<ApiGateway>) -> Self {
        Self {
            dispatcher: ToolDispatcher::new(gateway),
        }
    }

    /// Handle one raw line or body. `None` means nothing should be sent back.
    pub async fn handle_text(&self, text: &str) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => self.handle_value(value).await,
            Err(e) => {
                tracing::warn!("Failed to parse JSON-RPC message: {e}");
                Some(JsonRpcResponse::parse_error())
            }
        }
    }

    pub async fn handle_value(&self, value: Value) -> Option<JsonRpcResponse> {
        let id = value.get("id").cloned().filter(|id| !id.is_null());
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => self.handle(request).await,
            Err(e) => Some(JsonRpcResponse::failure(
                id,
                INVALID_REQUEST,
                format!("Invalid Request: {e}"),
            )),
        }
    }

    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        tracing::debug!("Processing request: {}", request.method);

        if request.is_notification() {
            tracing::debug!("Notification {} acknowledged", request.method);
            return None;
        }

        let id = request.id;
        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {
                        "tools": {
                            "listChanged": false
                        }
                    },
                    "serverInfo": {
                        "name": SERVER_NAME,
                        "version": SERVER_VERSION
                    }
                }),
            ),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => {
                JsonRpcResponse::success(id, json!({ "tools": self.dispatcher.list_tools() }))
            }
            "tools/call" => {
                let params = request
                    .params
                    .ok_or_else(|| "Invalid params: missing tool call parameters".to_string())
                    .and_then(|params| {
                        serde_json::from_value::<CallToolParams>(params)
                            .map_err(|e| format!("Invalid params: {e}"))
                    });

                match params {
                    Ok(params) => {
                        let result = self
                            .dispatcher
                            .call_tool(&params.name, params.arguments.as_ref())
                            .await;
                        match serde_json::to_value(&result) {
                            Ok(value) => JsonRpcResponse::success(id, value),
                            Err(e) => JsonRpcResponse::failure(id, INTERNAL_ERROR, e.to_string()),
                        }
                    }
                    Err(message) => JsonRpcResponse::failure(id, INVALID_PARAMS, message),
                }
            }
            other => {
                tracing::debug!("Unknown method: {other}");
                JsonRpcResponse::failure(id, METHOD_NOT_FOUND, "Method not found")
            }
        };

        Some(response)
    }
}
