use crate::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::tools::{CallToolResult, ToolDefinition};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct ToolList {
    tools: Vec<ToolDefinition>,
}

/// Talks to a running `plm-mcp-http` server
#[derive(Debug, Clone)]
pub struct McpHttpClient {
    base_url: String,
    client: reqwest::Client,
}

impl McpHttpClient {
    /// `base_url` is the server root, e.g. `http://localhost:8123`.
    /// A trailing `/mcp` is accepted and stripped.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let base_url = base_url
            .trim_end_matches('/')
            .trim_end_matches("/mcp")
            .to_string();

        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn initialize(&self) -> Result<Value> {
        self.request(
            "initialize",
            Some(json!({
                "protocolVersion": crate::protocol::PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": "plm-mcp-client",
                    "version": env!("CARGO_PKG_VERSION")
                }
            })),
        )
        .await
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolDefinition>> {
        let result = self.request("tools/list", None).await?;
        let list: ToolList =
            serde_json::from_value(result).context("Malformed tools/list result")?;
        Ok(list.tools)
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult> {
        let result = self
            .request(
                "tools/call",
                Some(json!({ "name": name, "arguments": arguments })),
            )
            .await?;
        serde_json::from_value(result).context("Malformed tools/call result")
    }

    pub async fn health(&self) -> Result<Value> {
        self.get_json("health").await
    }

    pub async fn status(&self) -> Result<Value> {
        self.get_json("status").await
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let request = JsonRpcRequest::new(Some(json!(Uuid::new_v4().to_string())), method, params);
        let url = format!("{}/mcp", self.base_url);
        tracing::debug!("POST {url} {method}");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to reach {url}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("{method} failed with HTTP {status}"));
        }

        let response: JsonRpcResponse = response
            .json()
            .await
            .with_context(|| format!("Invalid JSON-RPC response to {method}"))?;

        if let Some(error) = response.error {
            return Err(anyhow!(
                "{method} failed: {} ({})",
                error.message,
                error.code
            ));
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let url = format!("{}/{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to reach {url}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("GET {url} returned HTTP {status}"));
        }
        response
            .json()
            .await
            .with_context(|| format!("Invalid JSON from {url}"))
    }
}
