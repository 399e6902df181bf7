use crate::auth::{describe_status, BearerToken, TokenProvider};
use crate::bom;
use crate::config::GatewayConfig;
use crate::errors::{GatewayError, GatewayResult};
use crate::odata::{self, ItemAddress, ItemQuery};
use reqwest::{header, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::sync::{Mutex, RwLock};

/// Uniform outcome of every gateway operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub ok: bool,
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ToolResult {
    pub fn success(payload: Value) -> Self {
        Self {
            ok: true,
            payload,
            error_message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            payload: Value::Null,
            error_message: Some(message.into()),
        }
    }

    fn authentication_failure(error: &GatewayError) -> Self {
        Self::failure(format!("authentication failed: {error}"))
    }
}

impl From<GatewayResult<Value>> for ToolResult {
    fn from(result: GatewayResult<Value>) -> Self {
        match result {
            Ok(payload) => ToolResult::success(payload),
            Err(e) => ToolResult::failure(e.to_string()),
        }
    }
}

/// A relationship is an item of `relationship_type` linking two items by id
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NewRelationship {
    pub source_id: String,
    pub related_id: String,
    pub relationship_type: String,
    #[serde(default)]
    pub extra_properties: Map<String, Value>,
}

impl NewRelationship {
    pub fn new(
        source_id: impl Into<String>,
        related_id: impl Into<String>,
        relationship_type: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            related_id: related_id.into(),
            relationship_type: relationship_type.into(),
            extra_properties: Map::new(),
        }
    }

    pub fn with_properties(mut self, properties: Map<String, Value>) -> Self {
        self.extra_properties = properties;
        self
    }

    /// Extra properties plus `source_id`/`related_id`; the ids always win.
    pub fn to_body(&self) -> Value {
        let mut body = self.extra_properties.clone();
        body.insert("source_id".to_string(), json!(self.source_id));
        body.insert("related_id".to_string(), json!(self.related_id));
        Value::Object(body)
    }
}

/// Gateway operations, named as they appear in error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GetItems,
    CreateItem,
    UpdateItem,
    GetList,
    CallMethod,
    CreateRelationship,
    DeleteRelationship,
    ApplyAml,
    FetchBomStructure,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::GetItems => "get_items",
            Operation::CreateItem => "create_item",
            Operation::UpdateItem => "update_item",
            Operation::GetList => "get_list",
            Operation::CallMethod => "call_method",
            Operation::CreateRelationship => "create_relationship",
            Operation::DeleteRelationship => "delete_relationship",
            Operation::ApplyAml => "apply_aml",
            Operation::FetchBomStructure => "fetch_bom_structure",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Authenticated access to the backend's OData surface.
///
/// Owns the only cached [`BearerToken`] in the process. The token is fetched
/// lazily by the first operation and kept until [`ApiGateway::clear_token`] or
/// a failed [`ApiGateway::test_connection`]; expiry is not tracked. Concurrent
/// first calls share one acquisition.
///
/// No method returns an error: every outcome is a [`ToolResult`].
pub struct ApiGateway {
    config: GatewayConfig,
    base_url: String,
    client: reqwest::Client,
    provider: TokenProvider,
    token: RwLock<Option<BearerToken>>,
    auth_guard: Mutex<()>,
}

impl ApiGateway {
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Configuration(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.odata_base_url(),
            provider: TokenProvider::new(client.clone()),
            client,
            config,
            token: RwLock::new(None),
            auth_guard: Mutex::new(()),
        })
    }

    /// OData root every item, list and method URL is built from
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Backend root as configured
    pub fn server_url(&self) -> &str {
        &self.config.credentials.base_url
    }

    pub async fn has_token(&self) -> bool {
        self.token.read().await.is_some()
    }

    pub async fn clear_token(&self) {
        *self.token.write().await = None;
    }

    /// Force a fresh token acquisition, replacing or clearing the cache.
    pub async fn test_connection(&self) -> ToolResult {
        let _guard = self.auth_guard.lock().await;

        match self.provider.acquire_token(&self.config.credentials).await {
            Ok(token) => {
                *self.token.write().await = Some(token);
                ToolResult::success(json!({
                    "authenticated": true,
                    "server_url": self.server_url(),
                }))
            }
            Err(e) => {
                *self.token.write().await = None;
                tracing::warn!("Connection test against {} failed: {e}", self.server_url());
                ToolResult::authentication_failure(&e)
            }
        }
    }

    pub async fn get_items(&self, endpoint: &str, query: &ItemQuery) -> ToolResult {
        let url = odata::items_url(&self.base_url, endpoint, query);
        self.execute(Operation::GetItems, Method::GET, url, None).await
    }

    pub async fn create_item(&self, endpoint: &str, data: &Value) -> ToolResult {
        let url = ItemAddress::collection(endpoint).to_url(&self.base_url);
        self.execute(Operation::CreateItem, Method::POST, url, Some(data)).await
    }

    /// PATCH only the supplied fields of one item
    pub async fn update_item(&self, endpoint: &str, item_id: &str, data: &Value) -> ToolResult {
        let url = ItemAddress::item(endpoint, item_id).to_url(&self.base_url);
        self.execute(Operation::UpdateItem, Method::PATCH, url, Some(data)).await
    }

    pub async fn get_list(&self, list_id: &str, expand: Option<&str>) -> ToolResult {
        let url = odata::list_url(&self.base_url, list_id, expand);
        self.execute(Operation::GetList, Method::GET, url, None).await
    }

    pub async fn call_method(&self, method_name: &str, data: &Value) -> ToolResult {
        let url = odata::method_url(&self.base_url, method_name, self.config.method_addressing);
        self.execute(Operation::CallMethod, Method::POST, url, Some(data)).await
    }

    pub async fn create_relationship(&self, relationship: &NewRelationship) -> ToolResult {
        let url = ItemAddress::collection(&relationship.relationship_type).to_url(&self.base_url);
        let body = relationship.to_body();
        self.execute(Operation::CreateRelationship, Method::POST, url, Some(&body)).await
    }

    pub async fn delete_relationship(
        &self,
        relationship_type: &str,
        relationship_id: &str,
    ) -> ToolResult {
        let url = ItemAddress::item(relationship_type, relationship_id).to_url(&self.base_url);
        let result = self
            .execute(Operation::DeleteRelationship, Method::DELETE, url, None)
            .await;

        if !result.ok {
            return result;
        }
        ToolResult::success(json!({
            "status": "success",
            "message": format!("{relationship_type} {relationship_id} deleted successfully"),
        }))
    }

    /// Run the configured BOM structure method for one item and flatten the
    /// returned tree into rows carrying their parent's id.
    pub async fn fetch_bom_structure(&self, item_id: &str) -> ToolResult {
        let url = odata::method_url(
            &self.base_url,
            &self.config.bom_method,
            self.config.method_addressing,
        );
        let body = json!({ "id": item_id });
        let result = self
            .execute(Operation::FetchBomStructure, Method::POST, url, Some(&body))
            .await;

        if !result.ok {
            return result;
        }
        let rows = bom::flatten_reply(&result.payload);
        tracing::debug!("BOM for {item_id} flattened into {} rows", rows.len());
        ToolResult::success(json!(rows))
    }

    /// Post a raw AML document to the SOAP endpoint; the reply is returned as text.
    pub async fn apply_aml(&self, aml: &str) -> ToolResult {
        let token = match self.ensure_authenticated().await {
            Ok(token) => token,
            Err(e) => return ToolResult::authentication_failure(&e),
        };

        let url = format!("{}/Server/soap", self.server_url());
        let request = self
            .client
            .post(&url)
            .bearer_auth(token.as_str())
            .header(header::CONTENT_TYPE, "text/xml")
            .header("SOAPAction", "ApplyAML")
            .body(aml.to_string());

        let outcome = self
            .send(Operation::ApplyAml, request)
            .await
            .map(|text| json!({ "result": text }));
        self.finish(Operation::ApplyAml, &url, outcome)
    }

    async fn execute(
        &self,
        operation: Operation,
        method: Method,
        url: String,
        body: Option<&Value>,
    ) -> ToolResult {
        let token = match self.ensure_authenticated().await {
            Ok(token) => token,
            Err(e) => return ToolResult::authentication_failure(&e),
        };

        tracing::debug!("{operation}: {method} {url}");
        let mut request = self
            .client
            .request(method, &url)
            .bearer_auth(token.as_str())
            .header(header::ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let outcome = self
            .send(operation, request)
            .await
            .and_then(|text| parse_json_body(operation, &text));
        self.finish(operation, &url, outcome)
    }

    async fn ensure_authenticated(&self) -> GatewayResult<BearerToken> {
        let cached = self.token.read().await.clone();
        if let Some(token) = cached {
            return Ok(token);
        }

        let _guard = self.auth_guard.lock().await;
        // Another caller may have finished authenticating while we waited
        let cached = self.token.read().await.clone();
        if let Some(token) = cached {
            return Ok(token);
        }

        let token = self
            .provider
            .acquire_token(&self.config.credentials)
            .await
            .inspect_err(|e| {
                tracing::warn!("Authentication against {} failed: {e}", self.server_url())
            })?;
        *self.token.write().await = Some(token.clone());
        Ok(token)
    }

    async fn send(&self, operation: Operation, request: RequestBuilder) -> GatewayResult<String> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::request(
                    operation.name(),
                    format!("request timed out after {}s", self.config.timeout.as_secs()),
                )
            } else {
                GatewayError::request(operation.name(), e.to_string())
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::request(operation.name(), e.to_string()))?;

        if !status.is_success() {
            return Err(GatewayError::request(
                operation.name(),
                describe_status(status, &text),
            ));
        }
        Ok(text)
    }

    fn finish(&self, operation: Operation, url: &str, outcome: GatewayResult<Value>) -> ToolResult {
        if let Err(e) = &outcome {
            tracing::warn!("{operation} against {url} failed: {e}");
        }
        ToolResult::from(outcome)
    }
}

/// Empty 2xx bodies (204 No Content) become `null`
fn parse_json_body(operation: Operation, text: &str) -> GatewayResult<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| {
        GatewayError::request(operation.name(), format!("invalid JSON response: {e}"))
    })
}
