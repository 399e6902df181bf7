use crate::errors::{ErrorContext, GatewayError, GatewayResult};
use crate::gateway::{ApiGateway, NewRelationship, ToolResult};
use crate::odata::ItemQuery;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// A tool as advertised through `tools/list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolDefinition {
    fn new(name: &str, description: &str, input_schema: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

/// Result of `tools/call`: always text, flagged when it describes a failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolResult {
    pub content: Vec<TextContent>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl CallToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![TextContent {
                content_type: "text".to_string(),
                text: text.into(),
            }],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(text)
        }
    }

    pub fn first_text(&self) -> &str {
        self.content.first().map(|c| c.text.as_str()).unwrap_or("")
    }
}

/// Every tool the server exposes, in listing order
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "test_connection",
            "Test connection and authentication with the PLM server",
            json!({ "type": "object", "properties": {} }),
        ),
        ToolDefinition::new(
            "get_items",
            "GET operation - Retrieve items of an ItemType using OData",
            json!({
                "type": "object",
                "properties": {
                    "endpoint": {
                        "type": "string",
                        "description": "The ItemType to retrieve (e.g., 'Part', 'Document', 'User')"
                    },
                    "expand": {
                        "type": "string",
                        "description": "Optional: OData $expand parameter for related data"
                    },
                    "filter": {
                        "type": "string",
                        "description": "Optional: OData $filter parameter for filtering results"
                    },
                    "select": {
                        "type": "string",
                        "description": "Optional: OData $select parameter for specific fields"
                    }
                },
                "required": ["endpoint"]
            }),
        ),
        ToolDefinition::new(
            "create_item",
            "POST operation - Create a new item of an ItemType",
            json!({
                "type": "object",
                "properties": {
                    "endpoint": {
                        "type": "string",
                        "description": "The ItemType to create (e.g., 'Part', 'Document')"
                    },
                    "data": {
                        "type": "object",
                        "description": "The item properties as a JSON object"
                    }
                },
                "required": ["endpoint", "data"]
            }),
        ),
        ToolDefinition::new(
            "update_item",
            "PATCH operation - Update selected properties of an existing item",
            json!({
                "type": "object",
                "properties": {
                    "endpoint": {
                        "type": "string",
                        "description": "The ItemType of the item (e.g., 'Part')"
                    },
                    "item_id": {
                        "type": "string",
                        "description": "The id of the item to update"
                    },
                    "data": {
                        "type": "object",
                        "description": "Only the properties to change"
                    }
                },
                "required": ["endpoint", "item_id", "data"]
            }),
        ),
        ToolDefinition::new(
            "call_method",
            "Call a server method with JSON parameters",
            json!({
                "type": "object",
                "properties": {
                    "method_name": {
                        "type": "string",
                        "description": "The server method to call"
                    },
                    "data": {
                        "type": "object",
                        "description": "The method parameters as a JSON object"
                    }
                },
                "required": ["method_name", "data"]
            }),
        ),
        ToolDefinition::new(
            "get_list",
            "Get list values (e.g., dropdown values, document types)",
            json!({
                "type": "object",
                "properties": {
                    "list_id": {
                        "type": "string",
                        "description": "The list id to retrieve values from"
                    },
                    "expand": {
                        "type": "string",
                        "description": "Optional: OData $expand parameter (e.g., 'Value' for list values)"
                    }
                },
                "required": ["list_id"]
            }),
        ),
        ToolDefinition::new(
            "create_relationship",
            "Create a relationship item linking a source item to a related item",
            json!({
                "type": "object",
                "properties": {
                    "source_id": {
                        "type": "string",
                        "description": "The id of the source item"
                    },
                    "related_id": {
                        "type": "string",
                        "description": "The id of the related item"
                    },
                    "relationship_type": {
                        "type": "string",
                        "description": "The relationship ItemType (e.g., 'Part BOM', 'Document File')"
                    },
                    "data": {
                        "type": "object",
                        "description": "Optional: additional relationship properties (quantity, sort_order, ...)"
                    }
                },
                "required": ["source_id", "related_id", "relationship_type"]
            }),
        ),
        ToolDefinition::new(
            "delete_relationship",
            "Delete a relationship item by id",
            json!({
                "type": "object",
                "properties": {
                    "relationship_type": {
                        "type": "string",
                        "description": "The relationship ItemType (e.g., 'Part BOM')"
                    },
                    "relationship_id": {
                        "type": "string",
                        "description": "The id of the relationship item to delete"
                    }
                },
                "required": ["relationship_type", "relationship_id"]
            }),
        ),
        ToolDefinition::new(
            "apply_aml",
            "Execute a raw AML query against the server",
            json!({
                "type": "object",
                "properties": {
                    "aml": {
                        "type": "string",
                        "description": "The AML document to apply"
                    }
                },
                "required": ["aml"]
            }),
        ),
        ToolDefinition::new(
            "fetch_bom_structure",
            "Fetch the BOM structure of an item as a flat list of rows with parentId links",
            json!({
                "type": "object",
                "properties": {
                    "item_id": {
                        "type": "string",
                        "description": "The id of the top-level item"
                    }
                },
                "required": ["item_id"]
            }),
        ),
        ToolDefinition::new(
            "upload_file",
            "Upload a file to the PLM vault (reserved, not implemented)",
            json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "The absolute path to the file to upload"
                    },
                    "filename": {
                        "type": "string",
                        "description": "Optional: custom filename for the uploaded file"
                    }
                },
                "required": ["file_path"]
            }),
        ),
        ToolDefinition::new(
            "create_document_with_file",
            "Create a Document, upload a file and link them (reserved, not implemented)",
            json!({
                "type": "object",
                "properties": {
                    "document_data": {
                        "type": "object",
                        "description": "Document item data (item_number, name, description, ...)"
                    },
                    "file_path": {
                        "type": "string",
                        "description": "The absolute path to the file to upload"
                    },
                    "filename": {
                        "type": "string",
                        "description": "Optional: custom filename for the uploaded file"
                    }
                },
                "required": ["document_data", "file_path"]
            }),
        ),
    ]
}

#[derive(Debug, Deserialize)]
struct GetItemsArgs {
    endpoint: String,
    #[serde(default)]
    expand: Option<String>,
    #[serde(default)]
    filter: Option<String>,
    #[serde(default)]
    select: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateItemArgs {
    endpoint: String,
    data: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct UpdateItemArgs {
    endpoint: String,
    item_id: String,
    data: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct CallMethodArgs {
    method_name: String,
    data: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct GetListArgs {
    list_id: String,
    #[serde(default)]
    expand: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateRelationshipArgs {
    source_id: String,
    related_id: String,
    relationship_type: String,
    #[serde(default)]
    data: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct DeleteRelationshipArgs {
    relationship_type: String,
    relationship_id: String,
}

#[derive(Debug, Deserialize)]
struct ApplyAmlArgs {
    aml: String,
}

#[derive(Debug, Deserialize)]
struct FetchBomStructureArgs {
    item_id: String,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct UploadFileArgs {
    file_path: String,
    #[serde(default)]
    filename: Option<String>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct CreateDocumentWithFileArgs {
    document_data: Map<String, Value>,
    file_path: String,
    #[serde(default)]
    filename: Option<String>,
}

/// Maps tool names onto [`ApiGateway`] operations and renders results as text
#[derive(Clone)]
pub struct ToolDispatcher {
    gateway: Arc<ApiGateway>,
}

impl ToolDispatcher {
    pub fn new(gateway: Arc<ApiGateway>) -> Self {
        Self { gateway }
    }

    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        tool_definitions()
    }

    /// Run one tool. Never fails: problems come back as `Error: ...` text.
    pub async fn call_tool(&self, name: &str, arguments: Option<&Value>) -> CallToolResult {
        let arguments = arguments.cloned().unwrap_or_else(|| json!({}));
        tracing::info!("Calling tool {name}");

        match self.dispatch(name, arguments).await {
            Ok(Ok(text)) => CallToolResult::text(text),
            Ok(Err(message)) => {
                tracing::warn!("Tool {name} failed: {message}");
                CallToolResult::error(format!("Error: {message}"))
            }
            Err(error) => {
                let context = ErrorContext::new(error).with_context("tool", name);
                context.log();
                CallToolResult::error(context.user_message())
            }
        }
    }

    /// Outer error: the call never reached the gateway. Inner error: the
    /// gateway's own failure message.
    async fn dispatch(
        &self,
        name: &str,
        arguments: Value,
    ) -> GatewayResult<Result<String, String>> {
        let gateway = &self.gateway;

        let rendered = match name {
            "test_connection" => {
                let server_url = gateway.server_url().to_string();
                render(gateway.test_connection().await, |_| {
                    format!(
                        "Successfully authenticated with the PLM server.\nServer URL: {server_url}"
                    )
                })
            }
            "get_items" => {
                let args: GetItemsArgs = parse_args(name, arguments)?;
                require_non_empty("endpoint", &args.endpoint)?;
                let query = ItemQuery {
                    expand: args.expand,
                    filter: args.filter,
                    select: args.select,
                };
                render(gateway.get_items(&args.endpoint, &query).await, |payload| {
                    format!("Retrieved items from {}:\n{}", args.endpoint, pretty(payload))
                })
            }
            "create_item" => {
                let args: CreateItemArgs = parse_args(name, arguments)?;
                require_non_empty("endpoint", &args.endpoint)?;
                let data = Value::Object(args.data);
                render(gateway.create_item(&args.endpoint, &data).await, |payload| {
                    format!(
                        "Successfully created item at {}:\n{}",
                        args.endpoint,
                        pretty(payload)
                    )
                })
            }
            "update_item" => {
                let args: UpdateItemArgs = parse_args(name, arguments)?;
                require_non_empty("endpoint", &args.endpoint)?;
                require_non_empty("item_id", &args.item_id)?;
                let data = Value::Object(args.data);
                let result = gateway
                    .update_item(&args.endpoint, &args.item_id, &data)
                    .await;
                render(result, |payload| {
                    format!(
                        "Successfully updated {} {}:\n{}",
                        args.endpoint,
                        args.item_id,
                        pretty(payload)
                    )
                })
            }
            "call_method" => {
                let args: CallMethodArgs = parse_args(name, arguments)?;
                require_non_empty("method_name", &args.method_name)?;
                let data = Value::Object(args.data);
                render(gateway.call_method(&args.method_name, &data).await, |payload| {
                    format!("Method {} result:\n{}", args.method_name, pretty(payload))
                })
            }
            "get_list" => {
                let args: GetListArgs = parse_args(name, arguments)?;
                require_non_empty("list_id", &args.list_id)?;
                let result = gateway.get_list(&args.list_id, args.expand.as_deref()).await;
                render(result, |payload| {
                    format!("List {} data:\n{}", args.list_id, pretty(payload))
                })
            }
            "create_relationship" => {
                let args: CreateRelationshipArgs = parse_args(name, arguments)?;
                require_non_empty("source_id", &args.source_id)?;
                require_non_empty("related_id", &args.related_id)?;
                require_non_empty("relationship_type", &args.relationship_type)?;
                let relationship = NewRelationship::new(
                    args.source_id.clone(),
                    args.related_id.clone(),
                    args.relationship_type.clone(),
                )
                .with_properties(args.data.unwrap_or_default());
                render(gateway.create_relationship(&relationship).await, |payload| {
                    format!(
                        "Successfully created {} relationship:\nSource: {}\nTarget: {}\nResult: {}",
                        args.relationship_type,
                        args.source_id,
                        args.related_id,
                        pretty(payload)
                    )
                })
            }
            "delete_relationship" => {
                let args: DeleteRelationshipArgs = parse_args(name, arguments)?;
                require_non_empty("relationship_type", &args.relationship_type)?;
                require_non_empty("relationship_id", &args.relationship_id)?;
                let result = gateway
                    .delete_relationship(&args.relationship_type, &args.relationship_id)
                    .await;
                render(result, pretty)
            }
            "apply_aml" => {
                let args: ApplyAmlArgs = parse_args(name, arguments)?;
                require_non_empty("aml", &args.aml)?;
                render(gateway.apply_aml(&args.aml).await, |payload| {
                    let text = payload["result"].as_str().unwrap_or_default();
                    format!("AML result:\n{text}")
                })
            }
            "fetch_bom_structure" => {
                let args: FetchBomStructureArgs = parse_args(name, arguments)?;
                require_non_empty("item_id", &args.item_id)?;
                render(gateway.fetch_bom_structure(&args.item_id).await, |payload| {
                    let rows = payload.as_array().map(Vec::len).unwrap_or_default();
                    format!(
                        "BOM structure for {} ({rows} rows):\n{}",
                        args.item_id,
                        pretty(payload)
                    )
                })
            }
            "upload_file" => {
                let _args: UploadFileArgs = parse_args(name, arguments)?;
                return Err(GatewayError::NotImplemented {
                    feature: "file upload".to_string(),
                });
            }
            "create_document_with_file" => {
                let _args: CreateDocumentWithFileArgs = parse_args(name, arguments)?;
                return Err(GatewayError::NotImplemented {
                    feature: "document with file creation".to_string(),
                });
            }
            other => {
                return Err(GatewayError::Validation(format!("unknown tool: {other}")));
            }
        };

        Ok(rendered)
    }
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> GatewayResult<T> {
    serde_json::from_value(arguments)
        .map_err(|e| GatewayError::Validation(format!("invalid arguments for {tool}: {e}")))
}

fn require_non_empty(field: &str, value: &str) -> GatewayResult<()> {
    if value.trim().is_empty() {
        return Err(GatewayError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

fn render(result: ToolResult, success: impl FnOnce(&Value) -> String) -> Result<String, String> {
    if result.ok {
        Ok(success(&result.payload))
    } else {
        Err(result
            .error_message
            .unwrap_or_else(|| "unknown failure".to_string()))
    }
}

fn pretty(payload: &Value) -> String {
    serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{gateway_config, mount_oauth};
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn dispatcher_for(server: &MockServer) -> ToolDispatcher {
        mount_oauth(server, "tool-token").await;
        let gateway = ApiGateway::new(gateway_config(server)).unwrap();
        ToolDispatcher::new(Arc::new(gateway))
    }

    #[test]
    fn test_tool_catalog() {
        let names: Vec<String> = tool_definitions().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                "test_connection",
                "get_items",
                "create_item",
                "update_item",
                "call_method",
                "get_list",
                "create_relationship",
                "delete_relationship",
                "apply_aml",
                "fetch_bom_structure",
                "upload_file",
                "create_document_with_file",
            ]
        );

        for tool in tool_definitions() {
            assert_eq!(tool.input_schema["type"], "object", "{}", tool.name);
            assert!(!tool.description.is_empty());
        }
    }

    #[test]
    fn test_tool_definition_serializes_input_schema_in_camel_case() {
        let value = serde_json::to_value(&tool_definitions()[1]).unwrap();
        assert_eq!(value["name"], "get_items");
        assert_eq!(value["inputSchema"]["required"], json!(["endpoint"]));
    }

    #[tokio::test]
    async fn test_get_items_renders_payload() {
        let server = MockServer::start().await;
        let dispatcher = dispatcher_for(&server).await;
        Mock::given(method("GET"))
            .and(path("/Server/odata/Part"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "value": [{ "id": "1" }] })),
            )
            .mount(&server)
            .await;

        let result = dispatcher
            .call_tool("get_items", Some(&json!({ "endpoint": "Part" })))
            .await;

        assert!(!result.is_error);
        assert!(result.first_text().starts_with("Retrieved items from Part:\n"));
        assert!(result.first_text().contains("\"id\": \"1\""));
    }

    #[tokio::test]
    async fn test_missing_required_argument_skips_backend() {
        let server = MockServer::start().await;
        let dispatcher = dispatcher_for(&server).await;

        let result = dispatcher
            .call_tool("create_item", Some(&json!({ "endpoint": "Part" })))
            .await;

        assert!(result.is_error);
        assert!(
            result
                .first_text()
                .starts_with("Error: invalid arguments for create_item"),
            "{}",
            result.first_text()
        );
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_absent_arguments_are_validated() {
        let server = MockServer::start().await;
        let dispatcher = dispatcher_for(&server).await;

        let result = dispatcher.call_tool("get_list", None).await;
        assert!(result.is_error);
        assert!(result.first_text().contains("list_id"));
    }

    #[tokio::test]
    async fn test_blank_identifier_is_rejected() {
        let server = MockServer::start().await;
        let dispatcher = dispatcher_for(&server).await;

        let result = dispatcher
            .call_tool(
                "delete_relationship",
                Some(&json!({ "relationship_type": "Part BOM", "relationship_id": " " })),
            )
            .await;
        assert_eq!(
            result,
            CallToolResult::error("Error: relationship_id must not be empty")
        );
    }

    #[tokio::test]
    async fn test_gateway_failure_renders_error_text() {
        let server = MockServer::start().await;
        let dispatcher = dispatcher_for(&server).await;
        Mock::given(method("POST"))
            .and(path("/Server/odata/method.Explode"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let result = dispatcher
            .call_tool(
                "call_method",
                Some(&json!({ "method_name": "Explode", "data": {} })),
            )
            .await;

        assert_eq!(
            result,
            CallToolResult::error("Error: call_method error: HTTP 400 Bad Request")
        );
    }

    #[tokio::test]
    async fn test_create_relationship_passes_extra_data() {
        let server = MockServer::start().await;
        let dispatcher = dispatcher_for(&server).await;
        Mock::given(method("POST"))
            .and(path("/Server/odata/Part%20BOM"))
            .and(body_json(json!({ "source_id": "A", "related_id": "B", "quantity": 2 })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "R1" })))
            .expect(1)
            .mount(&server)
            .await;

        let result = dispatcher
            .call_tool(
                "create_relationship",
                Some(&json!({
                    "source_id": "A",
                    "related_id": "B",
                    "relationship_type": "Part BOM",
                    "data": { "quantity": 2 }
                })),
            )
            .await;

        assert!(!result.is_error, "{}", result.first_text());
        assert!(result
            .first_text()
            .starts_with("Successfully created Part BOM relationship:\nSource: A\nTarget: B\n"));
    }

    #[tokio::test]
    async fn test_delete_relationship_renders_status_json() {
        let server = MockServer::start().await;
        let dispatcher = dispatcher_for(&server).await;
        Mock::given(method("DELETE"))
            .and(path("/Server/odata/Part%20BOM('R1')"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let result = dispatcher
            .call_tool(
                "delete_relationship",
                Some(&json!({ "relationship_type": "Part BOM", "relationship_id": "R1" })),
            )
            .await;

        let rendered: Value = serde_json::from_str(result.first_text()).unwrap();
        assert_eq!(rendered["status"], "success");
        assert_eq!(rendered["message"], "Part BOM R1 deleted successfully");
    }

    #[tokio::test]
    async fn test_fetch_bom_structure_renders_rows() {
        let server = MockServer::start().await;
        let dispatcher = dispatcher_for(&server).await;
        Mock::given(method("POST"))
            .and(path("/Server/odata/method.aer_dcm_fetchBOMStructure"))
            .and(body_json(json!({ "id": "ASM" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Item": { "@aras.id": "ASM", "item_number": "ASM-1" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = dispatcher
            .call_tool("fetch_bom_structure", Some(&json!({ "item_id": "ASM" })))
            .await;

        assert!(!result.is_error, "{}", result.first_text());
        assert!(result
            .first_text()
            .starts_with("BOM structure for ASM (1 rows):\n"));
        assert!(result.first_text().contains("\"parentId\": null"));
    }

    #[tokio::test]
    async fn test_connection_tool_reports_server() {
        let server = MockServer::start().await;
        let dispatcher = dispatcher_for(&server).await;

        let result = dispatcher.call_tool("test_connection", None).await;

        assert!(!result.is_error);
        assert_eq!(
            result.first_text(),
            format!(
                "Successfully authenticated with the PLM server.\nServer URL: {}",
                server.uri()
            )
        );
    }

    #[tokio::test]
    async fn test_placeholder_tools_are_not_implemented() {
        let server = MockServer::start().await;
        let dispatcher = dispatcher_for(&server).await;

        let upload = dispatcher
            .call_tool("upload_file", Some(&json!({ "file_path": "/tmp/drawing.pdf" })))
            .await;
        assert_eq!(
            upload,
            CallToolResult::error("Error: file upload is not implemented")
        );

        let document = dispatcher
            .call_tool(
                "create_document_with_file",
                Some(&json!({ "document_data": { "name": "Drawing" }, "file_path": "/tmp/drawing.pdf" })),
            )
            .await;
        assert_eq!(
            document,
            CallToolResult::error("Error: document with file creation is not implemented")
        );
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let server = MockServer::start().await;
        let dispatcher = dispatcher_for(&server).await;

        let result = dispatcher.call_tool("drop_database", None).await;
        assert_eq!(result, CallToolResult::error("Error: unknown tool: drop_database"));
    }
}
