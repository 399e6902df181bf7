use super::common::StubBackend;
use plm_mcp::server::{router, AppState};
use plm_mcp::{GatewayConfig, McpHttpClient};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

async fn spawn_server(config: GatewayConfig) -> McpHttpClient {
    let app = router(AppState::new(config).unwrap());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    McpHttpClient::new(format!("http://{addr}"))
}

#[tokio::test]
async fn test_client_session_against_http_server() {
    let backend = StubBackend::start().await;
    Mock::given(method("GET"))
        .and(path("/Server/odata/List('DOC_TYPES')"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "DOC_TYPES",
            "Value": [{ "value": "Drawing" }, { "value": "Specification" }]
        })))
        .mount(&backend.server)
        .await;

    let client = spawn_server(backend.config()).await;

    let info = client.initialize().await.unwrap();
    assert_eq!(info["serverInfo"]["name"], "plm-mcp");

    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools.len(), 12);

    let connected = client
        .call_tool("test_connection", json!({}))
        .await
        .unwrap();
    assert!(!connected.is_error);
    assert!(connected
        .first_text()
        .starts_with("Successfully authenticated with the PLM server."));

    let list = client
        .call_tool("get_list", json!({ "list_id": "DOC_TYPES" }))
        .await
        .unwrap();
    assert!(!list.is_error, "{}", list.first_text());
    assert!(list.first_text().starts_with("List DOC_TYPES data:\n"));
    assert!(list.first_text().contains("Specification"));

    // test_connection cached the token; get_list reused it
    assert_eq!(backend.token_requests().await, 1);
}

#[tokio::test]
async fn test_status_uses_its_own_gateway() {
    let backend = StubBackend::start().await;
    let client = spawn_server(backend.config()).await;

    let status = client.status().await.unwrap();
    assert_eq!(status["authentication"], "connected");
    assert_eq!(status["backend_url"], backend.uri());

    let status = client.status().await.unwrap();
    assert_eq!(status["authentication"], "connected");

    // Every status check authenticates afresh
    assert_eq!(backend.token_requests().await, 2);
}

#[tokio::test]
async fn test_tool_failure_is_reported_in_band() {
    let backend = StubBackend::start().await;
    Mock::given(method("PATCH"))
        .and(path("/Server/odata/Part('missing')"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Item not found"))
        .mount(&backend.server)
        .await;

    let client = spawn_server(backend.config()).await;
    let result = client
        .call_tool(
            "update_item",
            json!({ "endpoint": "Part", "item_id": "missing", "data": { "name": "x" } }),
        )
        .await
        .unwrap();

    assert!(result.is_error);
    assert_eq!(
        result.first_text(),
        "Error: update_item error: HTTP 404 Not Found: Item not found"
    );
}
