use super::common::{StubBackend, ACCESS_TOKEN};
use plm_mcp::{ApiGateway, ItemQuery, NewRelationship};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_created_item_can_be_read_back_by_id() {
    let backend = StubBackend::start().await;
    let bearer = format!("Bearer {ACCESS_TOKEN}");

    Mock::given(method("POST"))
        .and(path("/Server/odata/Part"))
        .and(header("authorization", bearer.as_str()))
        .and(body_json(json!({ "item_number": "P-100", "name": "Bracket" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "4F1AC04A2B48410A8A4E3C12A1B2C3D4",
            "item_number": "P-100",
            "name": "Bracket"
        })))
        .expect(1)
        .mount(&backend.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Server/odata/Part"))
        .and(header("authorization", bearer.as_str()))
        .and(query_param("$filter", "id eq '4F1AC04A2B48410A8A4E3C12A1B2C3D4'"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{
                "id": "4F1AC04A2B48410A8A4E3C12A1B2C3D4",
                "item_number": "P-100",
                "name": "Bracket"
            }]
        })))
        .expect(1)
        .mount(&backend.server)
        .await;

    let gateway = ApiGateway::new(backend.config()).unwrap();

    let created = gateway
        .create_item("Part", &json!({ "item_number": "P-100", "name": "Bracket" }))
        .await;
    assert!(created.ok, "{:?}", created.error_message);
    let id = created.payload["id"].as_str().unwrap().to_string();

    let query = ItemQuery::default().filter(format!("id eq '{id}'"));
    let fetched = gateway.get_items("Part", &query).await;

    assert!(fetched.ok);
    assert_eq!(fetched.payload["value"][0]["id"], id);
    assert_eq!(fetched.payload["value"][0]["item_number"], "P-100");
    assert_eq!(backend.token_requests().await, 1);
}

#[tokio::test]
async fn test_relationship_lifecycle() {
    let backend = StubBackend::start().await;

    Mock::given(method("POST"))
        .and(path("/Server/odata/Part%20BOM"))
        .and(body_json(json!({
            "source_id": "PARENT",
            "related_id": "CHILD",
            "quantity": 4
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "BOM1" })))
        .expect(1)
        .mount(&backend.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/Server/odata/Part%20BOM('BOM1')"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&backend.server)
        .await;

    let gateway = ApiGateway::new(backend.config()).unwrap();

    let mut extra = serde_json::Map::new();
    extra.insert("quantity".to_string(), json!(4));
    let relationship = NewRelationship::new("PARENT", "CHILD", "Part BOM").with_properties(extra);

    let created = gateway.create_relationship(&relationship).await;
    assert!(created.ok, "{:?}", created.error_message);
    let rel_id = created.payload["id"].as_str().unwrap();

    let deleted = gateway.delete_relationship("Part BOM", rel_id).await;
    assert!(deleted.ok);
    assert_eq!(deleted.payload["status"], "success");
    assert_eq!(deleted.payload["message"], "Part BOM BOM1 deleted successfully");
}

#[tokio::test]
async fn test_unreachable_backend_reports_authentication_failure() {
    let backend = StubBackend::start().await;
    let mut config = backend.config();
    config.credentials.base_url = "http://127.0.0.1:9".to_string();

    let gateway = ApiGateway::new(config).unwrap();
    let result = gateway.get_list("DOC_TYPES", Some("Value")).await;

    assert!(!result.ok);
    assert!(result
        .error_message
        .unwrap()
        .starts_with("authentication failed: OAuth discovery failed"));
    assert!(!gateway.has_token().await);
}
