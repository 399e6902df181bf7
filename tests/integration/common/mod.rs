//! Stub PLM backend for integration tests.

use plm_mcp::{Credentials, GatewayConfig};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN_PATH: &str = "/OAuthServer/connect/token";
pub const ACCESS_TOKEN: &str = "integration-token";

/// A wiremock server answering the OAuth discovery chain
pub struct StubBackend {
    pub server: MockServer,
}

impl StubBackend {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let issuer = format!("{}/OAuthServer", server.uri());

        Mock::given(method("GET"))
            .and(path("/Server/OAuthServerDiscovery.aspx"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "locations": [{ "uri": issuer }] })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/OAuthServer/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_endpoint": format!("{}{TOKEN_PATH}", server.uri())
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "access_token": ACCESS_TOKEN })),
            )
            .mount(&server)
            .await;

        Self { server }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn config(&self) -> GatewayConfig {
        GatewayConfig::new(Credentials::new(
            self.server.uri(),
            "InnovatorSolutions",
            "admin",
            "innovator",
        ))
    }

    pub async fn token_requests(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == TOKEN_PATH)
            .count()
    }
}
