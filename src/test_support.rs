//! Stub backend fixtures shared by the unit tests.

use crate::config::{Credentials, GatewayConfig};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN_PATH: &str = "/OAuthServer/connect/token";

pub fn credentials(server: &MockServer) -> Credentials {
    Credentials::new(server.uri(), "InnovatorSolutions", "admin", "innovator")
}

pub fn gateway_config(server: &MockServer) -> GatewayConfig {
    GatewayConfig::new(credentials(server))
}

/// Mount the discovery, OpenID configuration and token endpoints.
pub async fn mount_oauth(server: &MockServer, access_token: &str) {
    let issuer = format!("{}/OAuthServer/", server.uri());

    Mock::given(method("GET"))
        .and(path("/Server/OAuthServerDiscovery.aspx"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "locations": [{ "uri": issuer }] })),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/OAuthServer/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": issuer,
            "token_endpoint": format!("{}{TOKEN_PATH}", server.uri())
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access_token,
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
}

/// Number of password grants the stub has answered so far
pub async fn token_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == TOKEN_PATH)
        .count()
}
