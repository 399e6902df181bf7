//! Password-grant token acquisition with OAuth server discovery.
//!
//! The backend advertises its OAuth server at a fixed discovery page; the
//! issuer's OpenID configuration names the token endpoint, which accepts a
//! form-encoded password grant and answers with an `access_token`.

use crate::config::Credentials;
use crate::errors::{GatewayError, GatewayResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;

pub const DISCOVERY_PATH: &str = "/Server/OAuthServerDiscovery.aspx";
pub const OPENID_CONFIGURATION_PATH: &str = ".well-known/openid-configuration";
pub const CLIENT_ID: &str = "IOMApp";
pub const SCOPE: &str = "Innovator";

/// Opaque bearer credential returned by the token endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BearerToken(***)")
    }
}

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    #[serde(default)]
    locations: Vec<DiscoveryLocation>,
}

#[derive(Debug, Deserialize)]
struct DiscoveryLocation {
    #[serde(default)]
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenIdConfiguration {
    #[serde(default)]
    token_endpoint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// Exchanges [`Credentials`] for a [`BearerToken`]. Holds no token state.
#[derive(Debug, Clone)]
pub struct TokenProvider {
    client: reqwest::Client,
}

impl TokenProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Run discovery, configuration fetch and password grant, in that order.
    pub async fn acquire_token(&self, credentials: &Credentials) -> GatewayResult<BearerToken> {
        let issuer = self.discover_issuer(&credentials.base_url).await?;
        tracing::debug!("OAuth issuer discovered at {issuer}");

        let token_endpoint = self.discover_token_endpoint(&issuer).await?;
        tracing::debug!("Token endpoint resolved to {token_endpoint}");

        let token = self.exchange_password(&token_endpoint, credentials).await?;
        tracing::info!(
            "Obtained bearer token for {} on database {}",
            credentials.username,
            credentials.database
        );
        Ok(token)
    }

    async fn discover_issuer(&self, base_url: &str) -> GatewayResult<String> {
        let url = format!("{}{DISCOVERY_PATH}", base_url.trim_end_matches('/'));
        let doc: DiscoveryDocument = self.fetch_discovery_json(&url).await?;

        doc.locations
            .into_iter()
            .next()
            .and_then(|location| location.uri)
            .filter(|uri| !uri.trim().is_empty())
            .ok_or_else(|| {
                GatewayError::Discovery(format!("no OAuth server location listed at {url}"))
            })
    }

    async fn discover_token_endpoint(&self, issuer: &str) -> GatewayResult<String> {
        let url = format!(
            "{}/{OPENID_CONFIGURATION_PATH}",
            issuer.trim().trim_end_matches('/')
        );
        let config: OpenIdConfiguration = self.fetch_discovery_json(&url).await?;

        config
            .token_endpoint
            .filter(|endpoint| !endpoint.trim().is_empty())
            .ok_or_else(|| GatewayError::Discovery(format!("no token_endpoint in {url}")))
    }

    async fn exchange_password(
        &self,
        token_endpoint: &str,
        credentials: &Credentials,
    ) -> GatewayResult<BearerToken> {
        let form = [
            ("grant_type", "password"),
            ("scope", SCOPE),
            ("client_id", CLIENT_ID),
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
            ("database", credentials.database.as_str()),
        ];

        let response = self
            .client
            .post(token_endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| GatewayError::Auth(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Auth(describe_status(status, &body)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Auth(format!("malformed token response: {e}")))?;

        token
            .access_token
            .filter(|t| !t.is_empty())
            .map(BearerToken::new)
            .ok_or_else(|| GatewayError::Auth("token response has no access_token".to_string()))
    }

    async fn fetch_discovery_json<T: DeserializeOwned>(&self, url: &str) -> GatewayResult<T> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| GatewayError::Discovery(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Discovery(format!("HTTP {status} from {url}")));
        }

        response
            .json()
            .await
            .map_err(|e| GatewayError::Discovery(format!("malformed JSON from {url}: {e}")))
    }
}

/// `HTTP 401 Unauthorized: {body}`, body omitted when empty
pub(crate) fn describe_status(status: reqwest::StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {body}")
    }
}
