use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::config::OauthConfig;
use crate::error::{ApiError, ApiResult};

// The one fixed provider this relay talks to.
const AUTHORIZE_URL: &str = "https://www.instagram.com/oauth/authorize";
const TOKEN_URL: &str = "https://api.instagram.com/oauth/access_token";
const GRAPH_BASE: &str = "https://graph.instagram.com";

const SCOPES: [&str; 4] = [
    "instagram_business_basic",
    "instagram_business_manage_messages",
    "instagram_business_manage_comments",
    "instagram_business_content_publish",
];

/// Client for the provider's OAuth endpoints and the external function
/// endpoint the long-lived token is forwarded to. Every outbound call runs
/// under a bounded timeout.
#[derive(Clone)]
pub struct OauthClient {
    http: reqwest::Client,
    config: OauthConfig,
    authorize_base: Url,
    graph_base: String,
}

impl OauthClient {
    pub fn new(config: OauthConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        let authorize_base = Url::parse(AUTHORIZE_URL)?;
        Ok(Self {
            http,
            config,
            authorize_base,
            graph_base: GRAPH_BASE.to_string(),
        })
    }

    /// Point provider calls at a local stub server.
    #[cfg(test)]
    pub(crate) fn with_graph_base(mut self, base: impl Into<String>) -> Self {
        self.graph_base = base.into();
        self
    }

    /// Provider authorization URL with the caller-supplied CSRF state value.
    pub fn authorization_url(&self, state: &str) -> String {
        let mut url = self.authorize_base.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &SCOPES.join(","))
            .append_pair("state", state);
        url.into()
    }

    pub fn require_secret(&self) -> ApiResult<&str> {
        self.config
            .client_secret
            .as_deref()
            .ok_or_else(|| ApiError::Config("OAUTH_CLIENT_SECRET is not set".into()))
    }

    pub fn require_forward_url(&self) -> ApiResult<&str> {
        self.config
            .forward_url
            .as_deref()
            .ok_or_else(|| ApiError::Config("FORWARD_URL is not set".into()))
    }

    /// Exchange an authorization code for a short-lived access token.
    pub async fn exchange_code(&self, code: &str) -> ApiResult<Value> {
        let secret = self.require_secret()?;
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", secret),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code", code),
        ];
        let resp = self
            .http
            .post(TOKEN_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                ApiError::upstream(format!("Failed to exchange code for access token: {e}"), None)
            })?;
        Self::read_json("Failed to exchange code for access token.", resp).await
    }

    /// Exchange a short-lived token for a long-lived one.
    pub async fn exchange_long_lived(&self, short_lived: &str) -> ApiResult<Value> {
        let secret = self.require_secret()?;
        let resp = self
            .http
            .get(format!("{}/access_token", self.graph_base))
            .query(&[
                ("grant_type", "ig_exchange_token"),
                ("client_secret", secret),
                ("access_token", short_lived),
            ])
            .send()
            .await
            .map_err(|e| {
                ApiError::upstream(format!("Failed to exchange for long-lived token: {e}"), None)
            })?;
        Self::read_json("Failed to exchange for long-lived token.", resp).await
    }

    /// Forward a freshly obtained long-lived token to the function endpoint.
    pub async fn forward_token(&self, long_lived: &str) -> ApiResult<Value> {
        let url = self.require_forward_url()?;
        let resp = self
            .http
            .post(url)
            .json(&json!({ "access_token": long_lived }))
            .send()
            .await
            .map_err(|e| ApiError::upstream(format!("Failed to reach forward endpoint: {e}"), None))?;
        Self::read_json("Forward endpoint rejected the token.", resp).await
    }

    /// Query the provider's debug endpoint for a token's validity.
    pub async fn debug_token(&self, token: &str) -> ApiResult<Value> {
        let resp = self
            .http
            .get(format!("{}/debug_token", self.graph_base))
            .query(&[("input_token", token), ("access_token", token)])
            .send()
            .await
            .map_err(|e| ApiError::upstream(format!("Failed to check token validity: {e}"), None))?;
        Self::read_json("Failed to check token validity.", resp).await
    }

    /// Pass an arbitrary payload through to the function endpoint with the
    /// caller's bearer token. The payload shape is owned by the endpoint.
    pub async fn forward_form(&self, payload: &Value, bearer: &str) -> ApiResult<Value> {
        let url = self.require_forward_url()?;
        let resp = self
            .http
            .post(url)
            .bearer_auth(bearer)
            .json(payload)
            .send()
            .await
            .map_err(|e| ApiError::upstream(format!("Failed to reach forward endpoint: {e}"), None))?;
        Self::read_json("Forward endpoint rejected the submission.", resp).await
    }

    async fn read_json(context: &str, resp: reqwest::Response) -> ApiResult<Value> {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::String(text));
        if !status.is_success() {
            debug!(%status, "upstream call failed");
            return Err(ApiError::upstream(context, Some(body)));
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OauthConfig;

    fn client(secret: Option<&str>, forward: Option<&str>) -> OauthClient {
        OauthClient::new(OauthConfig {
            client_id: "client-123".into(),
            client_secret: secret.map(String::from),
            redirect_uri: "https://example.com/auth/redirect".into(),
            forward_url: forward.map(String::from),
        })
        .unwrap()
    }

    #[test]
    fn authorization_url_carries_all_parameters() {
        let url = client(Some("s"), None).authorization_url("random-state");
        assert!(url.starts_with("https://www.instagram.com/oauth/authorize?"));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("state=random-state"));
        assert!(url.contains("instagram_business_basic"));
        // redirect_uri survives percent-encoding
        assert!(url.contains("redirect_uri=https%3A%2F%2Fexample.com%2Fauth%2Fredirect"));
    }

    #[tokio::test]
    async fn exchange_code_fails_fast_without_secret() {
        let err = client(None, None).exchange_code("abc").await.unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }

    #[tokio::test]
    async fn exchange_long_lived_fails_fast_without_secret() {
        let err = client(None, Some("https://fn.example.com"))
            .exchange_long_lived("tok")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }

    #[tokio::test]
    async fn forward_calls_fail_fast_without_forward_url() {
        let c = client(Some("s"), None);
        assert!(matches!(
            c.forward_token("tok").await.unwrap_err(),
            ApiError::Config(_)
        ));
        assert!(matches!(
            c.forward_form(&serde_json::json!({}), "tok").await.unwrap_err(),
            ApiError::Config(_)
        ));
    }
}
