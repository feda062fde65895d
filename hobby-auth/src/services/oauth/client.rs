//! HTTP plumbing shared by every provider: form-encoded code exchange and
//! bearer-authenticated JSON reads, both under one bounded-timeout client.

use reqwest::{header, Client, Response};
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;

use super::OAuthClientConfig;

const MAX_LOGGED_BODY: usize = 512;

pub fn build_http_client(timeout: Duration) -> Result<Client, anyhow::Error> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(concat!("hobby-auth/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build OAuth HTTP client: {}", e))
}

/// Consent-screen URL: the configured authorize endpoint plus client id,
/// redirect URI, scopes, state and any provider-specific parameters.
pub fn authorize_url(config: &OAuthClientConfig, state: &str, extra: &[(&str, &str)]) -> String {
    let scope = config.scopes.join(" ");
    let mut params: Vec<(&str, &str)> = vec![
        ("client_id", config.client_id.as_str()),
        ("redirect_uri", config.redirect_uri.as_str()),
        ("scope", scope.as_str()),
        ("state", state),
    ];
    params.extend_from_slice(extra);

    // Only &str pairs are encoded, which serde_urlencoded cannot reject.
    let query = serde_urlencoded::to_string(&params).unwrap_or_default();
    let separator = if config.authorize_url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", config.authorize_url, separator, query)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// POST the authorization code to the token endpoint and return the access
/// token. Some providers answer 200 with an `error` body; that is a failure
/// too.
pub async fn exchange_code(
    http: &Client,
    config: &OAuthClientConfig,
    provider: &str,
    code: &str,
) -> Result<String, anyhow::Error> {
    let response = http
        .post(&config.token_url)
        .header(header::ACCEPT, "application/json")
        .form(&[
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("token request failed: {}", e.without_url()))?;

    let response = ensure_success(response, provider, "token").await?;

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| anyhow::anyhow!("malformed token response: {}", e))?;

    match token.access_token.filter(|t| !t.is_empty()) {
        Some(access_token) => Ok(access_token),
        None => Err(anyhow::anyhow!(
            "token response carried no access token (error: {}, description: {})",
            token.error.as_deref().unwrap_or("none"),
            token.error_description.as_deref().unwrap_or("none"),
        )),
    }
}

/// Bearer-authenticated GET decoding a JSON body.
pub async fn get_json<T: DeserializeOwned>(
    http: &Client,
    url: &str,
    access_token: &str,
    provider: &str,
) -> Result<T, anyhow::Error> {
    let response = http
        .get(url)
        .bearer_auth(access_token)
        .header(header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("request to {} failed: {}", url, e.without_url()))?;

    let response = ensure_success(response, provider, url).await?;

    response
        .json()
        .await
        .map_err(|e| anyhow::anyhow!("malformed response from {}: {}", url, e))
}

async fn ensure_success(
    response: Response,
    provider: &str,
    endpoint: &str,
) -> Result<Response, anyhow::Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(MAX_LOGGED_BODY).collect();
    tracing::debug!(provider = %provider, endpoint = %endpoint, status = %status, body = %body, "Provider returned an error");

    Err(anyhow::anyhow!("{} endpoint returned status {}", endpoint, status))
}
