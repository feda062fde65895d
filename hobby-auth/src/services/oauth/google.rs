use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{client, OAuthClientConfig, OAuthProvider, ProviderIdentity};
use crate::config::ProviderCredentials;
use crate::services::error::ServiceError;

pub const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USER_INFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    verified_email: bool,
    #[serde(default)]
    name: Option<String>,
}

pub struct GoogleProvider {
    config: OAuthClientConfig,
    http: Client,
}

impl GoogleProvider {
    pub fn new(credentials: &ProviderCredentials, http: Client) -> Self {
        Self::with_config(
            OAuthClientConfig {
                client_id: credentials.client_id.clone(),
                client_secret: credentials.client_secret.clone(),
                redirect_uri: credentials.redirect_uri.clone(),
                authorize_url: GOOGLE_AUTHORIZE_URL.to_string(),
                token_url: GOOGLE_TOKEN_URL.to_string(),
                user_info_url: GOOGLE_USER_INFO_URL.to_string(),
                emails_url: None,
                scopes: vec!["email".to_string(), "profile".to_string()],
            },
            http,
        )
    }

    /// Use explicit endpoints, e.g. a local stand-in for Google.
    pub fn with_config(config: OAuthClientConfig, http: Client) -> Self {
        Self { config, http }
    }
}

#[async_trait]
impl OAuthProvider for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    fn auth_url(&self, state: &str) -> String {
        client::authorize_url(&self.config, state, &[("response_type", "code")])
    }

    async fn exchange_code(&self, code: &str) -> Result<String, ServiceError> {
        client::exchange_code(&self.http, &self.config, self.name(), code)
            .await
            .map_err(ServiceError::TokenExchange)
    }

    async fn fetch_user_info(&self, access_token: &str) -> Result<ProviderIdentity, ServiceError> {
        let info: GoogleUserInfo =
            client::get_json(&self.http, &self.config.user_info_url, access_token, self.name())
                .await
                .map_err(ServiceError::UserInfo)?;

        if info.id.is_empty() {
            return Err(ServiceError::UserInfo(anyhow::anyhow!(
                "user info response carried no account id"
            )));
        }

        Ok(ProviderIdentity {
            provider_user_id: info.id,
            email: info.email.filter(|e| !e.trim().is_empty()),
            email_verified: info.verified_email,
            name: info.name.unwrap_or_default(),
        })
    }
}
