use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{client, OAuthClientConfig, OAuthProvider, ProviderEmail, ProviderIdentity};
use crate::config::ProviderCredentials;
use crate::services::error::ServiceError;

pub const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
pub const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
pub const GITHUB_USER_INFO_URL: &str = "https://api.github.com/user";
pub const GITHUB_EMAILS_URL: &str = "https://api.github.com/user/emails";

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: i64,
    login: String,
    #[serde(default)]
    name: Option<String>,
}

pub struct GitHubProvider {
    config: OAuthClientConfig,
    http: Client,
}

impl GitHubProvider {
    pub fn new(credentials: &ProviderCredentials, http: Client) -> Self {
        Self::with_config(
            OAuthClientConfig {
                client_id: credentials.client_id.clone(),
                client_secret: credentials.client_secret.clone(),
                redirect_uri: credentials.redirect_uri.clone(),
                authorize_url: GITHUB_AUTHORIZE_URL.to_string(),
                token_url: GITHUB_TOKEN_URL.to_string(),
                user_info_url: GITHUB_USER_INFO_URL.to_string(),
                emails_url: Some(GITHUB_EMAILS_URL.to_string()),
                scopes: vec!["user:email".to_string()],
            },
            http,
        )
    }

    pub fn with_config(config: OAuthClientConfig, http: Client) -> Self {
        Self { config, http }
    }
}

#[async_trait]
impl OAuthProvider for GitHubProvider {
    fn name(&self) -> &'static str {
        "github"
    }

    fn auth_url(&self, state: &str) -> String {
        client::authorize_url(&self.config, state, &[])
    }

    async fn exchange_code(&self, code: &str) -> Result<String, ServiceError> {
        client::exchange_code(&self.http, &self.config, self.name(), code)
            .await
            .map_err(ServiceError::TokenExchange)
    }

    /// The profile's public email is user-editable and unverified, so it is
    /// ignored; the address always comes from [`fetch_emails`](Self::fetch_emails).
    async fn fetch_user_info(&self, access_token: &str) -> Result<ProviderIdentity, ServiceError> {
        let user: GitHubUser =
            client::get_json(&self.http, &self.config.user_info_url, access_token, self.name())
                .await
                .map_err(ServiceError::UserInfo)?;

        let name = user
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(user.login);

        Ok(ProviderIdentity {
            provider_user_id: user.id.to_string(),
            email: None,
            email_verified: false,
            name,
        })
    }

    async fn fetch_emails(
        &self,
        access_token: &str,
    ) -> Option<Result<Vec<ProviderEmail>, ServiceError>> {
        let url = self.config.emails_url.as_deref()?;
        Some(
            client::get_json(&self.http, url, access_token, self.name())
                .await
                .map_err(ServiceError::UserInfo),
        )
    }
}
