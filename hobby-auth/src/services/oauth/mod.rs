//! OAuth2 authorization-code federation.
//!
//! Each identity provider implements [`OAuthProvider`]; the
//! [`ProviderRegistry`] selects one by name and [`OAuthService`] drives the
//! callback from code exchange to session issuance.

pub mod client;
pub mod github;
pub mod google;
pub mod registry;
pub mod service;
pub mod state;

use async_trait::async_trait;
use serde::Deserialize;

use crate::services::error::ServiceError;

pub use github::GitHubProvider;
pub use google::GoogleProvider;
pub use registry::ProviderRegistry;
pub use service::{OAuthService, Resolution};
pub use state::OAuthStateStore;

/// Endpoints and credentials for one provider.
#[derive(Clone)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authorize_url: String,
    pub token_url: String,
    pub user_info_url: String,
    /// Secondary endpoint listing the account's email addresses.
    pub emails_url: Option<String>,
    pub scopes: Vec<String>,
}

impl std::fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("user_info_url", &self.user_info_url)
            .field("emails_url", &self.emails_url)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Identity as reported by a provider, normalised across providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderIdentity {
    pub provider_user_id: String,
    /// `None` when the primary user-info call carries no usable email.
    pub email: Option<String>,
    /// Whether the provider vouches that the account owns `email`.
    pub email_verified: bool,
    pub name: String,
}

/// One entry of a provider's email listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderEmail {
    pub email: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub verified: bool,
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Registry key and path segment, e.g. `google`.
    fn name(&self) -> &'static str;

    /// Consent-screen URL carrying the caller's CSRF `state`.
    fn auth_url(&self, state: &str) -> String;

    /// Trade a one-time authorization code for a provider access token.
    async fn exchange_code(&self, code: &str) -> Result<String, ServiceError>;

    async fn fetch_user_info(&self, access_token: &str) -> Result<ProviderIdentity, ServiceError>;

    /// Secondary email listing, for providers whose user-info may omit the
    /// address. `None` when the provider has no such endpoint.
    async fn fetch_emails(
        &self,
        _access_token: &str,
    ) -> Option<Result<Vec<ProviderEmail>, ServiceError>> {
        None
    }
}

/// Pick the address to sign in with: primary and verified, else the first
/// verified, else the first listed.
pub fn select_email(emails: &[ProviderEmail]) -> Option<&ProviderEmail> {
    emails
        .iter()
        .find(|e| e.primary && e.verified)
        .or_else(|| emails.iter().find(|e| e.verified))
        .or_else(|| emails.first())
}
