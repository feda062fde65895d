//! Shared setup for hobby-auth integration tests.
//!
//! Every test gets its own in-memory user directory. OAuth providers, when
//! needed, point at a wiremock server standing in for Google and GitHub.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, Response},
    Router,
};
use hobby_auth::{
    build_router,
    config::{
        AuthConfig, Environment, JwtConfig, MongoConfig, OAuthConfig, RateLimitConfig,
        SecurityConfig,
    },
    services::{
        oauth::{client::build_http_client, GitHubProvider, GoogleProvider, OAuthClientConfig, ProviderRegistry},
        InMemoryUserDirectory,
    },
    AppState,
};
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;
use wiremock::MockServer;

pub const TEST_JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";

pub fn test_config() -> AuthConfig {
    AuthConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "hobby-auth".to_string(),
        service_version: "0.1.0-test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        mongodb: MongoConfig {
            uri: "memory".to_string(),
            database: "hobby_tracker_test".to_string(),
        },
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            expiry_minutes: 60,
        },
        oauth: OAuthConfig {
            state_ttl_seconds: 300,
            http_timeout_seconds: 5,
            link_requires_verified_email: true,
        },
        google: None,
        github: None,
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            cookie_secure: false,
            trust_forwarded_for: false,
        },
        rate_limit: RateLimitConfig {
            login_attempts: 100,
            login_window_seconds: 60,
            register_attempts: 100,
            register_window_seconds: 60,
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    /// App with password auth only.
    pub fn spawn() -> Self {
        Self::with_providers(test_config(), ProviderRegistry::new())
    }

    pub fn with_providers(config: AuthConfig, providers: ProviderRegistry) -> Self {
        let directory = Arc::new(InMemoryUserDirectory::new());
        let state = AppState::new(config, directory, providers).expect("Failed to build app state");
        let router = build_router(state.clone()).expect("Failed to build router");
        Self { router, state }
    }

    /// App whose Google and GitHub providers talk to `server`.
    pub fn with_mock_providers(server: &MockServer) -> Self {
        Self::with_mock_providers_and_config(server, test_config())
    }

    pub fn with_mock_providers_and_config(server: &MockServer, config: AuthConfig) -> Self {
        let http = build_http_client(Duration::from_secs(config.oauth.http_timeout_seconds))
            .expect("Failed to build HTTP client");
        let base = server.uri();

        let google = GoogleProvider::with_config(
            OAuthClientConfig {
                client_id: "google-client".to_string(),
                client_secret: "google-secret".to_string(),
                redirect_uri: "http://localhost:8080/auth/google/callback".to_string(),
                authorize_url: format!("{}/google/authorize", base),
                token_url: format!("{}/google/token", base),
                user_info_url: format!("{}/google/userinfo", base),
                emails_url: None,
                scopes: vec!["email".to_string(), "profile".to_string()],
            },
            http.clone(),
        );
        let github = GitHubProvider::with_config(
            OAuthClientConfig {
                client_id: "github-client".to_string(),
                client_secret: "github-secret".to_string(),
                redirect_uri: "http://localhost:8080/auth/github/callback".to_string(),
                authorize_url: format!("{}/github/authorize", base),
                token_url: format!("{}/github/token", base),
                user_info_url: format!("{}/github/user", base),
                emails_url: Some(format!("{}/github/emails", base)),
                scopes: vec!["user:email".to_string()],
            },
            http,
        );

        let providers = ProviderRegistry::new()
            .with(Arc::new(google))
            .with(Arc::new(github));

        Self::with_providers(config, providers)
    }

    pub async fn request(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Router call failed")
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> Response<Body> {
        self.request(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.request(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn get_with_bearer(&self, uri: &str, token: &str) -> Response<Body> {
        self.request(
            Request::builder()
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Register and return the session token.
    pub async fn register(&self, email: &str, password: &str, name: &str) -> String {
        let response = self
            .post_json(
                "/auth/register",
                serde_json::json!({ "email": email, "password": password, "name": name }),
            )
            .await;
        assert_eq!(response.status(), 201, "registration of {} failed", email);
        body_json(response).await["token"]
            .as_str()
            .expect("token missing")
            .to_string()
    }

    /// Start an OAuth flow and return the state nonce set in the cookie.
    pub async fn start_oauth(&self, provider: &str) -> String {
        let response = self.get(&format!("/auth/{}", provider)).await;
        assert_eq!(response.status(), 307);
        state_cookie(&response).expect("oauth_state cookie missing")
    }

    /// Deliver a provider callback carrying `cookie_state` and `query_state`.
    pub async fn oauth_callback(
        &self,
        provider: &str,
        query: &str,
        cookie_state: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::builder().uri(format!("/auth/{}/callback?{}", provider, query));
        if let Some(value) = cookie_state {
            builder = builder.header(header::COOKIE, format!("oauth_state={}", value));
        }
        self.request(builder.body(Body::empty()).unwrap()).await
    }
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// Value of the `oauth_state` cookie set by a response, if any.
pub fn state_cookie(response: &Response<Body>) -> Option<String> {
    set_cookies(response).into_iter().find_map(|c| {
        let first = c.split(';').next()?.trim().to_string();
        first
            .strip_prefix("oauth_state=")
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    })
}
