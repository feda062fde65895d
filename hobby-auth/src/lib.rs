pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use service_core::middleware::{
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{openapi::security::SecurityScheme, Modify, OpenApi};

use crate::config::AuthConfig;
use crate::dtos::HealthResponse;
use crate::services::{
    oauth::{client::build_http_client, GitHubProvider, GoogleProvider, OAuthService, OAuthStateStore, ProviderRegistry},
    AuthService, JwtService, UserDirectory,
};
use service_core::error::AppError;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::register,
        handlers::auth::login,
        handlers::oauth::oauth_login,
        handlers::oauth::oauth_callback,
        handlers::user::get_me,
    ),
    components(
        schemas(
            dtos::auth::RegisterRequest,
            dtos::auth::LoginRequest,
            dtos::auth::AuthResponse,
            dtos::ErrorResponse,
            dtos::HealthResponse,
            models::SanitizedUser,
            models::ProviderLink,
            models::AccessLevel,
            models::Circle,
            models::CircleMember,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Password registration and login"),
        (name = "OAuth", description = "Federated sign-in through third-party providers"),
        (name = "User", description = "Current user profile"),
        (name = "Observability", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: AuthConfig,
    pub jwt: JwtService,
    pub auth_service: AuthService,
    pub oauth_service: OAuthService,
    pub oauth_state: OAuthStateStore,
    pub login_rate_limiter: IpRateLimiter,
    pub register_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire services over an already connected directory and provider set.
    pub fn new(
        config: AuthConfig,
        directory: Arc<dyn UserDirectory>,
        providers: ProviderRegistry,
    ) -> Result<Self, anyhow::Error> {
        let jwt = JwtService::new(&config.jwt)?;
        let oauth_state = OAuthStateStore::new(config.jwt.secret.as_bytes(), config.oauth.state_ttl_seconds)?;

        let auth_service = AuthService::new(directory, jwt.clone());
        let oauth_service = OAuthService::new(
            providers,
            auth_service.clone(),
            config.oauth.link_requires_verified_email,
        );

        let login_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.login_attempts,
            config.rate_limit.login_window_seconds,
        )
        .trust_forwarded_for(config.security.trust_forwarded_for);
        let register_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.register_attempts,
            config.rate_limit.register_window_seconds,
        )
        .trust_forwarded_for(config.security.trust_forwarded_for);

        Ok(Self {
            config,
            jwt,
            auth_service,
            oauth_service,
            oauth_state,
            login_rate_limiter,
            register_rate_limiter,
        })
    }
}

/// Providers whose client id is configured, talking to their production
/// endpoints through one shared HTTP client.
pub fn providers_from_config(config: &AuthConfig) -> Result<ProviderRegistry, anyhow::Error> {
    let http = build_http_client(Duration::from_secs(config.oauth.http_timeout_seconds))?;
    let mut registry = ProviderRegistry::new();

    if let Some(google) = &config.google {
        registry.register(Arc::new(GoogleProvider::new(google, http.clone())));
    }
    if let Some(github) = &config.github {
        registry.register(Arc::new(GitHubProvider::new(github, http)));
    }

    if registry.names().is_empty() {
        tracing::warn!("No OAuth providers configured; only password login is available");
    }

    Ok(registry)
}

pub fn build_router(state: AppState) -> Result<Router, AppError> {
    let login_route = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let register_route = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .layer(from_fn_with_state(
            state.register_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let protected = Router::new()
        .route("/users/me", get(handlers::user::get_me))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let origins = &state.config.security.allowed_origins;
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed = origins
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>().map_err(|e| {
                    AppError::ConfigError(anyhow::anyhow!("Invalid CORS origin '{}': {}", o, e))
                })
            })
            .collect::<Result<Vec<HeaderValue>, AppError>>()?;
        AllowOrigin::list(parsed)
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .merge(login_route)
        .merge(register_route)
        .route("/auth/:provider", get(handlers::oauth::oauth_login))
        .route(
            "/auth/:provider/callback",
            get(handlers::oauth::oauth_callback),
        )
        .merge(protected)
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    path = %request.uri().path(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(allow_origin)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        );

    Ok(app)
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "User directory unreachable", body = HealthResponse)
    ),
    tag = "Observability"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let directory_up = match state.auth_service.directory().health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "User directory health check failed");
            false
        }
    };

    let status = if directory_up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if directory_up { "healthy" } else { "unhealthy" }.to_string(),
            service: state.config.service_name.clone(),
            version: state.config.service_version.clone(),
            directory: if directory_up { "up" } else { "down" }.to_string(),
        }),
    )
}
