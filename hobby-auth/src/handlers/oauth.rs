use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use service_core::error::AppError;

use crate::{
    dtos::{
        auth::{AuthResponse, OAuthCallbackQuery},
        ErrorResponse,
    },
    services::ServiceError,
    AppState,
};

pub const OAUTH_STATE_COOKIE: &str = "oauth_state";
const OAUTH_COOKIE_PATH: &str = "/auth";

/// Start the OAuth flow: set the state cookie and redirect to the provider
#[utoipa::path(
    get,
    path = "/auth/{provider}",
    params(("provider" = String, Path, description = "Provider name, e.g. google or github")),
    responses(
        (status = 307, description = "Redirect to the provider consent screen"),
        (status = 404, description = "Unknown provider", body = ErrorResponse)
    ),
    tag = "OAuth"
)]
pub async fn oauth_login(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AppError> {
    let provider = state.oauth_service.provider(&provider)?;
    let nonce = state.oauth_state.issue(provider.name())?;
    let url = provider.auth_url(&nonce);

    let cookie = Cookie::build((OAUTH_STATE_COOKIE, nonce))
        .path(OAUTH_COOKIE_PATH)
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.security.cookie_secure)
        .max_age(time::Duration::seconds(state.oauth_state.ttl_seconds()))
        .build();

    tracing::debug!(provider = %provider.name(), "Redirecting to OAuth provider");

    Ok((jar.add(cookie), Redirect::temporary(&url)))
}

/// Provider redirect target: verify state, exchange the code, issue a session
#[utoipa::path(
    get,
    path = "/auth/{provider}/callback",
    params(
        ("provider" = String, Path, description = "Provider name, e.g. google or github"),
        OAuthCallbackQuery
    ),
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 400, description = "Invalid state, missing code or consent denied", body = ErrorResponse),
        (status = 403, description = "Email not verified for account linking", body = ErrorResponse),
        (status = 404, description = "Unknown provider", body = ErrorResponse),
        (status = 500, description = "Provider round-trip failed", body = ErrorResponse)
    ),
    tag = "OAuth"
)]
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    jar: CookieJar,
    Query(query): Query<OAuthCallbackQuery>,
) -> Response {
    let cookie_state = jar.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    let cleared = jar.remove(
        Cookie::build(OAUTH_STATE_COOKIE).path(OAUTH_COOKIE_PATH),
    );

    let result = complete_callback(&state, &provider, cookie_state.as_deref(), query).await;
    (cleared, result).into_response()
}

async fn complete_callback(
    state: &AppState,
    provider: &str,
    cookie_state: Option<&str>,
    query: OAuthCallbackQuery,
) -> Result<Json<AuthResponse>, AppError> {
    let provider = state.oauth_service.provider(provider)?;

    // Nothing leaves the process until the state checks out.
    state
        .oauth_state
        .consume(provider.name(), cookie_state, query.state.as_deref())
        .inspect_err(|_| tracing::warn!(provider = %provider.name(), "OAuth state verification failed"))?;

    if let Some(error) = query.error {
        tracing::info!(
            provider = %provider.name(),
            error = %error,
            description = %query.error_description.unwrap_or_default(),
            "Provider reported an authorization error"
        );
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "authorization was not granted by provider"
        )));
    }

    let code = query.code.unwrap_or_default();
    let (result, _resolution) = state
        .oauth_service
        .handle_callback(provider.name(), &code)
        .await
        .inspect_err(|e| {
            if let ServiceError::TokenExchange(_) | ServiceError::UserInfo(_) | ServiceError::NoEmailFound = e {
                tracing::error!(provider = %provider.name(), error = %e, "OAuth callback failed");
            }
        })?;

    Ok(Json(AuthResponse::from(result)))
}
