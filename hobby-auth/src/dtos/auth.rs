use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::services::auth::AuthResult;

/// Missing fields deserialize as empty so the service can report which one
/// is required.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[serde(default)]
    #[schema(example = "user@example.com")]
    pub email: String,

    #[serde(default)]
    #[schema(example = "password123", min_length = 8)]
    pub password: String,

    #[serde(default)]
    #[schema(example = "Jane Doe")]
    pub name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    #[schema(example = "user@example.com")]
    pub email: String,

    #[serde(default)]
    #[schema(example = "password123")]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[schema(example = "eyJhbGciOiJIUzI1NiJ9...")]
    pub token: String,
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub user_id: String,
    #[schema(example = "user@example.com")]
    pub email: String,
    #[schema(example = "Jane Doe")]
    pub name: String,
}

impl From<AuthResult> for AuthResponse {
    fn from(r: AuthResult) -> Self {
        Self {
            token: r.token,
            user_id: r.user_id,
            email: r.email,
            name: r.name,
        }
    }
}

/// Query string the provider appends when redirecting back.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the user declined consent.
    pub error: Option<String>,
    pub error_description: Option<String>,
}
