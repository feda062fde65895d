use axum::{
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use validator::ValidateEmail;

use crate::dtos::ErrorResponse;
use crate::services::error::ServiceError;
use crate::utils::password::Password;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// JSON body extractor whose rejections use the service's `{"error": ...}`
/// shape with status 400.
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
            let err_resp = ErrorResponse {
                error: format!("Json parse error: {}", e.body_text()),
            };
            (StatusCode::BAD_REQUEST, Json(err_resp)).into_response()
        })?;

        Ok(JsonBody(value))
    }
}

/// Lower-cased, trimmed form under which emails are stored and looked up.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Syntactic check: a valid address whose domain has a dotted, alphabetic
/// top-level label of two or more characters.
pub fn is_valid_email(email: &str) -> bool {
    if !email.validate_email() {
        return false;
    }

    let Some((_, domain)) = email.rsplit_once('@') else {
        return false;
    };
    match domain.rsplit_once('.') {
        Some((host, tld)) => {
            !host.is_empty() && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
        }
        None => false,
    }
}

/// Registration input checks, in the order callers see them reported.
pub fn validate_registration(email: &str, password: &Password, name: &str) -> Result<(), ServiceError> {
    if email.is_empty() {
        return Err(ServiceError::EmailRequired);
    }
    if password.is_empty() {
        return Err(ServiceError::PasswordRequired);
    }
    if name.trim().is_empty() {
        return Err(ServiceError::NameRequired);
    }
    if !is_valid_email(email) {
        return Err(ServiceError::InvalidEmail);
    }
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ServiceError::PasswordTooShort);
    }
    Ok(())
}

pub fn validate_login(email: &str, password: &Password) -> Result<(), ServiceError> {
    if email.is_empty() {
        return Err(ServiceError::EmailRequired);
    }
    if password.is_empty() {
        return Err(ServiceError::PasswordRequired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pw(s: &str) -> Password {
        Password::new(s.to_string())
    }

    #[test]
    fn accepts_common_addresses() {
        for email in ["a@b.com", "first.last+tag@sub.example.org", "x_y%z@mail.co"] {
            assert!(is_valid_email(email), "{email} should be valid");
        }
    }

    #[test]
    fn rejects_malformed_addresses() {
        for email in ["", "plain", "@b.com", "a@", "a@localhost", "a@b.c", "a@b.c0m", "a b@c.com"] {
            assert!(!is_valid_email(email), "{email} should be invalid");
        }
    }

    #[test]
    fn password_length_boundary() {
        assert!(matches!(
            validate_registration("a@b.com", &pw("1234567"), "A"),
            Err(ServiceError::PasswordTooShort)
        ));
        assert!(validate_registration("a@b.com", &pw("12345678"), "A").is_ok());
    }

    #[test]
    fn required_fields_are_checked_before_format() {
        assert!(matches!(
            validate_registration("", &pw(""), ""),
            Err(ServiceError::EmailRequired)
        ));
        assert!(matches!(
            validate_registration("bad", &pw(""), "A"),
            Err(ServiceError::PasswordRequired)
        ));
        assert!(matches!(
            validate_registration("bad", &pw("short"), "  "),
            Err(ServiceError::NameRequired)
        ));
        assert!(matches!(
            validate_registration("bad", &pw("short"), "A"),
            Err(ServiceError::InvalidEmail)
        ));
    }

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }
}
