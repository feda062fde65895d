use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::JwtConfig;
use crate::services::error::ServiceError;

/// Session token claims.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// Sign a session token expiring at `now + duration`.
///
/// A zero or negative `duration` still yields a token; it simply fails
/// validation from the moment it is issued. Expiries beyond the `i64`
/// timestamp range saturate instead of overflowing.
pub fn generate_token(
    user_id: &str,
    email: &str,
    secret: &[u8],
    duration: Duration,
) -> Result<String, ServiceError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        exp: now.timestamp().saturating_add(duration.num_seconds()),
        iat: now.timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to encode token: {}", e)))
}

/// Verify signature, algorithm and expiry. Every failure is reported as the
/// same [`ServiceError::InvalidToken`].
pub fn validate_token(token: &str, secret: &[u8]) -> Result<Claims, ServiceError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = vec![Algorithm::HS256];
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation).map_err(
        |e| {
            tracing::debug!(error = %e, "Token validation failed");
            ServiceError::InvalidToken
        },
    )?;

    // jsonwebtoken accepts exp == now; a token is already dead at its expiry instant.
    if data.claims.exp <= Utc::now().timestamp() {
        return Err(ServiceError::InvalidToken);
    }

    Ok(data.claims)
}

/// Issues and validates session tokens with the configured secret and lifetime.
#[derive(Clone)]
pub struct JwtService {
    secret: std::sync::Arc<[u8]>,
    expiry: Duration,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Result<Self, anyhow::Error> {
        if config.secret.is_empty() {
            return Err(anyhow::anyhow!("JWT secret must not be empty"));
        }

        let expiry = Duration::try_minutes(config.expiry_minutes).ok_or_else(|| {
            anyhow::anyhow!(
                "JWT expiry of {} minutes is out of range",
                config.expiry_minutes
            )
        })?;

        tracing::info!(
            expiry_minutes = config.expiry_minutes,
            "JWT service initialized with HS256"
        );

        Ok(Self {
            secret: config.secret.as_bytes().into(),
            expiry,
        })
    }

    pub fn issue(&self, user_id: &str, email: &str) -> Result<String, ServiceError> {
        generate_token(user_id, email, &self.secret, self.expiry)
    }

    pub fn validate(&self, token: &str) -> Result<Claims, ServiceError> {
        validate_token(token, &self.secret)
    }

    pub fn expires_in_seconds(&self) -> i64 {
        self.expiry.num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    const SECRET: &[u8] = b"test-secret-that-is-long-enough-32b";

    fn encode_segment(input: &[u8]) -> String {
        URL_SAFE_NO_PAD.encode(input)
    }

    #[test]
    fn round_trip_preserves_subject_and_email() {
        let token = generate_token("user-1", "a@b.com", SECRET, Duration::minutes(5)).unwrap();
        let claims = validate_token(&token, SECRET).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email, "a@b.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn zero_and_negative_durations_are_rejected() {
        for duration in [Duration::zero(), Duration::seconds(-1), Duration::hours(-2)] {
            let token = generate_token("user-1", "a@b.com", SECRET, duration).unwrap();
            assert!(matches!(
                validate_token(&token, SECRET),
                Err(ServiceError::InvalidToken)
            ));
        }
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_token("user-1", "a@b.com", SECRET, Duration::minutes(5)).unwrap();
        assert!(matches!(
            validate_token(&token, b"another-secret-another-secret-xx"),
            Err(ServiceError::InvalidToken)
        ));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let token = generate_token("user-1", "a@b.com", SECRET, Duration::minutes(5)).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged_payload = encode_segment(
            format!(
                r#"{{"sub":"admin","email":"a@b.com","exp":{},"iat":0}}"#,
                Utc::now().timestamp() + 3600
            )
            .as_bytes(),
        );
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert!(validate_token(&forged, SECRET).is_err());
    }

    #[test]
    fn unsigned_and_foreign_algorithms_are_rejected() {
        let payload = encode_segment(
            format!(
                r#"{{"sub":"user-1","email":"a@b.com","exp":{},"iat":0}}"#,
                Utc::now().timestamp() + 3600
            )
            .as_bytes(),
        );

        let none_token = format!("{}.{}.", encode_segment(br#"{"alg":"none","typ":"JWT"}"#), payload);
        assert!(validate_token(&none_token, SECRET).is_err());

        let hs512 = encode(
            &Header::new(Algorithm::HS512),
            &Claims {
                sub: "user-1".to_string(),
                email: "a@b.com".to_string(),
                exp: Utc::now().timestamp() + 3600,
                iat: Utc::now().timestamp(),
            },
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert!(validate_token(&hs512, SECRET).is_err());
    }

    #[test]
    fn malformed_input_is_rejected() {
        for token in ["", "not-a-token", "a.b.c", "...."] {
            assert!(matches!(
                validate_token(token, SECRET),
                Err(ServiceError::InvalidToken)
            ));
        }
    }

    #[test]
    fn service_uses_configured_lifetime() {
        let service = JwtService::new(&JwtConfig {
            secret: String::from_utf8(SECRET.to_vec()).unwrap(),
            expiry_minutes: 90,
        })
        .unwrap();

        assert_eq!(service.expires_in_seconds(), 5400);
        let claims = service.validate(&service.issue("u", "e@x.io").unwrap()).unwrap();
        assert_eq!(claims.exp - claims.iat, 5400);
    }

    #[test]
    fn extreme_durations_do_not_overflow() {
        let token = generate_token("user-1", "a@b.com", SECRET, Duration::MAX).unwrap();
        let claims = validate_token(&token, SECRET).unwrap();
        assert_eq!(claims.exp, i64::MAX);

        let token = generate_token("user-1", "a@b.com", SECRET, Duration::MIN).unwrap();
        assert!(matches!(
            validate_token(&token, SECRET),
            Err(ServiceError::InvalidToken)
        ));
    }

    #[test]
    fn out_of_range_configured_lifetime_is_an_error() {
        let result = JwtService::new(&JwtConfig {
            secret: String::from_utf8(SECRET.to_vec()).unwrap(),
            expiry_minutes: i64::MAX,
        });
        assert!(result.is_err());
    }
}
