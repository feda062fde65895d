use std::sync::Arc;

use crate::{
    models::{SanitizedUser, User},
    services::{
        directory::{DirectoryError, UserDirectory},
        JwtService, ServiceError,
    },
    utils::{
        hash_password, normalize_email,
        password::dummy_hash,
        validation::{validate_login, validate_registration},
        verify_password, Password, PasswordHashString,
    },
};

/// Outcome of a successful sign-in: a session token plus who it is for.
#[derive(Debug, Clone)]
pub struct AuthResult {
    pub token: String,
    pub user_id: String,
    pub email: String,
    pub name: String,
}

/// Password registration and login.
#[derive(Clone)]
pub struct AuthService {
    directory: Arc<dyn UserDirectory>,
    jwt: JwtService,
}

impl AuthService {
    pub fn new(directory: Arc<dyn UserDirectory>, jwt: JwtService) -> Self {
        Self { directory, jwt }
    }

    pub fn directory(&self) -> &Arc<dyn UserDirectory> {
        &self.directory
    }

    pub async fn register(
        &self,
        email: &str,
        password: String,
        name: &str,
    ) -> Result<AuthResult, ServiceError> {
        let email = normalize_email(email);
        let password = Password::new(password);
        let name = name.trim();
        validate_registration(&email, &password, name)?;

        match self.directory.find_by_email(&email).await {
            Ok(_) => return Err(ServiceError::EmailAlreadyExists),
            Err(DirectoryError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Password hashing task failed: {}", e)))?
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Password hashing error: {}", e)))?;

        let user = User::new_with_password(email, password_hash.into_string(), name.to_string());

        // A concurrent registration for the same email surfaces here as DuplicateEmail.
        self.directory.create(&user).await?;

        tracing::info!(user_id = %user.id, "User registered");

        self.issue(&user)
    }

    pub async fn login(&self, email: &str, password: String) -> Result<AuthResult, ServiceError> {
        let email = normalize_email(email);
        let password = Password::new(password);
        validate_login(&email, &password)?;

        let user = match self.directory.find_by_email(&email).await {
            Ok(user) => Some(user),
            Err(DirectoryError::NotFound) => None,
            Err(e) => return Err(e.into()),
        };

        let stored_hash = user
            .as_ref()
            .and_then(|u| u.password_hash.clone())
            .map(PasswordHashString::new);
        let has_hash = stored_hash.is_some();

        let verified = tokio::task::spawn_blocking(move || match stored_hash {
            Some(hash) => verify_password(&password, &hash).is_ok(),
            None => {
                // Same cost as a real check so response timing does not reveal the account.
                if let Some(hash) = dummy_hash() {
                    let _ = verify_password(&password, hash);
                }
                false
            }
        })
        .await
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Password verification task failed: {}", e)))?;

        match user {
            Some(user) if has_hash && verified => {
                tracing::info!(user_id = %user.id, "User logged in");
                self.issue(&user)
            }
            _ => {
                tracing::info!("Login rejected");
                Err(ServiceError::InvalidCredentials)
            }
        }
    }

    pub async fn current_user(&self, user_id: &str) -> Result<SanitizedUser, ServiceError> {
        let user = self.directory.find_by_id(user_id).await?;
        Ok(user.sanitized())
    }

    /// Sign a session token for an already resolved user.
    pub fn issue(&self, user: &User) -> Result<AuthResult, ServiceError> {
        let token = self.jwt.issue(&user.id, &user.email)?;
        Ok(AuthResult {
            token,
            user_id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::services::directory::{InMemoryUserDirectory, RacingUserDirectory};
    use crate::services::ErrorKind;

    fn service() -> AuthService {
        let jwt = JwtService::new(&JwtConfig {
            secret: "unit-test-secret-unit-test-secret".to_string(),
            expiry_minutes: 60,
        })
        .unwrap();
        AuthService::new(Arc::new(InMemoryUserDirectory::new()), jwt)
    }

    #[tokio::test]
    async fn register_then_login_resolve_same_user() {
        let svc = service();
        let registered = svc.register("a@b.com", "password1".to_string(), "A").await.unwrap();
        let logged_in = svc.login("a@b.com", "password1".to_string()).await.unwrap();

        assert_eq!(registered.user_id, logged_in.user_id);
        assert_eq!(registered.email, logged_in.email);
        assert_eq!(registered.name, "A");
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict_regardless_of_case() {
        let svc = service();
        svc.register("a@b.com", "password1".to_string(), "A").await.unwrap();

        let err = svc
            .register("A@B.com", "password2".to_string(), "B")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::EmailAlreadyExists));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let svc = service();
        svc.register("a@b.com", "password1".to_string(), "A").await.unwrap();

        let wrong = svc.login("a@b.com", "wrong".to_string()).await.unwrap_err();
        let missing = svc.login("missing@b.com", "x".to_string()).await.unwrap_err();

        assert_eq!(wrong.to_string(), "invalid credentials");
        assert_eq!(wrong.to_string(), missing.to_string());
    }

    #[tokio::test]
    async fn create_conflict_after_lookup_miss_is_email_already_exists() {
        let inner = InMemoryUserDirectory::new();
        inner
            .create(&User::new_with_password(
                "race@b.com".to_string(),
                "$argon2id$stub".to_string(),
                "First".to_string(),
            ))
            .await
            .unwrap();
        let jwt = JwtService::new(&JwtConfig {
            secret: "unit-test-secret-unit-test-secret".to_string(),
            expiry_minutes: 60,
        })
        .unwrap();
        let svc = AuthService::new(Arc::new(RacingUserDirectory::new(inner, usize::MAX)), jwt);

        let err = svc
            .register("race@b.com", "password1".to_string(), "Second")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::EmailAlreadyExists));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn oauth_only_account_cannot_password_login() {
        let svc = service();
        let user = User::new_from_provider(
            "o@b.com".to_string(),
            "O".to_string(),
            crate::models::ProviderLink {
                provider: "google".to_string(),
                provider_user_id: "g-1".to_string(),
            },
        );
        svc.directory().create(&user).await.unwrap();

        let err = svc.login("o@b.com", "password1".to_string()).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredentials));
    }

    #[tokio::test]
    async fn registration_validation_errors_are_specific() {
        let svc = service();
        let err = svc.register("a@b.com", "1234567".to_string(), "A").await.unwrap_err();
        assert!(matches!(err, ServiceError::PasswordTooShort));

        let err = svc.register("not-an-email", "password1".to_string(), "A").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidEmail));

        let err = svc.login("", "x".to_string()).await.unwrap_err();
        assert!(matches!(err, ServiceError::EmailRequired));
    }

    #[tokio::test]
    async fn current_user_is_sanitized() {
        let svc = service();
        let result = svc.register("a@b.com", "password1".to_string(), "A").await.unwrap();

        let me = svc.current_user(&result.user_id).await.unwrap();
        assert_eq!(me.email, "a@b.com");
        assert!(me.has_password);

        assert!(matches!(
            svc.current_user("unknown").await,
            Err(ServiceError::UserNotFound)
        ));
    }
}
