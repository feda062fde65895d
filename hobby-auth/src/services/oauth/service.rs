use std::sync::Arc;

use super::{select_email, OAuthProvider, ProviderIdentity, ProviderRegistry};
use crate::models::{ProviderLink, User};
use crate::services::{
    auth::{AuthResult, AuthService},
    directory::{DirectoryError, UserDirectory},
    error::ServiceError,
};
use crate::utils::normalize_email;

/// How the callback's identity mapped onto a local account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Created,
    Linked,
    Existing,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Created => "created",
            Resolution::Linked => "linked",
            Resolution::Existing => "existing",
        }
    }
}

#[derive(Clone)]
pub struct OAuthService {
    registry: ProviderRegistry,
    auth: AuthService,
    link_requires_verified_email: bool,
}

/// Identity with its email settled, either from user-info or the listing.
struct ResolvedIdentity {
    provider_user_id: String,
    email: String,
    email_verified: bool,
    name: String,
}

impl OAuthService {
    pub fn new(registry: ProviderRegistry, auth: AuthService, link_requires_verified_email: bool) -> Self {
        Self {
            registry,
            auth,
            link_requires_verified_email,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn provider(&self, name: &str) -> Result<Arc<dyn OAuthProvider>, ServiceError> {
        self.registry.get(name)
    }

    /// Complete the authorization-code flow. The caller has already verified
    /// the CSRF state. Nothing is retried: codes are single-use.
    pub async fn handle_callback(
        &self,
        provider_name: &str,
        code: &str,
    ) -> Result<(AuthResult, Resolution), ServiceError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ServiceError::CodeRequired);
        }

        let provider = self.registry.get(provider_name)?;

        let access_token = provider.exchange_code(code).await?;
        let identity = provider.fetch_user_info(&access_token).await?;
        let identity = self.resolve_email(provider.as_ref(), &access_token, identity).await?;

        let (user, resolution) = self.find_or_create(provider.name(), identity).await?;

        tracing::info!(
            provider = %provider.name(),
            user_id = %user.id,
            resolution = %resolution.as_str(),
            "OAuth sign-in"
        );

        Ok((self.auth.issue(&user)?, resolution))
    }

    async fn resolve_email(
        &self,
        provider: &dyn OAuthProvider,
        access_token: &str,
        identity: ProviderIdentity,
    ) -> Result<ResolvedIdentity, ServiceError> {
        let (email, email_verified) = match identity.email {
            Some(email) => (email, identity.email_verified),
            None => match provider.fetch_emails(access_token).await {
                Some(listing) => {
                    let emails = listing?;
                    let selected = select_email(&emails).ok_or(ServiceError::NoEmailFound)?;
                    (selected.email.clone(), selected.verified)
                }
                None => return Err(ServiceError::NoEmailFound),
            },
        };

        let email = normalize_email(&email);
        if email.is_empty() {
            return Err(ServiceError::NoEmailFound);
        }

        let name = if identity.name.trim().is_empty() {
            email.clone()
        } else {
            identity.name
        };

        Ok(ResolvedIdentity {
            provider_user_id: identity.provider_user_id,
            email,
            email_verified,
            name,
        })
    }

    async fn find_or_create(
        &self,
        provider: &str,
        identity: ResolvedIdentity,
    ) -> Result<(User, Resolution), ServiceError> {
        let directory = self.auth.directory();

        match directory.find_by_email(&identity.email).await {
            Ok(user) => return self.attach(directory.as_ref(), user, provider, &identity).await,
            Err(DirectoryError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let link = ProviderLink {
            provider: provider.to_string(),
            provider_user_id: identity.provider_user_id.clone(),
        };
        let user = User::new_from_provider(identity.email.clone(), identity.name.clone(), link);

        match directory.create(&user).await {
            Ok(()) => Ok((user, Resolution::Created)),
            // Lost a race with a concurrent sign-up for the same email.
            Err(DirectoryError::DuplicateEmail) => {
                let existing = directory.find_by_email(&identity.email).await?;
                self.attach(directory.as_ref(), existing, provider, &identity).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn attach(
        &self,
        directory: &dyn UserDirectory,
        mut user: User,
        provider: &str,
        identity: &ResolvedIdentity,
    ) -> Result<(User, Resolution), ServiceError> {
        if user.is_linked_to(provider, &identity.provider_user_id) {
            return Ok((user, Resolution::Existing));
        }

        if self.link_requires_verified_email && !identity.email_verified {
            tracing::warn!(
                provider = %provider,
                user_id = %user.id,
                "Refusing to attach provider identity with unverified email"
            );
            return Err(ServiceError::UnverifiedEmailLink);
        }

        let linked = user.link_provider(ProviderLink {
            provider: provider.to_string(),
            provider_user_id: identity.provider_user_id.clone(),
        });

        if !linked {
            return Ok((user, Resolution::Existing));
        }

        directory.update(&user).await?;
        Ok((user, Resolution::Linked))
    }
}
