//! User accounts, created by password registration or first OAuth sign-in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// The external identity an account was first federated with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderLink {
    pub provider: String,
    pub provider_user_id: String,
}

/// Persisted user record. `email` is stored normalised and is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    /// Absent for accounts that only ever signed in through a provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_link: Option<ProviderLink>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new_with_password(email: String, password_hash: String, name: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            email,
            password_hash: Some(password_hash),
            name,
            provider_link: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn new_from_provider(email: String, name: String, link: ProviderLink) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            email,
            password_hash: None,
            name,
            provider_link: Some(link),
            created_at: now,
            updated_at: now,
        }
    }

    /// Backfill the provider link. The first link wins: an already linked
    /// account is left untouched and `false` is returned.
    pub fn link_provider(&mut self, link: ProviderLink) -> bool {
        if self.provider_link.is_some() {
            return false;
        }
        self.provider_link = Some(link);
        self.updated_at = Utc::now();
        true
    }

    pub fn is_linked_to(&self, provider: &str, provider_user_id: &str) -> bool {
        self.provider_link
            .as_ref()
            .is_some_and(|l| l.provider == provider && l.provider_user_id == provider_user_id)
    }

    /// Convert to sanitized response (no sensitive fields).
    pub fn sanitized(&self) -> SanitizedUser {
        SanitizedUser::from(self.clone())
    }
}

/// User as exposed over the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub has_password: bool,
    pub provider: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for SanitizedUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            has_password: u.password_hash.is_some(),
            provider: u.provider_link.map(|l| l.provider),
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}
