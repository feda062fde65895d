//! Circles: a named group of users sharing categories, with one owner.
//!
//! Only the membership model and access resolution live here. Callers are
//! expected to check `require_access(caller, AccessLevel::Admin)` before
//! invoking any of the membership mutators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::services::error::ServiceError;

/// Permission tier. `Admin` implies `Edit`, which implies `View`.
///
/// `Private` describes a circle nobody else can see; it is never stored on
/// a member entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Private,
    View,
    Edit,
    Admin,
}

impl AccessLevel {
    fn rank(self) -> u8 {
        match self {
            AccessLevel::Private => 0,
            AccessLevel::View => 1,
            AccessLevel::Edit => 2,
            AccessLevel::Admin => 3,
        }
    }

    /// Whether holding `self` grants everything `required` grants.
    pub fn implies(self, required: AccessLevel) -> bool {
        if self == AccessLevel::Private || required == AccessLevel::Private {
            return false;
        }
        self.rank() >= required.rank()
    }

    pub fn is_assignable(self) -> bool {
        self != AccessLevel::Private
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Private => "private",
            AccessLevel::View => "view",
            AccessLevel::Edit => "edit",
            AccessLevel::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CircleMember {
    pub user_id: String,
    pub access_level: AccessLevel,
    pub invited_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Circle {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    #[serde(default)]
    pub members: Vec<CircleMember>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Circle {
    pub fn new(name: String, owner_id: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            owner_id,
            members: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Effective access of `user_id`: the owner is always `Admin`, members get
    /// their stored level, everyone else gets `None`.
    pub fn resolve_access(&self, user_id: &str) -> Option<AccessLevel> {
        if self.owner_id == user_id {
            return Some(AccessLevel::Admin);
        }
        self.member(user_id).map(|m| m.access_level)
    }

    pub fn has_member(&self, user_id: &str) -> bool {
        self.member(user_id).is_some()
    }

    pub fn member(&self, user_id: &str) -> Option<&CircleMember> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    pub fn require_access(&self, user_id: &str, required: AccessLevel) -> Result<AccessLevel, ServiceError> {
        match self.resolve_access(user_id) {
            Some(level) if level.implies(required) => Ok(level),
            _ => Err(ServiceError::AccessDenied),
        }
    }

    pub fn add_member(&mut self, user_id: &str, level: AccessLevel) -> Result<(), ServiceError> {
        if !level.is_assignable() {
            return Err(ServiceError::AccessLevelNotAssignable);
        }
        if self.owner_id == user_id {
            return Err(ServiceError::OwnerIsImplicitMember);
        }
        if self.has_member(user_id) {
            return Err(ServiceError::MemberAlreadyExists);
        }

        let now = Utc::now();
        self.members.push(CircleMember {
            user_id: user_id.to_string(),
            access_level: level,
            invited_at: now,
            accepted_at: None,
        });
        self.updated_at = now;
        Ok(())
    }

    pub fn remove_member(&mut self, user_id: &str) -> Result<CircleMember, ServiceError> {
        let idx = self
            .members
            .iter()
            .position(|m| m.user_id == user_id)
            .ok_or(ServiceError::MemberNotFound)?;

        self.updated_at = Utc::now();
        Ok(self.members.remove(idx))
    }

    pub fn update_member_access(&mut self, user_id: &str, level: AccessLevel) -> Result<(), ServiceError> {
        if !level.is_assignable() {
            return Err(ServiceError::AccessLevelNotAssignable);
        }

        let member = self
            .members
            .iter_mut()
            .find(|m| m.user_id == user_id)
            .ok_or(ServiceError::MemberNotFound)?;

        member.access_level = level;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record that an invited member accepted. Accepting twice keeps the
    /// first timestamp.
    pub fn accept_membership(&mut self, user_id: &str) -> Result<(), ServiceError> {
        let member = self
            .members
            .iter_mut()
            .find(|m| m.user_id == user_id)
            .ok_or(ServiceError::MemberNotFound)?;

        if member.accepted_at.is_none() {
            let now = Utc::now();
            member.accepted_at = Some(now);
            self.updated_at = now;
        }
        Ok(())
    }
}
