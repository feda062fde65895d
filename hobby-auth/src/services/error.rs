use service_core::error::AppError;
use thiserror::Error;

/// Broad class of a [`ServiceError`], used by callers that only care about
/// how to react (reject input, report a conflict, retry later...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    Authentication,
    Upstream,
    NotFound,
    Forbidden,
    Internal,
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("email is required")]
    EmailRequired,

    #[error("password is required")]
    PasswordRequired,

    #[error("name is required")]
    NameRequired,

    #[error("invalid email format")]
    InvalidEmail,

    #[error("password must be at least 8 characters")]
    PasswordTooShort,

    #[error("email already exists")]
    EmailAlreadyExists,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid token")]
    InvalidToken,

    #[error("authorization code is required")]
    CodeRequired,

    #[error("invalid state parameter")]
    InvalidState,

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("failed to exchange authorization code: {0:#}")]
    TokenExchange(anyhow::Error),

    #[error("failed to fetch user info: {0:#}")]
    UserInfo(anyhow::Error),

    #[error("no email found for user")]
    NoEmailFound,

    #[error("user not found")]
    UserNotFound,

    #[error("user is already a member of this circle")]
    MemberAlreadyExists,

    #[error("member not found in circle")]
    MemberNotFound,

    #[error("private access cannot be granted to a member")]
    AccessLevelNotAssignable,

    #[error("the circle owner cannot be added as a member")]
    OwnerIsImplicitMember,

    #[error("access denied")]
    AccessDenied,

    #[error("email must be verified by the provider before linking to an existing account")]
    UnverifiedEmailLink,

    #[error("user directory error: {0:#}")]
    Directory(anyhow::Error),

    #[error("Internal server error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::EmailRequired
            | ServiceError::PasswordRequired
            | ServiceError::NameRequired
            | ServiceError::InvalidEmail
            | ServiceError::PasswordTooShort
            | ServiceError::CodeRequired
            | ServiceError::InvalidState
            | ServiceError::AccessLevelNotAssignable
            | ServiceError::OwnerIsImplicitMember => ErrorKind::Validation,
            ServiceError::EmailAlreadyExists | ServiceError::MemberAlreadyExists => {
                ErrorKind::Conflict
            }
            ServiceError::InvalidCredentials | ServiceError::InvalidToken => {
                ErrorKind::Authentication
            }
            ServiceError::TokenExchange(_)
            | ServiceError::UserInfo(_)
            | ServiceError::NoEmailFound => ErrorKind::Upstream,
            ServiceError::UnknownProvider(_)
            | ServiceError::UserNotFound
            | ServiceError::MemberNotFound => ErrorKind::NotFound,
            ServiceError::AccessDenied | ServiceError::UnverifiedEmailLink => ErrorKind::Forbidden,
            ServiceError::Directory(_) | ServiceError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Message shown to callers when a provider round-trip fails. The cause is
/// logged, never returned.
pub const UPSTREAM_FAILURE_MESSAGE: &str = "failed to authenticate with provider";

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err.kind() {
            ErrorKind::Validation => AppError::BadRequest(anyhow::anyhow!(err.to_string())),
            ErrorKind::Conflict => AppError::Conflict(anyhow::anyhow!(err.to_string())),
            ErrorKind::Authentication => AppError::Unauthorized(anyhow::anyhow!(err.to_string())),
            ErrorKind::NotFound => AppError::NotFound(anyhow::anyhow!(err.to_string())),
            ErrorKind::Forbidden => AppError::Forbidden(anyhow::anyhow!(err.to_string())),
            ErrorKind::Upstream => AppError::Upstream(
                UPSTREAM_FAILURE_MESSAGE.to_string(),
                anyhow::Error::new(err),
            ),
            ErrorKind::Internal => match err {
                ServiceError::Directory(cause) => AppError::DatabaseError(cause),
                other => AppError::InternalError(anyhow::Error::new(other)),
            },
        }
    }
}
