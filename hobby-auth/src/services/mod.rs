pub mod auth;
pub mod directory;
pub mod error;
pub mod jwt;
pub mod oauth;

pub use auth::{AuthResult, AuthService};
pub use directory::{DirectoryError, InMemoryUserDirectory, MongoUserDirectory, UserDirectory};
pub use error::{ErrorKind, ServiceError};
pub use jwt::{generate_token, validate_token, Claims, JwtService};
