pub mod circle;
pub mod user;

pub use circle::{AccessLevel, Circle, CircleMember};
pub use user::{ProviderLink, SanitizedUser, User};
