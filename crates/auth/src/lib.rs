//! `natours-auth`: authentication/authorization boundary.
//!
//! This crate is decoupled from HTTP and storage: persistence and mail delivery
//! are reached through the [`UserRepository`] and [`Mailer`] traits.

pub mod authorize;
pub mod claims;
pub mod error;
pub mod password;
pub mod reset;
pub mod roles;
pub mod session;
pub mod store;
pub mod token;
pub mod user;

pub use authorize::{AuthzError, authorize};
pub use claims::{SessionClaims, TokenValidationError, validate_claims};
pub use error::AuthError;
pub use password::{PasswordError, PasswordHasher};
pub use reset::{RESET_TOKEN_TTL_MINUTES, ResetToken, hash_reset_token};
pub use roles::Role;
pub use session::{Session, SessionManager};
pub use store::{MailError, MailMessage, Mailer, UserRepository};
pub use token::{SessionTokens, TokenError};
pub use user::{
    AdminUserUpdate, NewPassword, PasswordChange, ProfileUpdate, Registration, User, UserView,
};
