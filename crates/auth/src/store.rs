//! Seams to the outside world: account persistence and mail delivery.

use async_trait::async_trait;
use thiserror::Error;

use natours_core::{StoreError, UserId};

use crate::User;

/// Account persistence.
///
/// Lookups return raw records including inactive accounts; callers decide
/// what an inactive account means for them.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new account. Fails with [`StoreError::Duplicate`] on a taken email.
    async fn insert(&self, user: User) -> Result<User, StoreError>;

    /// Overwrite an existing account.
    async fn save(&self, user: User) -> Result<User, StoreError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// `email` is expected already normalized (trimmed, lowercase).
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Find the account whose pending reset digest equals `token_hash`.
    async fn find_by_reset_token(&self, token_hash: &str) -> Result<Option<User>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MailError {
    #[error("mail transport failed: {0}")]
    Transport(String),

    #[error("mail relay rejected the message with status {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), MailError>;
}
