use thiserror::Error;

use natours_core::{DomainError, StoreError};

use crate::{AuthzError, MailError, PasswordError, TokenError, TokenValidationError};

/// Failures surfaced by [`crate::SessionManager`].
///
/// Display strings are client-facing messages.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error("Please provide email and password!")]
    MissingCredentials,

    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("You are not logged in! Please log in to get access.")]
    NotLoggedIn,

    #[error("Invalid token. Please log in again!")]
    InvalidToken,

    #[error("Your token has expired! Please log in again.")]
    TokenExpired,

    #[error("The user belonging to this token no longer exists.")]
    AccountGone,

    #[error("User recently changed password! Please log in again.")]
    PasswordChanged,

    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    #[error("Your current password is wrong.")]
    WrongCurrentPassword,

    #[error("Token is invalid or has expired")]
    ResetTokenInvalid,

    #[error("There was an error sending the email. Try again later!")]
    MailDelivery(#[source] MailError),

    #[error("This route is not for password updates. Please use /updateMyPassword.")]
    PasswordFieldsNotAllowed,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("password hashing failed: {0}")]
    Hashing(#[from] PasswordError),

    #[error("token signing failed: {0}")]
    Signing(String),
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Malformed => AuthError::InvalidToken,
            TokenError::Claims(TokenValidationError::Expired) => AuthError::TokenExpired,
            TokenError::Claims(_) => AuthError::InvalidToken,
            TokenError::Signing(msg) => AuthError::Signing(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_errors_map_to_client_messages() {
        assert!(matches!(AuthError::from(TokenError::Malformed), AuthError::InvalidToken));
        assert!(matches!(
            AuthError::from(TokenError::Claims(TokenValidationError::Expired)),
            AuthError::TokenExpired
        ));
        assert!(matches!(
            AuthError::from(TokenError::Claims(TokenValidationError::NotYetValid)),
            AuthError::InvalidToken
        ));
    }

    #[test]
    fn mail_failure_message_hides_transport_detail() {
        let err = AuthError::MailDelivery(MailError::Transport("connection refused".into()));
        assert_eq!(err.to_string(), "There was an error sending the email. Try again later!");
    }
}
