//! Session lifecycle: sign-up, login, token verification, password reset and
//! the authenticated account operations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;

use natours_core::{DomainError, UserId};

use crate::user::normalize_email;
use crate::{
    AuthError, MailMessage, Mailer, NewPassword, PasswordChange, PasswordHasher, ProfileUpdate,
    Registration, Role, SessionClaims, SessionTokens, User, UserRepository, hash_reset_token,
};

/// An authenticated session: the signed token, its claims and the account.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub claims: SessionClaims,
    pub user: User,
}

pub struct SessionManager {
    users: Arc<dyn UserRepository>,
    mailer: Arc<dyn Mailer>,
    tokens: SessionTokens,
    hasher: PasswordHasher,
    dummy_hash: OnceCell<String>,
}

impl SessionManager {
    pub fn new(
        users: Arc<dyn UserRepository>,
        mailer: Arc<dyn Mailer>,
        tokens: SessionTokens,
        hasher: PasswordHasher,
    ) -> Self {
        Self {
            users,
            mailer,
            tokens,
            hasher,
            dummy_hash: OnceCell::new(),
        }
    }

    pub fn tokens(&self) -> &SessionTokens {
        &self.tokens
    }

    pub async fn register(&self, input: Registration) -> Result<Session, AuthError> {
        let email = input.validate()?;
        let now = Utc::now();
        let password = self.hasher.hash(&input.password).await?;

        let user = User {
            id: UserId::new(),
            name: input.name.trim().to_string(),
            email,
            photo: input.photo,
            role: Role::User,
            password,
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            active: true,
            created_at: now,
        };

        let user = self.users.insert(user).await?;
        tracing::info!(user_id = %user.id, "account registered");
        self.issue(user, now)
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let candidate = self
            .users
            .find_by_email(&email)
            .await?
            .filter(|user| user.active);

        let Some(user) = candidate else {
            // Same bcrypt cost as a real check.
            let dummy = self.dummy_hash().await?;
            let _ = self.hasher.verify(password, dummy).await?;
            tracing::warn!("login rejected: unknown or inactive account");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.hasher.verify(password, &user.password).await? {
            tracing::warn!(user_id = %user.id, "login rejected: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        self.issue(user, Utc::now())
    }

    /// Resolve a presented token to a live account.
    pub async fn verify(&self, token: Option<&str>) -> Result<User, AuthError> {
        self.verify_at(token, Utc::now()).await
    }

    pub async fn verify_at(&self, token: Option<&str>, now: DateTime<Utc>) -> Result<User, AuthError> {
        let token = token.map(str::trim).filter(|t| !t.is_empty());
        let Some(token) = token else {
            return Err(AuthError::NotLoggedIn);
        };

        let claims = self.tokens.verify(token, now)?;

        let user = self
            .users
            .find_by_id(claims.sub)
            .await?
            .filter(|user| user.active)
            .ok_or(AuthError::AccountGone)?;

        if user.changed_password_after(claims.iat) {
            tracing::debug!(user_id = %user.id, "token predates password change");
            return Err(AuthError::PasswordChanged);
        }

        tracing::debug!(user_id = %user.id, role = %user.role, "session verified");
        Ok(user)
    }

    /// Mail a reset link to `email`. Unknown addresses get the same `Ok`.
    ///
    /// `reset_url_base` is the absolute prefix the raw token is appended to.
    pub async fn request_password_reset(&self, email: &str, reset_url_base: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(DomainError::validation("Please provide your email!").into());
        }

        let Some(mut user) = self.users.find_by_email(&email).await?.filter(|u| u.active) else {
            tracing::debug!("password reset requested for unknown account");
            return Ok(());
        };

        let raw = user.begin_password_reset(Utc::now());
        let mut user = self.users.save(user).await?;

        let reset_url = format!("{}/{}", reset_url_base.trim_end_matches('/'), raw);
        let message = MailMessage {
            to: user.email.clone(),
            subject: "Your password reset token (valid for 10 min)".to_string(),
            text: format!(
                "Forgot your password? Submit a PATCH request with your new password and passwordConfirm to: {reset_url}.\nIf you didn't forget your password, please ignore this email!"
            ),
        };

        if let Err(err) = self.mailer.send(message).await {
            tracing::warn!(user_id = %user.id, error = %err, "reset mail failed; clearing token");
            user.clear_password_reset();
            self.users.save(user).await?;
            return Err(AuthError::MailDelivery(err));
        }

        tracing::info!(user_id = %user.id, "password reset mailed");
        Ok(())
    }

    pub async fn complete_password_reset(&self, raw_token: &str, input: NewPassword) -> Result<Session, AuthError> {
        let now = Utc::now();
        let hash = hash_reset_token(raw_token);

        let mut user = self
            .users
            .find_by_reset_token(&hash)
            .await?
            .filter(|user| user.active && user.reset_token_valid(&hash, now))
            .ok_or(AuthError::ResetTokenInvalid)?;

        input.validate()?;
        let password = self.hasher.hash(&input.password).await?;
        user.set_password(password, now);

        let user = self.users.save(user).await?;
        tracing::info!(user_id = %user.id, "password reset completed");
        self.issue(user, now)
    }

    pub async fn change_password(&self, user_id: UserId, input: PasswordChange) -> Result<Session, AuthError> {
        let mut user = self
            .users
            .find_by_id(user_id)
            .await?
            .filter(|user| user.active)
            .ok_or(AuthError::AccountGone)?;

        if !self.hasher.verify(&input.password_current, &user.password).await? {
            return Err(AuthError::WrongCurrentPassword);
        }

        input.new.validate()?;
        let now = Utc::now();
        let password = self.hasher.hash(&input.new.password).await?;
        user.set_password(password, now);

        let user = self.users.save(user).await?;
        tracing::info!(user_id = %user.id, "password changed");
        self.issue(user, now)
    }

    pub async fn update_profile(&self, user_id: UserId, input: ProfileUpdate) -> Result<User, AuthError> {
        if input.touches_password() {
            return Err(AuthError::PasswordFieldsNotAllowed);
        }

        let mut user = self
            .users
            .find_by_id(user_id)
            .await?
            .filter(|user| user.active)
            .ok_or(AuthError::AccountGone)?;

        input.apply_to(&mut user)?;
        Ok(self.users.save(user).await?)
    }

    /// Soft delete: the record stays, but can no longer log in or verify.
    pub async fn deactivate(&self, user_id: UserId) -> Result<(), AuthError> {
        let mut user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::AccountGone)?;

        user.active = false;
        self.users.save(user).await?;
        tracing::info!(%user_id, "account deactivated");
        Ok(())
    }

    fn issue(&self, user: User, now: DateTime<Utc>) -> Result<Session, AuthError> {
        let (token, claims) = self.tokens.issue(user.id, now)?;
        Ok(Session { token, claims, user })
    }

    async fn dummy_hash(&self) -> Result<&String, AuthError> {
        let hash = self
            .dummy_hash
            .get_or_try_init(|| self.hasher.hash("natours-dummy-password"))
            .await?;
        Ok(hash)
    }
}

impl core::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionManager")
            .field("tokens", &self.tokens)
            .field("hasher", &self.hasher)
            .finish_non_exhaustive()
    }
}
