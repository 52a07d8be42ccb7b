//! User account record and the input shapes that change it.
//!
//! Validation and password bookkeeping are plain functions over an explicit
//! record; nothing runs implicitly on save.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use natours_core::{DomainError, DomainResult, Entity, UserId};

use crate::reset::ResetToken;
use crate::Role;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Persisted user account.
///
/// `password` holds the bcrypt hash, never the raw password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub role: Role,
    pub password: String,
    #[serde(default)]
    pub password_changed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub password_reset_token: Option<String>,
    #[serde(default)]
    pub password_reset_expires: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> UserId {
        self.id
    }
}

impl User {
    /// Was the password changed after a token issued at `iat` (seconds)?
    pub fn changed_password_after(&self, iat: i64) -> bool {
        self.password_changed_at
            .map(|changed| changed.timestamp() > iat)
            .unwrap_or(false)
    }

    /// Replace the password hash and clear any pending reset.
    ///
    /// A token issued with the same `now` still verifies: the comparison in
    /// [`User::changed_password_after`] is strict, at whole-second precision.
    pub fn set_password(&mut self, hash: String, now: DateTime<Utc>) {
        self.password = hash;
        self.password_changed_at = Some(now);
        self.clear_password_reset();
    }

    /// Start a reset: store the digest and expiry, return the raw token.
    pub fn begin_password_reset(&mut self, now: DateTime<Utc>) -> String {
        let token = ResetToken::generate(now);
        self.password_reset_token = Some(token.hash);
        self.password_reset_expires = Some(token.expires_at);
        token.raw
    }

    pub fn clear_password_reset(&mut self) {
        self.password_reset_token = None;
        self.password_reset_expires = None;
    }

    /// Does `token_hash` match the pending reset, and is it still unexpired?
    pub fn reset_token_valid(&self, token_hash: &str, now: DateTime<Utc>) -> bool {
        match (&self.password_reset_token, self.password_reset_expires) {
            (Some(stored), Some(expires)) => stored == token_hash && expires > now,
            _ => false,
        }
    }
}

/// Client-facing view of an account (no credentials, no reset state).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub photo: Option<String>,
    pub role: Role,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            photo: user.photo.clone(),
            role: user.role,
        }
    }
}

/// Sign-up payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub photo: Option<String>,
}

impl Registration {
    /// Validate and normalize; returns the lowercased email.
    pub fn validate(&self) -> DomainResult<String> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push("Please tell us your name!".to_string());
        }
        let email = normalize_email(&self.email);
        if email.is_empty() {
            errors.push("Please provide your email!".to_string());
        } else if !is_valid_email(&email) {
            errors.push("Please provide a valid email!".to_string());
        }
        password_errors(&self.password, &self.password_confirm, &mut errors);

        if errors.is_empty() {
            Ok(email)
        } else {
            Err(DomainError::Validation(errors))
        }
    }
}

/// New password plus its confirmation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewPassword {
    pub password: String,
    pub password_confirm: String,
}

impl NewPassword {
    pub fn validate(&self) -> DomainResult<()> {
        let mut errors = Vec::new();
        password_errors(&self.password, &self.password_confirm, &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Validation(errors))
        }
    }
}

/// Authenticated password change.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PasswordChange {
    pub password_current: String,
    #[serde(flatten)]
    pub new: NewPassword,
}

/// Self-service profile update. Only name, email and photo are applied.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub photo: Option<String>,
    pub password: Option<Value>,
    pub password_confirm: Option<Value>,
}

impl ProfileUpdate {
    pub fn touches_password(&self) -> bool {
        self.password.is_some() || self.password_confirm.is_some()
    }

    /// Apply the allowed fields to `user`, validating each one.
    pub fn apply_to(&self, user: &mut User) -> DomainResult<()> {
        let mut errors = Vec::new();
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                errors.push("Please tell us your name!".to_string());
            } else {
                user.name = name.trim().to_string();
            }
        }
        if let Some(email) = &self.email {
            let email = normalize_email(email);
            if is_valid_email(&email) {
                user.email = email;
            } else {
                errors.push("Please provide a valid email!".to_string());
            }
        }
        if let Some(photo) = &self.photo {
            user.photo = Some(photo.clone());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Validation(errors))
        }
    }
}

/// Administrative account update: profile fields plus role and activation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdminUserUpdate {
    #[serde(flatten)]
    pub profile: ProfileUpdate,
    pub role: Option<Role>,
    pub active: Option<bool>,
}

impl AdminUserUpdate {
    pub fn touches_password(&self) -> bool {
        self.profile.touches_password()
    }

    pub fn apply_to(&self, user: &mut User) -> DomainResult<()> {
        self.profile.apply_to(user)?;
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(active) = self.active {
            user.active = active;
        }
        Ok(())
    }
}

fn password_errors(password: &str, confirm: &str, errors: &mut Vec<String>) {
    if password.is_empty() {
        errors.push("Please provide a password!".to_string());
        return;
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(format!(
            "Password must have at least {MIN_PASSWORD_LEN} characters."
        ));
    }
    if confirm.is_empty() {
        errors.push("Please confirm your password!".to_string());
    } else if confirm != password {
        errors.push("Password confirmation is not the same as password!".to_string());
    }
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Structural check: one `@`, non-empty local part, dotted domain, no spaces.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user() -> User {
        User {
            id: UserId::new(),
            name: "Jonas".to_string(),
            email: "jonas@example.com".to_string(),
            photo: None,
            role: Role::User,
            password: "hash".to_string(),
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            active: true,
            created_at: Utc::now(),
        }
    }

    fn registration(password: &str, confirm: &str) -> Registration {
        Registration {
            name: "Jonas".to_string(),
            email: " Jonas@Example.com ".to_string(),
            password: password.to_string(),
            password_confirm: confirm.to_string(),
            photo: None,
        }
    }

    #[test]
    fn registration_normalizes_email() {
        let email = registration("pass1234", "pass1234").validate().unwrap();
        assert_eq!(email, "jonas@example.com");
    }

    #[test]
    fn mismatched_confirmation_is_rejected() {
        let err = registration("pass1234", "pass4321").validate().unwrap_err();
        assert_eq!(
            err,
            DomainError::Validation(vec![
                "Password confirmation is not the same as password!".to_string()
            ])
        );
    }

    #[test]
    fn missing_fields_are_all_reported() {
        let err = Registration::default().validate().unwrap_err();
        match err {
            DomainError::Validation(msgs) => {
                assert!(msgs.contains(&"Please tell us your name!".to_string()));
                assert!(msgs.contains(&"Please provide your email!".to_string()));
                assert!(msgs.contains(&"Please provide a password!".to_string()));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("a@b.io"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@b.io"));
        assert!(!is_valid_email("a b@c.io"));
        assert!(!is_valid_email("a@@c.io"));
        assert!(!is_valid_email("a@c..io"));
    }

    #[test]
    fn password_change_after_token_issue_is_detected() {
        let mut u = user();
        let issued = Utc::now() - Duration::hours(1);
        assert!(!u.changed_password_after(issued.timestamp()));

        u.set_password("new-hash".to_string(), Utc::now());
        assert!(u.changed_password_after(issued.timestamp()));
    }

    #[test]
    fn token_issued_a_second_before_the_change_is_stale() {
        let mut u = user();
        let now = Utc::now();
        u.set_password("new-hash".to_string(), now);
        assert_eq!(u.password_changed_at, Some(now));
        assert!(u.changed_password_after((now - Duration::seconds(1)).timestamp()));
    }

    #[test]
    fn token_issued_with_the_change_still_counts_as_newer() {
        let mut u = user();
        let now = Utc::now();
        u.set_password("new-hash".to_string(), now);
        assert!(!u.changed_password_after(now.timestamp()));
    }

    #[test]
    fn reset_token_lifecycle() {
        let mut u = user();
        let now = Utc::now();
        let raw = u.begin_password_reset(now);
        let hash = crate::hash_reset_token(&raw);

        assert!(u.reset_token_valid(&hash, now));
        assert!(!u.reset_token_valid(&hash, now + Duration::minutes(11)));
        assert!(!u.reset_token_valid("other", now));

        u.set_password("new-hash".to_string(), now);
        assert!(u.password_reset_token.is_none());
        assert!(u.password_reset_expires.is_none());
    }

    #[test]
    fn profile_update_flags_password_fields() {
        let update: ProfileUpdate =
            serde_json::from_str(r#"{"name":"X","password":"secret123"}"#).unwrap();
        assert!(update.touches_password());
    }

    #[test]
    fn profile_update_ignores_role() {
        let update: ProfileUpdate =
            serde_json::from_str(r#"{"name":"New Name","role":"admin"}"#).unwrap();
        let mut u = user();
        update.apply_to(&mut u).unwrap();
        assert_eq!(u.name, "New Name");
        assert_eq!(u.role, Role::User);
    }

    #[test]
    fn admin_update_sets_role_and_activation() {
        let update: AdminUserUpdate =
            serde_json::from_str(r#"{"role":"lead-guide","active":false,"photo":"p.jpg"}"#).unwrap();
        let mut u = user();
        update.apply_to(&mut u).unwrap();
        assert_eq!(u.role, Role::LeadGuide);
        assert!(!u.active);
        assert_eq!(u.photo.as_deref(), Some("p.jpg"));
        assert!(!update.touches_password());
    }
}
