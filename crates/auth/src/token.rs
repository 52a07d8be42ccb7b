//! HS256 session tokens.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use natours_core::UserId;

use crate::claims::{SessionClaims, TokenValidationError, validate_claims};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed or its signature does not verify")]
    Malformed,

    #[error(transparent)]
    Claims(#[from] TokenValidationError),

    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Signs and verifies session tokens with a server-held secret.
///
/// Tokens are stateless: expiry and the account's password-change time are
/// the only invalidation mechanisms.
#[derive(Clone)]
pub struct SessionTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl SessionTokens {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time checks run in `validate_claims` against an explicit clock.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, subject: UserId, now: DateTime<Utc>) -> Result<(String, SessionClaims), TokenError> {
        let claims = SessionClaims {
            sub: subject,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok((token, claims))
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, TokenError> {
        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "session token rejected");
                TokenError::Malformed
            })?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

impl core::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionTokens").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies() {
        let tokens = SessionTokens::new(b"test-secret", Duration::days(90));
        let now = Utc::now();
        let user = UserId::new();

        let (token, claims) = tokens.issue(user, now).unwrap();
        let verified = tokens.verify(&token, now).unwrap();

        assert_eq!(verified, claims);
        assert_eq!(verified.sub, user);
    }

    #[test]
    fn wrong_secret_is_malformed() {
        let issuer = SessionTokens::new(b"secret-a", Duration::hours(1));
        let verifier = SessionTokens::new(b"secret-b", Duration::hours(1));
        let now = Utc::now();

        let (token, _) = issuer.issue(UserId::new(), now).unwrap();
        assert_eq!(verifier.verify(&token, now), Err(TokenError::Malformed));
    }

    #[test]
    fn garbage_is_malformed() {
        let tokens = SessionTokens::new(b"secret", Duration::hours(1));
        assert_eq!(tokens.verify("not.a.jwt", Utc::now()), Err(TokenError::Malformed));
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let tokens = SessionTokens::new(b"secret", Duration::minutes(10));
        let now = Utc::now();
        let (token, _) = tokens.issue(UserId::new(), now).unwrap();

        assert_eq!(
            tokens.verify(&token, now + Duration::minutes(11)),
            Err(TokenError::Claims(TokenValidationError::Expired))
        );
    }
}
