//! Password-reset tokens.
//!
//! The raw token only ever leaves the server inside the reset mail; the user
//! record keeps its SHA-256 digest and an expiry.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

pub const RESET_TOKEN_TTL_MINUTES: i64 = 10;

const RESET_TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetToken {
    /// Hex-encoded random value handed to the user.
    pub raw: String,
    /// Hex-encoded SHA-256 digest of `raw`; the only form that is stored.
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

impl ResetToken {
    pub fn generate(now: DateTime<Utc>) -> Self {
        let mut bytes = [0u8; RESET_TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let raw = hex::encode(bytes);
        let hash = hash_reset_token(&raw);

        Self {
            raw,
            hash,
            expires_at: now + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
        }
    }
}

pub fn hash_reset_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_token_hashes_to_stored_digest() {
        let now = Utc::now();
        let token = ResetToken::generate(now);

        assert_eq!(token.raw.len(), RESET_TOKEN_BYTES * 2);
        assert_eq!(token.hash, hash_reset_token(&token.raw));
        assert_ne!(token.hash, token.raw);
        assert_eq!(token.expires_at - now, Duration::minutes(10));
    }

    #[test]
    fn tokens_are_unique() {
        let now = Utc::now();
        assert_ne!(ResetToken::generate(now).raw, ResetToken::generate(now).raw);
    }

    #[test]
    fn digest_is_sha256_hex() {
        assert_eq!(
            hash_reset_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
