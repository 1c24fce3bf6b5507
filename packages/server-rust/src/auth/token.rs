//! Identity token signing and validation.
//!
//! Tokens are opaque to clients: a signed JWT whose `identityKey` claim
//! carries the subject's public user id. The signing internals stay behind
//! [`TokenService`] so the dispatch pipeline never depends on the JWT
//! library directly.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use quill_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Signs and parses bearer identity tokens.
pub trait TokenService: Send + Sync {
    /// Signs a token for the subject, returning `(token, expires_at)` with
    /// the expiry in unix epoch milliseconds.
    fn sign(&self, user_id: &str) -> Result<(String, i64)>;

    /// Validates a token and returns its subject id.
    ///
    /// # Errors
    ///
    /// `TokenInvalid` when the signature is wrong or the token expired.
    fn parse(&self, token: &str) -> Result<String>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// Subject's public user id.
    #[serde(rename = "identityKey")]
    identity_key: String,
    iat: u64,
    exp: u64,
}

/// HS256 JWT implementation of [`TokenService`].
pub struct JwtTokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiration: Duration,
    validation: Validation,
}

impl JwtTokenService {
    /// Creates a service signing with the given symmetric key.
    #[must_use]
    pub fn new(key: &str, expiration: Duration) -> Self {
        let mut validation = Validation::default();
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(key.as_bytes()),
            decoding: DecodingKey::from_secret(key.as_bytes()),
            expiration,
            validation,
        }
    }

    fn now_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default()
    }
}

impl TokenService for JwtTokenService {
    fn sign(&self, user_id: &str) -> Result<(String, i64)> {
        let iat = Self::now_secs();
        let exp = iat + self.expiration.as_secs();
        let claims = Claims {
            identity_key: user_id.to_string(),
            iat,
            exp,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|err| Error::internal(format!("failed to sign token: {err}")))?;
        let expires_at = i64::try_from(exp).unwrap_or(i64::MAX).saturating_mul(1000);
        Ok((token, expires_at))
    }

    fn parse(&self, token: &str) -> Result<String> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims.identity_key)
            .map_err(|err| Error::token_invalid(err.to_string()))
    }
}
