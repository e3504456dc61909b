use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SECRET_ENV: &str = "SECRET_KEY";
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token secret is empty")]
    EmptySecret,

    #[error("environment variable {name} is not set")]
    MissingSecret { name: String },

    #[error("system clock is before the unix epoch")]
    Clock,

    #[error("failed to sign token: {source}")]
    Sign {
        #[source]
        source: jsonwebtoken::errors::Error,
    },
}

/// Produces the credential sent as `x-secure-token`. The pipeline treats the
/// value as opaque.
pub trait TokenProvider {
    fn token(&self) -> Result<String, TokenError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub iat: u64,
    pub exp: u64,
}

#[derive(Clone)]
pub struct JwtTokenProvider {
    secret: String,
    ttl_secs: u64,
}

impl std::fmt::Debug for JwtTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtTokenProvider")
            .field("secret", &"<redacted>")
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

impl JwtTokenProvider {
    pub fn new(secret: impl Into<String>, ttl_secs: u64) -> Result<Self, TokenError> {
        let secret = secret.into();
        if secret.trim().is_empty() {
            return Err(TokenError::EmptySecret);
        }
        Ok(Self { secret, ttl_secs })
    }

    pub fn from_env(var: &str, ttl_secs: u64) -> Result<Self, TokenError> {
        let secret = std::env::var(var).map_err(|_| TokenError::MissingSecret {
            name: var.to_string(),
        })?;
        Self::new(secret, ttl_secs)
    }

    fn claims(&self) -> Result<Claims, TokenError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| TokenError::Clock)?
            .as_secs();
        Ok(Claims {
            iat: now,
            exp: now + self.ttl_secs,
        })
    }
}

impl TokenProvider for JwtTokenProvider {
    fn token(&self) -> Result<String, TokenError> {
        let claims = self.claims()?;
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|source| TokenError::Sign { source })
    }
}

/// Passes a pre-issued token through unchanged.
#[derive(Clone, Debug)]
pub struct StaticToken(pub String);

impl TokenProvider for StaticToken {
    fn token(&self) -> Result<String, TokenError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};

    #[test]
    fn jwt_round_trips_with_same_secret() {
        let provider = JwtTokenProvider::new("test_secret_key", 60).unwrap();
        let token = provider.token().unwrap();
        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"test_secret_key"),
            &Validation::default(),
        )
        .unwrap();
        assert_eq!(data.claims.exp - data.claims.iat, 60);
    }

    #[test]
    fn wrong_secret_fails_validation() {
        let token = JwtTokenProvider::new("secret1", 60).unwrap().token().unwrap();
        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret2"),
            &Validation::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(
            JwtTokenProvider::new("  ", 60),
            Err(TokenError::EmptySecret)
        ));
    }
}
