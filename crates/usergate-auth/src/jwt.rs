//! HS256 token signing and verification.
//!
//! Verification order:
//!
//! 1. header, segments and algorithm (anything but HS256 is `Malformed`)
//! 2. HMAC signature, compared in constant time (`BadSignature`)
//! 3. payload shape: required claims, known role (`Malformed`)
//! 4. expiry: a token is expired once `now >= exp` (`Expired`)
//!
//! Expiry is checked against an explicit instant rather than by the JWT
//! library, so [`TokenCodec::verify_at`] is deterministic and has no leeway.
//!
//! # Example
//!
//! ```ignore
//! use usergate_auth::{Role, TokenCodec, TokenSubject};
//!
//! let codec = TokenCodec::new(b"secret", Duration::from_secs(3600));
//! let token = codec.sign(&TokenSubject::new("64f0c2", "a@example.com", Role::User))?;
//! let claims = codec.verify(&token)?;
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use thiserror::Error;

use usergate_config::JwtConfig;
use usergate_core::AppError;

use crate::claims::{IdentityClaims, TokenPayload, TokenSubject};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token signature does not match")]
    BadSignature,

    #[error("token has expired")]
    Expired,
}

impl TokenError {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::BadSignature => "bad_signature",
            Self::Expired => "expired",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => Self::BadSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Malformed(err.to_string()),
        }
    }
}

pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims = ["exp", "sub"].into_iter().map(String::from).collect();

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    pub fn from_config(config: &JwtConfig) -> Self {
        Self::new(config.secret.as_bytes(), config.access_token_expiry)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a token for `subject` valid for the configured lifetime.
    pub fn sign(&self, subject: &TokenSubject) -> Result<String, AppError> {
        self.sign_with_ttl(subject, self.ttl)
    }

    pub fn sign_with_ttl(&self, subject: &TokenSubject, ttl: Duration) -> Result<String, AppError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| AppError::internal_error(format!("Invalid token lifetime: {}", e)))?;
        let now = Utc::now();
        self.sign_at(subject, now, now + ttl)
    }

    /// Sign with explicit timestamps. `expires_at` may lie in the past.
    pub fn sign_at(
        &self,
        subject: &TokenSubject,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let payload = TokenPayload {
            sub: subject.sub.clone(),
            email: subject.email.clone(),
            role: subject.role,
            exp: expires_at.timestamp(),
            iat: issued_at.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &payload, &self.encoding)
            .map_err(|e| AppError::internal_error(format!("Failed to create token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<IdentityClaims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<IdentityClaims, TokenError> {
        let payload = decode::<TokenPayload>(token, &self.decoding, &self.validation)?.claims;

        let expires_at = DateTime::from_timestamp(payload.exp, 0)
            .ok_or_else(|| TokenError::Malformed("exp out of range".to_string()))?;
        let issued_at = DateTime::from_timestamp(payload.iat, 0)
            .ok_or_else(|| TokenError::Malformed("iat out of range".to_string()))?;

        if now >= expires_at {
            return Err(TokenError::Expired);
        }

        Ok(IdentityClaims::from_verified(payload, expires_at, issued_at))
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &Algorithm::HS256)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
