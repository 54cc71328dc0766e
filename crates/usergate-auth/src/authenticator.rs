//! Bearer-token authentication.

use axum::http::{HeaderMap, header::AUTHORIZATION};
use chrono::{DateTime, Utc};
use thiserror::Error;

use usergate_core::AppError;

use crate::claims::IdentityClaims;
use crate::jwt::{TokenCodec, TokenError};

/// Case-sensitive scheme prefix, including the separating space.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Why a request could not be authenticated.
///
/// The three token failures render the same client message; [`kind`] keeps
/// them apart in logs.
///
/// [`kind`]: AuthFailure::kind
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("Authorization header is required")]
    MissingHeader,

    #[error("Invalid authorization header")]
    BadScheme,

    #[error("Invalid or expired token")]
    Malformed,

    #[error("Invalid or expired token")]
    BadSignature,

    #[error("Invalid or expired token")]
    Expired,
}

impl AuthFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingHeader => "missing_header",
            Self::BadScheme => "bad_scheme",
            Self::Malformed => "malformed",
            Self::BadSignature => "bad_signature",
            Self::Expired => "expired",
        }
    }
}

impl From<TokenError> for AuthFailure {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Malformed(_) => Self::Malformed,
            TokenError::BadSignature => Self::BadSignature,
            TokenError::Expired => Self::Expired,
        }
    }
}

impl From<AuthFailure> for AppError {
    fn from(failure: AuthFailure) -> Self {
        AppError::unauthorized(failure.to_string())
    }
}

/// Verify the bearer token in `headers` against the current time.
pub fn authenticate(headers: &HeaderMap, codec: &TokenCodec) -> Result<IdentityClaims, AuthFailure> {
    authenticate_at(headers, codec, Utc::now())
}

pub fn authenticate_at(
    headers: &HeaderMap,
    codec: &TokenCodec,
    now: DateTime<Utc>,
) -> Result<IdentityClaims, AuthFailure> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthFailure::MissingHeader)?;

    // Non-visible-ASCII header values cannot carry a bearer token.
    let value = value.to_str().map_err(|_| AuthFailure::BadScheme)?;
    let token = value
        .strip_prefix(BEARER_PREFIX)
        .ok_or(AuthFailure::BadScheme)?;

    codec.verify_at(token, now).map_err(|err| {
        tracing::debug!(reason = %err, "Token verification failed");
        AuthFailure::from(err)
    })
}
