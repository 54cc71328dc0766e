//! Identity claim structures.
//!
//! - [`TokenSubject`]: who a new token is issued for
//! - [`TokenPayload`]: the JSON payload carried inside a signed token
//! - [`IdentityClaims`]: the verified identity handed to handlers
//!
//! `IdentityClaims` can only be built from a payload whose signature, shape
//! and expiry have been checked by [`crate::jwt::TokenCodec`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Identity a token is issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub sub: String,
    pub email: String,
    pub role: Role,
}

impl TokenSubject {
    pub fn new(sub: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            sub: sub.into(),
            email: email.into(),
            role,
        }
    }
}

/// Claims as serialized in the token. Timestamps are Unix seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TokenPayload {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

/// A verified identity. Lives for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityClaims {
    sub: String,
    email: String,
    role: Role,
    expires_at: DateTime<Utc>,
    issued_at: DateTime<Utc>,
}

impl IdentityClaims {
    /// Only called once the payload has passed verification.
    pub(crate) fn from_verified(
        payload: TokenPayload,
        expires_at: DateTime<Utc>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            sub: payload.sub,
            email: payload.email,
            role: payload.role,
            expires_at,
            issued_at,
        }
    }

    /// Subject identifier (user id).
    pub fn sub(&self) -> &str {
        &self.sub
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }
}
