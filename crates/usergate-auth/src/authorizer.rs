//! Role-based authorization.

use thiserror::Error;

use usergate_core::AppError;

use crate::claims::{IdentityClaims, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Allowed role set must not be empty")]
pub struct EmptyRoleSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthzFailure {
    #[error("Insufficient permissions")]
    Forbidden,
}

impl From<AuthzFailure> for AppError {
    fn from(failure: AuthzFailure) -> Self {
        AppError::forbidden(failure.to_string())
    }
}

/// Roles admitted by a route. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedRoles(Vec<Role>);

impl AllowedRoles {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Result<Self, EmptyRoleSet> {
        let mut unique = Vec::new();
        for role in roles {
            if !unique.contains(&role) {
                unique.push(role);
            }
        }
        if unique.is_empty() {
            return Err(EmptyRoleSet);
        }
        Ok(Self(unique))
    }

    pub fn only(role: Role) -> Self {
        Self(vec![role])
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn roles(&self) -> &[Role] {
        &self.0
    }
}

pub fn authorize(claims: &IdentityClaims, allowed: &AllowedRoles) -> Result<(), AuthzFailure> {
    if allowed.contains(claims.role()) {
        Ok(())
    } else {
        Err(AuthzFailure::Forbidden)
    }
}
