use tracing::warn;

use usergate_auth::{AllowedRoles, AuthzFailure, IdentityClaims, authorize};

/// Check the caller's role against the route's allowed set.
pub fn authorize_claims(claims: &IdentityClaims, allowed: &AllowedRoles) -> Result<(), AuthzFailure> {
    authorize(claims, allowed).inspect_err(|_| {
        warn!(
            sub = claims.sub(),
            role = %claims.role(),
            allowed = ?allowed.roles(),
            "Insufficient permissions"
        );
    })
}
