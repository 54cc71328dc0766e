use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use tracing::{debug, warn};

use usergate_auth::{AuthFailure, IdentityClaims, TokenCodec, authenticate};
use usergate_core::AppError;

use crate::middleware::pipeline::GateContext;

/// Verify the request's bearer token. The failure kind is logged here; the
/// client only sees the shared 401 message.
pub fn authenticate_request(
    headers: &HeaderMap,
    codec: &TokenCodec,
    client: &str,
) -> Result<IdentityClaims, AuthFailure> {
    match authenticate(headers, codec) {
        Ok(claims) => {
            debug!(client, sub = claims.sub(), role = %claims.role(), "Authenticated");
            Ok(claims)
        }
        Err(failure) => {
            warn!(client, reason = failure.kind(), "Authentication failed");
            Err(failure)
        }
    }
}

/// Claims of a request that passed an authenticating pipeline.
#[derive(Debug, Clone)]
pub struct Authenticated(pub IdentityClaims);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let context = GateContext::from_request_parts(parts, state).await?;

        context.claims.map(Authenticated).ok_or_else(|| {
            AppError::internal_error("Route does not authenticate requests")
        })
    }
}
