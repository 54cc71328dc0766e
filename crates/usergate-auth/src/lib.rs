//! # Usergate Auth
//!
//! Identity tokens and access checks for the usergate API.
//!
//! - [`claims`]: [`Role`], the verified [`IdentityClaims`] and the
//!   [`TokenSubject`] used to sign new tokens
//! - [`jwt`]: [`TokenCodec`], HS256 signing and verification
//! - [`authenticator`]: bearer-token extraction from request headers
//! - [`authorizer`]: role checks against a non-empty [`AllowedRoles`] set
//!
//! # Example
//!
//! ```ignore
//! use usergate_auth::{AllowedRoles, Role, TokenCodec, TokenSubject, authenticate, authorize};
//! use usergate_config::JwtConfig;
//!
//! let codec = TokenCodec::from_config(&JwtConfig::from_env());
//! let token = codec.sign(&TokenSubject::new("64f0c2", "admin@example.com", Role::Admin))?;
//!
//! let claims = authenticate(&headers, &codec)?;
//! authorize(&claims, &AllowedRoles::only(Role::Admin))?;
//! ```

pub mod authenticator;
pub mod authorizer;
pub mod claims;
pub mod jwt;

// Re-export commonly used types at crate root
pub use authenticator::{AuthFailure, authenticate, authenticate_at};
pub use authorizer::{AllowedRoles, AuthzFailure, EmptyRoleSet, authorize};
pub use claims::{IdentityClaims, Role, TokenSubject};
pub use jwt::{TokenCodec, TokenError};
