//! Gate stages and the pipeline that runs them.
//!
//! - [`rate_limit`]: client keying and token-bucket checks
//! - [`auth`]: bearer token authentication and the [`auth::Authenticated`] extractor
//! - [`role`]: role authorization
//! - [`upload`]: multipart body collection
//! - [`pipeline`]: per-route composition of the stages above
//!
//! # Example
//!
//! ```ignore
//! use crate::middleware::auth::Authenticated;
//!
//! // Route built with `Pipeline::builder(&state).authenticate()`
//! async fn get_profile(Authenticated(claims): Authenticated) -> impl IntoResponse {
//!     Json(claims)
//! }
//! ```

pub mod auth;
pub mod pipeline;
pub mod rate_limit;
pub mod role;
pub mod upload;
