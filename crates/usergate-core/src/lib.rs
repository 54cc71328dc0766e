//! # Usergate Core
//!
//! Core types and gate machinery for the usergate API:
//!
//! - [`errors`]: `AppError` with its JSON rejection envelope, `ApiResponse`
//! - [`validation`]: formatting of `validator` errors with user-facing field names
//! - [`rate_limiter`]: per-client token buckets with background eviction
//! - [`sniff`]: content-type detection from file bytes
//! - [`file_storage`]: all-or-nothing staged writes to local disk
//! - [`upload`]: upload constraints, validation and persistence
//!
//! # Example
//!
//! ```ignore
//! use usergate_core::rate_limiter::{BucketPolicy, RateLimiterRegistry};
//!
//! let limiter = RateLimiterRegistry::new("moderate", BucketPolicy::new(10.0, 20));
//! if !limiter.allow("203.0.113.7") {
//!     return Err(AppError::too_many_requests("Rate limit exceeded"));
//! }
//! ```

pub mod errors;
pub mod file_storage;
pub mod rate_limiter;
pub mod sniff;
pub mod upload;
pub mod validation;

// Re-export commonly used types at crate root
pub use errors::{ApiResponse, AppError};
pub use rate_limiter::{BucketPolicy, RateLimiterRegistry, SweepReport, SweeperHandle};
pub use upload::{
    IncomingFile, MultipartForm, StoredFileRecord, UploadConstraintSet, UploadFailure,
    UploadValidator,
};
