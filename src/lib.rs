//! # Usergate
//!
//! Request gatekeeper for a user-management API, built with Rust and Axum.
//!
//! Every gated route runs a fixed chain of stages before its handler and
//! stops at the first rejection:
//!
//! ```text
//! rate limit -> authenticate -> authorize -> upload -> handler
//! ```
//!
//! Stages are chosen per route at startup (see [`middleware::pipeline`]).
//! Rejections share one JSON envelope:
//!
//! ```json
//! { "success": false, "message": "Insufficient permissions", "error": "Forbidden" }
//! ```
//!
//! | Stage        | Status | Tag(s)                                                    |
//! |--------------|-------:|-----------------------------------------------------------|
//! | rate limit   |    429 | `LimitExceeded`                                           |
//! | authenticate |    401 | `Unauthorized`                                            |
//! | authorize    |    403 | `Forbidden`                                               |
//! | upload       |    400 | `FileRequired`, `TooManyFiles`, `FileTooLarge`, ...       |
//! | upload       |    500 | `StorageFailure`, `InternalFailure`                       |
//!
//! ## Architecture
//!
//! ```text
//! src/
//! ├── middleware/       # Gate stages and the pipeline composer
//! ├── modules/          # Route handlers
//! │   ├── health/      # Liveness probe
//! │   ├── users/       # Caller identity (profile, admin)
//! │   └── files/       # Upload routes
//! ├── router.rs         # Router with CORS, timeout, logging and metrics layers
//! └── state.rs          # Token codec, limiter registries and configuration
//! ```
//!
//! The gate machinery itself lives in the workspace crates, re-exported here:
//!
//! - [`usergate_core`]: errors, token buckets, content sniffing, upload validation and storage
//! - [`usergate_config`]: environment-backed configuration
//! - [`usergate_auth`]: token codec, authenticator and role authorizer
//! - [`usergate_observability`]: logging and Prometheus metrics
//!
//! ## Quick Start
//!
//! ```bash
//! JWT_SECRET=your-secure-secret-key
//! UPLOAD_ROOT=./uploads
//! PORT=8080
//! ```
//!
//! Tokens are issued by the identity service; for local testing sign one
//! with the configured secret:
//!
//! ```bash
//! cargo run -- issue-token --sub 64f0c2 --email admin@example.com --role admin
//! ```

pub mod middleware;
pub mod modules;
pub mod router;
pub mod state;

// Re-export workspace crates for convenience
pub use usergate_auth;
pub use usergate_config;
pub use usergate_core;
pub use usergate_observability;
