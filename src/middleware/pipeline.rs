//! Per-route gate pipelines.
//!
//! A [`Pipeline`] runs a fixed sequence of stages in front of a route and
//! stops at the first rejection:
//!
//! ```text
//! rate_limit -> authenticate -> authorize -> upload -> handler
//! ```
//!
//! Stages are opt-in per route; their order is not. The pipeline is built
//! once at startup with [`PipelineBuilder`], which rejects inconsistent
//! configurations (authorization without authentication, empty role sets,
//! invalid upload constraints) before the server starts.
//!
//! Accepted requests carry a [`GateContext`] extension, read by handlers
//! through the [`GateContext`], [`Authenticated`] and [`UploadedFiles`]
//! extractors.
//!
//! # Example
//!
//! ```ignore
//! let admin_only = Pipeline::builder(&state)
//!     .rate_limit(RateClass::Moderate)
//!     .authenticate()
//!     .authorize([Role::Admin])
//!     .build()?;
//!
//! let router = admin_only.apply(Router::new().route("/admin", get(handler)));
//! ```
//!
//! [`Authenticated`]: crate::middleware::auth::Authenticated

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    extract::{ConnectInfo, DefaultBodyLimit, FromRequestParts, Request, State},
    http::request::Parts,
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::warn;

use usergate_auth::{AllowedRoles, EmptyRoleSet, IdentityClaims, Role, TokenCodec};
use usergate_config::RateClass;
use usergate_core::{
    AppError, RateLimiterRegistry, StoredFileRecord, UploadConstraintSet, UploadValidator,
    upload::InvalidConstraints,
};
use usergate_observability::{track_gate_rejection, track_upload_stored};

use crate::middleware::{auth, rate_limit, role, upload};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RateLimit,
    Authenticate,
    Authorize,
    Upload,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::Authenticate => "authenticate",
            Self::Authorize => "authorize",
            Self::Upload => "upload",
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("authorization requires the authenticate stage")]
    AuthorizeWithoutAuthenticate,

    #[error(transparent)]
    EmptyRoles(#[from] EmptyRoleSet),

    #[error("invalid rate class {0}")]
    InvalidRateClass(RateClass),

    #[error(transparent)]
    InvalidUpload(#[from] InvalidConstraints),
}

/// What the gate established about an accepted request.
#[derive(Debug, Clone)]
pub struct GateContext {
    /// Rate-limit key of the client.
    pub client: String,
    /// Present when the route authenticates.
    pub claims: Option<IdentityClaims>,
    /// Files stored by the upload stage, empty otherwise.
    pub files: Vec<StoredFileRecord>,
}

impl<S> FromRequestParts<S> for GateContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<GateContext>()
            .cloned()
            .ok_or_else(|| AppError::internal_error("Route is not behind a gate pipeline"))
    }
}

/// Records of the files stored for this request.
#[derive(Debug, Clone)]
pub struct UploadedFiles(pub Vec<StoredFileRecord>);

impl<S> FromRequestParts<S> for UploadedFiles
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let context = GateContext::from_request_parts(parts, state).await?;
        Ok(UploadedFiles(context.files))
    }
}

pub struct PipelineBuilder<'a> {
    state: &'a AppState,
    rate_class: Option<RateClass>,
    authenticate: bool,
    roles: Option<Vec<Role>>,
    upload: Option<UploadConstraintSet>,
}

impl<'a> PipelineBuilder<'a> {
    pub fn rate_limit(mut self, class: RateClass) -> Self {
        self.rate_class = Some(class);
        self
    }

    pub fn authenticate(mut self) -> Self {
        self.authenticate = true;
        self
    }

    pub fn authorize(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles = Some(roles.into_iter().collect());
        self
    }

    pub fn upload(mut self, constraints: UploadConstraintSet) -> Self {
        self.upload = Some(constraints);
        self
    }

    pub fn build(self) -> Result<Pipeline, PipelineError> {
        let limiter = match self.rate_class {
            Some(class) if !class.is_valid() => return Err(PipelineError::InvalidRateClass(class)),
            Some(class) => Some(self.state.limiters.registry(class)),
            None => None,
        };

        let roles = match self.roles {
            Some(_) if !self.authenticate => return Err(PipelineError::AuthorizeWithoutAuthenticate),
            Some(roles) => Some(AllowedRoles::new(roles)?),
            None => None,
        };

        let upload = match self.upload {
            Some(constraints) => {
                constraints.ensure_valid()?;
                Some(
                    UploadValidator::new(constraints)
                        .with_timeout(self.state.upload_config.io_timeout),
                )
            }
            None => None,
        };

        Ok(Pipeline {
            limiter,
            codec: self
                .authenticate
                .then(|| Arc::clone(&self.state.codec)),
            roles,
            upload,
            trust_forwarded: self.state.rate_limit_config.trust_forwarded_headers,
        })
    }
}

pub struct Pipeline {
    limiter: Option<Arc<RateLimiterRegistry>>,
    codec: Option<Arc<TokenCodec>>,
    roles: Option<AllowedRoles>,
    upload: Option<UploadValidator>,
    trust_forwarded: bool,
}

/// A rejection with the stage that produced it.
struct Rejection {
    stage: Stage,
    error: AppError,
}

impl Rejection {
    fn new(stage: Stage, error: impl Into<AppError>) -> Self {
        Self {
            stage,
            error: error.into(),
        }
    }
}

impl Pipeline {
    pub fn builder(state: &AppState) -> PipelineBuilder<'_> {
        PipelineBuilder {
            state,
            rate_class: None,
            authenticate: false,
            roles: None,
            upload: None,
        }
    }

    /// Install the pipeline in front of every route of `router`.
    pub fn apply<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let body_limit = self
            .upload
            .as_ref()
            .map(|validator| upload::body_limit(validator.constraints()));

        let router = router.route_layer(middleware::from_fn_with_state(
            Arc::new(self),
            run_pipeline,
        ));

        // Outside the pipeline so the limit is visible to the upload stage.
        match body_limit {
            Some(limit) => router.route_layer(DefaultBodyLimit::max(limit)),
            None => router,
        }
    }

    async fn admit(&self, mut req: Request) -> Result<Request, Rejection> {
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let client = rate_limit::client_key(req.headers(), peer, self.trust_forwarded);

        if let Some(limiter) = &self.limiter {
            rate_limit::check_rate(limiter, &client)
                .map_err(|e| Rejection::new(Stage::RateLimit, e))?;
        }

        let claims = match &self.codec {
            Some(codec) => Some(
                auth::authenticate_request(req.headers(), codec, &client)
                    .map_err(|e| Rejection::new(Stage::Authenticate, e))?,
            ),
            None => None,
        };

        if let (Some(allowed), Some(claims)) = (&self.roles, &claims) {
            role::authorize_claims(claims, allowed)
                .map_err(|e| Rejection::new(Stage::Authorize, e))?;
        }

        let mut files = Vec::new();
        if let Some(validator) = &self.upload {
            let (rebuilt, form) = upload::collect_multipart(req, validator.constraints())
                .await
                .map_err(|e| Rejection::new(Stage::Upload, e))?;
            req = rebuilt;

            files = validator
                .process(&form)
                .await
                .map_err(|e| Rejection::new(Stage::Upload, e))?;
            track_upload_stored(files.len(), files.iter().map(|f| f.size).sum());
        }

        req.extensions_mut().insert(GateContext {
            client,
            claims,
            files,
        });
        Ok(req)
    }
}

async fn run_pipeline(State(pipeline): State<Arc<Pipeline>>, req: Request, next: Next) -> Response {
    match pipeline.admit(req).await {
        Ok(req) => next.run(req).await,
        Err(Rejection { stage, error }) => {
            warn!(
                stage = stage.as_str(),
                tag = error.tag,
                status = error.status.as_u16(),
                reason = %error.message(),
                "Request rejected"
            );
            track_gate_rejection(stage.as_str(), error.tag);
            error.into_response()
        }
    }
}
