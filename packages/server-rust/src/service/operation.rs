//! Request, response and error types flowing through the route pipeline.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use gatehouse_core::{ErrorCode, RequestContext};

use crate::auth::AuthError;
use crate::quota::QuotaError;
use crate::traits::ValidationError;

/// Boxed future returned by every pipeline stage.
pub type PipelineFuture =
    Pin<Box<dyn Future<Output = Result<ApiResponse, PipelineError>> + Send>>;

/// A request as seen by the pipeline: context plus the raw body.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub ctx: RequestContext,
    pub body: Bytes,
}

impl ApiRequest {
    #[must_use]
    pub fn new(ctx: RequestContext, body: Bytes) -> Self {
        Self { ctx, body }
    }

    /// Reads the top-level `name` field of a JSON body, if there is one.
    #[must_use]
    pub fn body_name(&self) -> Option<String> {
        if self.body.is_empty() {
            return None;
        }
        let value: serde_json::Value = serde_json::from_slice(&self.body).ok()?;
        value.get("name")?.as_str().map(str::to_string)
    }
}

/// A serialized successful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: String,
    /// Lowercase header names, excluding `content-type`.
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl ApiResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Opaque business error returned by a terminal handler or request filter.
///
/// Reported to the client unchanged: the pipeline never rewrites the code
/// or the message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    pub code: ErrorCode,
    pub message: String,
}

impl HandlerError {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }
}

/// Errors that end a request inside the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("request access denied: {0}")]
    AccessDenied(#[from] AuthError),
    #[error("request has no authenticated tenant")]
    MissingIdentity,
    #[error("{0}")]
    Quota(#[from] QuotaError),
    #[error("resource {name} is locked by another request")]
    LockConflict { name: String },
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Handler(#[from] HandlerError),
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl PipelineError {
    /// Stable error code reported in the failure envelope.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AccessDenied(_) | Self::MissingIdentity => ErrorCode::AccessDenied,
            Self::Quota(_) => ErrorCode::QuotaExceeded,
            Self::LockConflict { .. } => ErrorCode::LockConflict,
            Self::Validation(_) => ErrorCode::ValidationFailed,
            Self::Handler(err) => err.code,
            Self::Timeout { .. } | Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Client-facing message. Internal details stay in the logs.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Handler(err) => err.message.clone(),
            Self::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// Name of the gate that rejected the request, if a gate did.
    #[must_use]
    pub fn gate(&self) -> Option<&'static str> {
        match self {
            Self::AccessDenied(_) | Self::MissingIdentity => Some("auth"),
            Self::Quota(_) => Some("quota"),
            Self::LockConflict { .. } => Some("lock"),
            Self::Validation(_) => Some("validate"),
            Self::Handler(_) | Self::Timeout { .. } | Self::Internal(_) => None,
        }
    }
}
