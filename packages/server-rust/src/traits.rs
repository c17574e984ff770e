//! Contracts for the external collaborators the pipeline consumes.
//!
//! Resource business logic, persistence and credential formats live behind
//! these traits; the pipeline only orders and guards the calls.

use async_trait::async_trait;
use gatehouse_core::{Payload, RequestContext, ResourceKind, TenantIdentity};

use crate::auth::AuthError;
use crate::service::operation::{ApiRequest, HandlerError};

/// Validates request credentials and resolves the tenant they belong to.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolve the tenant for this request from whatever credential it carries.
    async fn authenticate(&self, ctx: &RequestContext) -> Result<TenantIdentity, AuthError>;
}

/// Terminal handler for one route operation.
///
/// Handlers mounted on cacheable (GET) routes must be free of side effects
/// and deterministic within the cache TTL window.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    async fn handle(&self, request: ApiRequest) -> Result<Payload, HandlerError>;
}

/// Counts the live population of one resource kind in a namespace.
#[async_trait]
pub trait QuotaCollector: Send + Sync {
    async fn count(&self, namespace: &str) -> anyhow::Result<u64>;
}

/// Source of per-namespace resource limits. `None` means unlimited.
#[async_trait]
pub trait QuotaLimits: Send + Sync {
    async fn limit(&self, namespace: &str, kind: ResourceKind) -> anyhow::Result<Option<u64>>;
}

/// What a validation stage is checking a request for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidateAction {
    Create,
    Delete,
}

impl ValidateAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Delete => "delete",
        }
    }
}

/// Rejection from a [`ResourceValidator`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

/// Pre-handler checks for resource creation and deletion.
#[async_trait]
pub trait ResourceValidator: Send + Sync {
    async fn validate(
        &self,
        action: ValidateAction,
        kind: ResourceKind,
        request: &ApiRequest,
    ) -> Result<(), ValidationError>;
}

/// Deployment-specific check run on every authenticated request after auth.
#[async_trait]
pub trait RequestFilter: Send + Sync {
    async fn filter(&self, ctx: &RequestContext) -> Result<(), HandlerError>;
}
