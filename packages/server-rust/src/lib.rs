//! Gatehouse server: the request pipeline of a multi-tenant admin API.
//!
//! Every route is a Tower service composed from the gates it declares:
//! authentication, validation, lease-scoped locking, quota admission and a
//! response cache in front of the resource handler. Results leave through a
//! uniform [`ResponseEnvelope`](service::ResponseEnvelope).

pub mod auth;
pub mod cache;
pub mod lock;
pub mod network;
pub mod quota;
pub mod service;
pub mod telemetry;
pub mod traits;

pub use cache::{CacheStore, InMemoryCacheStore};
pub use lock::{InMemoryLockService, LockPolicy, LockScope, LockService};
pub use network::{AdminServer, NetworkConfig};
pub use quota::{CollectorRegistry, QuotaService, StaticQuotaLimits};
pub use service::middleware::PipelineDeps;
pub use service::{HandlerRegistry, PipelineConfig, ResponseEnvelope};
pub use traits::{
    Authenticator, QuotaCollector, QuotaLimits, RequestFilter, ResourceHandler, ResourceValidator,
};
