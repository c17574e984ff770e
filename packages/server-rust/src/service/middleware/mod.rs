//! Tower middleware layers for the route pipeline.
//!
//! - [`metrics`]: request span, counters and duration histogram
//! - [`timeout`]: per-request deadline
//! - [`auth`]: authentication gate
//! - [`filter`]: deployment-specific request filters
//! - [`validate`]: resource validation on create/delete
//! - [`lock`]: lease-scoped write serialization
//! - [`quota`]: admission control on creation
//! - [`cache`]: response cache for read routes
//! - [`pipeline`]: composes the layers a route declares

pub mod auth;
pub mod cache;
pub mod filter;
pub mod lock;
pub mod metrics;
pub mod pipeline;
pub mod quota;
pub mod timeout;
pub mod validate;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::AuthLayer;
pub use cache::CacheLayer;
pub use filter::FilterLayer;
pub use lock::LockLayer;
pub use metrics::MetricsLayer;
pub use pipeline::{build_route_pipeline, PipelineDeps, RouteService};
pub use quota::QuotaLayer;
pub use timeout::TimeoutLayer;
pub use validate::ValidateLayer;
