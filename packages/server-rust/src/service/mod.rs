//! Request pipeline for the admin API.
//!
//! 1. **Routes** (`routes`): the route table and what each route declares
//! 2. **Middleware** (`middleware`): Tower layers composed per route
//! 3. **Handlers** (`handler`, `registry`): terminal resource handlers by operation
//! 4. **Envelope** (`envelope`): uniform success/error response shape
//! 5. **Background workers** (`worker`): periodic expiry sweeps

pub mod config;
pub mod envelope;
pub mod handler;
pub mod middleware;
pub mod operation;
pub mod registry;
pub mod routes;
pub mod worker;

pub use config::{CacheConfig, LockConfig, PipelineConfig, QuotaConfig, RouteFeatures};
pub use envelope::ResponseEnvelope;
pub use handler::{handler_fn, HandlerService};
pub use operation::{ApiRequest, ApiResponse, HandlerError, PipelineError, PipelineFuture};
pub use registry::HandlerRegistry;
pub use routes::{admin_routes, operations, RouteSpec};
pub use worker::{BackgroundRunnable, BackgroundWorker, ExpirySweeper, SweepReport, SweepTask};
