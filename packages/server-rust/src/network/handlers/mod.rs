//! HTTP handlers for the admin server.
//!
//! Defines `AppState`, the shared state carried through axum extractors,
//! and re-exports the handler functions used to build the router.

pub mod dispatch;
pub mod fallback;
pub mod health;

pub use dispatch::dispatch;
pub use fallback::{method_not_allowed, not_found};
pub use health::health_handler;

use std::sync::Arc;
use std::time::Instant;

use super::{NetworkConfig, ShutdownController};

/// Shared state passed to handlers. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Lifecycle state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    pub config: Arc<NetworkConfig>,
    /// Used for uptime reporting.
    pub start_time: Instant,
}

/// Trace id of a request: its `x-request-id`, or a fresh UUID if missing.
pub(crate) fn trace_id(headers: &axum::http::HeaderMap) -> String {
    headers
        .get(super::middleware::REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_string)
}
