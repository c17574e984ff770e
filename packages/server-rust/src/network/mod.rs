//! HTTP surface: configuration, transport middleware, handlers, lifecycle.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod module;
pub mod shutdown;

pub use config::NetworkConfig;
pub use handlers::AppState;
pub use module::AdminServer;
pub use shutdown::{HealthState, InFlightGuard, ShutdownController};
