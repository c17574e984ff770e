//! Unauthenticated health endpoint.

use axum::extract::State;
use axum::Json;
use serde_json::json;

use super::AppState;

/// Lifecycle state, in-flight request count and uptime.
///
/// Always 200; the `state` field says whether the server is actually
/// serving or draining.
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "state": state.shutdown.health_state().as_str(),
        "in_flight": state.shutdown.in_flight_count(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}
