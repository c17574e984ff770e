//! HTTP-level Tower layers wrapped around the admin router.
//!
//! Layers are listed outermost first: the first one sees the request first
//! and the response last.

use std::any::Any;

use axum::http::header::HeaderName;
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::Router;
use gatehouse_core::ErrorCode;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any as AnyHeader, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use super::config::NetworkConfig;
use crate::service::envelope::ResponseEnvelope;

/// Request id header, doubling as the request trace id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Applies the transport middleware to `router`.
///
/// **Layer order (outermost to innermost):**
/// 1. `SetRequestId` -- assigns a UUID v4 `x-request-id` unless the client sent one
/// 2. `PropagateRequestId` -- copies `x-request-id` onto the response
/// 3. `Trace` -- HTTP-level request/response spans
/// 4. `Compression` -- gzip response bodies
/// 5. `CORS` -- configured origins
/// 6. `CatchPanic` -- turns a handler panic into an `Internal` envelope
///
/// The per-request deadline lives in the route pipeline, not here, so a
/// timed-out request still gets an envelope.
pub fn with_http_layers(router: Router, config: &NetworkConfig) -> Router {
    let x_request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
            .layer(PropagateRequestIdLayer::new(x_request_id))
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new())
            .layer(build_cors_layer(&config.cors_origins))
            .layer(CatchPanicLayer::custom(panic_response)),
    )
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    tracing::error!(panic = detail, "request handler panicked");
    // The request is gone by now; the trace id reaches the client through
    // the propagated x-request-id header instead.
    ResponseEnvelope::failure(ErrorCode::Internal, "internal server error", "").into_response()
}

/// A wildcard `"*"` allows any origin; otherwise each origin is parsed into
/// an explicit allowlist.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(AnyHeader)
}
