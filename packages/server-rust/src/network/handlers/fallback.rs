//! Envelopes for requests that match no route.

use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use gatehouse_core::ErrorCode;

use super::trace_id;
use crate::service::envelope::ResponseEnvelope;

/// Unknown path.
pub async fn not_found(request: Request) -> Response {
    let trace_id = trace_id(request.headers());
    let message = format!("no route for {}", request.uri().path());
    ResponseEnvelope::failure(ErrorCode::NotFound, message, &trace_id).into_response()
}

/// Known path, unsupported method.
pub async fn method_not_allowed(request: Request) -> Response {
    let trace_id = trace_id(request.headers());
    let message = format!(
        "method {} not allowed on {}",
        request.method(),
        request.uri().path()
    );
    ResponseEnvelope::failure(ErrorCode::MethodNotAllowed, message, &trace_id).into_response()
}
