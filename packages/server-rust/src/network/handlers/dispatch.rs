//! Bridge from axum to a route pipeline.

use std::collections::HashMap;

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, Request};
use axum::response::{IntoResponse, Response};
use gatehouse_core::{ErrorCode, RequestContext};
use tower::ServiceExt;

use super::{trace_id, AppState};
use crate::service::envelope::ResponseEnvelope;
use crate::service::middleware::RouteService;
use crate::service::operation::ApiRequest;

/// Builds the request context, reads the body and runs `route`.
///
/// The response is always an envelope; oversized bodies and undecodable path
/// parameters are `ValidationFailed` before any pipeline stage runs.
pub async fn dispatch(
    route: RouteService,
    state: AppState,
    params: Result<Path<HashMap<String, String>>, PathRejection>,
    request: Request,
) -> Response {
    let _in_flight = state.shutdown.in_flight_guard();
    let (parts, body) = request.into_parts();
    let trace_id = trace_id(&parts.headers);

    let params = match params {
        Ok(Path(params)) => params,
        Err(PathRejection::MissingPathParams(_)) => HashMap::new(),
        Err(rejection) => {
            return ResponseEnvelope::failure(
                ErrorCode::ValidationFailed,
                rejection.body_text(),
                &trace_id,
            )
            .into_response();
        }
    };

    let mut ctx = RequestContext::new(trace_id.clone(), parts.method.as_str(), parts.uri.path())
        .with_query(parts.uri.query());
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            ctx = ctx.with_header(name.as_str(), value);
        }
    }
    for (name, value) in params {
        ctx = ctx.with_param(name, value);
    }

    let body = match axum::body::to_bytes(body, state.config.max_body_bytes).await {
        Ok(body) => body,
        Err(err) => {
            return ResponseEnvelope::failure(
                ErrorCode::ValidationFailed,
                format!("request body rejected: {err}"),
                &trace_id,
            )
            .into_response();
        }
    };

    let result = route.oneshot(ApiRequest::new(ctx, body)).await;
    ResponseEnvelope::from_result(result, &trace_id).into_response()
}
