//! Uniform response envelope.
//!
//! Every request ends in exactly one [`ResponseEnvelope`]: the handler's
//! payload on success, or an [`ErrorBody`] with a stable code, message and
//! trace id on failure.

use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use gatehouse_core::{ErrorBody, ErrorCode};

use crate::service::operation::{ApiResponse, PipelineError};

#[derive(Debug, Clone)]
pub enum ResponseEnvelope {
    Success(ApiResponse),
    Failure { status: StatusCode, body: ErrorBody },
}

impl ResponseEnvelope {
    /// Wraps a pipeline outcome. Unexpected faults are logged here with
    /// their detail and reported to the client generically.
    #[must_use]
    pub fn from_result(result: Result<ApiResponse, PipelineError>, trace_id: &str) -> Self {
        match result {
            Ok(response) => Self::Success(response),
            Err(err) => {
                if matches!(err, PipelineError::Internal(_)) {
                    tracing::error!(trace_id = %trace_id, error = ?err, "request failed");
                }
                Self::failure(err.code(), err.client_message(), trace_id)
            }
        }
    }

    #[must_use]
    pub fn failure(code: ErrorCode, message: impl Into<String>, trace_id: &str) -> Self {
        let status =
            StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::Failure {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
                trace_id: trace_id.to_string(),
            },
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Success(response) => {
                StatusCode::from_u16(response.status).unwrap_or(StatusCode::OK)
            }
            Self::Failure { status, .. } => *status,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&ErrorBody> {
        match self {
            Self::Success(_) => None,
            Self::Failure { body, .. } => Some(body),
        }
    }
}

impl IntoResponse for ResponseEnvelope {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::Success(api) => {
                let mut response = (status, api.body).into_response();
                let headers = response.headers_mut();
                if let Ok(value) = HeaderValue::from_str(&api.content_type) {
                    headers.insert(header::CONTENT_TYPE, value);
                }
                for (name, value) in &api.headers {
                    if let (Ok(name), Ok(value)) = (
                        HeaderName::from_bytes(name.as_bytes()),
                        HeaderValue::from_str(value),
                    ) {
                        headers.insert(name, value);
                    }
                }
                response
            }
            Self::Failure { body, .. } => {
                let bytes = serde_json::to_vec(&body).map_or_else(
                    |_| Bytes::from_static(b"{\"code\":\"Internal\"}"),
                    Bytes::from,
                );
                (
                    status,
                    [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
                    bytes,
                )
                    .into_response()
            }
        }
    }
}
