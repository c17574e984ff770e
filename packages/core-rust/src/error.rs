//! Stable error codes and the failure body shared by the server and its clients.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Enumerated failure domain reported in every rejected response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    AccessDenied,
    QuotaExceeded,
    ValidationFailed,
    NotFound,
    MethodNotAllowed,
    LockConflict,
    Internal,
}

impl ErrorCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AccessDenied => "AccessDenied",
            Self::QuotaExceeded => "QuotaExceeded",
            Self::ValidationFailed => "ValidationFailed",
            Self::NotFound => "NotFound",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::LockConflict => "LockConflict",
            Self::Internal => "Internal",
        }
    }

    /// HTTP status code the transport reports for this code.
    #[must_use]
    pub fn http_status(self) -> u16 {
        match self {
            Self::AccessDenied => 401,
            Self::QuotaExceeded => 403,
            Self::ValidationFailed => 400,
            Self::NotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::LockConflict => 409,
            Self::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON body of a failure envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(rename = "requestId")]
    pub trace_id: String,
}
