//! Gateway error taxonomy.
//!
//! Every error that reaches a client carries a stable `code`, a human message,
//! and the request's correlation id:
//!
//! ```json
//! { "error": { "code": "rate_limited", "message": "Rate limit exceeded" }, "request_id": "..." }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// One field-level validation problem.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced to API callers.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    InvalidApiKey(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("{message}")]
    Validation {
        message: String,
        details: Vec<FieldError>,
    },

    #[error("{0}")]
    MaxCostExceeded(String),

    #[error("{0}")]
    Provider(String),

    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    pub fn validation(message: impl Into<String>, details: Vec<FieldError>) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidApiKey(_) => "invalid_api_key",
            Self::RateLimited => "rate_limited",
            Self::Validation { .. } => "validation_error",
            Self::MaxCostExceeded(_) => "max_cost_exceeded",
            Self::Provider(_) => "provider_error",
            Self::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidApiKey(_) => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Validation { .. } | Self::MaxCostExceeded(_) => StatusCode::BAD_REQUEST,
            Self::Provider(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Attach the request's correlation id so the error can be rendered.
    pub fn with_request_id(self, request_id: impl Into<String>) -> ApiError {
        ApiError {
            error: self,
            request_id: Some(request_id.into()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a [FieldError]>,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorBody<'a>,
    request_id: Option<&'a str>,
}

/// A [`GatewayError`] bound to a request, ready to become an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub error: GatewayError,
    pub request_id: Option<String>,
}

impl From<GatewayError> for ApiError {
    fn from(error: GatewayError) -> Self {
        Self {
            error,
            request_id: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let details = match &self.error {
            GatewayError::Validation { details, .. } if !details.is_empty() => {
                Some(details.as_slice())
            }
            _ => None,
        };
        let envelope = ErrorEnvelope {
            error: ErrorBody {
                code: self.error.code(),
                message: self.error.to_string(),
                details,
            },
            request_id: self.request_id.as_deref(),
        };
        (self.error.status(), Json(&envelope)).into_response()
    }
}
