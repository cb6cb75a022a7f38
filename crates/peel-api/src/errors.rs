//! API error mapping.
//!
//! Every pipeline error surfaces with a stable machine code, a human
//! message, the request id, and the HTTP status the taxonomy prescribes.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use peel_types::PeelError;
use serde_json::json;

pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub request_id: String,
    pub retry_after: Option<u64>,
}

impl ApiError {
    pub fn from_peel(error: PeelError, request_id: String) -> Self {
        let status = match &error {
            PeelError::Validation { .. } => StatusCode::BAD_REQUEST,
            PeelError::Auth { .. } => StatusCode::UNAUTHORIZED,
            PeelError::Quota { .. } => StatusCode::PAYMENT_REQUIRED,
            PeelError::FeatureGated { .. } => StatusCode::FORBIDDEN,
            PeelError::Timeout { .. } | PeelError::Aborted => StatusCode::REQUEST_TIMEOUT,
            PeelError::Blocked { .. } => StatusCode::BAD_GATEWAY,
            PeelError::Http { .. } => StatusCode::BAD_GATEWAY,
            PeelError::Network { .. } => StatusCode::BAD_GATEWAY,
            PeelError::Parse { .. }
            | PeelError::Document { .. }
            | PeelError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            code: error.machine_code(),
            message: error.to_string(),
            request_id,
            retry_after: None,
        }
    }

    pub fn rate_limited(request_id: String, retry_after_secs: u64) -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            code: "rate_limited",
            message: "rate limit exceeded".to_string(),
            request_id,
            retry_after: Some(retry_after_secs),
        }
    }

    pub fn unauthorized(request_id: String) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "auth_error",
            message: "missing or invalid API key".to_string(),
            request_id,
            retry_after: None,
        }
    }

    pub fn not_found(request_id: String, what: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "not_found",
            message: format!("{what} not found"),
            request_id,
            retry_after: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.code,
            "message": self.message,
            "requestId": self.request_id,
        });
        let mut response = (self.status, Json(body)).into_response();
        if let Ok(value) = HeaderValue::from_str(&self.request_id) {
            response.headers_mut().insert("x-request-id", value);
        }
        if let Some(secs) = self.retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert("retry-after", value);
            }
        }
        response
    }
}
