//! Error taxonomy for the peel pipeline.
//!
//! Every failure that can cross a crate boundary is a `PeelError` variant
//! with a stable machine code. Retry and escalation decisions key off
//! `is_retryable`, so fetch strategies never need to string-match messages.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PeelError>;

#[derive(Error, Debug)]
pub enum PeelError {
    /// Client input failed validation (bad URL, out-of-range option).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Missing or invalid API key.
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// The caller's quota is exhausted.
    #[error("quota exhausted: {message}")]
    Quota { message: String },

    /// The option requires a higher plan tier.
    #[error("feature gated: {feature}")]
    FeatureGated { feature: String },

    /// DNS, connection or TLS failure before any HTTP response.
    #[error("network error: {message}")]
    Network { message: String },

    /// A deadline elapsed while waiting on I/O or a browser RPC.
    #[error("timed out: {operation}")]
    Timeout { operation: String },

    /// An anti-bot layer returned a challenge instead of content.
    #[error("blocked by {vendor}")]
    Blocked { vendor: String, retryable: bool },

    /// Upstream returned a non-success HTTP status.
    #[error("http {status} from upstream")]
    Http { status: u16 },

    /// Malformed HTML/JSON/XML. Usually recovered by a fallback path.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// PDF/DOCX extraction failure.
    #[error("document error: {message}")]
    Document { message: String },

    /// The caller cancelled the request. Never triggers escalation.
    #[error("request aborted")]
    Aborted,

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl PeelError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    pub fn blocked(vendor: impl Into<String>, retryable: bool) -> Self {
        Self::Blocked {
            vendor: vendor.into(),
            retryable,
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn document(message: impl Into<String>) -> Self {
        Self::Document {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the current fetch rung may retry (and, once retries are
    /// exhausted, escalate). 4xx statuses other than 429 are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            PeelError::Network { .. } | PeelError::Timeout { .. } => true,
            PeelError::Blocked { retryable, .. } => *retryable,
            PeelError::Http { status } => *status >= 500 || *status == 429,
            PeelError::Aborted => false,
            _ => false,
        }
    }

    /// Stable machine code surfaced in API error bodies and CLI output.
    pub fn machine_code(&self) -> &'static str {
        match self {
            PeelError::Validation { .. } => "validation_error",
            PeelError::Auth { .. } => "auth_error",
            PeelError::Quota { .. } => "quota_exhausted",
            PeelError::FeatureGated { .. } => "feature_gated",
            PeelError::Network { .. } => "network_error",
            PeelError::Timeout { .. } => "timeout",
            PeelError::Blocked { .. } => "upstream_blocked",
            PeelError::Http { .. } => "http_error",
            PeelError::Parse { .. } => "parse_error",
            PeelError::Document { .. } => "document_error",
            PeelError::Aborted => "aborted",
            PeelError::Internal { .. } => "internal_error",
        }
    }
}

impl From<url::ParseError> for PeelError {
    fn from(e: url::ParseError) -> Self {
        PeelError::validation(format!("invalid url: {e}"))
    }
}

impl From<serde_json::Error> for PeelError {
    fn from(e: serde_json::Error) -> Self {
        PeelError::parse(format!("json: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_follows_taxonomy() {
        assert!(PeelError::network("dns").is_retryable());
        assert!(PeelError::timeout("fetch").is_retryable());
        assert!(PeelError::blocked("cloudflare", true).is_retryable());
        assert!(!PeelError::blocked("datadome", false).is_retryable());
        assert!(PeelError::Http { status: 503 }.is_retryable());
        assert!(PeelError::Http { status: 429 }.is_retryable());
        assert!(!PeelError::Http { status: 404 }.is_retryable());
        assert!(!PeelError::Http { status: 403 }.is_retryable());
        assert!(!PeelError::Aborted.is_retryable());
        assert!(!PeelError::validation("bad").is_retryable());
    }

    #[test]
    fn machine_codes_are_stable() {
        assert_eq!(PeelError::validation("x").machine_code(), "validation_error");
        assert_eq!(
            PeelError::blocked("akamai", true).machine_code(),
            "upstream_blocked"
        );
        assert_eq!(PeelError::Aborted.machine_code(), "aborted");
    }
}
