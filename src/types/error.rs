//! Error types for the gateway
//!
//! Every failure a handler can return maps onto one HTTP status. Upstream
//! service failures keep the upstream code (when it is a client error) and
//! the diagnostic body the service sent back.

use hyper::StatusCode;
use serde::Serialize;

/// HTTP 499, nginx's "client closed request"
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Main error type for gateway operations
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Payment required: {0}")]
    PaymentRequired(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Unprocessable entity: {0}")]
    Unprocessable(String),

    #[error("Locked: {0}")]
    Locked(String),

    #[error("Client closed request")]
    ClientClosed,

    #[error("{message}")]
    Upstream {
        code: u16,
        message: String,
        data: Option<String>,
    },

    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Locked(_) => StatusCode::LOCKED,
            Self::ClientClosed => StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                .unwrap_or(StatusCode::BAD_REQUEST),
            Self::Upstream { code, .. } => upstream_status(*code),
            Self::Redis(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Build an upstream error from a backend's status and diagnostic body
    pub fn upstream(code: u16, message: impl Into<String>, data: Option<String>) -> Self {
        Self::Upstream {
            code,
            message: message.into(),
            data,
        }
    }

    /// True when the error means "the thing does not exist", whether we
    /// decided that or a backend did.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Upstream { code, .. } => *code == 404,
            _ => false,
        }
    }

    /// Wire shape of the error, serialized with the negotiated codec
    pub fn to_body(&self) -> ErrorResponse {
        let data = match self {
            Self::Upstream { data, .. } => data.clone(),
            _ => None,
        };
        ErrorResponse {
            error: ErrorBody {
                code: self.status_code().as_u16(),
                message: self.to_string(),
                data,
            },
        }
    }
}

/// Upstream client errors pass through; anything above 500 is our 500.
fn upstream_status(code: u16) -> StatusCode {
    if (400..=500).contains(&code) {
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// `{"error": {...}}`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

// Implement From conversions for common error types

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<serde_cbor::Error> for ApiError {
    fn from(err: serde_cbor::Error) -> Self {
        Self::BadRequest(format!("CBOR error: {}", err))
    }
}

impl From<hyper::Error> for ApiError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        let code = err.status().map(|s| s.as_u16()).unwrap_or(500);
        Self::upstream(code, format!("Upstream request failed: {}", err), None)
    }
}

impl From<deadpool_redis::PoolError> for ApiError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        Self::Redis(err.to_string())
    }
}

impl From<deadpool_redis::redis::RedisError> for ApiError {
    fn from(err: deadpool_redis::redis::RedisError) -> Self {
        Self::Redis(err.to_string())
    }
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, ApiError>;
