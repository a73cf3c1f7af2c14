//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use mrn_core::{ResolveError, StoreError};

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unauthorized - no caller identity on the request
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Forbidden - caller role may not perform this operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Not found - requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server error - unexpected server-side failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Service unavailable - patient store unreachable
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Resolver error - from the identity resolver
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Resolve(e) => match e {
                ResolveError::InvalidQuery(_) | ResolveError::InvalidIdentifier(_) => {
                    StatusCode::BAD_REQUEST
                }
                ResolveError::Ambiguous(_) => StatusCode::CONFLICT,
                ResolveError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                ResolveError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Get the error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::ServiceUnavailable(_) => "STORE_UNAVAILABLE",
            Self::Resolve(e) => match e {
                ResolveError::InvalidQuery(_) => "INVALID_QUERY",
                ResolveError::InvalidIdentifier(_) => "INVALID_IDENTIFIER",
                ResolveError::Ambiguous(_) => "AMBIGUOUS_MATCH",
                ResolveError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
                ResolveError::Store(_) => "STORE_ERROR",
            },
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            Self::Resolve(e) => match e {
                ResolveError::InvalidQuery(reason) => reason.clone(),
                ResolveError::InvalidIdentifier(reason) => {
                    format!("Invalid medical identifier: {reason}")
                }
                ResolveError::Ambiguous(warning) => format!(
                    "{} patients share this email address",
                    warning.match_count
                ),
                ResolveError::StoreUnavailable(_) => {
                    "Patient store temporarily unavailable".to_string()
                }
                ResolveError::Store(_) => "Patient store error".to_string(),
            },
            Self::Internal(_) => "Internal server error".to_string(),
            Self::ServiceUnavailable(_) => "Patient store temporarily unavailable".to_string(),
            _ => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::Resolve(_) => "resolve",
        }
    }

    /// Whether the client may retry the same request later
    pub fn is_retryable(&self) -> bool {
        use mrn_core::Classify;
        match self {
            Self::ServiceUnavailable(_) => true,
            Self::Resolve(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Resolve(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Server error"
            );
        } else if matches!(self, Self::Unauthorized(_) | Self::Forbidden(_)) {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Authorization error"
            );
        } else {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Client error"
            );
        }

        let mut body = serde_json::json!({
            "error": client_message,
            "code": code,
            "retryable": self.is_retryable(),
        });
        if let Self::Resolve(ResolveError::Ambiguous(warning)) = &self {
            body["candidateIds"] = serde_json::json!(warning.candidate_ids);
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrn_core::IdentifierError;

    #[test]
    fn test_resolve_errors_map_to_status_and_code() {
        let invalid = ApiError::from(ResolveError::InvalidIdentifier(IdentifierError::MissingDigit));
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(invalid.error_code(), "INVALID_IDENTIFIER");
        assert!(!invalid.is_retryable());

        let outage = ApiError::from(StoreError::Unavailable("connection refused".into()));
        assert_eq!(outage.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(outage.error_code(), "STORE_UNAVAILABLE");
        assert!(outage.is_retryable());

        let broken = ApiError::from(StoreError::Query("syntax error".into()));
        assert_eq!(broken.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_client_message_hides_store_details() {
        let outage = ApiError::from(StoreError::Unavailable("db.internal:5432 refused".into()));
        assert!(!outage.client_message().contains("5432"));
    }
}
