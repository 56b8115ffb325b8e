//! API error types.
//!
//! Every variant maps to one entry of the error taxonomy: validation
//! failures, unknown ids, unreachable dependencies, and internal errors.
//! The enum implements [`axum::response::IntoResponse`] so handlers can
//! simply return `Err(ApiError::NotFound { .. })` and get a JSON error
//! body with the right status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Generate a 16-character hex request ID.
pub fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes).to_uppercase()
}

/// Fadebox error taxonomy.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A request field is missing, blank, or out of range. Never retried.
    #[error("{message}")]
    InvalidArgument { message: String },

    /// No file record exists for the requested id.
    #[error("File not found")]
    NotFound { id: String },

    /// The metadata or object store is unreachable or rejected the call.
    #[error("A backing store is unavailable: {message}")]
    DependencyUnavailable { message: String },

    /// Catch-all for unexpected internal errors.
    #[error("We encountered an internal error, please try again.")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Return the machine-readable error code string.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidArgument { .. } => "InvalidArgument",
            ApiError::NotFound { .. } => "NotFound",
            ApiError::DependencyUnavailable { .. } => "DependencyUnavailable",
            ApiError::Internal(_) => "InternalError",
        }
    }

    /// Return the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::DependencyUnavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = generate_request_id();
        let status = self.status_code();
        let date = httpdate::fmt_http_date(std::time::SystemTime::now());

        let body = serde_json::json!({
            "error": self.code(),
            "message": self.to_string(),
            "requestId": request_id,
        });

        (
            status,
            [
                ("content-type", "application/json".to_string()),
                ("x-request-id", request_id),
                ("date", date),
                ("server", "Fadebox".to_string()),
            ],
            body.to_string(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let err = ApiError::InvalidArgument {
            message: "sizeBytes must be greater than zero".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "InvalidArgument");

        let err = ApiError::NotFound {
            id: "abc".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = ApiError::DependencyUnavailable {
            message: "kv put failed".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = ApiError::Internal(anyhow::anyhow!("boom"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "InternalError");
    }

    #[test]
    fn test_request_id_shape() {
        let id = generate_request_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id, id.to_uppercase());
    }
}
