use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Request validation failures. Raised before any external call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl ValidationError {
    /// Build a `MissingFields` error from `(name, is_missing)` pairs,
    /// or `None` when nothing is missing.
    pub fn missing<'a>(checks: impl IntoIterator<Item = (&'a str, bool)>) -> Option<Self> {
        let missing: Vec<String> = checks
            .into_iter()
            .filter(|(_, is_missing)| *is_missing)
            .map(|(name, _)| name.to_string())
            .collect();
        if missing.is_empty() {
            None
        } else {
            Some(ValidationError::MissingFields(missing))
        }
    }
}

/// Error returned by HTTP handlers. Serialised as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Upstream(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
