use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

/// Error response type
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error type for the query routes
///
/// Only the first two variants are part of the response contract. Store
/// faults are not recovered; the HTTP layer reports them as a 500 and the
/// library entry point hands them back to the caller.
#[derive(Debug)]
pub enum ApiError {
    /// `/records/` with nothing after the prefix
    MissingId,
    /// No record stored under the requested id
    RecordNotFound(String),
    /// Store read failed or returned malformed data
    Store(anyhow::Error),
}

impl ApiError {
    /// Status code and `error` message for this error
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::MissingId => (StatusCode::BAD_REQUEST, "missing id".to_string()),
            ApiError::RecordNotFound(_) => (StatusCode::NOT_FOUND, "not found".to_string()),
            ApiError::Store(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Store error: {}", err),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Store(err) = &self {
            tracing::error!("Store fault while serving request: {:#}", err);
        }

        let (status, error) = self.status_and_message();
        (status, Json(ErrorResponse { error })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Store(err)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Store(err.into())
    }
}
