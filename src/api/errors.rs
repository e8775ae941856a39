use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::{alarm::AlarmInputError, control::relay::RelayCommandError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or out-of-range request data. The epoch/request is
    /// rejected with no state mutation.
    #[error("{0}")]
    InvalidInput(String),
    /// A command the current mode does not permit.
    #[error("{0}")]
    PermissionDenied(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<AlarmInputError> for ApiError {
    fn from(e: AlarmInputError) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

impl From<RelayCommandError> for ApiError {
    fn from(e: RelayCommandError) -> Self {
        Self::PermissionDenied(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(e) => {
                error!(error = %e, "Internal server error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
