use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use keyhole_core::StorageError;
use keyhole_resolver::ResolveError;
use thiserror::Error;
use tracing::error;

use crate::model::ErrorResponse;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("invalid owner: {0}")]
    InvalidOwner(String),
    #[error("owner is required")]
    MissingOwner,
    #[error("short code not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Storage(StorageError),
}

impl From<ResolveError> for GatewayError {
    fn from(value: ResolveError) -> Self {
        match value {
            ResolveError::NotFound(code) => Self::NotFound(code.to_string()),
            ResolveError::Storage(e) => Self::Storage(e),
        }
    }
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::InvalidUrl(_)
            | GatewayError::InvalidRequest(_)
            | GatewayError::InvalidOwner(_) => StatusCode::BAD_REQUEST,
            GatewayError::MissingOwner => StatusCode::UNAUTHORIZED,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Storage(e) => match e {
                StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                StorageError::Unavailable(_) | StorageError::Timeout(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                StorageError::Query(_) | StorageError::InvalidData(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, "request failed");
            // storage details stay in the logs
            status
                .canonical_reason()
                .unwrap_or("internal error")
                .to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
