use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::response::{IntoResponse, Response};
use http::StatusCode;

use super::types::ErrorResponse;

/// 注册中心错误类型
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("{0}")]
    Validation(String),
    #[error("Service not found")]
    ServiceNotFound,
    #[error("No healthy service instances found for {0}")]
    NoHealthyInstance(String),
    #[error("Service information does not match")]
    Mismatch,
    #[error("Unknown sync action: {0}")]
    UnknownAction(String),
}

impl RegistryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RegistryError::ServiceNotFound | RegistryError::NoHealthyInstance(_) => {
                StatusCode::NOT_FOUND
            }
            RegistryError::Validation(_)
            | RegistryError::Mismatch
            | RegistryError::UnknownAction(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<JsonRejection> for RegistryError {
    fn from(rejection: JsonRejection) -> Self {
        RegistryError::Validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for RegistryError {
    fn from(rejection: QueryRejection) -> Self {
        RegistryError::Validation(format!("Invalid query: {}", rejection.body_text()))
    }
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        tracing::debug!(status = %status, error = %self, "Rejecting registry request");

        let body = ErrorResponse {
            code: status.as_u16(),
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
