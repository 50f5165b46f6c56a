use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The current snapshot carries a collection error.
    Upstream(String),
    GpuNotFound(u32),
    /// Path segment that is not a non-negative integer index; holds the
    /// extractor's reason.
    InvalidIndex(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::GpuNotFound(_) | ApiError::InvalidIndex(_) => StatusCode::NOT_FOUND,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::Upstream(message) => message.clone(),
            ApiError::GpuNotFound(index) => format!("GPU with index {index} not found"),
            ApiError::InvalidIndex(reason) => format!("invalid GPU index: {reason}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message(),
        };
        (self.status(), Json(body)).into_response()
    }
}
