use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chub_error::{ChubError, ErrorCategory};
use serde_json::json;

/// An HTTP-shaped error, the `chub-server` analogue of `chub_error::ChubError`
/// at the axum boundary.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Construct directly with a status and message.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// A bare 404, used where a source reports "nothing found" rather than
    /// failing (matches the original's `w.WriteHeader(http.StatusNotFound)`).
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl From<ChubError> for ApiError {
    fn from(e: ChubError) -> Self {
        let status = match e.code.category() {
            ErrorCategory::Config => StatusCode::BAD_REQUEST,
            ErrorCategory::Git | ErrorCategory::Credhub => StatusCode::BAD_GATEWAY,
            ErrorCategory::Properties | ErrorCategory::Aggregation | ErrorCategory::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<chub_credhub::CredhubError> for ApiError {
    fn from(e: chub_credhub::CredhubError) -> Self {
        ChubError::from(e).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
