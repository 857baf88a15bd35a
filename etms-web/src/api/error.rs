//! Error responses
//!
//! Every failure is rendered as `{"success": false, "error": "<message>"}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use etms_common::Error;
use serde_json::json;
use tracing::error;

/// Handler error wrapping the library error
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError(Error::InvalidInput(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::InvalidInput(_) | Error::Health(_) | Error::Csv(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Database(_) | Error::Io(_) | Error::Config(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-facing message; server faults are not echoed back
    fn message(&self) -> String {
        match &self.0 {
            Error::InvalidInput(msg)
            | Error::NotFound(msg)
            | Error::Conflict(msg)
            | Error::Unauthorized(msg)
            | Error::Forbidden(msg) => msg.clone(),
            Error::Health(e) => e.to_string(),
            Error::Csv(e) => format!("Invalid CSV: {}", e),
            Error::Database(_) | Error::Io(_) | Error::Config(_) | Error::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<Error>,
{
    fn from(err: E) -> Self {
        ApiError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }

        let body = Json(json!({
            "success": false,
            "error": self.message(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etms_common::HealthError;

    #[test]
    fn test_status_mapping() {
        let mismatch = ApiError::from(HealthError::CountMismatch { population: 100, total: 40 });
        assert_eq!(mismatch.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            mismatch.message(),
            "Health status total (40) must equal the total population (100)"
        );

        assert_eq!(ApiError(Error::Conflict("dup".into())).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError(Error::Forbidden("no".into())).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError(Error::Internal("boom".into())).message(),
            "Internal server error"
        );
    }
}
