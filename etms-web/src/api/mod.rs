//! HTTP API handlers for etms-web

pub mod analytics;
pub mod auth;
pub mod error;
pub mod health;
pub mod layers;
pub mod lookups;
pub mod seeds;
pub mod settings;
pub mod submissions;
pub mod trees;

pub use error::ApiError;
pub use health::health_routes;

use axum::extract::rejection::JsonRejection;
use axum::Json;

/// Unwrap a JSON body, turning extractor rejections into 400 responses
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}
