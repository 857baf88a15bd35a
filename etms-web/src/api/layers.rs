//! Map layer endpoints
//!
//! App users read active layers; head users manage the full set.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use etms_common::db::{layers, LayerInput, MapLayer, User};
use etms_common::ids;
use serde_json::json;

use super::{json_body, ApiError};
use crate::AppState;

/// GET /api/layers
pub async fn list_active_layers(
    State(state): State<AppState>,
) -> Result<Json<Vec<MapLayer>>, ApiError> {
    Ok(Json(layers::list_layers(&state.db, true).await?))
}

/// GET /head/api/layers
pub async fn list_all_layers(State(state): State<AppState>) -> Result<Json<Vec<MapLayer>>, ApiError> {
    Ok(Json(layers::list_layers(&state.db, false).await?))
}

/// POST /head/api/layers
pub async fn create_layer(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    payload: Result<Json<LayerInput>, JsonRejection>,
) -> Result<Response, ApiError> {
    let input = json_body(payload)?;
    let id = layers::create_layer(&state.db, &input, user.id).await?;
    let layer = layers::get_layer(&state.db, id).await?;

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "layer": layer }))).into_response())
}

/// PUT /head/api/layers/:id
pub async fn update_layer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<LayerInput>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = ids::parse_input("layer", &id)?;
    let input = json_body(payload)?;

    layers::update_layer(&state.db, id, &input).await?;
    let layer = layers::get_layer(&state.db, id).await?;

    Ok(Json(json!({ "success": true, "layer": layer })))
}

/// DELETE /head/api/layers/:id
pub async fn delete_layer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = ids::parse_input("layer", &id)?;
    layers::delete_layer(&state.db, id).await?;

    Ok(Json(json!({ "success": true })))
}
