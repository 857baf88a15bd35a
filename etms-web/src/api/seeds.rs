//! Seed planting endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use etms_common::db::{seeds, SeedInput, SeedUpdate, User};
use etms_common::geojson::{self, FeatureCollection, SeedProperties};
use etms_common::ids;
use serde::Deserialize;
use serde_json::json;

use super::{json_body, ApiError};
use crate::AppState;

/// GET /api/seeds, /head/api/seeds
pub async fn list_seeds(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<FeatureCollection<SeedProperties>>, ApiError> {
    let rows = seeds::list_seeds(&state.db, user.scope()).await?;
    Ok(Json(geojson::seeds_collection(rows)))
}

/// POST /api/seeds
pub async fn create_seed(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    payload: Result<Json<SeedInput>, JsonRejection>,
) -> Result<Response, ApiError> {
    let input = json_body(payload)?;
    let id = seeds::create_seed(&state.db, &input, user.id).await?;
    let seed = seeds::get_seed(&state.db, id, user.scope()).await?;

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "seed": seed }))).into_response())
}

/// PUT /api/seeds/:id
pub async fn update_seed(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    payload: Result<Json<SeedUpdate>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = ids::parse_input("seed", &id)?;
    let update = json_body(payload)?;

    let cleanup = seeds::update_seed(&state.db, id, &update, user.scope()).await?;
    let seed = seeds::get_seed(&state.db, id, user.scope()).await?;

    Ok(Json(json!({ "success": true, "seed": seed, "cleanup": cleanup })))
}

/// DELETE /api/seeds/:id
pub async fn delete_seed(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = ids::parse_input("seed", &id)?;
    let report = seeds::delete_seed(&state.db, id, user.scope()).await?;

    Ok(Json(json!({ "success": true, "deleted_count": report.deleted_count, "cleanup": report.cleanup })))
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub seed_ids: Vec<String>,
}

/// POST /api/seeds/bulk-delete
pub async fn bulk_delete(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    payload: Result<Json<BulkDeleteRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request = json_body(payload)?;
    let seed_ids = request
        .seed_ids
        .iter()
        .map(|id| ids::parse_input("seed", id))
        .collect::<Result<Vec<_>, _>>()?;

    let report = seeds::delete_seeds(&state.db, &seed_ids, user.scope()).await?;

    Ok(Json(json!({ "success": true, "deleted_count": report.deleted_count, "cleanup": report.cleanup })))
}

/// POST /api/seeds/delete-all
pub async fn delete_all(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let report = seeds::delete_all_seeds(&state.db, user.scope()).await?;

    Ok(Json(json!({ "success": true, "deleted_count": report.deleted_count, "cleanup": report.cleanup })))
}
