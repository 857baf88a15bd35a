//! Species and location lookup lists

use axum::{extract::State, Extension, Json};
use etms_common::db::{trees, LocationSummary, SpeciesSummary, User};

use super::ApiError;
use crate::AppState;

/// GET /api/species, /head/api/species
pub async fn list_species(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<SpeciesSummary>>, ApiError> {
    Ok(Json(trees::list_species(&state.db, user.scope()).await?))
}

/// GET /api/locations, /head/api/locations
pub async fn list_locations(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<LocationSummary>>, ApiError> {
    Ok(Json(trees::list_locations(&state.db, user.scope()).await?))
}
