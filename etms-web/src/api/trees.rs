//! Tree record endpoints
//!
//! Three creation call sites share one validation path: JSON import,
//! form-encoded manual entry and CSV upload.

use axum::{
    body::Bytes,
    extract::{
        rejection::{FormRejection, JsonRejection},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Form, Json,
};
use etms_common::db::{settings, trees, TreeInput, TreeUpdate, User};
use etms_common::geojson::{self, FeatureCollection, TreeProperties};
use etms_common::{ids, import, time, Error};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::{json_body, ApiError};
use crate::AppState;

/// Tree GeoJSON with the caller's default pin style attached
async fn tree_collection(
    state: &AppState,
    user: &User,
    species: Option<Uuid>,
) -> Result<FeatureCollection<TreeProperties>, ApiError> {
    let rows = trees::list_trees(&state.db, user.scope(), species).await?;
    let pin_style = settings::default_pin_style(&state.db, user.id).await?;
    Ok(geojson::trees_collection(rows).with_pin_style(pin_style))
}

/// GET /api/trees, /head/api/trees
pub async fn list_trees(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<FeatureCollection<TreeProperties>>, ApiError> {
    Ok(Json(tree_collection(&state, &user, None).await?))
}

/// GET /api/trees/species/:species_id
pub async fn list_trees_for_species(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(species_id): Path<String>,
) -> Result<Json<FeatureCollection<TreeProperties>>, ApiError> {
    let species_id = ids::parse_input("species", &species_id)?;
    if !trees::species_exists(&state.db, species_id, user.scope()).await? {
        return Err(Error::NotFound(format!("Species {}", species_id)).into());
    }

    Ok(Json(tree_collection(&state, &user, Some(species_id)).await?))
}

async fn created(state: &AppState, user: &User, id: Uuid) -> Result<Response, ApiError> {
    let tree = trees::get_tree(&state.db, id, user.scope()).await?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "tree": tree }))).into_response())
}

/// POST /api/trees
pub async fn create_tree_json(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    payload: Result<Json<TreeInput>, JsonRejection>,
) -> Result<Response, ApiError> {
    let input = json_body(payload)?;
    let id = trees::create_tree(&state.db, &input, user.id).await?;
    created(&state, &user, id).await
}

/// Manual entry form; every field arrives as a string
#[derive(Debug, Deserialize)]
pub struct TreeForm {
    pub common_name: String,
    pub scientific_name: String,
    pub family: String,
    pub genus: String,
    pub latitude: String,
    pub longitude: String,
    #[serde(default)]
    pub location_name: Option<String>,
    pub population: String,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub healthy_count: Option<String>,
    #[serde(default)]
    pub good_count: Option<String>,
    #[serde(default)]
    pub bad_count: Option<String>,
    #[serde(default)]
    pub deceased_count: Option<String>,
    #[serde(default)]
    pub hectares: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn parse_field<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, Error> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidInput(format!("{} must be a number (got {:?})", field, value)))
}

/// Blank optional fields take `default`
fn parse_optional<T: std::str::FromStr>(
    field: &str,
    value: Option<&str>,
    default: T,
) -> Result<T, Error> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => parse_field(field, v),
        None => Ok(default),
    }
}

impl TryFrom<TreeForm> for TreeInput {
    type Error = Error;

    fn try_from(form: TreeForm) -> Result<Self, Error> {
        Ok(TreeInput {
            latitude: parse_field("latitude", &form.latitude)?,
            longitude: parse_field("longitude", &form.longitude)?,
            population: parse_field("population", &form.population)?,
            year: parse_optional("year", form.year.as_deref(), time::current_year())?,
            healthy_count: parse_optional("healthy_count", form.healthy_count.as_deref(), 0)?,
            good_count: parse_optional("good_count", form.good_count.as_deref(), 0)?,
            bad_count: parse_optional("bad_count", form.bad_count.as_deref(), 0)?,
            deceased_count: parse_optional("deceased_count", form.deceased_count.as_deref(), 0)?,
            hectares: parse_optional("hectares", form.hectares.as_deref(), 0.0)?,
            common_name: form.common_name,
            scientific_name: form.scientific_name,
            family: form.family,
            genus: form.genus,
            location_name: form.location_name,
            notes: form.notes.filter(|n| !n.trim().is_empty()),
        })
    }
}

/// POST /api/trees/form
pub async fn create_tree_form(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    form: Result<Form<TreeForm>, FormRejection>,
) -> Result<Response, ApiError> {
    let Form(form) = form.map_err(|r| ApiError::bad_request(r.body_text()))?;
    let input = TreeInput::try_from(form)?;
    let id = trees::create_tree(&state.db, &input, user.id).await?;
    created(&state, &user, id).await
}

/// POST /api/trees/import (CSV body)
pub async fn import_csv(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::bad_request("CSV body is empty"));
    }

    let report = import::import_trees_csv(&state.db, &body, user.id).await?;

    Ok(Json(json!({
        "success": report.failed == 0,
        "imported": report.imported,
        "failed": report.failed,
        "errors": report.errors,
    })))
}

/// PUT /api/trees/:id
pub async fn update_tree(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    payload: Result<Json<TreeUpdate>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = ids::parse_input("tree", &id)?;
    let update = json_body(payload)?;

    let cleanup = trees::update_tree(&state.db, id, &update, user.scope()).await?;
    let tree = trees::get_tree(&state.db, id, user.scope()).await?;

    Ok(Json(json!({ "success": true, "tree": tree, "cleanup": cleanup })))
}

/// DELETE /api/trees/:id
pub async fn delete_tree(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = ids::parse_input("tree", &id)?;
    let report = trees::delete_tree(&state.db, id, user.scope()).await?;

    Ok(Json(json!({ "success": true, "deleted_count": report.deleted_count, "cleanup": report.cleanup })))
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub tree_ids: Vec<String>,
}

/// POST /api/trees/bulk-delete
pub async fn bulk_delete(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    payload: Result<Json<BulkDeleteRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request = json_body(payload)?;
    let tree_ids = request
        .tree_ids
        .iter()
        .map(|id| ids::parse_input("tree", id))
        .collect::<Result<Vec<_>, _>>()?;

    let report = trees::delete_trees(&state.db, &tree_ids, user.scope()).await?;

    Ok(Json(json!({ "success": true, "deleted_count": report.deleted_count, "cleanup": report.cleanup })))
}

/// POST /api/trees/delete-all
pub async fn delete_all(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let report = trees::delete_all_trees(&state.db, user.scope()).await?;

    Ok(Json(json!({ "success": true, "deleted_count": report.deleted_count, "cleanup": report.cleanup })))
}
