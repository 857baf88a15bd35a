//! User settings and pin style endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use etms_common::db::settings::{self, MAP_STYLE_KEY, THEME_KEY};
use etms_common::db::{PinStyle, PinStyleInput, Setting, User};
use etms_common::ids;
use serde::Deserialize;
use serde_json::json;

use super::{json_body, ApiError};
use crate::AppState;

/// Settings update; absent keys are left unchanged
#[derive(Debug, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub map_style: Option<String>,
}

/// GET /api/settings
pub async fn get_settings(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<Setting>>, ApiError> {
    Ok(Json(settings::user_settings(&state.db, user.id).await?))
}

/// POST /api/settings
pub async fn save_settings(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    payload: Result<Json<SettingsUpdate>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let update = json_body(payload)?;

    if let Some(theme) = &update.theme {
        settings::save_setting(&state.db, user.id, THEME_KEY, theme).await?;
    }
    if let Some(map_style) = &update.map_style {
        settings::save_setting(&state.db, user.id, MAP_STYLE_KEY, map_style).await?;
    }

    let current = settings::user_settings(&state.db, user.id).await?;
    Ok(Json(json!({ "success": true, "settings": current })))
}

/// GET /api/pin-styles
pub async fn list_pin_styles(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<PinStyle>>, ApiError> {
    Ok(Json(settings::list_pin_styles(&state.db, user.id).await?))
}

/// POST /api/pin-styles
pub async fn create_pin_style(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    payload: Result<Json<PinStyleInput>, JsonRejection>,
) -> Result<Response, ApiError> {
    let input = json_body(payload)?;
    let id = settings::create_pin_style(&state.db, user.id, &input).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "pin_style_id": id })),
    )
        .into_response())
}

/// POST /api/pin-styles/:id/default
pub async fn set_default_pin_style(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = ids::parse_input("pin style", &id)?;
    settings::set_default_pin_style(&state.db, user.id, id).await?;

    Ok(Json(json!({ "success": true })))
}
