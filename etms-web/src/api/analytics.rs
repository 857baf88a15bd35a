//! Analytics and dashboard endpoints

use axum::{extract::State, Extension, Json};
use etms_common::analytics::{self, AnalyticsReport, Dashboard};
use etms_common::db::User;

use super::ApiError;
use crate::AppState;

/// GET /api/analytics, /head/api/analytics
pub async fn analytics(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<AnalyticsReport>, ApiError> {
    Ok(Json(analytics::analytics(&state.db, user.scope()).await?))
}

/// GET /api/dashboard, /head/api/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Dashboard>, ApiError> {
    Ok(Json(analytics::dashboard(&state.db, user.scope()).await?))
}
