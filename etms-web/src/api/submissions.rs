//! Public sighting submissions

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use etms_common::db::{submissions, trees, Submission, SubmissionInput, TreeInput, User};
use etms_common::ids;
use serde_json::json;

use super::{auth, json_body, ApiError};
use crate::AppState;

/// POST /public/api/submissions
///
/// Anonymous, or attributed to the caller when a bearer token is sent.
pub async fn create_submission(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SubmissionInput>, JsonRejection>,
) -> Result<Response, ApiError> {
    let submitter = auth::optional_user(&state, &headers).await?;
    let input = json_body(payload)?;
    let id =
        submissions::create_submission(&state.db, &input, submitter.map(|u| u.id)).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "submission_id": id })),
    )
        .into_response())
}

/// GET /public/api/submissions
pub async fn list_public_submissions(
    State(state): State<AppState>,
) -> Result<Json<Vec<Submission>>, ApiError> {
    let list =
        submissions::list_submissions(&state.db, Some(submissions::PUBLIC_LIST_LIMIT)).await?;
    Ok(Json(list))
}

/// GET /public/api/submissions/mine
pub async fn list_own_submissions(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<Submission>>, ApiError> {
    Ok(Json(submissions::list_user_submissions(&state.db, user.id).await?))
}

/// GET /api/submissions (review queue)
pub async fn list_submissions(
    State(state): State<AppState>,
) -> Result<Json<Vec<Submission>>, ApiError> {
    Ok(Json(submissions::list_submissions(&state.db, None).await?))
}

/// POST /api/submissions/:id/import
pub async fn import_submission(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    payload: Result<Json<TreeInput>, JsonRejection>,
) -> Result<Response, ApiError> {
    let id = ids::parse_input("submission", &id)?;
    let record = json_body(payload)?;

    let tree_id = submissions::import_submission(&state.db, id, &record, user.id).await?;
    let tree = trees::get_tree(&state.db, tree_id, user.scope()).await?;

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "tree": tree }))).into_response())
}

/// DELETE /api/submissions/:id
pub async fn delete_submission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = ids::parse_input("submission", &id)?;
    submissions::delete_submission(&state.db, id).await?;

    Ok(Json(json!({ "success": true })))
}
