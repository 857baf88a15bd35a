//! Session authentication and role checks
//!
//! Clients send `Authorization: Bearer <token>`. The middleware resolves the
//! token to a [`User`] and stores it in the request extensions for handlers.

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};
use etms_common::db::users;
use etms_common::db::{Role, User};
use etms_common::Error;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::{json_body, ApiError};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Bearer token from the Authorization header
fn bearer_token(request: &Request) -> Option<&str> {
    bearer_from_headers(request.headers())
}

fn bearer_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve the session and, when `role` is given, enforce it
async fn authorize(
    state: &AppState,
    mut request: Request,
    next: Next,
    role: Option<Role>,
) -> Result<Response, ApiError> {
    let token = bearer_token(&request)
        .ok_or_else(|| Error::Unauthorized("Authentication required".to_string()))?
        .to_string();

    let user = users::resolve_session(&state.db, &token).await?;

    if let Some(required) = role {
        if user.role != required {
            warn!(
                username = %user.username,
                role = %user.role,
                required = %required,
                path = %request.uri().path(),
                "Role not permitted"
            );
            return Err(Error::Forbidden(format!("This resource requires the {} role", required)).into());
        }
    }

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Any signed-in user
pub async fn require_session(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&state, request, next, None).await
}

/// App portal routes
pub async fn require_app_user(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&state, request, next, Some(Role::AppUser)).await
}

/// Head portal routes
pub async fn require_head_user(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&state, request, next, Some(Role::HeadUser)).await
}

/// Public portal routes that need a signed-in public user
pub async fn require_public_user(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&state, request, next, Some(Role::PublicUser)).await
}

/// User behind an optional bearer token
///
/// No header means anonymous; a header with a bad or expired token is rejected.
pub async fn optional_user(state: &AppState, headers: &HeaderMap) -> Result<Option<User>, ApiError> {
    match bearer_from_headers(headers) {
        Some(token) => Ok(Some(users::resolve_session(&state.db, token).await?)),
        None => Ok(None),
    }
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let credentials = json_body(payload)?;

    let user = users::authenticate(&state.db, &credentials.username, &credentials.password).await?;
    let session = users::create_session(&state.db, &user, state.session_ttl_hours).await?;

    Ok(Json(json!({
        "success": true,
        "token": session.token,
        "expires_at": session.expires_at,
        "user": session.user,
    })))
}

/// POST /api/auth/signup
///
/// Self-service accounts are always public users. They submit sightings
/// under their name and can list their own submissions.
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Response, ApiError> {
    let credentials = json_body(payload)?;

    let user =
        users::create_user(&state.db, &credentials.username, &credentials.password, Role::PublicUser)
            .await?;
    info!(username = %user.username, "Public signup");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "user": user })),
    )
        .into_response())
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    request: Request,
) -> Result<Json<serde_json::Value>, ApiError> {
    if let Some(token) = bearer_token(&request) {
        users::revoke_session(&state.db, token).await?;
    }
    info!(username = %user.username, "Signed out");

    Ok(Json(json!({ "success": true })))
}
