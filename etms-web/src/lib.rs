//! etms-web library - HTTP API for the Endemic Tree Monitoring Service
//!
//! Three route groups share one router:
//! - public: health, login/signup, sighting submissions (a public user's
//!   own submissions under `/public/api/submissions/mine`)
//! - app portal (`/api`): owner-scoped data entry for app users
//! - head portal (`/head/api`): read-only oversight of every tenant, plus map layers

use axum::Router;
use sqlx::SqlitePool;

pub mod api;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Lifetime of newly issued session tokens
    pub session_ttl_hours: i64,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, session_ttl_hours: i64) -> Self {
        Self { db, session_ttl_hours }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{delete, get, post, put};

    let app_portal = Router::new()
        .route("/api/trees", get(api::trees::list_trees).post(api::trees::create_tree_json))
        .route("/api/trees/form", post(api::trees::create_tree_form))
        .route("/api/trees/import", post(api::trees::import_csv))
        .route("/api/trees/bulk-delete", post(api::trees::bulk_delete))
        .route("/api/trees/delete-all", post(api::trees::delete_all))
        .route("/api/trees/species/:species_id", get(api::trees::list_trees_for_species))
        .route(
            "/api/trees/:id",
            put(api::trees::update_tree).delete(api::trees::delete_tree),
        )
        .route("/api/seeds", get(api::seeds::list_seeds).post(api::seeds::create_seed))
        .route("/api/seeds/bulk-delete", post(api::seeds::bulk_delete))
        .route("/api/seeds/delete-all", post(api::seeds::delete_all))
        .route(
            "/api/seeds/:id",
            put(api::seeds::update_seed).delete(api::seeds::delete_seed),
        )
        .route("/api/species", get(api::lookups::list_species))
        .route("/api/locations", get(api::lookups::list_locations))
        .route("/api/analytics", get(api::analytics::analytics))
        .route("/api/dashboard", get(api::analytics::dashboard))
        .route("/api/layers", get(api::layers::list_active_layers))
        .route(
            "/api/settings",
            get(api::settings::get_settings).post(api::settings::save_settings),
        )
        .route(
            "/api/pin-styles",
            get(api::settings::list_pin_styles).post(api::settings::create_pin_style),
        )
        .route("/api/pin-styles/:id/default", post(api::settings::set_default_pin_style))
        .route("/api/submissions", get(api::submissions::list_submissions))
        .route("/api/submissions/:id/import", post(api::submissions::import_submission))
        .route("/api/submissions/:id", delete(api::submissions::delete_submission))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth::require_app_user,
        ));

    let head_portal = Router::new()
        .route("/head/api/trees", get(api::trees::list_trees))
        .route("/head/api/trees/species/:species_id", get(api::trees::list_trees_for_species))
        .route("/head/api/seeds", get(api::seeds::list_seeds))
        .route("/head/api/species", get(api::lookups::list_species))
        .route("/head/api/locations", get(api::lookups::list_locations))
        .route("/head/api/analytics", get(api::analytics::analytics))
        .route("/head/api/dashboard", get(api::analytics::dashboard))
        .route(
            "/head/api/layers",
            get(api::layers::list_all_layers).post(api::layers::create_layer),
        )
        .route(
            "/head/api/layers/:id",
            put(api::layers::update_layer).delete(api::layers::delete_layer),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth::require_head_user,
        ));

    let signed_in = Router::new()
        .route("/api/auth/logout", post(api::auth::logout))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth::require_session,
        ));

    let public_portal = Router::new()
        .route("/public/api/submissions/mine", get(api::submissions::list_own_submissions))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth::require_public_user,
        ));

    let public = Router::new()
        .route("/api/auth/login", post(api::auth::login))
        .route("/api/auth/signup", post(api::auth::signup))
        .route(
            "/public/api/submissions",
            get(api::submissions::list_public_submissions)
                .post(api::submissions::create_submission),
        )
        .merge(api::health_routes());

    Router::new()
        .merge(app_portal)
        .merge(head_portal)
        .merge(signed_in)
        .merge(public_portal)
        .merge(public)
        .with_state(state)
}
