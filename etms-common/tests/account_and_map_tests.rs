//! Integration tests for accounts, sessions, settings, pin styles, map
//! layers and analytics queries

use etms_common::analytics;
use etms_common::db::{
    init_database, layers, settings, trees, users, LayerInput, LayerType, PinStyleInput, Role,
    Scope, TreeInput,
};
use etms_common::Error;
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn setup() -> (TempDir, SqlitePool) {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("etms.db")).await.unwrap();
    (dir, pool)
}

#[tokio::test]
async fn test_login_and_session_lifecycle() {
    let (_dir, pool) = setup().await;

    let created = users::create_user(&pool, "alice", "password123", Role::AppUser).await.unwrap();
    assert!(matches!(
        users::create_user(&pool, "alice", "password456", Role::AppUser).await,
        Err(Error::Conflict(_))
    ));

    assert!(matches!(
        users::authenticate(&pool, "alice", "wrong-password").await,
        Err(Error::Unauthorized(_))
    ));
    assert!(matches!(
        users::authenticate(&pool, "nobody", "password123").await,
        Err(Error::Unauthorized(_))
    ));

    let user = users::authenticate(&pool, "alice", "password123").await.unwrap();
    assert_eq!(user, created);
    assert_eq!(users::find_user(&pool, user.id).await.unwrap(), created);

    let session = users::create_session(&pool, &user, 1).await.unwrap();
    assert_eq!(users::resolve_session(&pool, &session.token).await.unwrap(), user);

    assert!(users::revoke_session(&pool, &session.token).await.unwrap());
    assert!(users::resolve_session(&pool, &session.token).await.is_err());
}

#[tokio::test]
async fn test_expired_session_rejected() {
    let (_dir, pool) = setup().await;
    let user = users::create_user(&pool, "alice", "password123", Role::AppUser).await.unwrap();

    let session = users::create_session(&pool, &user, -1).await.unwrap();
    assert!(matches!(
        users::resolve_session(&pool, &session.token).await,
        Err(Error::Unauthorized(_))
    ));
    assert_eq!(users::purge_expired_sessions(&pool).await.unwrap(), 0);
}

#[tokio::test]
async fn test_short_password_rejected() {
    let (_dir, pool) = setup().await;
    assert!(matches!(
        users::create_user(&pool, "bob", "123", Role::PublicUser).await,
        Err(Error::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_settings_defaults_and_overrides() {
    let (_dir, pool) = setup().await;
    let user = users::create_user(&pool, "alice", "password123", Role::AppUser).await.unwrap();

    assert_eq!(
        settings::get_setting(&pool, user.id, settings::THEME_KEY, "light").await.unwrap(),
        "light"
    );

    settings::save_setting(&pool, user.id, settings::THEME_KEY, "dark").await.unwrap();
    settings::save_setting(&pool, user.id, settings::THEME_KEY, "contrast").await.unwrap();

    let all = settings::user_settings(&pool, user.id).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].value, "contrast");
    assert_eq!(all[1].value, settings::DEFAULT_MAP_STYLE);
}

fn pin(name: &str, is_default: bool) -> PinStyleInput {
    let mut input: PinStyleInput =
        serde_json::from_value(serde_json::json!({ "name": name })).unwrap();
    input.is_default = is_default;
    input
}

#[tokio::test]
async fn test_single_default_pin_style() {
    let (_dir, pool) = setup().await;
    let user = users::create_user(&pool, "alice", "password123", Role::AppUser).await.unwrap();

    assert!(settings::default_pin_style(&pool, user.id).await.unwrap().is_none());

    let first = settings::create_pin_style(&pool, user.id, &pin("Green", true)).await.unwrap();
    let second = settings::create_pin_style(&pool, user.id, &pin("Red", true)).await.unwrap();

    let current = settings::default_pin_style(&pool, user.id).await.unwrap().unwrap();
    assert_eq!(current.id, second.to_string());

    settings::set_default_pin_style(&pool, user.id, first).await.unwrap();
    let styles = settings::list_pin_styles(&pool, user.id).await.unwrap();
    assert_eq!(styles.iter().filter(|s| s.is_default).count(), 1);
    assert_eq!(styles[0].id, first.to_string());
}

fn layer(name: &str, layer_type: LayerType, is_default: bool, is_active: bool) -> LayerInput {
    LayerInput {
        name: name.into(),
        description: None,
        url: "https://tiles.example.org/{z}/{x}/{y}.png".into(),
        layer_type,
        is_active,
        is_default,
        attribution: None,
        z_index: 0,
    }
}

#[tokio::test]
async fn test_layer_default_per_type() {
    let (_dir, pool) = setup().await;
    let head = users::create_user(&pool, "head", "password123", Role::HeadUser).await.unwrap();

    let a = layers::create_layer(&pool, &layer("A", LayerType::Satellite, true, true), head.id)
        .await
        .unwrap();
    let b = layers::create_layer(&pool, &layer("B", LayerType::Satellite, true, true), head.id)
        .await
        .unwrap();
    let c = layers::create_layer(&pool, &layer("C", LayerType::Street, true, false), head.id)
        .await
        .unwrap();

    assert!(!layers::get_layer(&pool, a).await.unwrap().is_default);
    assert!(layers::get_layer(&pool, b).await.unwrap().is_default);
    // Other types are untouched
    assert!(layers::get_layer(&pool, c).await.unwrap().is_default);

    assert_eq!(layers::list_layers(&pool, true).await.unwrap().len(), 2);
    assert_eq!(layers::list_layers(&pool, false).await.unwrap().len(), 3);

    layers::delete_layer(&pool, c).await.unwrap();
    assert!(matches!(layers::delete_layer(&pool, c).await, Err(Error::NotFound(_))));
}

fn record(common: &str, scientific: &str, population: u32, year: i32, counts: [u32; 4]) -> TreeInput {
    TreeInput {
        common_name: common.into(),
        scientific_name: scientific.into(),
        family: "Fabaceae".into(),
        genus: scientific.split(' ').next().unwrap_or("Genus").into(),
        latitude: 14.0,
        longitude: 121.0,
        location_name: None,
        population,
        year,
        healthy_count: counts[0],
        good_count: counts[1],
        bad_count: counts[2],
        deceased_count: counts[3],
        hectares: 0.0,
        notes: None,
    }
}

#[tokio::test]
async fn test_analytics_and_dashboard() {
    let (_dir, pool) = setup().await;
    let user = users::create_user(&pool, "alice", "password123", Role::AppUser).await.unwrap();

    for input in [
        record("Narra", "Pterocarpus indicus", 50, 2023, [50, 0, 0, 0]),
        record("Narra", "Pterocarpus indicus", 25, 2024, [25, 0, 0, 0]),
        record("Ipil", "Intsia bijuga", 25, 2024, [0, 0, 20, 5]),
    ] {
        trees::create_tree(&pool, &input, user.id).await.unwrap();
    }

    let report = analytics::analytics(&pool, user.scope()).await.unwrap();

    assert_eq!(report.species_distribution[0].common_name, "Narra");
    assert_eq!(report.species_distribution[0].record_count, 2);
    assert_eq!(report.population_by_year.len(), 2);
    assert_eq!(report.growth_rates[1].growth_rate, 0.0);
    assert_eq!(report.family_distribution[0].population, 100);
    assert_eq!(report.health_distribution[0].health_status, "excellent");
    assert_eq!(report.health_metrics.total, 100);
    assert_eq!(report.health_metrics.healthy_pct, 75.0);
    assert_eq!(report.species_richness[1].species_count, 2);
    assert_eq!(report.biodiversity[1].simpson, 0.5);

    let dashboard = analytics::dashboard(&pool, user.scope()).await.unwrap();
    assert_eq!(dashboard.total_records, 3);
    assert_eq!(dashboard.total_population, 100);
    assert_eq!(dashboard.species_count, 2);
    assert_eq!(dashboard.healthy_records, 2);

    let empty = analytics::dashboard(&pool, Scope::Owner(uuid::Uuid::new_v4())).await.unwrap();
    assert_eq!(empty.total_records, 0);
}
