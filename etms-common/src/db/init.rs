//! Database initialization
//!
//! Creates the database file on first run, applies connection pragmas and
//! creates every table idempotently before running versioned migrations.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Pragmas set on the options apply to every pooled connection,
    // not just the first one
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    crate::db::migrations::run_migrations(&pool).await?;

    Ok(pool)
}

/// Create all tables (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_users_table(pool).await?;
    create_sessions_table(pool).await?;
    create_user_settings_table(pool).await?;

    // Taxonomy: family -> genus -> species
    create_families_table(pool).await?;
    create_genera_table(pool).await?;
    create_species_table(pool).await?;
    create_locations_table(pool).await?;

    // Observation records
    create_trees_table(pool).await?;
    create_seeds_table(pool).await?;

    // Map presentation
    create_map_layers_table(pool).await?;
    create_pin_styles_table(pool).await?;

    // Public portal
    create_submissions_table(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            guid TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            password_salt TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'app_user'
                CHECK (role IN ('app_user', 'head_user', 'public_user')),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(guid) ON DELETE CASCADE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            expires_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_user_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_settings (
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            user_id TEXT NOT NULL REFERENCES users(guid) ON DELETE CASCADE,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (key, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_families_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS families (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            user_id TEXT REFERENCES users(guid) ON DELETE CASCADE,
            UNIQUE (name, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_genera_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS genera (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            family_id TEXT NOT NULL REFERENCES families(guid) ON DELETE CASCADE,
            description TEXT,
            user_id TEXT REFERENCES users(guid) ON DELETE CASCADE,
            UNIQUE (name, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_species_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS species (
            guid TEXT PRIMARY KEY,
            scientific_name TEXT NOT NULL,
            common_name TEXT NOT NULL,
            genus_id TEXT NOT NULL REFERENCES genera(guid) ON DELETE CASCADE,
            description TEXT,
            is_endemic INTEGER NOT NULL DEFAULT 1,
            conservation_status TEXT,
            user_id TEXT REFERENCES users(guid) ON DELETE CASCADE,
            UNIQUE (scientific_name, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_locations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS locations (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            elevation REAL,
            description TEXT,
            user_id TEXT REFERENCES users(guid) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_trees_table(pool: &SqlitePool) -> Result<()> {
    // The count invariant is also enforced by the schema so that no write
    // path can bypass it
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trees (
            guid TEXT PRIMARY KEY,
            species_id TEXT NOT NULL REFERENCES species(guid) ON DELETE CASCADE,
            location_id TEXT NOT NULL REFERENCES locations(guid) ON DELETE CASCADE,
            population INTEGER NOT NULL CHECK (population >= 0),
            year INTEGER NOT NULL,
            health_status TEXT NOT NULL CHECK (health_status IN
                ('unknown', 'very_poor', 'poor', 'good', 'very_good', 'excellent')),
            healthy_count INTEGER NOT NULL DEFAULT 0 CHECK (healthy_count >= 0),
            good_count INTEGER NOT NULL DEFAULT 0 CHECK (good_count >= 0),
            bad_count INTEGER NOT NULL DEFAULT 0 CHECK (bad_count >= 0),
            deceased_count INTEGER NOT NULL DEFAULT 0 CHECK (deceased_count >= 0),
            hectares REAL NOT NULL DEFAULT 0,
            notes TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            user_id TEXT REFERENCES users(guid) ON DELETE CASCADE,
            UNIQUE (species_id, location_id, year),
            CHECK (healthy_count + good_count + bad_count + deceased_count = population
                   OR (healthy_count + good_count + bad_count + deceased_count = 0))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_seeds_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS seeds (
            guid TEXT PRIMARY KEY,
            species_id TEXT NOT NULL REFERENCES species(guid) ON DELETE CASCADE,
            location_id TEXT NOT NULL REFERENCES locations(guid) ON DELETE CASCADE,
            quantity INTEGER NOT NULL CHECK (quantity > 0),
            planting_date DATE NOT NULL,
            germination_status TEXT NOT NULL DEFAULT 'not_germinated'
                CHECK (germination_status IN ('not_germinated', 'germinating',
                    'partially_germinated', 'fully_germinated', 'failed')),
            germination_date DATE,
            survival_rate REAL CHECK (survival_rate IS NULL OR (survival_rate >= 0 AND survival_rate <= 100)),
            hectares REAL NOT NULL DEFAULT 0,
            expected_maturity_date DATE,
            notes TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            user_id TEXT REFERENCES users(guid) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_map_layers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS map_layers (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            url TEXT NOT NULL,
            layer_type TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            is_default INTEGER NOT NULL DEFAULT 0,
            attribution TEXT,
            z_index INTEGER NOT NULL DEFAULT 0,
            user_id TEXT REFERENCES users(guid) ON DELETE SET NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_pin_styles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pin_styles (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            icon_class TEXT NOT NULL DEFAULT 'fa-tree',
            color TEXT NOT NULL DEFAULT '#4caf50',
            size INTEGER NOT NULL DEFAULT 24,
            border_color TEXT NOT NULL DEFAULT '#ffffff',
            border_width INTEGER NOT NULL DEFAULT 2,
            background_color TEXT NOT NULL DEFAULT 'rgba(0, 0, 0, 0.6)',
            is_default INTEGER NOT NULL DEFAULT 0,
            user_id TEXT REFERENCES users(guid) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_submissions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS submissions (
            guid TEXT PRIMARY KEY,
            tree_description TEXT NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            person_name TEXT NOT NULL,
            user_id TEXT REFERENCES users(guid) ON DELETE SET NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
