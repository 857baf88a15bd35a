//! Database schema migrations
//!
//! Versioned, idempotent migrations tracked in the `schema_version` table.
//! Tables themselves are created by [`crate::db::init::create_schema`];
//! migrations handle anything `CREATE TABLE IF NOT EXISTS` cannot.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - databases in the field already ran them
//! 2. **Always add new migrations** - one function per schema change
//! 3. **Stay idempotent** - check before altering

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 3;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        warn!("This may indicate a downgrade. Proceeding with caution.");
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("✓ Migration v2 completed");
    }

    if current_version < 3 {
        migrate_v3(pool).await?;
        set_schema_version(pool, 3).await?;
        info!("✓ Migration v3 completed");
    }

    info!("All migrations completed successfully");
    Ok(())
}

/// Migration v1: lookup indexes for year and planting date filters
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: Add year / planting_date indexes");

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_trees_year ON trees(year)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_trees_user ON trees(user_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_seeds_planting_date ON seeds(planting_date)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_seeds_user ON seeds(user_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Migration v2: empty distributions classify as `unknown`
///
/// Older rows with zero population carried a `good` default status.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v2: Mark zero-population records as unknown");

    let result = sqlx::query(
        r#"
        UPDATE trees SET health_status = 'unknown', updated_at = CURRENT_TIMESTAMP
        WHERE population = 0
          AND healthy_count + good_count + bad_count + deceased_count = 0
          AND health_status != 'unknown'
        "#,
    )
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        info!("  ✓ Reclassified {} zero-population records", result.rows_affected());
    }

    Ok(())
}

/// Migration v3: submissions remember the signed-in submitter
async fn migrate_v3(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v3: Add submissions.user_id");

    let has_column: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM pragma_table_info('submissions') WHERE name = 'user_id')",
    )
    .fetch_one(pool)
    .await?;

    if has_column {
        info!("  ✓ submissions.user_id already present");
    } else {
        sqlx::query(
            "ALTER TABLE submissions ADD COLUMN user_id TEXT REFERENCES users(guid) ON DELETE SET NULL",
        )
        .execute(pool)
        .await?;
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_submissions_user ON submissions(user_id)")
        .execute(pool)
        .await?;

    Ok(())
}
