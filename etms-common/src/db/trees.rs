//! Endemic tree record repository
//!
//! Every write builds a [`HealthDistribution`] first, so counts are
//! validated and the status classified before any SQL runs. Deletes are
//! followed by location and taxonomy orphan cleanup in the same transaction.

use crate::db::models::{
    validate_coordinates, require_text, LocationSummary, Scope, SpeciesSummary, TreeInput,
    TreeUpdate, TreeView,
};
use crate::db::taxonomy::{self, CleanupReport, TaxonomyNames};
use crate::health::{backfill, HealthDistribution};
use crate::{ids, Error, Result};
use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

const TREE_VIEW_SELECT: &str = r#"
    SELECT t.guid AS id, t.species_id, s.common_name, s.scientific_name,
           g.name AS genus, f.name AS family,
           t.location_id, l.name AS location_name, l.latitude, l.longitude,
           t.population, t.year, t.health_status,
           t.healthy_count, t.good_count, t.bad_count, t.deceased_count,
           t.hectares, t.notes, u.username AS owner,
           CAST(t.created_at AS TEXT) AS created_at, CAST(t.updated_at AS TEXT) AS updated_at
    FROM trees t
    JOIN species s ON s.guid = t.species_id
    JOIN genera g ON g.guid = s.genus_id
    JOIN families f ON f.guid = g.family_id
    JOIN locations l ON l.guid = t.location_id
    LEFT JOIN users u ON u.guid = t.user_id
"#;

/// Result of a delete operation
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DeleteReport {
    pub deleted_count: u64,
    pub cleanup: CleanupReport,
}

/// Validate a submitted tree record and derive its health distribution
pub fn validate_tree_input(input: &TreeInput) -> Result<HealthDistribution> {
    require_text("common_name", &input.common_name)?;
    require_text("scientific_name", &input.scientific_name)?;
    require_text("family", &input.family)?;
    require_text("genus", &input.genus)?;
    validate_coordinates(input.latitude, input.longitude)?;
    validate_hectares(input.hectares)?;

    let distribution = HealthDistribution::new(
        input.population,
        input.healthy_count,
        input.good_count,
        input.bad_count,
        input.deceased_count,
    )?;

    Ok(distribution)
}

fn validate_hectares(hectares: f64) -> Result<()> {
    if !hectares.is_finite() || hectares < 0.0 {
        return Err(Error::InvalidInput(format!(
            "Hectares must be a non-negative number (got {})",
            hectares
        )));
    }
    Ok(())
}

/// Create a tree record, resolving taxonomy and location on the way
pub async fn create_tree(pool: &SqlitePool, input: &TreeInput, owner: Uuid) -> Result<Uuid> {
    let distribution = validate_tree_input(input)?;

    let mut tx = pool.begin().await?;
    let id = insert_tree(&mut tx, input, distribution, owner).await?;
    tx.commit().await?;

    Ok(id)
}

/// Insert inside an existing transaction
///
/// `distribution` must come from [`validate_tree_input`] on the same input.
pub async fn insert_tree(
    tx: &mut Transaction<'_, Sqlite>,
    input: &TreeInput,
    distribution: HealthDistribution,
    owner: Uuid,
) -> Result<Uuid> {
    let species_id = taxonomy::resolve_species(
        tx,
        TaxonomyNames {
            family: input.family.trim(),
            genus: input.genus.trim(),
            scientific_name: input.scientific_name.trim(),
            common_name: input.common_name.trim(),
        },
        Some(owner),
    )
    .await?;

    let default_name = input
        .location_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| format!("{} Location", input.common_name.trim()));
    let (location_id, _) = taxonomy::get_or_create_location(
        tx,
        input.latitude,
        input.longitude,
        &default_name,
        Some(owner),
    )
    .await?;

    ensure_unique_observation(tx, &species_id, &location_id, input.year, None).await?;

    let id = ids::generate();
    sqlx::query(
        r#"
        INSERT INTO trees (
            guid, species_id, location_id, population, year, health_status,
            healthy_count, good_count, bad_count, deceased_count,
            hectares, notes, user_id
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(&species_id)
    .bind(&location_id)
    .bind(distribution.population())
    .bind(input.year)
    .bind(distribution.status().as_str())
    .bind(distribution.healthy())
    .bind(distribution.good())
    .bind(distribution.bad())
    .bind(distribution.deceased())
    .bind(input.hectares)
    .bind(&input.notes)
    .bind(owner.to_string())
    .execute(&mut **tx)
    .await?;

    info!(
        tree_id = %id,
        species = %input.scientific_name,
        population = distribution.population(),
        status = %distribution.status(),
        "Created tree record"
    );

    Ok(id)
}

/// One record per (species, location, year)
async fn ensure_unique_observation(
    tx: &mut Transaction<'_, Sqlite>,
    species_id: &str,
    location_id: &str,
    year: i32,
    exclude_id: Option<&str>,
) -> Result<()> {
    let existing: Option<String> = sqlx::query_scalar(
        r#"
        SELECT guid FROM trees
        WHERE species_id = ? AND location_id = ? AND year = ? AND guid IS NOT ?
        "#,
    )
    .bind(species_id)
    .bind(location_id)
    .bind(year)
    .bind(exclude_id)
    .fetch_optional(&mut **tx)
    .await?;

    if existing.is_some() {
        return Err(Error::Conflict(format!(
            "A record for this species and location already exists for {}",
            year
        )));
    }

    Ok(())
}

/// Fetch one tree visible under `scope`
pub async fn get_tree(pool: &SqlitePool, id: Uuid, scope: Scope) -> Result<TreeView> {
    let owner = scope.owner_id();
    let sql = format!(
        "{} WHERE t.guid = ? AND (? IS NULL OR t.user_id = ?)",
        TREE_VIEW_SELECT
    );

    sqlx::query_as::<_, TreeView>(&sql)
        .bind(id.to_string())
        .bind(&owner)
        .bind(&owner)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Tree record {}", id)))
}

/// List trees visible under `scope`, optionally for one species
pub async fn list_trees(
    pool: &SqlitePool,
    scope: Scope,
    species_id: Option<Uuid>,
) -> Result<Vec<TreeView>> {
    let owner = scope.owner_id();
    let species = species_id.map(|s| s.to_string());
    let sql = format!(
        r#"{}
        WHERE (? IS NULL OR t.user_id = ?)
          AND (? IS NULL OR t.species_id = ?)
        ORDER BY s.common_name, t.year DESC"#,
        TREE_VIEW_SELECT
    );

    let trees = sqlx::query_as::<_, TreeView>(&sql)
        .bind(&owner)
        .bind(&owner)
        .bind(&species)
        .bind(&species)
        .fetch_all(pool)
        .await?;

    Ok(trees)
}

/// Full edit of a tree record
///
/// A move to new coordinates or a different species cleans up whatever
/// the old values left orphaned.
pub async fn update_tree(
    pool: &SqlitePool,
    id: Uuid,
    update: &TreeUpdate,
    scope: Scope,
) -> Result<CleanupReport> {
    validate_coordinates(update.latitude, update.longitude)?;
    validate_hectares(update.hectares)?;
    let distribution = HealthDistribution::new(
        update.population,
        update.healthy_count,
        update.good_count,
        update.bad_count,
        update.deceased_count,
    )?;

    let owner = scope.owner_id();
    let mut tx = pool.begin().await?;

    let current: Option<(String, String, Option<String>)> = sqlx::query_as(
        "SELECT species_id, location_id, user_id FROM trees WHERE guid = ? AND (? IS NULL OR user_id = ?)",
    )
    .bind(id.to_string())
    .bind(&owner)
    .bind(&owner)
    .fetch_optional(&mut *tx)
    .await?;
    let (old_species, old_location, record_owner) =
        current.ok_or_else(|| Error::NotFound(format!("Tree record {}", id)))?;

    // New species must be visible to the editor as well
    let species: Option<(String, String)> = sqlx::query_as(
        "SELECT guid, common_name FROM species WHERE guid = ? AND (? IS NULL OR user_id = ?)",
    )
    .bind(update.species_id.to_string())
    .bind(&owner)
    .bind(&owner)
    .fetch_optional(&mut *tx)
    .await?;
    let (new_species, common_name) =
        species.ok_or_else(|| Error::NotFound(format!("Species {}", update.species_id)))?;

    // Locations belong to the record owner, not the editor
    let record_owner = match record_owner {
        Some(o) => Some(ids::parse_stored(&o)?),
        None => None,
    };
    let (new_location, _) = taxonomy::get_or_create_location(
        &mut tx,
        update.latitude,
        update.longitude,
        &format!("{} Location", common_name),
        record_owner,
    )
    .await?;

    ensure_unique_observation(
        &mut tx,
        &new_species,
        &new_location,
        update.year,
        Some(&id.to_string()),
    )
    .await?;

    sqlx::query(
        r#"
        UPDATE trees SET
            species_id = ?, location_id = ?, population = ?, year = ?, health_status = ?,
            healthy_count = ?, good_count = ?, bad_count = ?, deceased_count = ?,
            hectares = ?, notes = ?, updated_at = CURRENT_TIMESTAMP
        WHERE guid = ?
        "#,
    )
    .bind(&new_species)
    .bind(&new_location)
    .bind(distribution.population())
    .bind(update.year)
    .bind(distribution.status().as_str())
    .bind(distribution.healthy())
    .bind(distribution.good())
    .bind(distribution.bad())
    .bind(distribution.deceased())
    .bind(update.hectares)
    .bind(&update.notes)
    .bind(id.to_string())
    .execute(&mut *tx)
    .await?;

    let mut cleanup = CleanupReport::default();
    if old_location != new_location {
        taxonomy::delete_location_if_unreferenced(&mut tx, &old_location, &mut cleanup).await?;
    }
    if old_species != new_species {
        taxonomy::cleanup_from_species(&mut tx, &old_species, &mut cleanup).await?;
    }

    tx.commit().await?;

    info!(
        tree_id = %id,
        status = %distribution.status(),
        "Updated tree record"
    );

    Ok(cleanup)
}

/// Delete one tree record
pub async fn delete_tree(pool: &SqlitePool, id: Uuid, scope: Scope) -> Result<DeleteReport> {
    let report = delete_trees(pool, &[id], scope).await?;

    if report.deleted_count == 0 {
        return Err(Error::NotFound(format!("Tree record {}", id)));
    }

    Ok(report)
}

/// Delete several tree records; ids not visible under `scope` are skipped
pub async fn delete_trees(pool: &SqlitePool, ids: &[Uuid], scope: Scope) -> Result<DeleteReport> {
    if ids.is_empty() {
        return Err(Error::InvalidInput("No tree IDs provided".to_string()));
    }

    let owner = scope.owner_id();
    let mut tx = pool.begin().await?;
    let mut report = DeleteReport::default();
    let mut locations = Vec::new();
    let mut species = Vec::new();

    for id in ids {
        let row: Option<(String, String)> = sqlx::query_as(
            r#"
            DELETE FROM trees WHERE guid = ? AND (? IS NULL OR user_id = ?)
            RETURNING species_id, location_id
            "#,
        )
        .bind(id.to_string())
        .bind(&owner)
        .bind(&owner)
        .fetch_optional(&mut *tx)
        .await?;

        match row {
            Some((species_id, location_id)) => {
                report.deleted_count += 1;
                push_unique(&mut species, species_id);
                push_unique(&mut locations, location_id);
            }
            None => warn!(tree_id = %id, "Tree not found for delete; skipping"),
        }
    }

    cleanup_after_delete(&mut tx, &locations, &species, &mut report.cleanup).await?;
    tx.commit().await?;

    info!(deleted = report.deleted_count, "Deleted tree records");
    Ok(report)
}

/// Delete every tree record visible under `scope`
pub async fn delete_all_trees(pool: &SqlitePool, scope: Scope) -> Result<DeleteReport> {
    let owner = scope.owner_id();
    let mut tx = pool.begin().await?;
    let mut report = DeleteReport::default();

    let removed: Vec<(String, String)> = sqlx::query_as(
        "DELETE FROM trees WHERE (? IS NULL OR user_id = ?) RETURNING species_id, location_id",
    )
    .bind(&owner)
    .bind(&owner)
    .fetch_all(&mut *tx)
    .await?;

    let mut locations = Vec::new();
    let mut species = Vec::new();
    for (species_id, location_id) in removed {
        report.deleted_count += 1;
        push_unique(&mut species, species_id);
        push_unique(&mut locations, location_id);
    }

    cleanup_after_delete(&mut tx, &locations, &species, &mut report.cleanup).await?;
    tx.commit().await?;

    info!(deleted = report.deleted_count, "Deleted all tree records in scope");
    Ok(report)
}

/// Location then taxonomy cleanup after trees or seeds are removed
pub(crate) async fn cleanup_after_delete(
    tx: &mut Transaction<'_, Sqlite>,
    locations: &[String],
    species: &[String],
    report: &mut CleanupReport,
) -> Result<()> {
    for location_id in locations {
        taxonomy::delete_location_if_unreferenced(tx, location_id, report).await?;
    }
    for species_id in species {
        taxonomy::cleanup_from_species(tx, species_id, report).await?;
    }
    Ok(())
}

pub(crate) fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

// ========================================
// Maintenance
// ========================================

/// Outcome of [`backfill_legacy_distributions`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub examined: u64,
    pub updated: u64,
}

/// Fill counts for records that only carry a population and a status label
///
/// Applies [`crate::health::backfill`] to every tree whose four counts are
/// zero while its population is not. Each record's status is re-derived.
pub async fn backfill_legacy_distributions(pool: &SqlitePool) -> Result<BackfillReport> {
    let mut tx = pool.begin().await?;

    let legacy: Vec<(String, String, i64)> = sqlx::query_as(
        r#"
        SELECT guid, health_status, population FROM trees
        WHERE population > 0
          AND healthy_count = 0 AND good_count = 0 AND bad_count = 0 AND deceased_count = 0
        "#,
    )
    .fetch_all(&mut *tx)
    .await?;

    let mut report = BackfillReport { examined: legacy.len() as u64, updated: 0 };

    for (id, label, population) in legacy {
        let population = u32::try_from(population).map_err(|_| {
            Error::Internal(format!("Tree {} has out-of-range population {}", id, population))
        })?;
        let distribution = backfill::distribution_from_label(&label, population)?;

        sqlx::query(
            r#"
            UPDATE trees SET
                healthy_count = ?, good_count = ?, bad_count = ?, deceased_count = ?,
                health_status = ?, updated_at = CURRENT_TIMESTAMP
            WHERE guid = ?
            "#,
        )
        .bind(distribution.healthy())
        .bind(distribution.good())
        .bind(distribution.bad())
        .bind(distribution.deceased())
        .bind(distribution.status().as_str())
        .bind(&id)
        .execute(&mut *tx)
        .await?;

        info!(
            tree_id = %id,
            old_status = %label,
            new_status = %distribution.status(),
            "Backfilled health distribution"
        );
        report.updated += 1;
    }

    tx.commit().await?;
    Ok(report)
}

// ========================================
// Lookups
// ========================================

/// Species visible under `scope`, by common name
pub async fn list_species(pool: &SqlitePool, scope: Scope) -> Result<Vec<SpeciesSummary>> {
    let owner = scope.owner_id();

    let species = sqlx::query_as::<_, SpeciesSummary>(
        r#"
        SELECT s.guid AS id, s.scientific_name, s.common_name,
               g.name AS genus, f.name AS family, s.is_endemic, s.conservation_status
        FROM species s
        JOIN genera g ON g.guid = s.genus_id
        JOIN families f ON f.guid = g.family_id
        WHERE (? IS NULL OR s.user_id = ?)
        ORDER BY s.common_name
        "#,
    )
    .bind(&owner)
    .bind(&owner)
    .fetch_all(pool)
    .await?;

    Ok(species)
}

/// Locations visible under `scope`, by name
pub async fn list_locations(pool: &SqlitePool, scope: Scope) -> Result<Vec<LocationSummary>> {
    let owner = scope.owner_id();

    let locations = sqlx::query_as::<_, LocationSummary>(
        r#"
        SELECT guid AS id, name, latitude, longitude, elevation
        FROM locations
        WHERE (? IS NULL OR user_id = ?)
        ORDER BY name
        "#,
    )
    .bind(&owner)
    .bind(&owner)
    .fetch_all(pool)
    .await?;

    Ok(locations)
}

/// Check that a species exists and is visible under `scope`
pub async fn species_exists(pool: &SqlitePool, species_id: Uuid, scope: Scope) -> Result<bool> {
    let owner = scope.owner_id();
    let found: Option<String> = sqlx::query_scalar(
        "SELECT guid FROM species WHERE guid = ? AND (? IS NULL OR user_id = ?)",
    )
    .bind(species_id.to_string())
    .bind(&owner)
    .bind(&owner)
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}
