//! Seed planting record repository

use crate::db::models::{
    require_text, validate_coordinates, GerminationStatus, Scope, SeedInput, SeedUpdate, SeedView,
};
use crate::db::taxonomy::{self, CleanupReport, TaxonomyNames};
use crate::db::trees::{cleanup_after_delete, push_unique, DeleteReport};
use crate::{ids, Error, Result};
use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

const SEED_VIEW_SELECT: &str = r#"
    SELECT sd.guid AS id, sd.species_id, s.common_name, s.scientific_name,
           g.name AS genus, f.name AS family,
           sd.location_id, l.name AS location_name, l.latitude, l.longitude,
           sd.quantity, sd.planting_date, sd.germination_status, sd.germination_date,
           sd.survival_rate, sd.hectares, sd.expected_maturity_date, sd.notes,
           u.username AS owner
    FROM seeds sd
    JOIN species s ON s.guid = sd.species_id
    JOIN genera g ON g.guid = s.genus_id
    JOIN families f ON f.guid = g.family_id
    JOIN locations l ON l.guid = sd.location_id
    LEFT JOIN users u ON u.guid = sd.user_id
"#;

/// Rules shared by create and update
fn validate_planting(
    quantity: u32,
    planting_date: NaiveDate,
    germination_date: Option<NaiveDate>,
    survival_rate: Option<f64>,
    hectares: f64,
) -> Result<()> {
    if quantity == 0 {
        return Err(Error::InvalidInput("Quantity must be greater than zero".to_string()));
    }

    if let Some(rate) = survival_rate {
        if !(0.0..=100.0).contains(&rate) {
            return Err(Error::InvalidInput(format!(
                "Survival rate must be between 0 and 100 (got {})",
                rate
            )));
        }
    }

    if let Some(germinated) = germination_date {
        if germinated < planting_date {
            return Err(Error::InvalidInput(format!(
                "Germination date {} is before planting date {}",
                germinated, planting_date
            )));
        }
    }

    if !hectares.is_finite() || hectares < 0.0 {
        return Err(Error::InvalidInput(format!(
            "Hectares must be a non-negative number (got {})",
            hectares
        )));
    }

    Ok(())
}

pub fn validate_seed_input(input: &SeedInput) -> Result<()> {
    require_text("common_name", &input.common_name)?;
    require_text("scientific_name", &input.scientific_name)?;
    require_text("family", &input.family)?;
    require_text("genus", &input.genus)?;
    validate_coordinates(input.latitude, input.longitude)?;
    validate_planting(
        input.quantity,
        input.planting_date,
        input.germination_date,
        input.survival_rate,
        input.hectares,
    )
}

pub async fn create_seed(pool: &SqlitePool, input: &SeedInput, owner: Uuid) -> Result<Uuid> {
    validate_seed_input(input)?;

    let mut tx = pool.begin().await?;

    let species_id = taxonomy::resolve_species(
        &mut tx,
        TaxonomyNames {
            family: input.family.trim(),
            genus: input.genus.trim(),
            scientific_name: input.scientific_name.trim(),
            common_name: input.common_name.trim(),
        },
        Some(owner),
    )
    .await?;

    let (location_id, _) = taxonomy::get_or_create_location(
        &mut tx,
        input.latitude,
        input.longitude,
        &format!("{} Planting Site", input.common_name.trim()),
        Some(owner),
    )
    .await?;

    let id = ids::generate();
    sqlx::query(
        r#"
        INSERT INTO seeds (
            guid, species_id, location_id, quantity, planting_date, germination_status,
            germination_date, survival_rate, hectares, expected_maturity_date, notes, user_id
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(&species_id)
    .bind(&location_id)
    .bind(input.quantity)
    .bind(input.planting_date)
    .bind(input.germination_status.as_str())
    .bind(input.germination_date)
    .bind(input.survival_rate)
    .bind(input.hectares)
    .bind(input.expected_maturity_date)
    .bind(&input.notes)
    .bind(owner.to_string())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(
        seed_id = %id,
        species = %input.scientific_name,
        quantity = input.quantity,
        "Created seed planting record"
    );

    Ok(id)
}

pub async fn get_seed(pool: &SqlitePool, id: Uuid, scope: Scope) -> Result<SeedView> {
    let owner = scope.owner_id();
    let sql = format!(
        "{} WHERE sd.guid = ? AND (? IS NULL OR sd.user_id = ?)",
        SEED_VIEW_SELECT
    );

    sqlx::query_as::<_, SeedView>(&sql)
        .bind(id.to_string())
        .bind(&owner)
        .bind(&owner)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Seed record {}", id)))
}

/// Newest plantings first
pub async fn list_seeds(pool: &SqlitePool, scope: Scope) -> Result<Vec<SeedView>> {
    let owner = scope.owner_id();
    let sql = format!(
        "{} WHERE (? IS NULL OR sd.user_id = ?) ORDER BY sd.planting_date DESC, s.common_name",
        SEED_VIEW_SELECT
    );

    let seeds = sqlx::query_as::<_, SeedView>(&sql)
        .bind(&owner)
        .bind(&owner)
        .fetch_all(pool)
        .await?;

    Ok(seeds)
}

pub async fn update_seed(
    pool: &SqlitePool,
    id: Uuid,
    update: &SeedUpdate,
    scope: Scope,
) -> Result<CleanupReport> {
    validate_coordinates(update.latitude, update.longitude)?;
    validate_planting(
        update.quantity,
        update.planting_date,
        update.germination_date,
        update.survival_rate,
        update.hectares,
    )?;

    let owner = scope.owner_id();
    let mut tx = pool.begin().await?;

    let current: Option<(String, String, Option<String>)> = sqlx::query_as(
        "SELECT species_id, location_id, user_id FROM seeds WHERE guid = ? AND (? IS NULL OR user_id = ?)",
    )
    .bind(id.to_string())
    .bind(&owner)
    .bind(&owner)
    .fetch_optional(&mut *tx)
    .await?;
    let (old_species, old_location, record_owner) =
        current.ok_or_else(|| Error::NotFound(format!("Seed record {}", id)))?;

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

    let record_owner = match record_owner {
        Some(o) => Some(ids::parse_stored(&o)?),
        None => None,
    };
    let (new_location, _) = taxonomy::get_or_create_location(
        &mut tx,
        update.latitude,
        update.longitude,
        &format!("{} Planting Site", common_name),
        record_owner,
    )
    .await?;

    sqlx::query(
        r#"
        UPDATE seeds SET
            species_id = ?, location_id = ?, quantity = ?, planting_date = ?,
            germination_status = ?, germination_date = ?, survival_rate = ?,
            hectares = ?, expected_maturity_date = ?, notes = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE guid = ?
        "#,
    )
    .bind(&new_species)
    .bind(&new_location)
    .bind(update.quantity)
    .bind(update.planting_date)
    .bind(update.germination_status.as_str())
    .bind(update.germination_date)
    .bind(update.survival_rate)
    .bind(update.hectares)
    .bind(update.expected_maturity_date)
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

    info!(seed_id = %id, "Updated seed planting record");
    Ok(cleanup)
}

pub async fn delete_seed(pool: &SqlitePool, id: Uuid, scope: Scope) -> Result<DeleteReport> {
    let report = delete_seeds(pool, &[id], scope).await?;

    if report.deleted_count == 0 {
        return Err(Error::NotFound(format!("Seed record {}", id)));
    }

    Ok(report)
}

/// Ids not visible under `scope` are skipped
pub async fn delete_seeds(pool: &SqlitePool, ids: &[Uuid], scope: Scope) -> Result<DeleteReport> {
    if ids.is_empty() {
        return Err(Error::InvalidInput("No seed IDs provided".to_string()));
    }

    let owner = scope.owner_id();
    let mut tx = pool.begin().await?;
    let mut report = DeleteReport::default();
    let mut locations = Vec::new();
    let mut species = Vec::new();

    for id in ids {
        let row: Option<(String, String)> = sqlx::query_as(
            r#"
            DELETE FROM seeds WHERE guid = ? AND (? IS NULL OR user_id = ?)
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
            None => warn!(seed_id = %id, "Seed not found for delete; skipping"),
        }
    }

    cleanup_after_delete(&mut tx, &locations, &species, &mut report.cleanup).await?;
    tx.commit().await?;

    info!(deleted = report.deleted_count, "Deleted seed records");
    Ok(report)
}

pub async fn delete_all_seeds(pool: &SqlitePool, scope: Scope) -> Result<DeleteReport> {
    let owner = scope.owner_id();
    let mut tx = pool.begin().await?;
    let mut report = DeleteReport::default();

    let removed: Vec<(String, String)> = sqlx::query_as(
        "DELETE FROM seeds WHERE (? IS NULL OR user_id = ?) RETURNING species_id, location_id",
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

    info!(deleted = report.deleted_count, "Deleted all seed records in scope");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let result = validate_planting(0, date("2024-03-01"), None, None, 0.0);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_survival_rate_bounds() {
        let planted = date("2024-03-01");
        assert!(validate_planting(10, planted, None, Some(0.0), 0.0).is_ok());
        assert!(validate_planting(10, planted, None, Some(100.0), 0.0).is_ok());
        assert!(validate_planting(10, planted, None, Some(100.5), 0.0).is_err());
        assert!(validate_planting(10, planted, None, Some(-1.0), 0.0).is_err());
    }

    #[test]
    fn test_germination_before_planting_rejected() {
        let planted = date("2024-03-01");
        assert!(validate_planting(10, planted, Some(date("2024-02-28")), None, 0.0).is_err());
        assert!(validate_planting(10, planted, Some(planted), None, 0.0).is_ok());
    }

    #[test]
    fn test_default_germination_status() {
        assert_eq!(GerminationStatus::default().as_str(), "not_germinated");
    }
}
