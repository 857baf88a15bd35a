//! Taxonomy and location repository
//!
//! Family -> genus -> species rows are created on demand by the write paths
//! (get-or-create keyed per owner) and removed again once nothing refers to
//! them. Removal goes bottom-up through [`delete_if_unreferenced`], one
//! level at a time, inside the caller's transaction.

use crate::ids;
use crate::{Error, Result};
use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

/// Names identifying a species and its parents
#[derive(Debug, Clone, Copy)]
pub struct TaxonomyNames<'a> {
    pub family: &'a str,
    pub genus: &'a str,
    pub scientific_name: &'a str,
    pub common_name: &'a str,
}

/// Level in the taxonomy hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxonLevel {
    Species,
    Genus,
    Family,
}

impl TaxonLevel {
    fn table(self) -> &'static str {
        match self {
            TaxonLevel::Species => "species",
            TaxonLevel::Genus => "genera",
            TaxonLevel::Family => "families",
        }
    }

    /// Next level up, if any
    pub fn parent(self) -> Option<TaxonLevel> {
        match self {
            TaxonLevel::Species => Some(TaxonLevel::Genus),
            TaxonLevel::Genus => Some(TaxonLevel::Family),
            TaxonLevel::Family => None,
        }
    }

    /// Number of rows that keep this record alive
    async fn reference_count(self, tx: &mut Transaction<'_, Sqlite>, id: &str) -> Result<i64> {
        let count: i64 = match self {
            TaxonLevel::Species => {
                sqlx::query_scalar(
                    r#"
                    SELECT (SELECT COUNT(*) FROM trees WHERE species_id = ?)
                         + (SELECT COUNT(*) FROM seeds WHERE species_id = ?)
                    "#,
                )
                .bind(id)
                .bind(id)
                .fetch_one(&mut **tx)
                .await?
            }
            TaxonLevel::Genus => {
                sqlx::query_scalar("SELECT COUNT(*) FROM species WHERE genus_id = ?")
                    .bind(id)
                    .fetch_one(&mut **tx)
                    .await?
            }
            TaxonLevel::Family => {
                sqlx::query_scalar("SELECT COUNT(*) FROM genera WHERE family_id = ?")
                    .bind(id)
                    .fetch_one(&mut **tx)
                    .await?
            }
        };

        Ok(count)
    }

    async fn parent_id(self, tx: &mut Transaction<'_, Sqlite>, id: &str) -> Result<Option<String>> {
        let sql = match self {
            TaxonLevel::Species => "SELECT genus_id FROM species WHERE guid = ?",
            TaxonLevel::Genus => "SELECT family_id FROM genera WHERE guid = ?",
            TaxonLevel::Family => return Ok(None),
        };

        let parent: Option<String> = sqlx::query_scalar(sql)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(parent)
    }
}

/// Result of a single delete-if-unreferenced check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// Still referenced (or already gone); nothing deleted
    Retained,
    /// Row deleted; `parent` is the next level's id to check
    Deleted { parent: Option<String> },
}

/// Rows removed by orphan cleanup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub species: u64,
    pub genera: u64,
    pub families: u64,
    pub locations: u64,
}

impl CleanupReport {
    fn record(&mut self, level: TaxonLevel) {
        match level {
            TaxonLevel::Species => self.species += 1,
            TaxonLevel::Genus => self.genera += 1,
            TaxonLevel::Family => self.families += 1,
        }
    }

    pub fn merge(&mut self, other: CleanupReport) {
        self.species += other.species;
        self.genera += other.genera;
        self.families += other.families;
        self.locations += other.locations;
    }
}

/// Delete one taxonomy row if its reference count is zero
pub async fn delete_if_unreferenced(
    tx: &mut Transaction<'_, Sqlite>,
    level: TaxonLevel,
    id: &str,
) -> Result<CleanupOutcome> {
    if level.reference_count(tx, id).await? > 0 {
        return Ok(CleanupOutcome::Retained);
    }

    let parent = level.parent_id(tx, id).await?;

    let sql = format!("DELETE FROM {} WHERE guid = ?", level.table());
    let result = sqlx::query(&sql).bind(id).execute(&mut **tx).await?;

    if result.rows_affected() == 0 {
        return Ok(CleanupOutcome::Retained);
    }

    debug!(table = level.table(), id, "Deleted orphaned taxonomy record");
    Ok(CleanupOutcome::Deleted { parent })
}

/// Walk up from `level`/`id`, deleting each level while it is unreferenced
pub async fn cleanup_from(
    tx: &mut Transaction<'_, Sqlite>,
    level: TaxonLevel,
    id: &str,
    report: &mut CleanupReport,
) -> Result<()> {
    let mut next = Some((level, id.to_string()));

    while let Some((level, id)) = next.take() {
        match delete_if_unreferenced(tx, level, &id).await? {
            CleanupOutcome::Retained => break,
            CleanupOutcome::Deleted { parent } => {
                report.record(level);
                next = level.parent().zip(parent);
            }
        }
    }

    Ok(())
}

/// Species -> genus -> family cascade after a tree or seed delete
pub async fn cleanup_from_species(
    tx: &mut Transaction<'_, Sqlite>,
    species_id: &str,
    report: &mut CleanupReport,
) -> Result<()> {
    cleanup_from(tx, TaxonLevel::Species, species_id, report).await
}

/// Delete a location once no tree or seed is recorded there
pub async fn delete_location_if_unreferenced(
    tx: &mut Transaction<'_, Sqlite>,
    location_id: &str,
    report: &mut CleanupReport,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM locations
        WHERE guid = ?
          AND NOT EXISTS (SELECT 1 FROM trees WHERE location_id = locations.guid)
          AND NOT EXISTS (SELECT 1 FROM seeds WHERE location_id = locations.guid)
        "#,
    )
    .bind(location_id)
    .execute(&mut **tx)
    .await?;

    let deleted = result.rows_affected() > 0;
    if deleted {
        report.locations += 1;
        debug!(location_id, "Deleted orphaned location");
    }

    Ok(deleted)
}

// ========================================
// Get-or-create
// ========================================

async fn find_family(
    tx: &mut Transaction<'_, Sqlite>,
    name: &str,
    owner: &Option<String>,
) -> Result<Option<String>> {
    let id: Option<String> = sqlx::query_scalar("SELECT guid FROM families WHERE name = ? AND user_id IS ?")
        .bind(name)
        .bind(owner)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(id)
}

/// Insert a family; a row that appeared since the lookup is returned instead
async fn insert_family(
    tx: &mut Transaction<'_, Sqlite>,
    name: &str,
    owner: &Option<String>,
) -> Result<(String, bool)> {
    let id = ids::generate().to_string();
    let result = sqlx::query(
        "INSERT INTO families (guid, name, user_id) VALUES (?, ?, ?) ON CONFLICT (name, user_id) DO NOTHING",
    )
    .bind(&id)
    .bind(name)
    .bind(owner)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        let existing = find_family(tx, name, owner).await?;
        return Ok((conflict_winner("family", name, existing)?, false));
    }

    debug!(family_id = %id, name, "Created family");
    Ok((id, true))
}

/// Row id after an `ON CONFLICT DO NOTHING` insert was skipped
fn conflict_winner(kind: &str, key: &str, existing: Option<String>) -> Result<String> {
    existing.ok_or_else(|| Error::Internal(format!("{} '{}' conflicted but was not found", kind, key)))
}

/// Returns `(id, created)`
pub async fn get_or_create_family(
    tx: &mut Transaction<'_, Sqlite>,
    name: &str,
    owner: Option<Uuid>,
) -> Result<(String, bool)> {
    let owner = owner.map(|o| o.to_string());

    match find_family(tx, name, &owner).await? {
        Some(id) => Ok((id, false)),
        None => insert_family(tx, name, &owner).await,
    }
}

async fn find_genus(
    tx: &mut Transaction<'_, Sqlite>,
    name: &str,
    owner: &Option<String>,
) -> Result<Option<String>> {
    let id: Option<String> = sqlx::query_scalar("SELECT guid FROM genera WHERE name = ? AND user_id IS ?")
        .bind(name)
        .bind(owner)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(id)
}

async fn insert_genus(
    tx: &mut Transaction<'_, Sqlite>,
    name: &str,
    family_id: &str,
    owner: &Option<String>,
) -> Result<(String, bool)> {
    let id = ids::generate().to_string();
    let result = sqlx::query(
        r#"
        INSERT INTO genera (guid, name, family_id, user_id) VALUES (?, ?, ?, ?)
        ON CONFLICT (name, user_id) DO NOTHING
        "#,
    )
    .bind(&id)
    .bind(name)
    .bind(family_id)
    .bind(owner)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        let existing = find_genus(tx, name, owner).await?;
        return Ok((conflict_winner("genus", name, existing)?, false));
    }

    debug!(genus_id = %id, name, "Created genus");
    Ok((id, true))
}

/// Genus lookup is by name only; `family_id` applies when creating
pub async fn get_or_create_genus(
    tx: &mut Transaction<'_, Sqlite>,
    name: &str,
    family_id: &str,
    owner: Option<Uuid>,
) -> Result<(String, bool)> {
    let owner = owner.map(|o| o.to_string());

    match find_genus(tx, name, &owner).await? {
        Some(id) => Ok((id, false)),
        None => insert_genus(tx, name, family_id, &owner).await,
    }
}

async fn find_species(
    tx: &mut Transaction<'_, Sqlite>,
    scientific_name: &str,
    owner: &Option<String>,
) -> Result<Option<String>> {
    let id: Option<String> =
        sqlx::query_scalar("SELECT guid FROM species WHERE scientific_name = ? AND user_id IS ?")
            .bind(scientific_name)
            .bind(owner)
            .fetch_optional(&mut **tx)
            .await?;
    Ok(id)
}

async fn insert_species(
    tx: &mut Transaction<'_, Sqlite>,
    scientific_name: &str,
    common_name: &str,
    genus_id: &str,
    owner: &Option<String>,
) -> Result<(String, bool)> {
    let id = ids::generate().to_string();
    let result = sqlx::query(
        r#"
        INSERT INTO species (guid, scientific_name, common_name, genus_id, user_id)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (scientific_name, user_id) DO NOTHING
        "#,
    )
    .bind(&id)
    .bind(scientific_name)
    .bind(common_name)
    .bind(genus_id)
    .bind(owner)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        let existing = find_species(tx, scientific_name, owner).await?;
        return Ok((conflict_winner("species", scientific_name, existing)?, false));
    }

    debug!(species_id = %id, scientific_name, "Created species");
    Ok((id, true))
}

/// Species lookup is by scientific name; common name and genus apply when creating
pub async fn get_or_create_species(
    tx: &mut Transaction<'_, Sqlite>,
    scientific_name: &str,
    common_name: &str,
    genus_id: &str,
    owner: Option<Uuid>,
) -> Result<(String, bool)> {
    let owner = owner.map(|o| o.to_string());

    match find_species(tx, scientific_name, &owner).await? {
        Some(id) => Ok((id, false)),
        None => insert_species(tx, scientific_name, common_name, genus_id, &owner).await,
    }
}

/// Location lookup is by exact coordinates; `default_name` applies when creating
pub async fn get_or_create_location(
    tx: &mut Transaction<'_, Sqlite>,
    latitude: f64,
    longitude: f64,
    default_name: &str,
    owner: Option<Uuid>,
) -> Result<(String, bool)> {
    let owner = owner.map(|o| o.to_string());

    let existing: Option<String> = sqlx::query_scalar(
        "SELECT guid FROM locations WHERE latitude = ? AND longitude = ? AND user_id IS ? LIMIT 1",
    )
    .bind(latitude)
    .bind(longitude)
    .bind(&owner)
    .fetch_optional(&mut **tx)
    .await?;

    if let Some(id) = existing {
        return Ok((id, false));
    }

    let id = ids::generate().to_string();
    sqlx::query(
        "INSERT INTO locations (guid, name, latitude, longitude, user_id) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(default_name)
    .bind(latitude)
    .bind(longitude)
    .bind(&owner)
    .execute(&mut **tx)
    .await?;

    debug!(location_id = %id, latitude, longitude, "Created location");
    Ok((id, true))
}

/// Family -> genus -> species get-or-create cascade; returns the species id
pub async fn resolve_species(
    tx: &mut Transaction<'_, Sqlite>,
    names: TaxonomyNames<'_>,
    owner: Option<Uuid>,
) -> Result<String> {
    let (family_id, _) = get_or_create_family(tx, names.family, owner).await?;
    let (genus_id, _) = get_or_create_genus(tx, names.genus, &family_id, owner).await?;
    let (species_id, _) = get_or_create_species(
        tx,
        names.scientific_name,
        names.common_name,
        &genus_id,
        owner,
    )
    .await?;

    Ok(species_id)
}

// ========================================
// Maintenance sweep
// ========================================

/// Row counts per taxonomy table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaxonomyCounts {
    pub species: i64,
    pub genera: i64,
    pub families: i64,
    pub locations: i64,
}

/// Outcome of [`sweep_orphans`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub before: TaxonomyCounts,
    pub after: TaxonomyCounts,
    pub deleted: CleanupReport,
}

pub async fn taxonomy_counts(pool: &SqlitePool) -> Result<TaxonomyCounts> {
    let (species, genera, families, locations): (i64, i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT (SELECT COUNT(*) FROM species),
               (SELECT COUNT(*) FROM genera),
               (SELECT COUNT(*) FROM families),
               (SELECT COUNT(*) FROM locations)
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(TaxonomyCounts { species, genera, families, locations })
}

/// Remove every unreferenced taxonomy and location row
///
/// With `force_all`, every taxonomy and location row is deleted regardless
/// of references. Foreign keys cascade, so tree and seed records go too.
pub async fn sweep_orphans(pool: &SqlitePool, force_all: bool) -> Result<SweepReport> {
    let before = taxonomy_counts(pool).await?;
    let mut tx = pool.begin().await?;
    let mut deleted = CleanupReport::default();

    if force_all {
        for table in ["species", "genera", "families", "locations"] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }
    } else {
        let orphan_species: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT guid FROM species s
            WHERE NOT EXISTS (SELECT 1 FROM trees WHERE species_id = s.guid)
              AND NOT EXISTS (SELECT 1 FROM seeds WHERE species_id = s.guid)
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;
        for id in &orphan_species {
            cleanup_from(&mut tx, TaxonLevel::Species, id, &mut deleted).await?;
        }

        let orphan_genera: Vec<String> = sqlx::query_scalar(
            "SELECT guid FROM genera g WHERE NOT EXISTS (SELECT 1 FROM species WHERE genus_id = g.guid)",
        )
        .fetch_all(&mut *tx)
        .await?;
        for id in &orphan_genera {
            cleanup_from(&mut tx, TaxonLevel::Genus, id, &mut deleted).await?;
        }

        let orphan_families: Vec<String> = sqlx::query_scalar(
            "SELECT guid FROM families f WHERE NOT EXISTS (SELECT 1 FROM genera WHERE family_id = f.guid)",
        )
        .fetch_all(&mut *tx)
        .await?;
        for id in &orphan_families {
            cleanup_from(&mut tx, TaxonLevel::Family, id, &mut deleted).await?;
        }

        let orphan_locations: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT guid FROM locations l
            WHERE NOT EXISTS (SELECT 1 FROM trees WHERE location_id = l.guid)
              AND NOT EXISTS (SELECT 1 FROM seeds WHERE location_id = l.guid)
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;
        for id in &orphan_locations {
            delete_location_if_unreferenced(&mut tx, id, &mut deleted).await?;
        }
    }

    tx.commit().await?;
    let after = taxonomy_counts(pool).await?;

    if force_all {
        deleted = CleanupReport {
            species: (before.species - after.species).max(0) as u64,
            genera: (before.genera - after.genera).max(0) as u64,
            families: (before.families - after.families).max(0) as u64,
            locations: (before.locations - after.locations).max(0) as u64,
        };
    }

    info!(
        force_all,
        species = deleted.species,
        genera = deleted.genera,
        families = deleted.families,
        locations = deleted.locations,
        "Taxonomy sweep complete"
    );

    Ok(SweepReport { before, after, deleted })
}
