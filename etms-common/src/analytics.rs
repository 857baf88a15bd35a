//! Population analytics and dashboard totals
//!
//! Aggregation runs in SQL; the derived figures (growth rate, diversity
//! indices, health percentages) are pure functions over the query results.

use crate::db::models::Scope;
use crate::health::HealthStatus;
use crate::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeMap;

const TOP_N: i64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct SpeciesCount {
    pub common_name: String,
    pub scientific_name: String,
    pub record_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, sqlx::FromRow)]
pub struct YearPopulation {
    pub year: i64,
    pub population: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct FamilyPopulation {
    pub family: String,
    pub population: i64,
}

/// Records and counts sharing one health status
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct HealthGroup {
    pub health_status: String,
    pub record_count: i64,
    pub population: i64,
    pub healthy_count: i64,
    pub good_count: i64,
    pub bad_count: i64,
    pub deceased_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct YearHealthGroup {
    pub year: i64,
    pub health_status: String,
    pub record_count: i64,
    pub population: i64,
}

/// Share of all counted trees in each bucket, in percent
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HealthMetrics {
    pub total: i64,
    pub healthy_pct: f64,
    pub good_pct: f64,
    pub bad_pct: f64,
    pub deceased_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, sqlx::FromRow)]
pub struct YearRichness {
    pub year: i64,
    pub species_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GrowthRate {
    pub year: i64,
    pub population: i64,
    /// Percent change from the previous year, 2 dp
    pub growth_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct SpeciesData {
    pub common_name: String,
    pub scientific_name: String,
    pub population: i64,
    pub location_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BiodiversityIndex {
    pub year: i64,
    pub species_count: usize,
    /// Shannon H, 3 dp
    pub shannon: f64,
    /// Simpson 1 - D, 3 dp
    pub simpson: f64,
}

/// Everything the analytics page shows
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub species_distribution: Vec<SpeciesCount>,
    pub population_by_year: Vec<YearPopulation>,
    pub family_distribution: Vec<FamilyPopulation>,
    pub health_distribution: Vec<HealthGroup>,
    pub health_by_year: Vec<YearHealthGroup>,
    pub health_metrics: HealthMetrics,
    pub species_richness: Vec<YearRichness>,
    pub growth_rates: Vec<GrowthRate>,
    pub species_data: Vec<SpeciesData>,
    pub biodiversity: Vec<BiodiversityIndex>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub total_records: i64,
    pub total_population: i64,
    pub species_count: i64,
    pub location_count: i64,
    pub seed_records: i64,
    pub seed_quantity: i64,
    /// Records classified good or better
    pub healthy_records: i64,
}

// ========================================
// Pure computations
// ========================================

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Year-over-year percent change
///
/// `years` must be sorted by year. The first year, and any year following a
/// zero-population year, report 0.
pub fn growth_rates(years: &[YearPopulation]) -> Vec<GrowthRate> {
    let mut previous: Option<i64> = None;

    years
        .iter()
        .map(|y| {
            let rate = match previous {
                Some(prev) if prev != 0 => {
                    round_to((y.population - prev) as f64 / prev as f64 * 100.0, 2)
                }
                _ => 0.0,
            };
            previous = Some(y.population);
            GrowthRate { year: y.year, population: y.population, growth_rate: rate }
        })
        .collect()
}

/// Shannon and Simpson indices per year from `(year, species, population)` rows
///
/// Species with zero population do not count toward richness or the indices.
pub fn biodiversity_indices(rows: &[(i64, String, i64)]) -> Vec<BiodiversityIndex> {
    let mut by_year: BTreeMap<i64, BTreeMap<&str, i64>> = BTreeMap::new();
    for (year, species, population) in rows {
        if *population > 0 {
            *by_year.entry(*year).or_default().entry(species.as_str()).or_default() += population;
        }
    }

    by_year
        .into_iter()
        .map(|(year, species)| {
            let total: i64 = species.values().sum();
            let (shannon, simpson_d) = species.values().fold((0.0, 0.0), |(h, d), &n| {
                let p = n as f64 / total as f64;
                (h - p * p.ln(), d + p * p)
            });

            BiodiversityIndex {
                year,
                species_count: species.len(),
                shannon: round_to(shannon, 3),
                simpson: round_to(1.0 - simpson_d, 3),
            }
        })
        .collect()
}

/// Percent of all counted trees in each bucket; all zero when nothing is counted
pub fn health_metrics(healthy: i64, good: i64, bad: i64, deceased: i64) -> HealthMetrics {
    let total = healthy + good + bad + deceased;
    if total <= 0 {
        return HealthMetrics::default();
    }

    let pct = |n: i64| round_to(n as f64 / total as f64 * 100.0, 2);
    HealthMetrics {
        total,
        healthy_pct: pct(healthy),
        good_pct: pct(good),
        bad_pct: pct(bad),
        deceased_pct: pct(deceased),
    }
}

// ========================================
// Queries
// ========================================

pub async fn analytics(pool: &SqlitePool, scope: Scope) -> Result<AnalyticsReport> {
    let owner = scope.owner_id();

    let species_distribution = sqlx::query_as::<_, SpeciesCount>(
        r#"
        SELECT s.common_name, s.scientific_name, COUNT(t.guid) AS record_count
        FROM trees t JOIN species s ON s.guid = t.species_id
        WHERE (? IS NULL OR t.user_id = ?)
        GROUP BY s.guid
        ORDER BY record_count DESC, s.common_name
        LIMIT ?
        "#,
    )
    .bind(&owner)
    .bind(&owner)
    .bind(TOP_N)
    .fetch_all(pool)
    .await?;

    let population_by_year = sqlx::query_as::<_, YearPopulation>(
        r#"
        SELECT year, COALESCE(SUM(population), 0) AS population
        FROM trees
        WHERE (? IS NULL OR user_id = ?)
        GROUP BY year
        ORDER BY year
        "#,
    )
    .bind(&owner)
    .bind(&owner)
    .fetch_all(pool)
    .await?;

    let family_distribution = sqlx::query_as::<_, FamilyPopulation>(
        r#"
        SELECT f.name AS family, COALESCE(SUM(t.population), 0) AS population
        FROM trees t
        JOIN species s ON s.guid = t.species_id
        JOIN genera g ON g.guid = s.genus_id
        JOIN families f ON f.guid = g.family_id
        WHERE (? IS NULL OR t.user_id = ?)
        GROUP BY f.guid
        ORDER BY population DESC, f.name
        LIMIT ?
        "#,
    )
    .bind(&owner)
    .bind(&owner)
    .bind(TOP_N)
    .fetch_all(pool)
    .await?;

    let mut health_distribution = sqlx::query_as::<_, HealthGroup>(
        r#"
        SELECT health_status, COUNT(*) AS record_count,
               COALESCE(SUM(population), 0) AS population,
               COALESCE(SUM(healthy_count), 0) AS healthy_count,
               COALESCE(SUM(good_count), 0) AS good_count,
               COALESCE(SUM(bad_count), 0) AS bad_count,
               COALESCE(SUM(deceased_count), 0) AS deceased_count
        FROM trees
        WHERE (? IS NULL OR user_id = ?)
        GROUP BY health_status
        "#,
    )
    .bind(&owner)
    .bind(&owner)
    .fetch_all(pool)
    .await?;
    health_distribution.sort_by_key(|g| status_order(&g.health_status));

    let health_by_year = sqlx::query_as::<_, YearHealthGroup>(
        r#"
        SELECT year, health_status, COUNT(*) AS record_count,
               COALESCE(SUM(population), 0) AS population
        FROM trees
        WHERE (? IS NULL OR user_id = ?)
        GROUP BY year, health_status
        ORDER BY year
        "#,
    )
    .bind(&owner)
    .bind(&owner)
    .fetch_all(pool)
    .await?;

    let (healthy, good, bad, deceased) = health_distribution.iter().fold(
        (0, 0, 0, 0),
        |(h, g, b, d), group| {
            (
                h + group.healthy_count,
                g + group.good_count,
                b + group.bad_count,
                d + group.deceased_count,
            )
        },
    );

    let species_richness = sqlx::query_as::<_, YearRichness>(
        r#"
        SELECT year, COUNT(DISTINCT species_id) AS species_count
        FROM trees
        WHERE (? IS NULL OR user_id = ?)
        GROUP BY year
        ORDER BY year
        "#,
    )
    .bind(&owner)
    .bind(&owner)
    .fetch_all(pool)
    .await?;

    let species_data = sqlx::query_as::<_, SpeciesData>(
        r#"
        SELECT s.common_name, s.scientific_name,
               COALESCE(SUM(t.population), 0) AS population,
               COUNT(DISTINCT t.location_id) AS location_count
        FROM trees t JOIN species s ON s.guid = t.species_id
        WHERE (? IS NULL OR t.user_id = ?)
        GROUP BY s.guid
        ORDER BY population DESC, s.common_name
        LIMIT ?
        "#,
    )
    .bind(&owner)
    .bind(&owner)
    .bind(TOP_N)
    .fetch_all(pool)
    .await?;

    let year_species: Vec<(i64, String, i64)> = sqlx::query_as(
        r#"
        SELECT year, species_id, COALESCE(SUM(population), 0)
        FROM trees
        WHERE (? IS NULL OR user_id = ?)
        GROUP BY year, species_id
        "#,
    )
    .bind(&owner)
    .bind(&owner)
    .fetch_all(pool)
    .await?;

    Ok(AnalyticsReport {
        growth_rates: growth_rates(&population_by_year),
        biodiversity: biodiversity_indices(&year_species),
        health_metrics: health_metrics(healthy, good, bad, deceased),
        species_distribution,
        population_by_year,
        family_distribution,
        health_distribution,
        health_by_year,
        species_richness,
        species_data,
    })
}

/// Sort key placing groups from best to worst, `unknown` last
fn status_order(label: &str) -> u8 {
    label
        .parse::<HealthStatus>()
        .ok()
        .and_then(|s| s.rank())
        .map(|r| u8::MAX - 1 - r)
        .unwrap_or(u8::MAX)
}

pub async fn dashboard(pool: &SqlitePool, scope: Scope) -> Result<Dashboard> {
    let owner = scope.owner_id();

    let (total_records, total_population, species_count, location_count, healthy_records): (
        i64,
        i64,
        i64,
        i64,
        i64,
    ) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COALESCE(SUM(population), 0),
               COUNT(DISTINCT species_id),
               COUNT(DISTINCT location_id),
               COALESCE(SUM(health_status IN ('good', 'very_good', 'excellent')), 0)
        FROM trees
        WHERE (? IS NULL OR user_id = ?)
        "#,
    )
    .bind(&owner)
    .bind(&owner)
    .fetch_one(pool)
    .await?;

    let (seed_records, seed_quantity): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(quantity), 0) FROM seeds WHERE (? IS NULL OR user_id = ?)",
    )
    .bind(&owner)
    .bind(&owner)
    .fetch_one(pool)
    .await?;

    Ok(Dashboard {
        total_records,
        total_population,
        species_count,
        location_count,
        seed_records,
        seed_quantity,
        healthy_records,
    })
}
