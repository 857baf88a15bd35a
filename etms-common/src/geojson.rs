//! GeoJSON output for the map views
//!
//! Point coordinates are `[longitude, latitude]`.

use crate::db::models::{PinStyle, SeedView, TreeView};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct FeatureCollection<P> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub features: Vec<Feature<P>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin_style: Option<PinStyle>,
}

impl<P> FeatureCollection<P> {
    pub fn new(features: Vec<Feature<P>>) -> Self {
        FeatureCollection { kind: "FeatureCollection", features, pin_style: None }
    }

    pub fn with_pin_style(mut self, style: Option<PinStyle>) -> Self {
        self.pin_style = style;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Feature<P> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub geometry: Point,
    pub properties: P,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub coordinates: [f64; 2],
}

impl Point {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Point { kind: "Point", coordinates: [longitude, latitude] }
    }
}

impl<P> Feature<P> {
    pub fn point(latitude: f64, longitude: f64, properties: P) -> Self {
        Feature { kind: "Feature", geometry: Point::new(latitude, longitude), properties }
    }
}

/// Properties of a tree record feature
#[derive(Debug, Clone, Serialize)]
pub struct TreeProperties {
    pub id: String,
    pub species_id: String,
    pub common_name: String,
    pub scientific_name: String,
    pub family: String,
    pub genus: String,
    pub population: i64,
    pub year: i64,
    pub health_status: String,
    pub healthy_count: i64,
    pub good_count: i64,
    pub bad_count: i64,
    pub deceased_count: i64,
    pub hectares: f64,
    pub notes: Option<String>,
    pub location_id: String,
    pub location_name: String,
    pub owner: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Properties of a seed planting feature; dates as `YYYY-MM-DD`
#[derive(Debug, Clone, Serialize)]
pub struct SeedProperties {
    pub id: String,
    pub entity_type: &'static str,
    pub species_id: String,
    pub common_name: String,
    pub scientific_name: String,
    pub family: String,
    pub genus: String,
    pub quantity: i64,
    pub planting_date: String,
    pub germination_status: String,
    pub germination_date: Option<String>,
    pub survival_rate: Option<f64>,
    pub hectares: f64,
    pub expected_maturity_date: Option<String>,
    pub notes: Option<String>,
    pub location_id: String,
    pub location_name: String,
    pub owner: Option<String>,
}

impl From<TreeView> for Feature<TreeProperties> {
    fn from(t: TreeView) -> Self {
        let (latitude, longitude) = (t.latitude, t.longitude);
        Feature::point(
            latitude,
            longitude,
            TreeProperties {
                id: t.id,
                species_id: t.species_id,
                common_name: t.common_name,
                scientific_name: t.scientific_name,
                family: t.family,
                genus: t.genus,
                population: t.population,
                year: t.year,
                health_status: t.health_status,
                healthy_count: t.healthy_count,
                good_count: t.good_count,
                bad_count: t.bad_count,
                deceased_count: t.deceased_count,
                hectares: t.hectares,
                notes: t.notes,
                location_id: t.location_id,
                location_name: t.location_name,
                owner: t.owner,
                created_at: t.created_at,
                updated_at: t.updated_at,
            },
        )
    }
}

impl From<SeedView> for Feature<SeedProperties> {
    fn from(s: SeedView) -> Self {
        let fmt = |d: chrono::NaiveDate| d.format("%Y-%m-%d").to_string();
        let (latitude, longitude) = (s.latitude, s.longitude);
        Feature::point(
            latitude,
            longitude,
            SeedProperties {
                id: s.id,
                entity_type: "seed",
                species_id: s.species_id,
                common_name: s.common_name,
                scientific_name: s.scientific_name,
                family: s.family,
                genus: s.genus,
                quantity: s.quantity,
                planting_date: fmt(s.planting_date),
                germination_status: s.germination_status,
                germination_date: s.germination_date.map(fmt),
                survival_rate: s.survival_rate,
                hectares: s.hectares,
                expected_maturity_date: s.expected_maturity_date.map(fmt),
                notes: s.notes,
                location_id: s.location_id,
                location_name: s.location_name,
                owner: s.owner,
            },
        )
    }
}

pub fn trees_collection(trees: Vec<TreeView>) -> FeatureCollection<TreeProperties> {
    FeatureCollection::new(trees.into_iter().map(Feature::from).collect())
}

pub fn seeds_collection(seeds: Vec<SeedView>) -> FeatureCollection<SeedProperties> {
    FeatureCollection::new(seeds.into_iter().map(Feature::from).collect())
}
