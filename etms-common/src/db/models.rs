//! Database models

use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ========================================
// Users and row ownership
// ========================================

/// Portal a user account belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    AppUser,
    HeadUser,
    PublicUser,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::AppUser => "app_user",
            Role::HeadUser => "head_user",
            Role::PublicUser => "public_user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "app_user" => Ok(Role::AppUser),
            "head_user" => Ok(Role::HeadUser),
            "public_user" => Ok(Role::PublicUser),
            other => Err(Error::InvalidInput(format!("Unknown role: {}", other))),
        }
    }
}

/// Authenticated account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

impl User {
    /// Row filter this user's queries run under
    ///
    /// Head users oversee every tenant; everyone else sees their own rows.
    pub fn scope(&self) -> Scope {
        match self.role {
            Role::HeadUser => Scope::All,
            Role::AppUser | Role::PublicUser => Scope::Owner(self.id),
        }
    }
}

/// Row ownership filter applied to queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Only rows whose `user_id` matches
    Owner(Uuid),
    /// Every row
    All,
}

impl Scope {
    /// Value bound to `(? IS NULL OR user_id = ?)` clauses
    pub fn owner_id(&self) -> Option<String> {
        match self {
            Scope::Owner(id) => Some(id.to_string()),
            Scope::All => None,
        }
    }
}

// ========================================
// Trees
// ========================================

/// Tree record as submitted by manual entry, JSON import or CSV import
///
/// There is deliberately no `health_status` field: it is derived from the
/// four counts. Unknown fields (including a stray `health_status`) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeInput {
    pub common_name: String,
    pub scientific_name: String,
    pub family: String,
    pub genus: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub location_name: Option<String>,
    pub population: u32,
    pub year: i32,
    pub healthy_count: u32,
    pub good_count: u32,
    pub bad_count: u32,
    pub deceased_count: u32,
    #[serde(default)]
    pub hectares: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Full edit of an existing tree record
///
/// All four counts are resupplied; there is no partial count update.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeUpdate {
    pub species_id: Uuid,
    pub population: u32,
    pub year: i32,
    pub healthy_count: u32,
    pub good_count: u32,
    pub bad_count: u32,
    pub deceased_count: u32,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub hectares: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Tree record joined with taxonomy, location and owner
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TreeView {
    pub id: String,
    pub species_id: String,
    pub common_name: String,
    pub scientific_name: String,
    pub genus: String,
    pub family: String,
    pub location_id: String,
    pub location_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub population: i64,
    pub year: i64,
    pub health_status: String,
    pub healthy_count: i64,
    pub good_count: i64,
    pub bad_count: i64,
    pub deceased_count: i64,
    pub hectares: f64,
    pub notes: Option<String>,
    pub owner: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

// ========================================
// Seeds
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GerminationStatus {
    #[default]
    NotGerminated,
    Germinating,
    PartiallyGerminated,
    FullyGerminated,
    Failed,
}

impl GerminationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GerminationStatus::NotGerminated => "not_germinated",
            GerminationStatus::Germinating => "germinating",
            GerminationStatus::PartiallyGerminated => "partially_germinated",
            GerminationStatus::FullyGerminated => "fully_germinated",
            GerminationStatus::Failed => "failed",
        }
    }
}

/// New seed planting record
#[derive(Debug, Clone, Deserialize)]
pub struct SeedInput {
    pub common_name: String,
    pub scientific_name: String,
    pub family: String,
    pub genus: String,
    pub quantity: u32,
    pub planting_date: NaiveDate,
    #[serde(default)]
    pub germination_status: GerminationStatus,
    #[serde(default)]
    pub germination_date: Option<NaiveDate>,
    #[serde(default)]
    pub survival_rate: Option<f64>,
    #[serde(default)]
    pub hectares: f64,
    #[serde(default)]
    pub expected_maturity_date: Option<NaiveDate>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Full edit of a seed planting record
#[derive(Debug, Clone, Deserialize)]
pub struct SeedUpdate {
    pub species_id: Uuid,
    pub quantity: u32,
    pub planting_date: NaiveDate,
    #[serde(default)]
    pub germination_status: GerminationStatus,
    #[serde(default)]
    pub germination_date: Option<NaiveDate>,
    #[serde(default)]
    pub survival_rate: Option<f64>,
    #[serde(default)]
    pub hectares: f64,
    #[serde(default)]
    pub expected_maturity_date: Option<NaiveDate>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SeedView {
    pub id: String,
    pub species_id: String,
    pub common_name: String,
    pub scientific_name: String,
    pub genus: String,
    pub family: String,
    pub location_id: String,
    pub location_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub quantity: i64,
    pub planting_date: NaiveDate,
    pub germination_status: String,
    pub germination_date: Option<NaiveDate>,
    pub survival_rate: Option<f64>,
    pub hectares: f64,
    pub expected_maturity_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub owner: Option<String>,
}

// ========================================
// Lookups
// ========================================

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SpeciesSummary {
    pub id: String,
    pub scientific_name: String,
    pub common_name: String,
    pub genus: String,
    pub family: String,
    pub is_endemic: bool,
    pub conservation_status: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LocationSummary {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
}

// ========================================
// Map layers, pin styles, settings
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerType {
    Topographic,
    Satellite,
    Street,
    Heatmap,
    Protected,
    Landuse,
    Soil,
    Custom,
}

impl LayerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerType::Topographic => "topographic",
            LayerType::Satellite => "satellite",
            LayerType::Street => "street",
            LayerType::Heatmap => "heatmap",
            LayerType::Protected => "protected",
            LayerType::Landuse => "landuse",
            LayerType::Soil => "soil",
            LayerType::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LayerInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub url: String,
    pub layer_type: LayerType,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub attribution: Option<String>,
    #[serde(default)]
    pub z_index: i64,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MapLayer {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub layer_type: String,
    pub is_active: bool,
    pub is_default: bool,
    pub attribution: Option<String>,
    pub z_index: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PinStyleInput {
    pub name: String,
    #[serde(default = "default_icon_class")]
    pub icon_class: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_size")]
    pub size: i64,
    #[serde(default = "default_border_color")]
    pub border_color: String,
    #[serde(default = "default_border_width")]
    pub border_width: i64,
    #[serde(default = "default_background_color")]
    pub background_color: String,
    #[serde(default)]
    pub is_default: bool,
}

fn default_icon_class() -> String {
    "fa-tree".to_string()
}

fn default_color() -> String {
    "#4caf50".to_string()
}

fn default_size() -> i64 {
    24
}

fn default_border_color() -> String {
    "#ffffff".to_string()
}

fn default_border_width() -> i64 {
    2
}

fn default_background_color() -> String {
    "rgba(0, 0, 0, 0.6)".to_string()
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PinStyle {
    pub id: String,
    pub name: String,
    pub icon_class: String,
    pub color: String,
    pub size: i64,
    pub border_color: String,
    pub border_width: i64,
    pub background_color: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

// ========================================
// Public submissions
// ========================================

#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionInput {
    pub tree_description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub person_name: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Submission {
    pub id: String,
    pub tree_description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub person_name: String,
    /// Username of the signed-in submitter, if any
    pub submitted_by: Option<String>,
    pub created_at: String,
}

// ========================================
// Shared validation
// ========================================

/// Reject coordinates outside the WGS84 range
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<()> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(Error::InvalidInput(format!(
            "Latitude {} out of range [-90, 90]",
            latitude
        )));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(Error::InvalidInput(format!(
            "Longitude {} out of range [-180, 180]",
            longitude
        )));
    }
    Ok(())
}

/// Reject blank required text fields
pub fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{} is required", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [Role::AppUser, Role::HeadUser, Role::PublicUser] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_head_user_scope_is_all() {
        let head = User { id: Uuid::new_v4(), username: "head".into(), role: Role::HeadUser };
        assert_eq!(head.scope(), Scope::All);
        assert_eq!(head.scope().owner_id(), None);

        let app = User { id: Uuid::new_v4(), username: "app".into(), role: Role::AppUser };
        assert_eq!(app.scope(), Scope::Owner(app.id));
        assert_eq!(app.scope().owner_id(), Some(app.id.to_string()));
    }

    #[test]
    fn test_tree_input_ignores_supplied_status() {
        let input: TreeInput = serde_json::from_value(serde_json::json!({
            "common_name": "Philippine Ebony",
            "scientific_name": "Diospyros philippinensis",
            "family": "Ebenaceae",
            "genus": "Diospyros",
            "latitude": 14.5,
            "longitude": 121.0,
            "population": 10,
            "year": 2024,
            "health_status": "excellent",
            "healthy_count": 0,
            "good_count": 0,
            "bad_count": 10,
            "deceased_count": 0
        }))
        .unwrap();
        assert_eq!(input.bad_count, 10);
        assert_eq!(input.hectares, 0.0);
    }

    #[test]
    fn test_tree_input_rejects_negative_counts() {
        let result: std::result::Result<TreeInput, _> = serde_json::from_value(serde_json::json!({
            "common_name": "a", "scientific_name": "b", "family": "c", "genus": "d",
            "latitude": 0.0, "longitude": 0.0, "population": 1, "year": 2024,
            "healthy_count": -1, "good_count": 2, "bad_count": 0, "deceased_count": 0
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_coordinate_validation() {
        assert!(validate_coordinates(14.5, 121.0).is_ok());
        assert!(validate_coordinates(91.0, 0.0).is_err());
        assert!(validate_coordinates(0.0, -180.5).is_err());
    }

    #[test]
    fn test_pin_style_defaults() {
        let input: PinStyleInput =
            serde_json::from_value(serde_json::json!({ "name": "Default" })).unwrap();
        assert_eq!(input.icon_class, "fa-tree");
        assert_eq!(input.size, 24);
        assert!(!input.is_default);
    }
}
