//! # ETMS Common Library
//!
//! Shared code for the Endemic Tree Monitoring Service:
//! - Health distribution validation and classification
//! - Database schema, migrations and repositories
//! - GeoJSON and analytics response types
//! - CSV import
//! - Configuration loading

pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod geojson;
pub mod health;
pub mod import;
pub mod ids;
pub mod time;

pub use error::{Error, Result};
pub use health::{HealthDistribution, HealthError, HealthStatus};
