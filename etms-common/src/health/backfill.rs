//! One-time migration heuristic for records that predate health counts
//!
//! Old rows stored only a status label and a population, with all four
//! counts left at zero. This module fabricates a distribution for such rows
//! by putting the whole population in a single bucket chosen from the old
//! label. It is an approximation, not a measurement.
//!
//! The resulting distribution is classified like any other, so the stored
//! status is re-derived and may differ from the old label (for example an
//! old `very_good` row becomes all-healthy and therefore `excellent`).

use super::{HealthDistribution, HealthError};

/// Bucket a legacy label maps onto
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyBucket {
    Healthy,
    Good,
    Bad,
}

/// Map an old status label to the bucket that receives the whole population
///
/// Unrecognised labels fall into `Good`.
pub fn bucket_for_label(label: &str) -> LegacyBucket {
    match label {
        "excellent" | "very_good" => LegacyBucket::Healthy,
        "poor" | "very_poor" => LegacyBucket::Bad,
        _ => LegacyBucket::Good,
    }
}

/// Build a distribution for a legacy row from its old label and population
pub fn distribution_from_label(
    label: &str,
    population: u32,
) -> Result<HealthDistribution, HealthError> {
    match bucket_for_label(label) {
        LegacyBucket::Healthy => HealthDistribution::new(population, population, 0, 0, 0),
        LegacyBucket::Good => HealthDistribution::new(population, 0, population, 0, 0),
        LegacyBucket::Bad => HealthDistribution::new(population, 0, 0, population, 0),
    }
}
