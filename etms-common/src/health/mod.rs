//! Health distribution validation and status classification
//!
//! A tree record carries a 4-way partition of its population into
//! healthy / good / bad / deceased counts. The overall [`HealthStatus`] is
//! always derived from that partition; callers never supply it directly.
//!
//! # Rules
//!
//! Evaluated top to bottom, first match wins:
//!
//! | Condition                                      | Status      |
//! |------------------------------------------------|-------------|
//! | healthy% >= 60                                 | `excellent` |
//! | healthy% >= 40 or (healthy% + good%) >= 70     | `very_good` |
//! | healthy% >= 20 or (healthy% + good%) >= 50     | `good`      |
//! | deceased% <= 30                                | `poor`      |
//! | otherwise                                      | `very_poor` |
//!
//! An empty distribution (total of zero) classifies as `unknown`.

pub mod backfill;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Overall health label for a tree record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// No trees counted, nothing to classify
    Unknown,
    VeryPoor,
    Poor,
    Good,
    VeryGood,
    Excellent,
}

impl HealthStatus {
    /// All labels, worst first (`Unknown` excluded)
    pub const ORDERED: [HealthStatus; 5] = [
        HealthStatus::VeryPoor,
        HealthStatus::Poor,
        HealthStatus::Good,
        HealthStatus::VeryGood,
        HealthStatus::Excellent,
    ];

    /// Database / wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Unknown => "unknown",
            HealthStatus::VeryPoor => "very_poor",
            HealthStatus::Poor => "poor",
            HealthStatus::Good => "good",
            HealthStatus::VeryGood => "very_good",
            HealthStatus::Excellent => "excellent",
        }
    }

    /// Ordinal position, 0 = very_poor .. 4 = excellent
    ///
    /// `Unknown` has no rank.
    pub fn rank(&self) -> Option<u8> {
        match self {
            HealthStatus::Unknown => None,
            HealthStatus::VeryPoor => Some(0),
            HealthStatus::Poor => Some(1),
            HealthStatus::Good => Some(2),
            HealthStatus::VeryGood => Some(3),
            HealthStatus::Excellent => Some(4),
        }
    }

    /// True for `good`, `very_good` and `excellent`
    pub fn is_good_or_better(&self) -> bool {
        self.rank().is_some_and(|r| r >= 2)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HealthStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(HealthStatus::Unknown),
            "very_poor" => Ok(HealthStatus::VeryPoor),
            "poor" => Ok(HealthStatus::Poor),
            "good" => Ok(HealthStatus::Good),
            "very_good" => Ok(HealthStatus::VeryGood),
            "excellent" => Ok(HealthStatus::Excellent),
            other => Err(format!("Unknown health status: {}", other)),
        }
    }
}

/// Health distribution validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HealthError {
    /// The four counts do not add up to the declared population
    #[error("Health status total ({total}) must equal the total population ({population})")]
    CountMismatch { population: u64, total: u64 },
}

/// Check that the four counts sum exactly to `population`
pub fn validate(
    population: u32,
    healthy: u32,
    good: u32,
    bad: u32,
    deceased: u32,
) -> Result<(), HealthError> {
    let total = u64::from(healthy) + u64::from(good) + u64::from(bad) + u64::from(deceased);
    let population = u64::from(population);

    if total != population {
        return Err(HealthError::CountMismatch { population, total });
    }

    Ok(())
}

/// Derive the overall status from a distribution
///
/// Percent thresholds are compared in integer arithmetic
/// (`healthy * 100 >= 60 * total` rather than `healthy / total * 100 >= 60`)
/// so boundary values land exactly where the table says.
pub fn classify(healthy: u32, good: u32, bad: u32, deceased: u32) -> HealthStatus {
    let healthy = u64::from(healthy);
    let good = u64::from(good);
    let deceased = u64::from(deceased);
    let total = healthy + good + u64::from(bad) + deceased;

    if total == 0 {
        return HealthStatus::Unknown;
    }

    let healthy_pct_x = healthy * 100;
    let healthy_good_pct_x = (healthy + good) * 100;

    if healthy_pct_x >= 60 * total {
        HealthStatus::Excellent
    } else if healthy_pct_x >= 40 * total || healthy_good_pct_x >= 70 * total {
        HealthStatus::VeryGood
    } else if healthy_pct_x >= 20 * total || healthy_good_pct_x >= 50 * total {
        HealthStatus::Good
    } else if deceased * 10 <= 3 * total {
        HealthStatus::Poor
    } else {
        HealthStatus::VeryPoor
    }
}

/// Validated counts plus the status derived from them
///
/// The only way to obtain one is [`HealthDistribution::new`], so a status
/// can never drift from its counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthDistribution {
    population: u32,
    healthy: u32,
    good: u32,
    bad: u32,
    deceased: u32,
    status: HealthStatus,
}

impl HealthDistribution {
    /// Validate the counts against `population`, then classify
    pub fn new(
        population: u32,
        healthy: u32,
        good: u32,
        bad: u32,
        deceased: u32,
    ) -> Result<Self, HealthError> {
        validate(population, healthy, good, bad, deceased)?;

        Ok(Self {
            population,
            healthy,
            good,
            bad,
            deceased,
            status: classify(healthy, good, bad, deceased),
        })
    }

    pub fn population(&self) -> u32 {
        self.population
    }

    pub fn healthy(&self) -> u32 {
        self.healthy
    }

    pub fn good(&self) -> u32 {
        self.good
    }

    pub fn bad(&self) -> u32 {
        self.bad
    }

    pub fn deceased(&self) -> u32 {
        self.deceased
    }

    pub fn status(&self) -> HealthStatus {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exactly_sixty_percent_is_excellent() {
        assert_eq!(classify(60, 0, 0, 0), HealthStatus::Excellent);
        assert_eq!(classify(60, 10, 20, 10), HealthStatus::Excellent);
    }

    #[test]
    fn test_healthy_plus_good_seventy_is_very_good() {
        // healthy 59%, healthy + good = 70%
        assert_eq!(classify(59, 11, 0, 30), HealthStatus::VeryGood);
    }

    #[test]
    fn test_healthy_forty_percent_is_very_good() {
        assert_eq!(classify(40, 0, 60, 0), HealthStatus::VeryGood);
    }

    #[test]
    fn test_exactly_twenty_percent_is_good() {
        assert_eq!(classify(20, 0, 80, 0), HealthStatus::Good);
    }

    #[test]
    fn test_healthy_plus_good_fifty_is_good() {
        assert_eq!(classify(0, 50, 0, 50), HealthStatus::Good);
    }

    #[test]
    fn test_deceased_thirty_percent_is_poor() {
        assert_eq!(classify(0, 0, 70, 30), HealthStatus::Poor);
    }

    #[test]
    fn test_deceased_forty_percent_is_very_poor() {
        assert_eq!(classify(0, 0, 60, 40), HealthStatus::VeryPoor);
    }

    #[test]
    fn test_even_quarters_is_good() {
        assert!(validate(40, 10, 10, 10, 10).is_ok());
        assert_eq!(classify(10, 10, 10, 10), HealthStatus::Good);
    }

    #[test]
    fn test_thresholds_are_exact_for_non_decimal_ratios() {
        // 1/3 healthy + 1/3 good = 66.7%, below 70 but above 50
        assert_eq!(classify(1, 1, 1, 0), HealthStatus::Good);
        // 3 of 10 deceased is exactly 30%
        assert_eq!(classify(0, 1, 6, 3), HealthStatus::Poor);
        // 7 of 10 healthy+good is exactly 70%
        assert_eq!(classify(3, 4, 3, 0), HealthStatus::VeryGood);
    }

    #[test]
    fn test_zero_total_is_unknown() {
        assert_eq!(classify(0, 0, 0, 0), HealthStatus::Unknown);
        let dist = HealthDistribution::new(0, 0, 0, 0, 0).unwrap();
        assert_eq!(dist.status(), HealthStatus::Unknown);
    }

    #[test]
    fn test_validate_rejects_mismatch() {
        let err = validate(100, 10, 10, 10, 10).unwrap_err();
        assert_eq!(err, HealthError::CountMismatch { population: 100, total: 40 });
        assert_eq!(
            err.to_string(),
            "Health status total (40) must equal the total population (100)"
        );
    }

    #[test]
    fn test_validate_does_not_overflow() {
        assert!(validate(u32::MAX, u32::MAX, 0, 0, 0).is_ok());
        assert!(validate(u32::MAX, u32::MAX, 1, 0, 0).is_err());
        assert_eq!(classify(u32::MAX, u32::MAX, u32::MAX, u32::MAX), HealthStatus::Good);
    }

    #[test]
    fn test_distribution_carries_counts_and_status() {
        let dist = HealthDistribution::new(100, 70, 20, 5, 5).unwrap();
        assert_eq!(dist.population(), 100);
        assert_eq!(dist.healthy(), 70);
        assert_eq!(dist.good(), 20);
        assert_eq!(dist.bad(), 5);
        assert_eq!(dist.deceased(), 5);
        assert_eq!(dist.status(), HealthStatus::Excellent);
    }

    #[test]
    fn test_distribution_rejects_mismatch() {
        assert!(HealthDistribution::new(10, 1, 1, 1, 1).is_err());
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in HealthStatus::ORDERED {
            assert_eq!(status.as_str().parse::<HealthStatus>().unwrap(), status);
        }
        assert_eq!("unknown".parse::<HealthStatus>().unwrap(), HealthStatus::Unknown);
        assert!("fair".parse::<HealthStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&HealthStatus::VeryGood).unwrap();
        assert_eq!(json, "\"very_good\"");
    }

    #[test]
    fn test_good_or_better() {
        assert!(HealthStatus::Good.is_good_or_better());
        assert!(HealthStatus::Excellent.is_good_or_better());
        assert!(!HealthStatus::Poor.is_good_or_better());
        assert!(!HealthStatus::Unknown.is_good_or_better());
    }
}
