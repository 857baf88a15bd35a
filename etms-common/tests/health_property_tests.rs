//! Property tests for health distribution validation and classification
//!
//! Small exhaustive grids stand in for randomised inputs.

use etms_common::health::{classify, validate};
use etms_common::{HealthDistribution, HealthError, HealthStatus};

const GRID: u32 = 12;

fn grid() -> impl Iterator<Item = (u32, u32, u32, u32)> {
    (0..=GRID).flat_map(|h| {
        (0..=GRID).flat_map(move |g| (0..=GRID).flat_map(move |b| (0..=GRID).map(move |d| (h, g, b, d))))
    })
}

/// Ordering used for monotonicity: unknown sorts below every real status
fn order(status: HealthStatus) -> i16 {
    status.rank().map(i16::from).unwrap_or(-1)
}

#[test]
fn test_validate_accepts_exact_sum_only() {
    for (h, g, b, d) in grid() {
        let sum = h + g + b + d;
        assert!(validate(sum, h, g, b, d).is_ok());
        assert_eq!(
            validate(sum + 1, h, g, b, d),
            Err(HealthError::CountMismatch { population: u64::from(sum + 1), total: u64::from(sum) })
        );
        if sum > 0 {
            assert!(validate(sum - 1, h, g, b, d).is_err());
        }
    }
}

#[test]
fn test_more_healthy_never_lowers_status() {
    for (h, g, b, d) in grid() {
        let before = order(classify(h, g, b, d));
        let after = order(classify(h + 1, g, b, d));
        assert!(
            after >= before,
            "classify({h}+1, {g}, {b}, {d}) dropped from {before} to {after}"
        );
    }
}

#[test]
fn test_boundary_table() {
    let cases = [
        ((60, 0, 0, 0), HealthStatus::Excellent),
        ((59, 11, 0, 30), HealthStatus::VeryGood),
        ((20, 0, 80, 0), HealthStatus::Good),
        ((0, 0, 70, 30), HealthStatus::Poor),
        ((0, 0, 60, 40), HealthStatus::VeryPoor),
        ((10, 10, 10, 10), HealthStatus::Good),
    ];

    for ((h, g, b, d), expected) in cases {
        let dist = HealthDistribution::new(h + g + b + d, h, g, b, d).unwrap();
        assert_eq!(dist.status(), expected, "({h}, {g}, {b}, {d})");
        assert_eq!(classify(h, g, b, d).as_str(), expected.as_str());
    }
}

#[test]
fn test_mismatch_is_rejected_with_message() {
    let err = HealthDistribution::new(100, 10, 10, 10, 10).unwrap_err();
    assert_eq!(err, HealthError::CountMismatch { population: 100, total: 40 });
    assert_eq!(
        err.to_string(),
        "Health status total (40) must equal the total population (100)"
    );
}

#[test]
fn test_classification_is_idempotent() {
    for (h, g, b, d) in grid().step_by(7) {
        let first = HealthDistribution::new(h + g + b + d, h, g, b, d).unwrap();
        let second = HealthDistribution::new(
            first.population(),
            first.healthy(),
            first.good(),
            first.bad(),
            first.deceased(),
        )
        .unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn test_zero_total_is_unknown() {
    let dist = HealthDistribution::new(0, 0, 0, 0, 0).unwrap();
    assert_eq!(dist.status(), HealthStatus::Unknown);
    assert!(!dist.status().is_good_or_better());
}

#[test]
fn test_every_nonempty_distribution_gets_a_rank() {
    for (h, g, b, d) in grid().skip(1) {
        assert!(classify(h, g, b, d).rank().is_some());
    }
}
