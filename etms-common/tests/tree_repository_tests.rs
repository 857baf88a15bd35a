//! Integration tests for tree, seed and submission repositories
//!
//! Covers owner scoping, duplicate detection, orphan cleanup and the
//! guarantee that a rejected distribution stores nothing.

use chrono::NaiveDate;
use etms_common::db::taxonomy::{self, taxonomy_counts};
use etms_common::db::{
    init_database, seeds, submissions, trees, users, Role, Scope, SeedInput, SubmissionInput,
    TreeInput, TreeUpdate, User,
};
use etms_common::{Error, HealthError};
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn setup() -> (TempDir, SqlitePool) {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("etms.db")).await.unwrap();
    (dir, pool)
}

async fn app_user(pool: &SqlitePool, name: &str) -> User {
    users::create_user(pool, name, "password123", Role::AppUser).await.unwrap()
}

fn narra(population: u32, counts: (u32, u32, u32, u32)) -> TreeInput {
    TreeInput {
        common_name: "Narra".into(),
        scientific_name: "Pterocarpus indicus".into(),
        family: "Fabaceae".into(),
        genus: "Pterocarpus".into(),
        latitude: 14.5,
        longitude: 121.0,
        location_name: None,
        population,
        year: 2024,
        healthy_count: counts.0,
        good_count: counts.1,
        bad_count: counts.2,
        deceased_count: counts.3,
        hectares: 2.0,
        notes: None,
    }
}

fn molave(year: i32) -> TreeInput {
    TreeInput {
        common_name: "Molave".into(),
        scientific_name: "Vitex parviflora".into(),
        family: "Lamiaceae".into(),
        genus: "Vitex".into(),
        latitude: 10.0,
        longitude: 123.0,
        location_name: Some("Ridge".into()),
        population: 10,
        year,
        healthy_count: 0,
        good_count: 0,
        bad_count: 7,
        deceased_count: 3,
        hectares: 0.0,
        notes: None,
    }
}

async fn tree_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM trees").fetch_one(pool).await.unwrap()
}

#[tokio::test]
async fn test_create_derives_status_from_counts() {
    let (_dir, pool) = setup().await;
    let alice = app_user(&pool, "alice").await;

    let id = trees::create_tree(&pool, &narra(100, (60, 20, 10, 10)), alice.id).await.unwrap();
    let tree = trees::get_tree(&pool, id, alice.scope()).await.unwrap();

    assert_eq!(tree.health_status, "excellent");
    assert_eq!(tree.family, "Fabaceae");
    assert_eq!(tree.location_name, "Narra Location");
    assert_eq!(tree.owner.as_deref(), Some("alice"));

    let molave_id = trees::create_tree(&pool, &molave(2024), alice.id).await.unwrap();
    let molave = trees::get_tree(&pool, molave_id, alice.scope()).await.unwrap();
    assert_eq!(molave.health_status, "poor");
    assert_eq!(molave.location_name, "Ridge");
}

#[tokio::test]
async fn test_mismatched_counts_store_nothing() {
    let (_dir, pool) = setup().await;
    let alice = app_user(&pool, "alice").await;

    let err = trees::create_tree(&pool, &narra(100, (10, 10, 10, 10)), alice.id).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Health(HealthError::CountMismatch { population: 100, total: 40 })
    ));
    assert_eq!(tree_count(&pool).await, 0);
    // Nothing half-created either
    assert_eq!(taxonomy_counts(&pool).await.unwrap().species, 0);
}

#[tokio::test]
async fn test_duplicate_observation_conflicts() {
    let (_dir, pool) = setup().await;
    let alice = app_user(&pool, "alice").await;

    trees::create_tree(&pool, &molave(2023), alice.id).await.unwrap();
    let err = trees::create_tree(&pool, &molave(2023), alice.id).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    // Same place, different year is fine
    trees::create_tree(&pool, &molave(2024), alice.id).await.unwrap();
    assert_eq!(tree_count(&pool).await, 2);
}

#[tokio::test]
async fn test_owner_scoping() {
    let (_dir, pool) = setup().await;
    let alice = app_user(&pool, "alice").await;
    let bob = app_user(&pool, "bob").await;
    let head = users::create_user(&pool, "head", "password123", Role::HeadUser).await.unwrap();

    let alice_tree = trees::create_tree(&pool, &narra(5, (5, 0, 0, 0)), alice.id).await.unwrap();
    trees::create_tree(&pool, &molave(2024), bob.id).await.unwrap();

    assert_eq!(trees::list_trees(&pool, alice.scope(), None).await.unwrap().len(), 1);
    assert_eq!(trees::list_trees(&pool, bob.scope(), None).await.unwrap().len(), 1);
    assert_eq!(trees::list_trees(&pool, head.scope(), None).await.unwrap().len(), 2);

    // Bob can neither read nor delete Alice's record
    assert!(matches!(
        trees::get_tree(&pool, alice_tree, bob.scope()).await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        trees::delete_tree(&pool, alice_tree, bob.scope()).await,
        Err(Error::NotFound(_))
    ));
    assert_eq!(trees::delete_all_trees(&pool, bob.scope()).await.unwrap().deleted_count, 1);
    assert!(trees::get_tree(&pool, alice_tree, alice.scope()).await.is_ok());

    // Taxonomy is per owner
    assert_eq!(trees::list_species(&pool, alice.scope()).await.unwrap().len(), 1);
    assert_eq!(trees::list_species(&pool, Scope::All).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_last_tree_cascades_taxonomy() {
    let (_dir, pool) = setup().await;
    let alice = app_user(&pool, "alice").await;

    let narra_id = trees::create_tree(&pool, &narra(5, (5, 0, 0, 0)), alice.id).await.unwrap();

    // A second Pterocarpus species shares genus and family
    let mut other = narra(3, (0, 3, 0, 0));
    other.common_name = "Apalit".into();
    other.scientific_name = "Pterocarpus other".into();
    other.latitude = 15.0;
    let other_id = trees::create_tree(&pool, &other, alice.id).await.unwrap();

    let report = trees::delete_tree(&pool, narra_id, alice.scope()).await.unwrap();
    assert_eq!(report.deleted_count, 1);
    assert_eq!(report.cleanup.species, 1);
    assert_eq!(report.cleanup.genera, 0);
    assert_eq!(report.cleanup.families, 0);
    assert_eq!(report.cleanup.locations, 1);

    let report = trees::delete_tree(&pool, other_id, alice.scope()).await.unwrap();
    assert_eq!(report.cleanup.species, 1);
    assert_eq!(report.cleanup.genera, 1);
    assert_eq!(report.cleanup.families, 1);

    let counts = taxonomy_counts(&pool).await.unwrap();
    assert_eq!((counts.species, counts.genera, counts.families, counts.locations), (0, 0, 0, 0));
}

#[tokio::test]
async fn test_seed_keeps_species_alive() {
    let (_dir, pool) = setup().await;
    let alice = app_user(&pool, "alice").await;

    let tree_id = trees::create_tree(&pool, &narra(5, (5, 0, 0, 0)), alice.id).await.unwrap();
    let seed = SeedInput {
        common_name: "Narra".into(),
        scientific_name: "Pterocarpus indicus".into(),
        family: "Fabaceae".into(),
        genus: "Pterocarpus".into(),
        quantity: 200,
        planting_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        germination_status: Default::default(),
        germination_date: None,
        survival_rate: Some(75.0),
        hectares: 0.5,
        expected_maturity_date: None,
        latitude: 14.5,
        longitude: 121.0,
        notes: None,
    };
    let seed_id = seeds::create_seed(&pool, &seed, alice.id).await.unwrap();

    let report = trees::delete_tree(&pool, tree_id, alice.scope()).await.unwrap();
    assert_eq!(report.cleanup.species, 0);
    // Seed shares the location too
    assert_eq!(report.cleanup.locations, 0);

    let report = seeds::delete_seed(&pool, seed_id, alice.scope()).await.unwrap();
    assert_eq!(report.cleanup.species, 1);
    assert_eq!(report.cleanup.locations, 1);
}

#[tokio::test]
async fn test_seed_validation() {
    let (_dir, pool) = setup().await;
    let alice = app_user(&pool, "alice").await;

    let mut seed = SeedInput {
        common_name: "Narra".into(),
        scientific_name: "Pterocarpus indicus".into(),
        family: "Fabaceae".into(),
        genus: "Pterocarpus".into(),
        quantity: 0,
        planting_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        germination_status: Default::default(),
        germination_date: None,
        survival_rate: None,
        hectares: 0.0,
        expected_maturity_date: None,
        latitude: 14.5,
        longitude: 121.0,
        notes: None,
    };
    assert!(matches!(seeds::create_seed(&pool, &seed, alice.id).await, Err(Error::InvalidInput(_))));

    seed.quantity = 10;
    seed.germination_date = NaiveDate::from_ymd_opt(2024, 5, 1);
    assert!(matches!(seeds::create_seed(&pool, &seed, alice.id).await, Err(Error::InvalidInput(_))));

    seed.germination_date = NaiveDate::from_ymd_opt(2024, 7, 1);
    seeds::create_seed(&pool, &seed, alice.id).await.unwrap();
    assert_eq!(seeds::list_seeds(&pool, alice.scope()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_update_moves_location_and_reclassifies() {
    let (_dir, pool) = setup().await;
    let alice = app_user(&pool, "alice").await;

    let id = trees::create_tree(&pool, &narra(10, (10, 0, 0, 0)), alice.id).await.unwrap();
    let before = trees::get_tree(&pool, id, alice.scope()).await.unwrap();

    let update = TreeUpdate {
        species_id: before.species_id.parse().unwrap(),
        population: 10,
        year: 2025,
        healthy_count: 0,
        good_count: 0,
        bad_count: 4,
        deceased_count: 6,
        latitude: 16.0,
        longitude: 120.5,
        hectares: 1.0,
        notes: Some("resurveyed".into()),
    };
    let cleanup = trees::update_tree(&pool, id, &update, alice.scope()).await.unwrap();
    assert_eq!(cleanup.locations, 1);
    assert_eq!(cleanup.species, 0);

    let after = trees::get_tree(&pool, id, alice.scope()).await.unwrap();
    assert_eq!(after.health_status, "very_poor");
    assert_eq!(after.year, 2025);
    assert_ne!(after.location_id, before.location_id);

    // Counts that do not add up are rejected and nothing changes
    let bad = TreeUpdate { deceased_count: 5, ..update };
    assert!(matches!(
        trees::update_tree(&pool, id, &bad, alice.scope()).await,
        Err(Error::Health(_))
    ));
    let unchanged = trees::get_tree(&pool, id, alice.scope()).await.unwrap();
    assert_eq!(unchanged.deceased_count, 6);
}

#[tokio::test]
async fn test_bulk_delete_skips_foreign_ids() {
    let (_dir, pool) = setup().await;
    let alice = app_user(&pool, "alice").await;
    let bob = app_user(&pool, "bob").await;

    let a1 = trees::create_tree(&pool, &molave(2021), alice.id).await.unwrap();
    let a2 = trees::create_tree(&pool, &molave(2022), alice.id).await.unwrap();
    let b1 = trees::create_tree(&pool, &molave(2021), bob.id).await.unwrap();

    let report = trees::delete_trees(&pool, &[a1, a2, b1], alice.scope()).await.unwrap();
    assert_eq!(report.deleted_count, 2);
    assert_eq!(tree_count(&pool).await, 1);
}

#[tokio::test]
async fn test_submission_import_is_atomic() {
    let (_dir, pool) = setup().await;
    let alice = app_user(&pool, "alice").await;

    let submission = submissions::create_submission(
        &pool,
        &SubmissionInput {
            tree_description: "Large narra near the river".into(),
            latitude: 14.5,
            longitude: 121.0,
            person_name: "Juan".into(),
        },
        None,
    )
    .await
    .unwrap();

    // Rejected record keeps the submission queued
    let err = submissions::import_submission(&pool, submission, &narra(10, (1, 1, 1, 1)), alice.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Health(_)));
    assert_eq!(submissions::list_submissions(&pool, None).await.unwrap().len(), 1);

    let tree_id = submissions::import_submission(&pool, submission, &narra(10, (4, 3, 2, 1)), alice.id)
        .await
        .unwrap();
    assert!(submissions::list_submissions(&pool, None).await.unwrap().is_empty());
    assert_eq!(
        trees::get_tree(&pool, tree_id, alice.scope()).await.unwrap().health_status,
        "very_good"
    );
}

#[tokio::test]
async fn test_submission_requires_fields() {
    let (_dir, pool) = setup().await;

    let result = submissions::create_submission(
        &pool,
        &SubmissionInput {
            tree_description: " ".into(),
            latitude: 14.5,
            longitude: 121.0,
            person_name: "Juan".into(),
        },
        None,
    )
    .await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));

    let result = submissions::create_submission(
        &pool,
        &SubmissionInput {
            tree_description: "x".into(),
            latitude: 95.0,
            longitude: 121.0,
            person_name: "Juan".into(),
        },
        None,
    )
    .await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn test_backfill_legacy_rows() {
    let (_dir, pool) = setup().await;
    let alice = app_user(&pool, "alice").await;

    let id = trees::create_tree(&pool, &narra(5, (5, 0, 0, 0)), alice.id).await.unwrap();
    // Simulate a pre-count record
    sqlx::query(
        "UPDATE trees SET population = 20, healthy_count = 0, health_status = 'very_good' WHERE guid = ?",
    )
    .bind(id.to_string())
    .execute(&pool)
    .await
    .unwrap();

    let report = trees::backfill_legacy_distributions(&pool).await.unwrap();
    assert_eq!(report.updated, 1);

    let tree = trees::get_tree(&pool, id, alice.scope()).await.unwrap();
    assert_eq!(tree.healthy_count, 20);
    assert_eq!(tree.health_status, "excellent");

    // Second run has nothing to do
    assert_eq!(trees::backfill_legacy_distributions(&pool).await.unwrap().updated, 0);
}

#[tokio::test]
async fn test_sweep_orphans() {
    let (_dir, pool) = setup().await;
    let alice = app_user(&pool, "alice").await;
    trees::create_tree(&pool, &molave(2024), alice.id).await.unwrap();

    // Leave an orphaned chain behind
    let mut tx = pool.begin().await.unwrap();
    taxonomy::resolve_species(
        &mut tx,
        taxonomy::TaxonomyNames {
            family: "Dipterocarpaceae",
            genus: "Shorea",
            scientific_name: "Shorea contorta",
            common_name: "White lauan",
        },
        Some(alice.id),
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let report = taxonomy::sweep_orphans(&pool, false).await.unwrap();
    assert_eq!(report.deleted.species, 1);
    assert_eq!(report.deleted.genera, 1);
    assert_eq!(report.deleted.families, 1);
    assert_eq!(report.after.species, 1);

    let report = taxonomy::sweep_orphans(&pool, true).await.unwrap();
    assert_eq!(report.after.species, 0);
    assert_eq!(report.after.locations, 0);
    // Records cascade with their species
    assert_eq!(tree_count(&pool).await, 0);
}

#[tokio::test]
async fn test_public_list_is_capped_and_attributed() {
    let (_dir, pool) = setup().await;
    let visitor = users::create_user(&pool, "visitor", "password123", Role::PublicUser)
        .await
        .unwrap();

    for i in 0..=submissions::PUBLIC_LIST_LIMIT {
        let submitter = if i == submissions::PUBLIC_LIST_LIMIT { Some(visitor.id) } else { None };
        submissions::create_submission(
            &pool,
            &SubmissionInput {
                tree_description: format!("Sighting {}", i),
                latitude: 14.5,
                longitude: 121.0,
                person_name: "Juan".into(),
            },
            submitter,
        )
        .await
        .unwrap();
    }

    let public = submissions::list_submissions(&pool, Some(submissions::PUBLIC_LIST_LIMIT))
        .await
        .unwrap();
    assert_eq!(public.len(), 50);
    assert_eq!(public[0].tree_description, "Sighting 50");
    assert_eq!(public[0].submitted_by.as_deref(), Some("visitor"));
    assert!(public[1].submitted_by.is_none());

    assert_eq!(submissions::list_submissions(&pool, None).await.unwrap().len(), 51);

    let own = submissions::list_user_submissions(&pool, visitor.id).await.unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].tree_description, "Sighting 50");
}
