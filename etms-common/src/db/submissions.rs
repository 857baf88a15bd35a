//! Public tree sighting submissions
//!
//! Anyone may submit a sighting; a signed-in submitter is recorded so
//! public users can follow their own submissions. App users review the
//! queue and either import a submission as a tree record or discard it.

use crate::db::models::{require_text, validate_coordinates, Submission, SubmissionInput, TreeInput};
use crate::db::trees::{insert_tree, validate_tree_input};
use crate::{ids, Error, Result};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

/// Most recent submissions shown on the public list
pub const PUBLIC_LIST_LIMIT: i64 = 50;

const SUBMISSION_SELECT: &str = r#"
    SELECT s.guid AS id, s.tree_description, s.latitude, s.longitude, s.person_name,
           u.username AS submitted_by, CAST(s.created_at AS TEXT) AS created_at
    FROM submissions s
    LEFT JOIN users u ON u.guid = s.user_id
"#;

pub async fn create_submission(
    pool: &SqlitePool,
    input: &SubmissionInput,
    submitter: Option<Uuid>,
) -> Result<Uuid> {
    require_text("tree_description", &input.tree_description)?;
    require_text("person_name", &input.person_name)?;
    validate_coordinates(input.latitude, input.longitude)?;

    let id = ids::generate();
    sqlx::query(
        r#"
        INSERT INTO submissions (guid, tree_description, latitude, longitude, person_name, user_id)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(input.tree_description.trim())
    .bind(input.latitude)
    .bind(input.longitude)
    .bind(input.person_name.trim())
    .bind(submitter.map(|u| u.to_string()))
    .execute(pool)
    .await?;

    info!(
        submission_id = %id,
        person = %input.person_name.trim(),
        signed_in = submitter.is_some(),
        "Received public submission"
    );
    Ok(id)
}

/// Newest first; `limit` caps the number returned
pub async fn list_submissions(pool: &SqlitePool, limit: Option<i64>) -> Result<Vec<Submission>> {
    let sql = format!("{} ORDER BY s.created_at DESC, s.rowid DESC LIMIT ?", SUBMISSION_SELECT);

    // SQLite treats a negative LIMIT as no limit
    let submissions = sqlx::query_as::<_, Submission>(&sql)
        .bind(limit.unwrap_or(-1))
        .fetch_all(pool)
        .await?;

    Ok(submissions)
}

/// Submissions made by one signed-in user, newest first
pub async fn list_user_submissions(pool: &SqlitePool, user: Uuid) -> Result<Vec<Submission>> {
    let sql = format!(
        "{} WHERE s.user_id = ? ORDER BY s.created_at DESC, s.rowid DESC",
        SUBMISSION_SELECT
    );

    let submissions = sqlx::query_as::<_, Submission>(&sql)
        .bind(user.to_string())
        .fetch_all(pool)
        .await?;

    Ok(submissions)
}

pub async fn delete_submission(pool: &SqlitePool, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM submissions WHERE guid = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Submission {}", id)));
    }

    info!(submission_id = %id, "Deleted submission");
    Ok(())
}

/// Turn a submission into a tree record owned by `owner`
///
/// The tree is created and the submission removed in one transaction, so a
/// rejected record leaves the submission in the queue.
pub async fn import_submission(
    pool: &SqlitePool,
    id: Uuid,
    record: &TreeInput,
    owner: Uuid,
) -> Result<Uuid> {
    let distribution = validate_tree_input(record)?;

    let mut tx = pool.begin().await?;

    let exists: Option<String> = sqlx::query_scalar("SELECT guid FROM submissions WHERE guid = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(Error::NotFound(format!("Submission {}", id)));
    }

    let tree_id = insert_tree(&mut tx, record, distribution, owner).await?;

    sqlx::query("DELETE FROM submissions WHERE guid = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(submission_id = %id, tree_id = %tree_id, "Imported submission as tree record");
    Ok(tree_id)
}
