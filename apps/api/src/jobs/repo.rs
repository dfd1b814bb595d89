use std::collections::HashMap;

use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::JobRow;

/// Application counts for one job, broken down by status.
#[derive(Debug, serde::Serialize, FromRow)]
pub struct JobStats {
    pub total: i64,
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

pub async fn insert(
    pool: &PgPool,
    title: &str,
    description: &str,
    created_by: Uuid,
) -> Result<JobRow, sqlx::Error> {
    sqlx::query_as::<_, JobRow>(
        r#"
        INSERT INTO jobs (id, title, description, created_by)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(title)
    .bind(description)
    .bind(created_by)
    .fetch_one(pool)
    .await
}

/// Lookup with no ownership filter; used by the pipeline, which reads the
/// description regardless of who is asking.
pub async fn find(pool: &PgPool, job_id: Uuid) -> Result<Option<JobRow>, sqlx::Error> {
    sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1")
        .bind(job_id)
        .fetch_optional(pool)
        .await
}

/// Ownership-checked lookup. Absence and un-ownership are indistinguishable
/// to callers.
pub async fn find_owned(
    pool: &PgPool,
    job_id: Uuid,
    owner: Uuid,
) -> Result<Option<JobRow>, sqlx::Error> {
    sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1 AND created_by = $2")
        .bind(job_id)
        .bind(owner)
        .fetch_optional(pool)
        .await
}

pub async fn list_for_owner(pool: &PgPool, owner: Uuid) -> Result<Vec<JobRow>, sqlx::Error> {
    sqlx::query_as::<_, JobRow>(
        "SELECT * FROM jobs WHERE created_by = $1 ORDER BY created_at DESC",
    )
    .bind(owner)
    .fetch_all(pool)
    .await
}

pub async fn update(
    pool: &PgPool,
    job_id: Uuid,
    owner: Uuid,
    title: Option<&str>,
    description: Option<&str>,
) -> Result<Option<JobRow>, sqlx::Error> {
    sqlx::query_as::<_, JobRow>(
        r#"
        UPDATE jobs
        SET title = COALESCE($3, title),
            description = COALESCE($4, description),
            updated_at = now()
        WHERE id = $1 AND created_by = $2
        RETURNING *
        "#,
    )
    .bind(job_id)
    .bind(owner)
    .bind(title)
    .bind(description)
    .fetch_optional(pool)
    .await
}

/// Deletes a job and (via cascade) all of its applications.
pub async fn delete(pool: &PgPool, job_id: Uuid, owner: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM jobs WHERE id = $1 AND created_by = $2")
        .bind(job_id)
        .bind(owner)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Application counts per job, for job listings.
pub async fn application_counts(
    pool: &PgPool,
    job_ids: &[Uuid],
) -> Result<HashMap<Uuid, i64>, sqlx::Error> {
    let rows: Vec<(Uuid, i64)> = sqlx::query_as(
        "SELECT job_id, count(*) FROM applications WHERE job_id = ANY($1) GROUP BY job_id",
    )
    .bind(job_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

pub async fn stats(pool: &PgPool, job_id: Uuid) -> Result<JobStats, sqlx::Error> {
    sqlx::query_as::<_, JobStats>(
        r#"
        SELECT count(*) AS total,
               count(*) FILTER (WHERE status = 'pending') AS pending,
               count(*) FILTER (WHERE status = 'processing') AS processing,
               count(*) FILTER (WHERE status = 'completed') AS completed,
               count(*) FILTER (WHERE status = 'failed') AS failed
        FROM applications
        WHERE job_id = $1
        "#,
    )
    .bind(job_id)
    .fetch_one(pool)
    .await
}
