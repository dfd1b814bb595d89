use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::jobs::repo::{self, JobStats};
use crate::models::JobRow;
use crate::state::AppState;

const TITLE_MIN: usize = 3;
const TITLE_MAX: usize = 200;
const DESCRIPTION_MIN: usize = 10;

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateJobRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub application_count: i64,
}

impl JobResponse {
    fn from_row(job: JobRow, application_count: i64) -> Self {
        Self {
            id: job.id,
            title: job.title,
            description: job.description,
            created_by: job.created_by,
            created_at: job.created_at,
            updated_at: job.updated_at,
            application_count,
        }
    }
}

fn validate_title(title: &str) -> Result<(), AppError> {
    let len = title.trim().chars().count();
    if !(TITLE_MIN..=TITLE_MAX).contains(&len) {
        return Err(AppError::Validation(format!(
            "Title must be {TITLE_MIN}-{TITLE_MAX} characters"
        )));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), AppError> {
    if description.trim().chars().count() < DESCRIPTION_MIN {
        return Err(AppError::Validation(format!(
            "Description must be at least {DESCRIPTION_MIN} characters"
        )));
    }
    Ok(())
}

fn job_not_found() -> AppError {
    AppError::NotFound("Job not found".to_string())
}

/// POST /api/v1/jobs
pub async fn handle_create_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<JobResponse>), AppError> {
    validate_title(&req.title)?;
    validate_description(&req.description)?;

    let job = repo::insert(&state.db, req.title.trim(), &req.description, auth.user_id).await?;
    info!(job_id = %job.id, title = %job.title, "Job created");

    Ok((StatusCode::CREATED, Json(JobResponse::from_row(job, 0))))
}

/// GET /api/v1/jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<JobResponse>>, AppError> {
    let jobs = repo::list_for_owner(&state.db, auth.user_id).await?;
    let ids: Vec<Uuid> = jobs.iter().map(|j| j.id).collect();
    let counts = repo::application_counts(&state.db, &ids).await?;

    Ok(Json(
        jobs.into_iter()
            .map(|job| {
                let count = counts.get(&job.id).copied().unwrap_or(0);
                JobResponse::from_row(job, count)
            })
            .collect(),
    ))
}

/// GET /api/v1/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobResponse>, AppError> {
    let job = repo::find_owned(&state.db, job_id, auth.user_id)
        .await?
        .ok_or_else(job_not_found)?;
    let counts = repo::application_counts(&state.db, &[job.id]).await?;
    let count = counts.get(&job.id).copied().unwrap_or(0);

    Ok(Json(JobResponse::from_row(job, count)))
}

/// PUT /api/v1/jobs/:id
pub async fn handle_update_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<Uuid>,
    Json(req): Json<UpdateJobRequest>,
) -> Result<Json<JobResponse>, AppError> {
    if let Some(title) = &req.title {
        validate_title(title)?;
    }
    if let Some(description) = &req.description {
        validate_description(description)?;
    }

    let job = repo::update(
        &state.db,
        job_id,
        auth.user_id,
        req.title.as_deref().map(str::trim),
        req.description.as_deref(),
    )
    .await?
    .ok_or_else(job_not_found)?;

    info!(job_id = %job.id, "Job updated");
    let counts = repo::application_counts(&state.db, &[job.id]).await?;
    let count = counts.get(&job.id).copied().unwrap_or(0);

    Ok(Json(JobResponse::from_row(job, count)))
}

/// DELETE /api/v1/jobs/:id
pub async fn handle_delete_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !repo::delete(&state.db, job_id, auth.user_id).await? {
        return Err(job_not_found());
    }

    info!(job_id = %job_id, "Job deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/jobs/:id/stats
pub async fn handle_job_stats(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStats>, AppError> {
    repo::find_owned(&state.db, job_id, auth.user_id)
        .await?
        .ok_or_else(job_not_found)?;

    Ok(Json(repo::stats(&state.db, job_id).await?))
}
