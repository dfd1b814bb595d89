use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::applications::repo;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::jobs;
use crate::models::{ApplicationRow, ProcessingStatus};
use crate::pipeline::intake::{submit_batch, BulkUploadResponse, IncomingFile, IntakeLimits};
use crate::pipeline::ranking::rank_by_match;
use crate::state::AppState;
use crate::storage;

/// List-view projection: everything except the (large) extracted text and
/// the storage path.
#[derive(Debug, Serialize)]
pub struct ApplicationResponse {
    pub id: Uuid,
    pub job_id: Uuid,
    pub original_filename: String,
    pub candidate_name: Option<String>,
    pub match_score: Option<f64>,
    pub status: ProcessingStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl From<ApplicationRow> for ApplicationResponse {
    fn from(row: ApplicationRow) -> Self {
        Self {
            id: row.id,
            job_id: row.job_id,
            original_filename: row.original_filename,
            candidate_name: row.candidate_name,
            match_score: row.match_score,
            status: row.status,
            error_message: row.error_message,
            created_at: row.created_at,
            processed_at: row.processed_at,
        }
    }
}

/// Detail view, including the full extracted CV text.
#[derive(Debug, Serialize)]
pub struct ApplicationDetail {
    #[serde(flatten)]
    pub summary: ApplicationResponse,
    pub extracted_text: Option<String>,
    pub cv_file_path: String,
}

impl From<ApplicationRow> for ApplicationDetail {
    fn from(row: ApplicationRow) -> Self {
        let extracted_text = row.extracted_text.clone();
        let cv_file_path = row.cv_file_path.clone();
        Self {
            summary: row.into(),
            extracted_text,
            cv_file_path,
        }
    }
}

fn application_not_found() -> AppError {
    AppError::NotFound("Application not found".to_string())
}

/// POST /api/v1/jobs/:id/applications
///
/// Multipart bulk CV upload. Returns intake counts immediately; processing
/// completes in the background and is observed by polling.
pub async fn handle_upload_cvs(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<BulkUploadResponse>, AppError> {
    let job = jobs::repo::find_owned(&state.db, job_id, auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Job not found".to_string()))?;

    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart payload: {e}")))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue; // non-file form fields are ignored
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read '{filename}': {e}")))?;
        files.push(IncomingFile {
            filename,
            bytes: bytes.to_vec(),
        });
    }

    if files.is_empty() {
        return Err(AppError::Validation("No files provided".to_string()));
    }

    info!(job_id = %job.id, count = files.len(), "Received CV batch");
    let limits = IntakeLimits::from_config(&state.config);
    let response = submit_batch(&state.db, &state.pipeline, &job, files, &limits).await?;
    Ok(Json(response))
}

/// GET /api/v1/jobs/:id/applications
///
/// All applications for an owned job, best match first; rows without a score
/// sort after all scored ones, in creation order.
pub async fn handle_list_applications(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Vec<ApplicationResponse>>, AppError> {
    jobs::repo::find_owned(&state.db, job_id, auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Job not found".to_string()))?;

    let mut rows = repo::list_for_job(&state.db, job_id).await?;
    rank_by_match(&mut rows);

    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// GET /api/v1/applications/:id
pub async fn handle_get_application(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(application_id): Path<Uuid>,
) -> Result<Json<ApplicationDetail>, AppError> {
    let application = owned_application(&state, application_id, auth.user_id).await?;
    Ok(Json(application.into()))
}

/// DELETE /api/v1/applications/:id
pub async fn handle_delete_application(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(application_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let application = owned_application(&state, application_id, auth.user_id).await?;

    repo::delete(&state.db, application.id).await?;
    storage::remove_cv_file(&application.cv_file_path).await;

    info!(application_id = %application.id, "Application deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Loads an application only when the caller owns its job. Absence and
/// un-ownership are both reported as the same not-found.
async fn owned_application(
    state: &AppState,
    application_id: Uuid,
    caller: Uuid,
) -> Result<ApplicationRow, AppError> {
    let application = repo::find(&state.db, application_id)
        .await?
        .ok_or_else(application_not_found)?;

    jobs::repo::find_owned(&state.db, application.job_id, caller)
        .await?
        .ok_or_else(application_not_found)?;

    Ok(application)
}
