//! Batch CV intake.
//!
//! One application per uploaded file, each scheduled independently. The only
//! whole-batch rejection is the size cap, checked before any file touches
//! disk; after that, a file failing to save or record never stops the rest of
//! the batch — failures are accumulated and reported per file.

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;
use crate::models::JobRow;
use crate::pipeline::dispatcher::PipelineHandle;
use crate::pipeline::store::PipelineStore;
use crate::storage;

/// A file as received from the upload request.
pub struct IncomingFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Serialize)]
pub struct BulkUploadResponse {
    pub total_files: usize,
    pub uploaded: usize,
    pub failed: usize,
    pub failed_files: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct IntakeLimits {
    pub max_files: usize,
    pub max_file_size: usize,
    pub upload_dir: String,
}

impl IntakeLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_files: config.max_files_per_upload,
            max_file_size: config.max_file_size_bytes,
            upload_dir: config.upload_dir.clone(),
        }
    }
}

/// Persists a batch of CV files for `job` and schedules one processor run
/// per created application. The caller has already verified job ownership.
pub async fn submit_batch<S>(
    store: &S,
    pipeline: &PipelineHandle,
    job: &JobRow,
    files: Vec<IncomingFile>,
    limits: &IntakeLimits,
) -> Result<BulkUploadResponse, AppError>
where
    S: PipelineStore + ?Sized,
{
    if files.len() > limits.max_files {
        return Err(AppError::Validation(format!(
            "Too many files. Max: {}",
            limits.max_files
        )));
    }

    let total_files = files.len();
    let mut uploaded = 0usize;
    let mut failed_files = Vec::new();

    for file in files {
        match admit_file(store, pipeline, job, &file, limits).await {
            Ok(application_id) => {
                uploaded += 1;
                info!(
                    job_id = %job.id,
                    application_id = %application_id,
                    file = %file.filename,
                    "CV accepted"
                );
            }
            Err(error) => {
                warn!(job_id = %job.id, file = %file.filename, error = %error, "CV rejected");
                failed_files.push(file.filename);
            }
        }
    }

    let failed = failed_files.len();
    Ok(BulkUploadResponse {
        total_files,
        uploaded,
        failed,
        failed_files,
        message: format!(
            "Successfully uploaded {uploaded}/{total_files} files. Processing started in background."
        ),
    })
}

async fn admit_file<S>(
    store: &S,
    pipeline: &PipelineHandle,
    job: &JobRow,
    file: &IncomingFile,
    limits: &IntakeLimits,
) -> anyhow::Result<Uuid>
where
    S: PipelineStore + ?Sized,
{
    let saved = storage::save_cv_file(
        &limits.upload_dir,
        job.id,
        &file.filename,
        &file.bytes,
        limits.max_file_size,
    )
    .await?;

    let application = store
        .insert_application(job.id, &saved.path, &file.filename)
        .await?;

    pipeline.enqueue(application.id).await;
    Ok(application.id)
}
