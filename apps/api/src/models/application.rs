use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle of one CV through the pipeline.
///
/// `pending → processing → {completed | failed}`; terminal states are never
/// left automatically. Serialized lowercase everywhere (API and database).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "processing_status", rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }
}

/// One candidate's CV submission against a job.
///
/// `cv_file_path` and `original_filename` are fixed at upload time; the
/// remaining mutable fields are written only by the pipeline.
/// `candidate_name` and `match_score` are populated iff the row completed;
/// a failed row carries `error_message` instead. `processed_at` is stamped
/// on the transition out of `processing`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApplicationRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub cv_file_path: String,
    pub original_filename: String,
    pub candidate_name: Option<String>,
    pub match_score: Option<f64>,
    pub extracted_text: Option<String>,
    pub status: ProcessingStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Stamped when a worker claims the row; the staleness sweep uses it to
    /// spot runs that died between the claim and the terminal write.
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
}
