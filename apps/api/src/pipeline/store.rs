//! The narrow repository surface the pipeline runs against.
//!
//! Every call is a single atomic statement; no session or transaction is
//! shared between calls, so each processor run owns its own store scope.
//! Implemented for `PgPool` in production and by `MemoryStore` in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{ApplicationRow, JobRow};

/// Result fields persisted when a CV completes the pipeline.
#[derive(Debug, Clone)]
pub struct CvOutcome {
    pub extracted_text: String,
    pub candidate_name: String,
    pub match_score: f64,
}

#[async_trait]
pub trait PipelineStore: Send + Sync {
    async fn load_application(&self, id: Uuid) -> anyhow::Result<Option<ApplicationRow>>;

    async fn load_job(&self, id: Uuid) -> anyhow::Result<Option<JobRow>>;

    /// Compare-and-set `pending → processing`. Returns false when the row is
    /// not `pending`, which makes at-most-one-run-per-application a property
    /// of the store rather than of scheduling discipline.
    async fn claim_pending(&self, id: Uuid) -> anyhow::Result<bool>;

    /// Terminal write for a successful run.
    async fn store_completed(&self, id: Uuid, outcome: &CvOutcome) -> anyhow::Result<()>;

    /// Terminal write for a failed run.
    async fn store_failed(&self, id: Uuid, message: &str) -> anyhow::Result<()>;

    /// Intake: creates a `pending` application row.
    async fn insert_application(
        &self,
        job_id: Uuid,
        cv_file_path: &str,
        original_filename: &str,
    ) -> anyhow::Result<ApplicationRow>;

    /// Reconciliation sweep: resets rows claimed before `cutoff` and still
    /// `processing` back to `pending`, returning their ids for re-queueing.
    async fn requeue_stale(&self, cutoff: DateTime<Utc>) -> anyhow::Result<Vec<Uuid>>;
}

#[async_trait]
impl PipelineStore for PgPool {
    async fn load_application(&self, id: Uuid) -> anyhow::Result<Option<ApplicationRow>> {
        Ok(crate::applications::repo::find(self, id).await?)
    }

    async fn load_job(&self, id: Uuid) -> anyhow::Result<Option<JobRow>> {
        Ok(crate::jobs::repo::find(self, id).await?)
    }

    async fn claim_pending(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE applications
            SET status = 'processing', processing_started_at = now()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(self)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn store_completed(&self, id: Uuid, outcome: &CvOutcome) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE applications
            SET status = 'completed',
                extracted_text = $2,
                candidate_name = $3,
                match_score = $4,
                processed_at = now()
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(&outcome.extracted_text)
        .bind(&outcome.candidate_name)
        .bind(outcome.match_score)
        .execute(self)
        .await?;

        Ok(())
    }

    async fn store_failed(&self, id: Uuid, message: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE applications
            SET status = 'failed',
                error_message = $2,
                processed_at = now()
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(message)
        .execute(self)
        .await?;

        Ok(())
    }

    async fn insert_application(
        &self,
        job_id: Uuid,
        cv_file_path: &str,
        original_filename: &str,
    ) -> anyhow::Result<ApplicationRow> {
        Ok(crate::applications::repo::insert(self, job_id, cv_file_path, original_filename).await?)
    }

    async fn requeue_stale(&self, cutoff: DateTime<Utc>) -> anyhow::Result<Vec<Uuid>> {
        Ok(sqlx::query_scalar(
            r#"
            UPDATE applications
            SET status = 'pending', processing_started_at = NULL
            WHERE status = 'processing' AND processing_started_at < $1
            RETURNING id
            "#,
        )
        .bind(cutoff)
        .fetch_all(self)
        .await?)
    }
}

#[cfg(test)]
pub(crate) mod memory {
    //! In-memory `PipelineStore` with the same claim/terminal-write semantics
    //! as the Postgres implementation, plus bookkeeping the state-machine
    //! tests assert on (status history, write counts).

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::models::ProcessingStatus;

    #[derive(Default)]
    pub struct MemoryStore {
        jobs: Mutex<HashMap<Uuid, JobRow>>,
        applications: Mutex<HashMap<Uuid, ApplicationRow>>,
        history: Mutex<HashMap<Uuid, Vec<ProcessingStatus>>>,
        writes: AtomicUsize,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_job(&self, job: JobRow) -> Uuid {
            let id = job.id;
            self.jobs.lock().unwrap().insert(id, job);
            id
        }

        pub fn add_application(&self, application: ApplicationRow) -> Uuid {
            let id = application.id;
            self.history
                .lock()
                .unwrap()
                .insert(id, vec![application.status]);
            self.applications.lock().unwrap().insert(id, application);
            id
        }

        pub fn snapshot(&self, id: Uuid) -> ApplicationRow {
            self.applications.lock().unwrap()[&id].clone()
        }

        pub fn status_history(&self, id: Uuid) -> Vec<ProcessingStatus> {
            self.history.lock().unwrap()[&id].clone()
        }

        pub fn application_count(&self) -> usize {
            self.applications.lock().unwrap().len()
        }

        pub fn write_count(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }

        fn record_transition(&self, id: Uuid, status: ProcessingStatus) {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.history.lock().unwrap().entry(id).or_default().push(status);
        }
    }

    pub fn sample_job(description: &str) -> JobRow {
        JobRow {
            id: Uuid::new_v4(),
            title: "Backend Engineer".to_string(),
            description: description.to_string(),
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn sample_application(job_id: Uuid, cv_file_path: &str) -> ApplicationRow {
        ApplicationRow {
            id: Uuid::new_v4(),
            job_id,
            cv_file_path: cv_file_path.to_string(),
            original_filename: "cv.pdf".to_string(),
            candidate_name: None,
            match_score: None,
            extracted_text: None,
            status: ProcessingStatus::Pending,
            error_message: None,
            created_at: Utc::now(),
            processing_started_at: None,
            processed_at: None,
        }
    }

    #[async_trait]
    impl PipelineStore for MemoryStore {
        async fn load_application(&self, id: Uuid) -> anyhow::Result<Option<ApplicationRow>> {
            Ok(self.applications.lock().unwrap().get(&id).cloned())
        }

        async fn load_job(&self, id: Uuid) -> anyhow::Result<Option<JobRow>> {
            Ok(self.jobs.lock().unwrap().get(&id).cloned())
        }

        async fn claim_pending(&self, id: Uuid) -> anyhow::Result<bool> {
            let claimed = {
                let mut applications = self.applications.lock().unwrap();
                match applications.get_mut(&id) {
                    Some(row) if row.status == ProcessingStatus::Pending => {
                        row.status = ProcessingStatus::Processing;
                        row.processing_started_at = Some(Utc::now());
                        true
                    }
                    _ => false,
                }
            };

            if claimed {
                self.record_transition(id, ProcessingStatus::Processing);
            }
            Ok(claimed)
        }

        async fn store_completed(&self, id: Uuid, outcome: &CvOutcome) -> anyhow::Result<()> {
            let written = {
                let mut applications = self.applications.lock().unwrap();
                match applications.get_mut(&id) {
                    Some(row) if row.status == ProcessingStatus::Processing => {
                        row.status = ProcessingStatus::Completed;
                        row.extracted_text = Some(outcome.extracted_text.clone());
                        row.candidate_name = Some(outcome.candidate_name.clone());
                        row.match_score = Some(outcome.match_score);
                        row.processed_at = Some(Utc::now());
                        true
                    }
                    _ => false,
                }
            };

            if written {
                self.record_transition(id, ProcessingStatus::Completed);
            }
            Ok(())
        }

        async fn store_failed(&self, id: Uuid, message: &str) -> anyhow::Result<()> {
            let written = {
                let mut applications = self.applications.lock().unwrap();
                match applications.get_mut(&id) {
                    Some(row) if row.status == ProcessingStatus::Processing => {
                        row.status = ProcessingStatus::Failed;
                        row.error_message = Some(message.to_string());
                        row.processed_at = Some(Utc::now());
                        true
                    }
                    _ => false,
                }
            };

            if written {
                self.record_transition(id, ProcessingStatus::Failed);
            }
            Ok(())
        }

        async fn insert_application(
            &self,
            job_id: Uuid,
            cv_file_path: &str,
            original_filename: &str,
        ) -> anyhow::Result<ApplicationRow> {
            let mut row = sample_application(job_id, cv_file_path);
            row.original_filename = original_filename.to_string();
            let id = self.add_application(row);
            Ok(self.snapshot(id))
        }

        async fn requeue_stale(&self, cutoff: DateTime<Utc>) -> anyhow::Result<Vec<Uuid>> {
            let mut stale = Vec::new();
            let mut applications = self.applications.lock().unwrap();
            for (id, row) in applications.iter_mut() {
                if row.status == ProcessingStatus::Processing
                    && row.processing_started_at.is_some_and(|t| t < cutoff)
                {
                    row.status = ProcessingStatus::Pending;
                    row.processing_started_at = None;
                    stale.push(*id);
                }
            }
            Ok(stale)
        }
    }
}
