//! The per-application state machine.
//!
//! `pending → processing → {completed | failed}`; terminal states are never
//! left. A run issues exactly two persistence writes: the claim and the
//! terminal transition.
//!
//! Failure policy is asymmetric on purpose. Text extraction failing means
//! there is nothing to rank, so the application fails and the operator sees
//! it. Name extraction and scoring failures degrade to sentinel values
//! ("Unknown" / 0.0) instead: a best-effort label must not hide an otherwise
//! usable CV.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engines::{CvEngine, EngineError, NameGuess};
use crate::models::{ApplicationRow, JobRow};
use crate::pipeline::store::{CvOutcome, PipelineStore};

/// Extracted text shorter than this (after trimming) cannot be ranked.
/// The boundary is inclusive: 50 usable characters proceed, 49 fail.
pub const MIN_EXTRACTED_CHARS: usize = 50;

/// Failures that terminate an application in `failed`. The display string is
/// what operators see as the stored error message.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("job {0} no longer exists")]
    MissingJob(Uuid),

    #[error("{0}")]
    Extraction(#[from] EngineError),

    #[error("text extraction timed out after {}s", .0.as_secs())]
    ExtractionTimeout(Duration),

    #[error("extracted text is too short or empty ({0} usable characters)")]
    TextTooShort(usize),
}

/// Drives one application through the pipeline.
///
/// Returns `Err` only when the store itself fails mid-run; the row is then
/// left in `processing` for the staleness sweep to reclaim. Every other
/// failure is captured in the row's terminal state.
pub async fn process_application<S>(
    store: &S,
    engine: &dyn CvEngine,
    engine_timeout: Duration,
    application_id: Uuid,
) -> anyhow::Result<()>
where
    S: PipelineStore + ?Sized,
{
    let Some(application) = store.load_application(application_id).await? else {
        // Deleted between enqueue and pickup; not an error.
        warn!(application_id = %application_id, "Application vanished before processing; skipping");
        return Ok(());
    };

    if !store.claim_pending(application_id).await? {
        debug!(application_id = %application_id, "Application is not pending; skipping");
        return Ok(());
    }

    info!(
        application_id = %application_id,
        filename = %application.original_filename,
        "Processing CV"
    );

    let job = store.load_job(application.job_id).await?;
    let verdict = match job {
        Some(job) => run_steps(engine, engine_timeout, &application, &job).await,
        None => Err(PipelineError::MissingJob(application.job_id)),
    };

    match verdict {
        Ok(outcome) => {
            store.store_completed(application_id, &outcome).await?;
            info!(
                application_id = %application_id,
                candidate = %outcome.candidate_name,
                score = outcome.match_score,
                "Processing completed"
            );
        }
        Err(error) => {
            let message = error.to_string();
            store.store_failed(application_id, &message).await?;
            warn!(
                application_id = %application_id,
                error = %message,
                "Processing failed"
            );
        }
    }

    Ok(())
}

/// The extraction/scoring steps. Only text extraction may abort the run;
/// name and score failures are absorbed into sentinels here.
async fn run_steps(
    engine: &dyn CvEngine,
    engine_timeout: Duration,
    application: &ApplicationRow,
    job: &JobRow,
) -> Result<CvOutcome, PipelineError> {
    let path = Path::new(&application.cv_file_path);
    let text = match timeout(engine_timeout, engine.extract_text(path)).await {
        Ok(result) => result?,
        Err(_) => return Err(PipelineError::ExtractionTimeout(engine_timeout)),
    };

    let usable_chars = text.trim().chars().count();
    if usable_chars < MIN_EXTRACTED_CHARS {
        return Err(PipelineError::TextTooShort(usable_chars));
    }

    let name = match timeout(engine_timeout, engine.extract_name(&text)).await {
        Ok(Ok(guess)) => guess,
        Ok(Err(error)) => {
            warn!(error = %error, "Name extraction failed; using sentinel");
            NameGuess::unknown()
        }
        Err(_) => {
            warn!("Name extraction timed out; using sentinel");
            NameGuess::unknown()
        }
    };
    debug!(candidate = %name.name, confidence = name.confidence, "Candidate name extracted");

    let match_score = match timeout(
        engine_timeout,
        engine.score_match(&job.description, &text),
    )
    .await
    {
        Ok(Ok(score)) => score.clamp(0.0, 1.0),
        Ok(Err(error)) => {
            warn!(error = %error, "Scoring failed; using 0.0");
            0.0
        }
        Err(_) => {
            warn!("Scoring timed out; using 0.0");
            0.0
        }
    };

    Ok(CvOutcome {
        extracted_text: text,
        candidate_name: name.name,
        match_score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::UNKNOWN_CANDIDATE;
    use crate::models::ProcessingStatus;
    use crate::pipeline::store::memory::{sample_application, sample_job, MemoryStore};
    use async_trait::async_trait;

    const TIMEOUT: Duration = Duration::from_secs(5);

    /// Deterministic engine: extraction serves canned text per path,
    /// name/score either succeed with fixed values or error on demand.
    struct FakeEngine {
        text: Option<String>,
        fail_name: bool,
        fail_score: bool,
        score: f64,
    }

    impl FakeEngine {
        fn with_text(text: &str) -> Self {
            Self {
                text: Some(text.to_string()),
                fail_name: false,
                fail_score: false,
                score: 0.72,
            }
        }

        fn missing_file() -> Self {
            Self {
                text: None,
                fail_name: false,
                fail_score: false,
                score: 0.72,
            }
        }
    }

    #[async_trait]
    impl CvEngine for FakeEngine {
        async fn extract_text(&self, path: &Path) -> Result<String, EngineError> {
            match &self.text {
                Some(text) => Ok(text.clone()),
                None => Err(EngineError::FileNotFound(path.display().to_string())),
            }
        }

        async fn extract_name(&self, _text: &str) -> Result<NameGuess, EngineError> {
            if self.fail_name {
                Err(EngineError::Inference("name model unavailable".to_string()))
            } else {
                Ok(NameGuess {
                    name: "Alice Carter".to_string(),
                    confidence: 0.9,
                })
            }
        }

        async fn score_match(
            &self,
            _job_description: &str,
            _cv_text: &str,
        ) -> Result<f64, EngineError> {
            if self.fail_score {
                Err(EngineError::Inference("scorer unavailable".to_string()))
            } else {
                Ok(self.score)
            }
        }
    }

    fn long_cv_text() -> String {
        "Alice Carter\nSenior backend engineer with a decade of Rust and \
         distributed systems experience."
            .to_string()
    }

    fn seed(store: &MemoryStore) -> Uuid {
        let job_id = store.add_job(sample_job("Rust engineer for payment systems"));
        store.add_application(sample_application(job_id, "/cvs/alice.pdf"))
    }

    #[tokio::test]
    async fn test_successful_run_completes_with_results() {
        let store = MemoryStore::new();
        let id = seed(&store);
        let engine = FakeEngine::with_text(&long_cv_text());

        process_application(&store, &engine, TIMEOUT, id).await.unwrap();

        let row = store.snapshot(id);
        assert_eq!(row.status, ProcessingStatus::Completed);
        assert_eq!(row.candidate_name.as_deref(), Some("Alice Carter"));
        assert_eq!(row.match_score, Some(0.72));
        assert!(row.extracted_text.is_some());
        assert!(row.processed_at.is_some());
        assert!(row.error_message.is_none());
    }

    #[tokio::test]
    async fn test_status_sequence_is_monotonic() {
        let store = MemoryStore::new();
        let id = seed(&store);
        let engine = FakeEngine::with_text(&long_cv_text());

        process_application(&store, &engine, TIMEOUT, id).await.unwrap();

        assert_eq!(
            store.status_history(id),
            vec![
                ProcessingStatus::Pending,
                ProcessingStatus::Processing,
                ProcessingStatus::Completed,
            ]
        );
    }

    #[tokio::test]
    async fn test_exactly_two_writes_per_run() {
        let store = MemoryStore::new();
        let id = seed(&store);

        process_application(&store, &FakeEngine::with_text(&long_cv_text()), TIMEOUT, id)
            .await
            .unwrap();
        assert_eq!(store.write_count(), 2);

        let failing_id = seed(&store);
        process_application(&store, &FakeEngine::missing_file(), TIMEOUT, failing_id)
            .await
            .unwrap();
        assert_eq!(store.write_count(), 4);
    }

    #[tokio::test]
    async fn test_text_of_49_chars_fails_50_proceeds() {
        let store = MemoryStore::new();
        let engine_49 = FakeEngine::with_text(&"x".repeat(49));
        let engine_50 = FakeEngine::with_text(&"x".repeat(50));

        let short = seed(&store);
        process_application(&store, &engine_49, TIMEOUT, short).await.unwrap();
        let row = store.snapshot(short);
        assert_eq!(row.status, ProcessingStatus::Failed);
        assert!(row.error_message.unwrap().contains("too short"));
        assert!(row.match_score.is_none());
        assert!(row.candidate_name.is_none());

        let exact = seed(&store);
        process_application(&store, &engine_50, TIMEOUT, exact).await.unwrap();
        assert_eq!(store.snapshot(exact).status, ProcessingStatus::Completed);
    }

    #[tokio::test]
    async fn test_missing_file_fails_with_message() {
        let store = MemoryStore::new();
        let id = seed(&store);

        process_application(&store, &FakeEngine::missing_file(), TIMEOUT, id)
            .await
            .unwrap();

        let row = store.snapshot(id);
        assert_eq!(row.status, ProcessingStatus::Failed);
        assert!(row.error_message.unwrap().contains("not found"));
        assert!(row.processed_at.is_some());
    }

    #[tokio::test]
    async fn test_missing_job_fails() {
        let store = MemoryStore::new();
        // Application whose job was never registered.
        let id = store.add_application(sample_application(Uuid::new_v4(), "/cvs/x.pdf"));

        process_application(&store, &FakeEngine::with_text(&long_cv_text()), TIMEOUT, id)
            .await
            .unwrap();

        let row = store.snapshot(id);
        assert_eq!(row.status, ProcessingStatus::Failed);
        assert!(row.error_message.unwrap().contains("job"));
    }

    #[tokio::test]
    async fn test_name_failure_degrades_to_sentinel() {
        let store = MemoryStore::new();
        let id = seed(&store);
        let mut engine = FakeEngine::with_text(&long_cv_text());
        engine.fail_name = true;

        process_application(&store, &engine, TIMEOUT, id).await.unwrap();

        let row = store.snapshot(id);
        assert_eq!(row.status, ProcessingStatus::Completed);
        assert_eq!(row.candidate_name.as_deref(), Some(UNKNOWN_CANDIDATE));
        assert_eq!(row.match_score, Some(0.72));
    }

    #[tokio::test]
    async fn test_score_failure_degrades_to_zero() {
        let store = MemoryStore::new();
        let id = seed(&store);
        let mut engine = FakeEngine::with_text(&long_cv_text());
        engine.fail_score = true;

        process_application(&store, &engine, TIMEOUT, id).await.unwrap();

        let row = store.snapshot(id);
        assert_eq!(row.status, ProcessingStatus::Completed);
        assert_eq!(row.match_score, Some(0.0));
        assert_eq!(row.candidate_name.as_deref(), Some("Alice Carter"));
    }

    #[tokio::test]
    async fn test_out_of_range_score_is_clamped() {
        let store = MemoryStore::new();
        let id = seed(&store);
        let mut engine = FakeEngine::with_text(&long_cv_text());
        engine.score = 1.7;

        process_application(&store, &engine, TIMEOUT, id).await.unwrap();
        assert_eq!(store.snapshot(id).match_score, Some(1.0));
    }

    #[tokio::test]
    async fn test_absent_application_is_a_silent_no_op() {
        let store = MemoryStore::new();
        let engine = FakeEngine::with_text(&long_cv_text());

        process_application(&store, &engine, TIMEOUT, Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_reads_do_not_mutate() {
        let store = MemoryStore::new();
        let id = seed(&store);
        process_application(&store, &FakeEngine::with_text(&long_cv_text()), TIMEOUT, id)
            .await
            .unwrap();

        let first = store.load_application(id).await.unwrap().unwrap();
        let second = store.load_application(id).await.unwrap().unwrap();
        assert_eq!(first.status, second.status);
        assert_eq!(first.match_score, second.match_score);
        assert_eq!(first.candidate_name, second.candidate_name);
        assert_eq!(first.processed_at, second.processed_at);
    }

    #[tokio::test]
    async fn test_terminal_row_is_never_reprocessed() {
        let store = MemoryStore::new();
        let id = seed(&store);
        let engine = FakeEngine::with_text(&long_cv_text());

        process_application(&store, &engine, TIMEOUT, id).await.unwrap();
        let first = store.snapshot(id);

        // A second run must not touch the row.
        process_application(&store, &engine, TIMEOUT, id).await.unwrap();
        let second = store.snapshot(id);

        assert_eq!(first.status, second.status);
        assert_eq!(first.processed_at, second.processed_at);
        assert_eq!(store.write_count(), 2);
    }
}
