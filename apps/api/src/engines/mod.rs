//! CV analysis engines — text extraction, candidate-name extraction and
//! semantic scoring behind one pluggable trait.
//!
//! The pipeline holds an `Arc<dyn CvEngine>` and never knows which backend is
//! wired in, so tests swap in deterministic fakes. `StandardCvEngine` is the
//! production wiring: local document parsing plus an embedding inference
//! service for scoring.

pub mod name;
pub mod score;
pub mod text;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::engines::score::EmbeddingScorer;

/// Placeholder candidate name used when name extraction cannot produce one.
pub const UNKNOWN_CANDIDATE: &str = "Unknown";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("CV file not found: {0}")]
    FileNotFound(String),

    #[error("text extraction failed: {0}")]
    Extraction(String),

    #[error("inference request failed: {0}")]
    Inference(String),
}

/// A candidate name with the extractor's confidence in it.
#[derive(Debug, Clone, PartialEq)]
pub struct NameGuess {
    pub name: String,
    pub confidence: f64,
}

impl NameGuess {
    /// The sentinel substituted when name extraction fails or finds nothing.
    pub fn unknown() -> Self {
        Self {
            name: UNKNOWN_CANDIDATE.to_string(),
            confidence: 0.0,
        }
    }
}

/// The extraction/scoring provider consumed by the CV processor.
///
/// Failure policy is decided by the caller, not here: extraction errors are
/// pipeline-fatal, while name and score errors are absorbed into sentinel
/// values by the processor.
#[async_trait]
pub trait CvEngine: Send + Sync {
    /// Returns normalized document text for the file at `path`.
    async fn extract_text(&self, path: &Path) -> Result<String, EngineError>;

    /// Extracts the candidate's name from document text.
    async fn extract_name(&self, text: &str) -> Result<NameGuess, EngineError>;

    /// Semantic similarity of `cv_text` against `job_description`, in [0, 1].
    async fn score_match(&self, job_description: &str, cv_text: &str)
        -> Result<f64, EngineError>;
}

/// Production engine: pdf/docx/txt parsing in-process, scoring via the
/// embedding inference service.
pub struct StandardCvEngine {
    scorer: EmbeddingScorer,
}

impl StandardCvEngine {
    pub fn new(embedding_url: String, request_timeout: Duration) -> Self {
        Self {
            scorer: EmbeddingScorer::new(embedding_url, request_timeout),
        }
    }
}

#[async_trait]
impl CvEngine for StandardCvEngine {
    async fn extract_text(&self, path: &Path) -> Result<String, EngineError> {
        text::extract_document_text(path).await
    }

    async fn extract_name(&self, text: &str) -> Result<NameGuess, EngineError> {
        Ok(name::extract_candidate_name(text))
    }

    async fn score_match(
        &self,
        job_description: &str,
        cv_text: &str,
    ) -> Result<f64, EngineError> {
        self.scorer.score(job_description, cv_text).await
    }
}
