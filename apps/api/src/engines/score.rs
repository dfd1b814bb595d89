//! Semantic match scoring via an embedding inference service.
//!
//! The service exposes a single `/embed` endpoint that returns one embedding
//! vector per input text; similarity is computed in-process as cosine of the
//! two vectors. Transient failures (429/5xx/network) are retried with
//! exponential backoff.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use crate::engines::EngineError;

const MAX_RETRIES: u32 = 3;

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    inputs: [&'a str; 2],
}

pub struct EmbeddingScorer {
    client: Client,
    embed_url: String,
}

impl EmbeddingScorer {
    pub fn new(base_url: String, request_timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(request_timeout)
                .build()
                .expect("Failed to build HTTP client"),
            embed_url: format!("{}/embed", base_url.trim_end_matches('/')),
        }
    }

    /// Scores `cv_text` against `job_description`, returning a value in [0, 1].
    pub async fn score(
        &self,
        job_description: &str,
        cv_text: &str,
    ) -> Result<f64, EngineError> {
        if job_description.trim().is_empty() || cv_text.trim().is_empty() {
            warn!("Empty job description or CV text; scoring as 0.0");
            return Ok(0.0);
        }

        let embeddings = self.embed_pair(job_description, cv_text).await?;
        let score = cosine_similarity(&embeddings.0, &embeddings.1).clamp(0.0, 1.0);
        debug!(score, "Match score computed");
        Ok(score)
    }

    /// Fetches embeddings for both texts in one request.
    /// Retries on 429 and 5xx with exponential backoff.
    async fn embed_pair(
        &self,
        first: &str,
        second: &str,
    ) -> Result<(Vec<f64>, Vec<f64>), EngineError> {
        let request_body = EmbedRequest {
            inputs: [first, second],
        };

        let mut last_error: Option<EngineError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Embedding request attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&self.embed_url)
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(EngineError::Inference(e.to_string()));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                last_error = Some(EngineError::Inference(format!(
                    "embedding service returned {status}: {body}"
                )));
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(EngineError::Inference(format!(
                    "embedding service returned {status}: {body}"
                )));
            }

            let vectors: Vec<Vec<f64>> = response
                .json()
                .await
                .map_err(|e| EngineError::Inference(format!("invalid embedding response: {e}")))?;

            let mut vectors = vectors.into_iter();
            return match (vectors.next(), vectors.next()) {
                (Some(a), Some(b)) => Ok((a, b)),
                _ => Err(EngineError::Inference(
                    "embedding service returned fewer than two vectors".to_string(),
                )),
            };
        }

        Err(last_error.unwrap_or_else(|| {
            EngineError::Inference(format!("gave up after {MAX_RETRIES} attempts"))
        }))
    }
}

/// Cosine similarity of two vectors. Zero-magnitude or mismatched inputs
/// score 0.0 rather than erroring.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_vectors_score_one() {
        let v = vec![0.3, -0.5, 0.8];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_orthogonal_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn test_opposite_vectors_score_negative_before_clamp() {
        assert!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) < 0.0);
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_mismatched_lengths_score_zero() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }
}
