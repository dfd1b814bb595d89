use std::time::Duration;

use anyhow::{Context, Result};

/// File extensions accepted by the CV upload endpoint.
pub const ALLOWED_EXTENSIONS: &[&str] = &[".pdf", ".docx", ".txt"];

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub embedding_url: String,
    pub port: u16,
    pub rust_log: String,
    pub upload_dir: String,
    pub max_file_size_bytes: usize,
    pub max_files_per_upload: usize,
    /// Number of concurrent pipeline workers; bounds in-flight CV processing.
    pub worker_concurrency: usize,
    pub engine_timeout: Duration,
    /// Age after which a row stuck in `processing` is considered abandoned.
    pub stale_processing_after: Duration,
    pub sweep_interval: Duration,
    pub token_ttl_minutes: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            jwt_secret: require_env("JWT_SECRET")?,
            embedding_url: require_env("EMBEDDING_URL")?,
            port: env_or("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
            upload_dir: env_or("UPLOAD_DIR", "./uploads"),
            max_file_size_bytes: env_or("MAX_FILE_SIZE_BYTES", "10485760")
                .parse()
                .context("MAX_FILE_SIZE_BYTES must be an integer")?,
            max_files_per_upload: env_or("MAX_FILES_PER_UPLOAD", "1000")
                .parse()
                .context("MAX_FILES_PER_UPLOAD must be an integer")?,
            worker_concurrency: env_or("WORKER_CONCURRENCY", "4")
                .parse()
                .context("WORKER_CONCURRENCY must be an integer")?,
            engine_timeout: Duration::from_secs(
                env_or("ENGINE_TIMEOUT_SECS", "120")
                    .parse()
                    .context("ENGINE_TIMEOUT_SECS must be an integer")?,
            ),
            stale_processing_after: Duration::from_secs(
                env_or("STALE_PROCESSING_SECS", "600")
                    .parse()
                    .context("STALE_PROCESSING_SECS must be an integer")?,
            ),
            sweep_interval: Duration::from_secs(
                env_or("SWEEP_INTERVAL_SECS", "60")
                    .parse()
                    .context("SWEEP_INTERVAL_SECS must be an integer")?,
            ),
            token_ttl_minutes: env_or("TOKEN_TTL_MINUTES", "1440")
                .parse()
                .context("TOKEN_TTL_MINUTES must be an integer")?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
