use sqlx::PgPool;

use crate::config::Config;
use crate::pipeline::PipelineHandle;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    /// Entry point to the CV processing worker pool: handlers enqueue
    /// application ids here and never touch the engines directly.
    pub pipeline: PipelineHandle,
}
