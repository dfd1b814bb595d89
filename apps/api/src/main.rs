mod applications;
mod auth;
mod config;
mod db;
mod engines;
mod errors;
mod jobs;
mod models;
mod pipeline;
mod routes;
mod state;
mod storage;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::engines::{CvEngine, StandardCvEngine};
use crate::pipeline::{PipelineSettings, PipelineStore};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (errors out on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CV ranking API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize the CV engine (document parsing + embedding scorer)
    let engine: Arc<dyn CvEngine> = Arc::new(StandardCvEngine::new(
        config.embedding_url.clone(),
        config.engine_timeout,
    ));
    info!("CV engine initialized (embedding endpoint: {})", config.embedding_url);

    // Start the processing pipeline: bounded worker pool + staleness sweeper
    let store: Arc<dyn PipelineStore> = Arc::new(db.clone());
    let pipeline = pipeline::spawn(store, engine, PipelineSettings::from_config(&config));
    info!("Pipeline started ({} workers)", config.worker_concurrency);

    // Build app state
    let state = AppState {
        db,
        config: config.clone(),
        pipeline,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
