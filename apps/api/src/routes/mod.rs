pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::applications::handlers as application_handlers;
use crate::auth::handlers as auth_handlers;
use crate::jobs::handlers as job_handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    // Bulk uploads carry many files in one request; size the body limit to
    // the configured worst case instead of axum's 2 MB default.
    let body_limit = state
        .config
        .max_file_size_bytes
        .saturating_mul(state.config.max_files_per_upload.max(1));

    Router::new()
        .route("/health", get(health::health_handler))
        // Auth
        .route("/api/v1/auth/register", post(auth_handlers::handle_register))
        .route("/api/v1/auth/login", post(auth_handlers::handle_login))
        .route("/api/v1/auth/me", get(auth_handlers::handle_me))
        // Jobs
        .route(
            "/api/v1/jobs",
            post(job_handlers::handle_create_job).get(job_handlers::handle_list_jobs),
        )
        .route(
            "/api/v1/jobs/:id",
            get(job_handlers::handle_get_job)
                .put(job_handlers::handle_update_job)
                .delete(job_handlers::handle_delete_job),
        )
        .route("/api/v1/jobs/:id/stats", get(job_handlers::handle_job_stats))
        // Applications
        .route(
            "/api/v1/jobs/:id/applications",
            post(application_handlers::handle_upload_cvs)
                .get(application_handlers::handle_list_applications),
        )
        .route(
            "/api/v1/applications/:id",
            get(application_handlers::handle_get_application)
                .delete(application_handlers::handle_delete_application),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
