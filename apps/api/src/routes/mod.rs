pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::progression::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Classification
        .route("/api/v1/classify", post(handlers::handle_classify))
        .route(
            "/api/v1/classifications",
            get(handlers::handle_list_classifications).post(handlers::handle_record_classification),
        )
        .route(
            "/api/v1/classifications/:id",
            get(handlers::handle_get_classification),
        )
        .route(
            "/api/v1/classifications/:id/feedback",
            post(handlers::handle_submit_feedback),
        )
        // Progress read models
        .route("/api/v1/progress", get(handlers::handle_get_progress))
        .route("/api/v1/badges", get(handlers::handle_get_badges))
        .route("/api/v1/levels", get(handlers::handle_get_levels))
        .with_state(state)
}
