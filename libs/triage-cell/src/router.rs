// libs/triage-cell/src/router.rs
use std::sync::Arc;

use axum::{routing::post, Router};

use shared_config::AppConfig;

use crate::handlers;

pub fn triage_routes(state: Arc<AppConfig>) -> Router {
    // Deliberately unauthenticated: symptom checks must work before sign-up.
    Router::new()
        .route("/symptom-check", post(handlers::symptom_check))
        .with_state(state)
}
