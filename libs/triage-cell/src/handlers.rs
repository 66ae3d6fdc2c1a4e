// libs/triage-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::error::AppError;

use crate::models::{SymptomReport, TriageError};
use crate::services::scorer::TriageService;

#[derive(Debug, Deserialize)]
pub struct SymptomCheckQuery {
    /// Returning anonymous callers pass their previous session id to keep
    /// their submissions correlated.
    pub session_id: Option<Uuid>,
}

/// Public symptom check. No authentication: anyone in pain gets an answer,
/// and anonymous callers are correlated by the returned session id.
#[axum::debug_handler]
pub async fn symptom_check(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<SymptomCheckQuery>,
    Json(report): Json<SymptomReport>,
) -> Result<Json<Value>, AppError> {
    let service = TriageService::new(Arc::new(SupabaseClient::new(&state)));
    let result = service
        .assess(report, query.session_id)
        .await
        .map_err(|e| match e {
            TriageError::ValidationError(msg) => AppError::ValidationError(msg),
            TriageError::DatabaseError(msg) => AppError::Database(msg),
        })?;

    Ok(Json(json!({
        "success": true,
        "triage": result
    })))
}
