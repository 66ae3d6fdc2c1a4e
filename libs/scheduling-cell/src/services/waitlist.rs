// libs/scheduling-cell/src/services/waitlist.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::supabase::{StoreError, SupabaseClient};

use crate::models::{
    parse_date, parse_time, CreateWaitlistRequest, SchedulingError, WaitlistEntry, WaitlistStatus,
};

pub struct WaitlistService {
    supabase: Arc<SupabaseClient>,
}

impl WaitlistService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Join the waitlist for a date. At most one active entry per
    /// (patient, date, service-or-none) combination.
    pub async fn create_entry(
        &self,
        patient_id: Uuid,
        request: CreateWaitlistRequest,
        auth_token: &str,
    ) -> Result<WaitlistEntry, SchedulingError> {
        let preferred_date = parse_date(&request.preferred_date, "preferred_date")?;
        let preferred_time = request
            .preferred_time
            .as_deref()
            .map(|t| parse_time(t, "preferred_time"))
            .transpose()?;

        info!("Waitlist request from patient {} for {}", patient_id, preferred_date);

        let service_filter = match request.service_id {
            Some(id) => format!("service_id=eq.{}", id),
            None => "service_id=is.null".to_string(),
        };
        let check_path = format!(
            "/rest/v1/waitlist_entries?patient_id=eq.{}&preferred_date=eq.{}&{}&status=eq.active",
            patient_id, preferred_date, service_filter
        );
        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &check_path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        if !existing.is_empty() {
            warn!("Duplicate waitlist entry rejected for patient {} on {}", patient_id, preferred_date);
            return Err(SchedulingError::DuplicateWaitlistEntry);
        }

        let entry_data = json!({
            "patient_id": patient_id,
            "preferred_date": preferred_date,
            "preferred_time": preferred_time.map(|t| t.format("%H:%M:%S").to_string()),
            "service_id": request.service_id,
            "dentist_id": request.dentist_id,
            "auto_book": request.auto_book,
            "status": "active",
            "created_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/waitlist_entries",
                Some(auth_token),
                Some(entry_data),
                Some(headers),
            )
            .await
            .map_err(|e| match e {
                // The partial unique index closes the race the read check
                // cannot.
                StoreError::Conflict(_) => SchedulingError::DuplicateWaitlistEntry,
                other => SchedulingError::DatabaseError(other.to_string()),
            })?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::DatabaseError("Failed to create waitlist entry".to_string()))?;

        serde_json::from_value(row).map_err(|e| {
            SchedulingError::DatabaseError(format!("Failed to parse waitlist entry: {}", e))
        })
    }

    /// Soft-cancel a waitlist entry. Scoped to the owning patient; an entry
    /// owned by someone else reports as not found.
    pub async fn cancel_entry(
        &self,
        entry_id: Uuid,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<WaitlistEntry, SchedulingError> {
        debug!("Cancelling waitlist entry {} for patient {}", entry_id, patient_id);

        let path = format!(
            "/rest/v1/waitlist_entries?id=eq.{}&patient_id=eq.{}",
            entry_id, patient_id
        );
        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        if existing.is_empty() {
            return Err(SchedulingError::WaitlistEntryNotFound);
        }

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let update_data = json!({ "status": WaitlistStatus::Cancelled });
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(update_data), Some(headers))
            .await
            .map_err(SchedulingError::from_store)?;

        let row = result
            .into_iter()
            .next()
            .ok_or(SchedulingError::WaitlistEntryNotFound)?;

        info!("Waitlist entry {} cancelled", entry_id);
        serde_json::from_value(row).map_err(|e| {
            SchedulingError::DatabaseError(format!("Failed to parse waitlist entry: {}", e))
        })
    }

    /// Active entries for a patient, soonest preferred date first.
    pub async fn list_entries(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<WaitlistEntry>, SchedulingError> {
        let path = format!(
            "/rest/v1/waitlist_entries?patient_id=eq.{}&status=eq.active&order=preferred_date.asc",
            patient_id
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<WaitlistEntry>, _>>()
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse waitlist entries: {}", e)))
    }
}
