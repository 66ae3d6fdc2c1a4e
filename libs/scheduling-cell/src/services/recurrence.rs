// libs/scheduling-cell/src/services/recurrence.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{
    parse_date, parse_time, CreateRecurrenceRequest, RecurrencePattern, RecurrenceRule,
    RecurrenceStatus, SchedulingDefaults, SchedulingError, UpdateRecurrenceRequest,
};

/// Standing recurrence rules. The rule is a data contract for the external
/// reminder/materialization job; this service never expands occurrences.
pub struct RecurrenceService {
    supabase: Arc<SupabaseClient>,
    defaults: SchedulingDefaults,
}

impl RecurrenceService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            supabase,
            defaults: SchedulingDefaults::default(),
        }
    }

    pub async fn create_rule(
        &self,
        request: CreateRecurrenceRequest,
        auth_token: &str,
    ) -> Result<RecurrenceRule, SchedulingError> {
        let start_date = parse_date(&request.start_date, "start_date")?;
        let end_date = request
            .end_date
            .as_deref()
            .map(|d| parse_date(d, "end_date"))
            .transpose()?;
        let time = parse_time(&request.time, "time")?;

        if let Some(end) = end_date {
            if end < start_date {
                return Err(SchedulingError::ValidationError(
                    "end_date: must not precede start_date".to_string(),
                ));
            }
        }

        match request.pattern {
            RecurrencePattern::Weekly | RecurrencePattern::Biweekly => {
                match request.day_of_week {
                    Some(d) if (0..=6).contains(&d) => {}
                    Some(d) => {
                        return Err(SchedulingError::ValidationError(format!(
                            "day_of_week: expected 0-6, got {}",
                            d
                        )))
                    }
                    None => {
                        return Err(SchedulingError::ValidationError(
                            "day_of_week: required for weekly patterns".to_string(),
                        ))
                    }
                }
            }
            RecurrencePattern::Monthly => match request.day_of_month {
                Some(d) if (1..=31).contains(&d) => {}
                Some(d) => {
                    return Err(SchedulingError::ValidationError(format!(
                        "day_of_month: expected 1-31, got {}",
                        d
                    )))
                }
                None => {
                    return Err(SchedulingError::ValidationError(
                        "day_of_month: required for monthly pattern".to_string(),
                    ))
                }
            },
            RecurrencePattern::Daily => {}
        }

        let now = Utc::now();
        let rule_data = json!({
            "patient_id": request.patient_id,
            "dentist_id": request.dentist_id,
            "service_id": request.service_id,
            "pattern": request.pattern,
            "interval": request.interval.unwrap_or(1),
            "day_of_week": request.day_of_week,
            "day_of_month": request.day_of_month,
            "start_date": start_date,
            "end_date": end_date,
            "time": time.format("%H:%M:%S").to_string(),
            "duration_minutes": request
                .duration_minutes
                .unwrap_or(self.defaults.fallback_duration_minutes),
            "status": RecurrenceStatus::Active,
            "notes": request.notes,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
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
                "/rest/v1/recurring_appointments",
                Some(auth_token),
                Some(rule_data),
                Some(headers),
            )
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::DatabaseError("Failed to create recurrence rule".to_string()))?;

        let rule: RecurrenceRule = serde_json::from_value(row).map_err(|e| {
            SchedulingError::DatabaseError(format!("Failed to parse recurrence rule: {}", e))
        })?;

        self.queue_recurrence_notification(&rule, "created");
        info!("Recurrence rule {} created for patient {}", rule.id, rule.patient_id);
        Ok(rule)
    }

    /// Partial update: only the provided fields change.
    pub async fn update_rule(
        &self,
        rule_id: Uuid,
        request: UpdateRecurrenceRequest,
        auth_token: &str,
    ) -> Result<RecurrenceRule, SchedulingError> {
        let mut changes = Map::new();
        if let Some(status) = request.status {
            changes.insert("status".to_string(), json!(status));
        }
        if let Some(end_date) = request.end_date.as_deref() {
            changes.insert("end_date".to_string(), json!(parse_date(end_date, "end_date")?));
        }
        if let Some(notes) = request.notes {
            changes.insert("notes".to_string(), json!(notes));
        }
        if changes.is_empty() {
            return Err(SchedulingError::ValidationError(
                "update: at least one field required".to_string(),
            ));
        }
        changes.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/recurring_appointments?id=eq.{}", rule_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(changes)),
                Some(headers),
            )
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or(SchedulingError::RecurrenceNotFound)?;

        let rule: RecurrenceRule = serde_json::from_value(row).map_err(|e| {
            SchedulingError::DatabaseError(format!("Failed to parse recurrence rule: {}", e))
        })?;

        self.queue_recurrence_notification(&rule, "updated");
        Ok(rule)
    }

    /// Hard delete. Rules are standing configuration, not history, so no
    /// soft-cancel here.
    pub async fn delete_rule(
        &self,
        rule_id: Uuid,
        auth_token: &str,
    ) -> Result<(), SchedulingError> {
        let path = format!("/rest/v1/recurring_appointments?id=eq.{}", rule_id);

        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;
        if existing.is_empty() {
            return Err(SchedulingError::RecurrenceNotFound);
        }

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );
        let _: Vec<Value> = self
            .supabase
            .request_with_headers(Method::DELETE, &path, Some(auth_token), None, Some(headers))
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        info!("Recurrence rule {} deleted", rule_id);
        Ok(())
    }

    pub async fn get_rule(
        &self,
        rule_id: Uuid,
        auth_token: &str,
    ) -> Result<RecurrenceRule, SchedulingError> {
        let path = format!("/rest/v1/recurring_appointments?id=eq.{}", rule_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or(SchedulingError::RecurrenceNotFound)?;
        serde_json::from_value(row).map_err(|e| {
            SchedulingError::DatabaseError(format!("Failed to parse recurrence rule: {}", e))
        })
    }

    pub async fn list_rules_for_patient(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<RecurrenceRule>, SchedulingError> {
        let path = format!(
            "/rest/v1/recurring_appointments?patient_id=eq.{}&order=created_at.desc",
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
            .collect::<Result<Vec<RecurrenceRule>, _>>()
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse recurrence rules: {}", e)))
    }

    // Fire-and-forget: recurrence-change alerts go out through the external
    // notifier and never fail the mutation.
    fn queue_recurrence_notification(&self, rule: &RecurrenceRule, action: &str) {
        debug!("Queueing recurrence {} notice for rule {}", action, rule.id);
    }
}
