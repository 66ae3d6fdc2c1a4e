// libs/scheduling-cell/src/services/urgent.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{parse_date, parse_time, CreateUrgentRequest, SchedulingError, UrgentRequest};

const SEVERITY_TERMS: &[&str] = &["severe", "extreme", "emergency", "unbearable", "excruciating"];
const TRAUMA_TERMS: &[&str] = &["trauma", "bleeding", "injury", "accident", "knocked", "broken"];
const INFECTION_TERMS: &[&str] = &["fever", "swelling", "swollen", "infection", "pus", "abscess"];
const PAIN_TERMS: &[&str] = &["pain", "ache", "hurts", "hurting", "throbbing"];

/// Score a free-text urgency request into [0, 100].
///
/// Base 50, escalated by language in the reason and symptom text. The score
/// orders the urgent queue and downstream patient outreach.
pub fn priority_score(reason: &str, symptoms: Option<&str>) -> i32 {
    let reason_lc = reason.to_lowercase();
    let symptoms_lc = symptoms.map(str::to_lowercase).unwrap_or_default();

    let mut score = 50;

    if contains_any(&reason_lc, SEVERITY_TERMS) {
        score += 30;
    }
    if contains_any(&reason_lc, TRAUMA_TERMS) {
        score += 25;
    }
    if contains_any(&symptoms_lc, INFECTION_TERMS) {
        score += 20;
    }
    if contains_any(&reason_lc, PAIN_TERMS)
        && (reason_lc.contains("unbearable") || reason_lc.contains("severe"))
    {
        score += 15;
    }

    score.min(100)
}

fn contains_any(haystack: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| haystack.contains(t))
}

pub struct UrgentRequestService {
    supabase: Arc<SupabaseClient>,
}

impl UrgentRequestService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn create_request(
        &self,
        patient_id: Uuid,
        request: CreateUrgentRequest,
        auth_token: &str,
    ) -> Result<UrgentRequest, SchedulingError> {
        if request.reason.trim().is_empty() {
            return Err(SchedulingError::ValidationError(
                "reason: must not be empty".to_string(),
            ));
        }

        let preferred_date = request
            .preferred_date
            .as_deref()
            .map(|d| parse_date(d, "preferred_date"))
            .transpose()?;
        let preferred_time = request
            .preferred_time
            .as_deref()
            .map(|t| parse_time(t, "preferred_time"))
            .transpose()?;

        let score = priority_score(&request.reason, request.symptoms.as_deref());
        info!("Urgent request from patient {} scored {}", patient_id, score);

        let request_data = json!({
            "patient_id": patient_id,
            "preferred_date": preferred_date,
            "preferred_time": preferred_time.map(|t| t.format("%H:%M:%S").to_string()),
            "service_id": request.service_id,
            "reason": request.reason,
            "symptoms": request.symptoms,
            "priority_score": score,
            "status": "pending",
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
                "/rest/v1/urgent_requests",
                Some(auth_token),
                Some(request_data),
                Some(headers),
            )
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::DatabaseError("Failed to create urgent request".to_string()))?;

        serde_json::from_value(row).map_err(|e| {
            SchedulingError::DatabaseError(format!("Failed to parse urgent request: {}", e))
        })
    }

    /// The urgent queue, highest priority first, ties broken by recency.
    pub async fn list_requests(
        &self,
        auth_token: &str,
    ) -> Result<Vec<UrgentRequest>, SchedulingError> {
        debug!("Listing urgent request queue");

        let path = "/rest/v1/urgent_requests?status=eq.pending&order=priority_score.desc,created_at.desc";
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<UrgentRequest>, _>>()
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse urgent requests: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_reason_scores_base() {
        assert_eq!(priority_score("need a checkup soon", None), 50);
    }

    #[test]
    fn severe_bleeding_scores_near_cap() {
        // 50 base + 30 severity + 25 trauma, clamped to 100.
        let score = priority_score("severe bleeding after extraction", None);
        assert_eq!(score, 100);
        assert!(score > priority_score("need a checkup soon", None));
    }

    #[test]
    fn infection_symptoms_raise_score() {
        let score = priority_score("toothache", Some("fever and swelling on the left side"));
        assert_eq!(score, 70);
    }

    #[test]
    fn unbearable_pain_combines_severity_and_pain_bonus() {
        // 50 + 30 (unbearable is severity language) + 15 (pain + qualifier).
        assert_eq!(priority_score("unbearable tooth pain", None), 95);
    }

    #[test]
    fn score_never_exceeds_cap() {
        let score = priority_score(
            "severe unbearable pain with heavy bleeding after an accident",
            Some("fever, swelling, pus"),
        );
        assert_eq!(score, 100);
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(
            priority_score("SEVERE pain", None),
            priority_score("severe pain", None)
        );
    }
}
