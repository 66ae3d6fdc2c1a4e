// libs/triage-cell/src/services/scorer.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{
    Severity, SignalLevel, StructuredSignals, SymptomList, SymptomReport, TriageError,
    TriageResult, TriageTier,
};

const PAIN_TERMS: &[&str] = &[
    "pain", "ache", "aching", "toothache", "hurts", "hurting", "throbbing", "discomfort",
    "sensitive", "sensitivity",
];
const SWELLING_TERMS: &[&str] = &["swelling", "swollen", "puffy"];
const FEVER_TERMS: &[&str] = &["fever", "temperature", "chills"];
const BLEEDING_TERMS: &[&str] = &["bleed", "blood"];
const TRAUMA_TERMS: &[&str] = &[
    "trauma", "injury", "injured", "broken", "fracture", "chipped", "cracked", "knocked",
    "accident",
];
const BREATHING_TERMS: &[&str] = &["breath", "breathing"];
const SWALLOWING_TERMS: &[&str] = &["swallow"];

fn contains_any(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| text.contains(t))
}

/// First integer found in the free-text duration field, in days.
fn duration_days(duration: Option<&str>) -> Option<i64> {
    let text = duration?;
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Score a free-text symptom list.
pub fn score_list(report: &SymptomList) -> (i32, bool) {
    let mut text = report.symptoms.join(" ").to_lowercase();
    if let Some(extra) = &report.additional_info {
        text.push(' ');
        text.push_str(&extra.to_lowercase());
    }

    let has_pain = contains_any(&text, PAIN_TERMS);
    let has_swelling = contains_any(&text, SWELLING_TERMS);
    let has_fever = contains_any(&text, FEVER_TERMS);
    let has_bleeding = contains_any(&text, BLEEDING_TERMS);
    let has_trauma = contains_any(&text, TRAUMA_TERMS);
    let has_breathing = contains_any(&text, BREATHING_TERMS);
    let has_swallowing = contains_any(&text, SWALLOWING_TERMS);

    let is_severe = report.severity == Some(Severity::Severe);
    let days = duration_days(report.duration.as_deref());
    let prolonged_severe = is_severe && days.map(|d| d >= 2).unwrap_or(false);

    let mut score = 0;

    if has_pain {
        score += match report.severity {
            Some(Severity::Severe) => 35,
            Some(Severity::Moderate) => 20,
            Some(Severity::Mild) => 10,
            None => 8,
        };
    }
    if has_swelling {
        score += 15;
    }
    if has_fever {
        score += 15;
    }
    if has_bleeding {
        score += 20;
    }
    if has_trauma {
        score += 25;
    }

    if has_breathing {
        score = score.max(85);
    }
    if has_swallowing {
        score = score.max(80);
    }
    if has_fever && has_swelling {
        score = score.max(80);
    }
    if prolonged_severe {
        score = score.max(70);
    }
    if is_severe && days.map(|d| d <= 1).unwrap_or(false) {
        score += 5;
    }

    let red_flag = has_breathing
        || has_swallowing
        || (has_fever && has_swelling)
        || has_trauma
        || has_bleeding
        || prolonged_severe;

    (score.clamp(0, 100), red_flag)
}

/// Score the legacy structured intake form.
pub fn score_structured(signals: &StructuredSignals) -> (i32, bool) {
    let mut score = signals.pain_level.clamp(0, 10) * 2;

    score += match signals.bleeding {
        SignalLevel::Severe => 20,
        SignalLevel::Moderate => 10,
        SignalLevel::Mild => 5,
        SignalLevel::None => 0,
    };
    score += match signals.swelling {
        SignalLevel::Severe => 15,
        SignalLevel::Moderate => 8,
        SignalLevel::Mild | SignalLevel::None => 0,
    };
    if signals.fever {
        score += 15;
    }
    if signals.difficulty_breathing {
        score += 25;
    }
    if signals.difficulty_swallowing {
        score += 20;
    }
    if signals.trauma {
        score += 15;
    }

    let red_flag = signals.difficulty_breathing
        || signals.difficulty_swallowing
        || signals.trauma
        || signals.bleeding == SignalLevel::Severe
        || signals.swelling == SignalLevel::Severe;

    (score.min(100), red_flag)
}

/// Patient-facing guidance. Thresholds here are looser than the persisted
/// tier on purpose: the wording escalates earlier than the stored
/// classification does.
pub fn recommendation_for(score: i32, red_flag: bool) -> &'static str {
    if red_flag || score >= 80 {
        "Seek immediate emergency dental care"
    } else if score >= 60 {
        "Book an urgent appointment within 24 hours"
    } else if score >= 40 {
        "Book an appointment within 2-3 days"
    } else {
        "Monitor symptoms and book a routine appointment if they persist"
    }
}

pub fn tier_for(score: i32, red_flag: bool) -> TriageTier {
    if red_flag || score >= 70 {
        TriageTier::Urgent
    } else if score >= 50 {
        TriageTier::High
    } else if score >= 30 {
        TriageTier::Moderate
    } else {
        TriageTier::Low
    }
}

pub struct TriageService {
    supabase: Arc<SupabaseClient>,
}

impl TriageService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Score a submission and record it. Recording is best-effort: the
    /// caller gets their result even when the store write fails.
    pub async fn assess(
        &self,
        report: SymptomReport,
        session_id: Option<Uuid>,
    ) -> Result<TriageResult, TriageError> {
        let (score, red_flag) = match &report {
            SymptomReport::List(list) => {
                if list.symptoms.is_empty() {
                    return Err(TriageError::ValidationError(
                        "symptoms: at least one symptom is required".to_string(),
                    ));
                }
                score_list(list)
            }
            SymptomReport::Structured(signals) => {
                if !(0..=10).contains(&signals.pain_level) {
                    return Err(TriageError::ValidationError(format!(
                        "pain_level: expected 0-10, got {}",
                        signals.pain_level
                    )));
                }
                score_structured(signals)
            }
        };

        let tier = tier_for(score, red_flag);
        let result = TriageResult {
            score,
            red_flag,
            recommendation: recommendation_for(score, red_flag).to_string(),
            tier,
            session_id: session_id.unwrap_or_else(Uuid::new_v4),
        };

        info!(
            "Triage assessment: score={} red_flag={} tier={}",
            score, red_flag, tier
        );

        self.record_assessment(&report, &result).await;
        Ok(result)
    }

    async fn record_assessment(&self, report: &SymptomReport, result: &TriageResult) {
        let shape = match report {
            SymptomReport::List(_) => "list",
            SymptomReport::Structured(_) => "structured",
        };
        let record = json!({
            "session_id": result.session_id,
            "input_shape": shape,
            "score": result.score,
            "red_flag": result.red_flag,
            "tier": result.tier,
            "created_at": Utc::now().to_rfc3339()
        });

        match self
            .supabase
            .request::<Value>(Method::POST, "/rest/v1/triage_assessments", None, Some(record))
            .await
        {
            Ok(_) => debug!("Triage assessment {} recorded", result.session_id),
            Err(e) => warn!("Failed to record triage assessment: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(symptoms: &[&str], severity: Option<Severity>, duration: Option<&str>) -> SymptomList {
        SymptomList {
            symptoms: symptoms.iter().map(|s| s.to_string()).collect(),
            severity,
            duration: duration.map(String::from),
            location: None,
            additional_info: None,
        }
    }

    #[test]
    fn breathing_difficulty_escalates_to_red_flag() {
        let (score, red_flag) = score_list(&list(&["difficulty breathing"], None, None));
        assert_eq!(score, 85);
        assert!(red_flag);
        assert_eq!(tier_for(score, red_flag), TriageTier::Urgent);
        assert_eq!(
            recommendation_for(score, red_flag),
            "Seek immediate emergency dental care"
        );
    }

    #[test]
    fn prolonged_severe_pain_is_urgent() {
        let (score, red_flag) = score_list(&list(
            &["severe tooth pain"],
            Some(Severity::Severe),
            Some("3"),
        ));
        assert!(score >= 70);
        assert!(red_flag);
        assert_eq!(tier_for(score, red_flag), TriageTier::Urgent);
    }

    #[test]
    fn mild_discomfort_stays_low() {
        let (score, red_flag) = score_list(&list(&["mild discomfort"], Some(Severity::Mild), None));
        assert_eq!(score, 10);
        assert!(!red_flag);
        assert_eq!(tier_for(score, red_flag), TriageTier::Low);
        assert_eq!(
            recommendation_for(score, red_flag),
            "Monitor symptoms and book a routine appointment if they persist"
        );
    }

    #[test]
    fn fever_with_swelling_escalates() {
        let (score, red_flag) = score_list(&list(&["fever", "swollen jaw"], None, None));
        assert_eq!(score, 80);
        assert!(red_flag);
    }

    #[test]
    fn recent_severe_onset_gets_acuity_bonus() {
        let (with_bonus, _) = score_list(&list(
            &["severe toothache"],
            Some(Severity::Severe),
            Some("1"),
        ));
        let (without, _) = score_list(&list(&["severe toothache"], Some(Severity::Severe), None));
        assert_eq!(with_bonus, without + 5);
    }

    #[test]
    fn recommendation_and_tier_thresholds_stay_distinct() {
        // 75 without a red flag: urgent tier, but not the emergency wording.
        assert_eq!(tier_for(75, false), TriageTier::Urgent);
        assert_eq!(
            recommendation_for(75, false),
            "Book an urgent appointment within 24 hours"
        );
    }

    #[test]
    fn structured_pain_scales_linearly() {
        let signals = StructuredSignals {
            pain_level: 6,
            bleeding: SignalLevel::None,
            swelling: SignalLevel::None,
            fever: false,
            difficulty_breathing: false,
            difficulty_swallowing: false,
            trauma: false,
        };
        let (score, red_flag) = score_structured(&signals);
        assert_eq!(score, 12);
        assert!(!red_flag);
    }

    #[test]
    fn structured_severe_bleeding_is_a_red_flag() {
        let signals = StructuredSignals {
            pain_level: 4,
            bleeding: SignalLevel::Severe,
            swelling: SignalLevel::Moderate,
            fever: true,
            difficulty_breathing: false,
            difficulty_swallowing: false,
            trauma: false,
        };
        let (score, red_flag) = score_structured(&signals);
        // 8 pain + 20 bleeding + 8 swelling + 15 fever
        assert_eq!(score, 51);
        assert!(red_flag);
        assert_eq!(tier_for(score, red_flag), TriageTier::Urgent);
    }

    #[test]
    fn structured_score_is_capped() {
        let signals = StructuredSignals {
            pain_level: 10,
            bleeding: SignalLevel::Severe,
            swelling: SignalLevel::Severe,
            fever: true,
            difficulty_breathing: true,
            difficulty_swallowing: true,
            trauma: true,
        };
        let (score, _) = score_structured(&signals);
        assert_eq!(score, 100);
    }

    #[test]
    fn duration_text_parses_leading_number() {
        assert_eq!(duration_days(Some("3")), Some(3));
        assert_eq!(duration_days(Some("2 days")), Some(2));
        assert_eq!(duration_days(Some("about 4 days")), Some(4));
        assert_eq!(duration_days(Some("a while")), None);
        assert_eq!(duration_days(None), None);
    }
}
