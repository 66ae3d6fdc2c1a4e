// libs/triage-cell/src/models.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A symptom submission arrives in one of two wire shapes. The list shape is
/// what the current clients send; the structured shape is the legacy intake
/// form with explicit signal fields. Deserialization dispatches on shape:
/// the structured shape requires `pain_level`, the list shape requires
/// `symptoms`, so the variants cannot shadow each other.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SymptomReport {
    List(SymptomList),
    Structured(StructuredSignals),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymptomList {
    pub symptoms: Vec<String>,
    pub severity: Option<Severity>,
    /// Duration in days, as free text ("3", "2 days"). Unparseable values
    /// are treated as unknown, not rejected.
    pub duration: Option<String>,
    pub location: Option<String>,
    pub additional_info: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StructuredSignals {
    /// 0-10 pain scale.
    pub pain_level: i32,
    #[serde(default)]
    pub bleeding: SignalLevel,
    #[serde(default)]
    pub swelling: SignalLevel,
    #[serde(default)]
    pub fever: bool,
    #[serde(default)]
    pub difficulty_breathing: bool,
    #[serde(default)]
    pub difficulty_swallowing: bool,
    #[serde(default)]
    pub trauma: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SignalLevel {
    #[default]
    None,
    Mild,
    Moderate,
    Severe,
}

#[derive(Debug, Clone, Serialize)]
pub struct TriageResult {
    pub score: i32,
    pub red_flag: bool,
    pub recommendation: String,
    pub tier: TriageTier,
    /// Opaque correlation id for unauthenticated callers.
    pub session_id: Uuid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TriageTier {
    Low,
    Moderate,
    High,
    Urgent,
}

impl fmt::Display for TriageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriageTier::Low => write!(f, "low"),
            TriageTier::Moderate => write!(f, "moderate"),
            TriageTier::High => write!(f, "high"),
            TriageTier::Urgent => write!(f, "urgent"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TriageError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
