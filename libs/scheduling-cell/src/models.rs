// libs/scheduling-cell/src/models.rs
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub dentist_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Rescheduled,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Rescheduled => write!(f, "rescheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One row of open hours. `dentist_id = null` is the clinic-wide default
/// schedule; a dentist's own rows override it. A weekday with no row is
/// closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicHours {
    pub id: Uuid,
    pub dentist_id: Option<Uuid>,
    pub day_of_week: i32,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub duration_minutes: i32,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAppointmentRequest {
    pub date: String,
    pub time: String,
    pub service_id: Option<Uuid>,
    pub dentist_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub date: String,
    pub time: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DaySlotsQuery {
    pub date: String,
    pub dentist_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DaySlotsResponse {
    pub date: NaiveDate,
    pub weekday: String,
    pub closed: bool,
    pub closed_reason: Option<String>,
    pub slot_duration_minutes: i32,
    pub slots: Vec<NaiveTime>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DentistAvailabilityResponse {
    pub dentist_id: Uuid,
    pub date: NaiveDate,
    pub schedule: Vec<ClinicHours>,
    pub booked_slots: Vec<NaiveTime>,
    pub free_slots: Vec<NaiveTime>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentSearchQuery {
    pub patient_id: Option<Uuid>,
    pub dentist_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

// ==============================================================================
// WAITLIST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub preferred_date: NaiveDate,
    pub preferred_time: Option<NaiveTime>,
    pub service_id: Option<Uuid>,
    pub dentist_id: Option<Uuid>,
    pub auto_book: bool,
    pub status: WaitlistStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WaitlistStatus {
    Active,
    Cancelled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateWaitlistRequest {
    pub preferred_date: String,
    pub preferred_time: Option<String>,
    pub service_id: Option<Uuid>,
    pub dentist_id: Option<Uuid>,
    #[serde(default)]
    pub auto_book: bool,
}

// ==============================================================================
// URGENT REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrgentRequest {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub preferred_date: Option<NaiveDate>,
    pub preferred_time: Option<NaiveTime>,
    pub service_id: Option<Uuid>,
    pub reason: String,
    pub symptoms: Option<String>,
    pub priority_score: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUrgentRequest {
    pub reason: String,
    pub symptoms: Option<String>,
    pub preferred_date: Option<String>,
    pub preferred_time: Option<String>,
    pub service_id: Option<Uuid>,
}

// ==============================================================================
// RECURRING APPOINTMENT MODELS (standing data contract, never expanded)
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub dentist_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub pattern: RecurrencePattern,
    pub interval: i32,
    pub day_of_week: Option<i32>,
    pub day_of_month: Option<i32>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub time: NaiveTime,
    pub duration_minutes: i32,
    pub status: RecurrenceStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecurrencePattern {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceStatus {
    Active,
    Paused,
    Cancelled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRecurrenceRequest {
    pub patient_id: Uuid,
    pub dentist_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub pattern: RecurrencePattern,
    pub interval: Option<i32>,
    pub day_of_week: Option<i32>,
    pub day_of_month: Option<i32>,
    pub start_date: String,
    pub end_date: Option<String>,
    pub time: String,
    pub duration_minutes: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRecurrenceRequest {
    pub status: Option<RecurrenceStatus>,
    pub end_date: Option<String>,
    pub notes: Option<String>,
}

// ==============================================================================
// DEFAULTS
// ==============================================================================

/// Per-operation defaults, declared once instead of scattered through
/// handlers.
#[derive(Debug, Clone)]
pub struct SchedulingDefaults {
    pub slot_granularity_minutes: i32,
    pub fallback_duration_minutes: i32,
    pub search_result_limit: i32,
}

impl Default for SchedulingDefaults {
    fn default() -> Self {
        Self {
            slot_granularity_minutes: 30,
            fallback_duration_minutes: 30,
            search_result_limit: 50,
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulingError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Dentist not found")]
    DentistNotFound,

    #[error("Requested slot is already booked")]
    SlotConflict,

    #[error("An appointment for this service already exists on this date")]
    DuplicateService,

    #[error("An active waitlist entry already exists for this date")]
    DuplicateWaitlistEntry,

    #[error("Waitlist entry not found")]
    WaitlistEntryNotFound,

    #[error("Recurring appointment not found")]
    RecurrenceNotFound,

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl SchedulingError {
    /// Default mapping from store failures. Call sites with a more specific
    /// meaning for a 409 (waitlist uniqueness, for instance) match on
    /// `StoreError::Conflict` themselves before falling back to this.
    pub fn from_store(err: shared_database::supabase::StoreError) -> Self {
        use shared_database::supabase::StoreError;
        match err {
            StoreError::Conflict(_) => SchedulingError::SlotConflict,
            StoreError::NotFound(_) => SchedulingError::NotFound,
            other => SchedulingError::DatabaseError(other.to_string()),
        }
    }
}

// ==============================================================================
// DATE/TIME PARSING
// ==============================================================================

pub fn parse_date(value: &str, field: &str) -> Result<NaiveDate, SchedulingError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        SchedulingError::ValidationError(format!("{}: expected YYYY-MM-DD, got '{}'", field, value))
    })
}

pub fn parse_time(value: &str, field: &str) -> Result<NaiveTime, SchedulingError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| {
            SchedulingError::ValidationError(format!("{}: expected HH:MM, got '{}'", field, value))
        })
}

/// PostgREST day_of_week convention: 0 = Sunday through 6 = Saturday.
pub fn day_of_week(date: NaiveDate) -> i32 {
    match date.weekday() {
        Weekday::Sun => 0,
        Weekday::Mon => 1,
        Weekday::Tue => 2,
        Weekday::Wed => 3,
        Weekday::Thu => 4,
        Weekday::Fri => 5,
        Weekday::Sat => 6,
    }
}

pub fn weekday_name(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Sun => "Sunday",
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
    }
}
