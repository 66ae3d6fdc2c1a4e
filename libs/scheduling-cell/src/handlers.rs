// libs/scheduling-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::{NaiveDate, Utc};
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_staff_class;

use crate::models::{
    AppointmentSearchQuery, CancelAppointmentRequest, CreateAppointmentRequest,
    CreateRecurrenceRequest, CreateUrgentRequest, CreateWaitlistRequest, DaySlotsQuery,
    RescheduleAppointmentRequest, SchedulingError, UpdateRecurrenceRequest,
};
use crate::services::{
    AvailabilityService, BookingService, RecurrenceService, UrgentRequestService, WaitlistService,
};

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct DentistAvailabilityQuery {
    /// Defaults to today when omitted.
    pub date: Option<NaiveDate>,
}

// ==============================================================================
// ERROR MAPPING
// ==============================================================================

fn map_scheduling_error(e: SchedulingError) -> AppError {
    match e {
        SchedulingError::NotFound
        | SchedulingError::DentistNotFound
        | SchedulingError::WaitlistEntryNotFound
        | SchedulingError::RecurrenceNotFound => AppError::NotFound(e.to_string()),
        SchedulingError::SlotConflict
        | SchedulingError::DuplicateService
        | SchedulingError::DuplicateWaitlistEntry => AppError::Conflict(e.to_string()),
        SchedulingError::InvalidStatusTransition(_) => AppError::BadRequest(e.to_string()),
        SchedulingError::ValidationError(msg) => AppError::ValidationError(msg),
        SchedulingError::Forbidden(msg) => AppError::Forbidden(msg),
        SchedulingError::DatabaseError(msg) => AppError::Database(msg),
    }
}

fn caller_uuid(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Token subject is not a valid user id".to_string()))
}

// ==============================================================================
// AVAILABILITY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_day_slots(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<DaySlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = AvailabilityService::new(Arc::new(SupabaseClient::new(&state)));

    let slots = service
        .get_day_slots(query, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "availability": slots
    })))
}

#[axum::debug_handler]
pub async fn get_dentist_availability(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(dentist_id): Path<Uuid>,
    Query(query): Query<DentistAvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let service = AvailabilityService::new(Arc::new(SupabaseClient::new(&state)));

    let availability = service
        .get_dentist_availability(dentist_id, date, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "availability": availability
    })))
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let patient_id = caller_uuid(&user)?;

    let service = BookingService::new(Arc::new(SupabaseClient::new(&state)));
    let appointment = service
        .create_appointment(patient_id, request, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = BookingService::new(Arc::new(SupabaseClient::new(&state)));

    let appointment = service
        .get_appointment(appointment_id, token)
        .await
        .map_err(map_scheduling_error)?;

    // Ownership check: a record the caller may not see reports as missing,
    // the same as one that does not exist.
    let is_owner = appointment.patient_id.to_string() == user.id;
    let is_assigned_dentist = appointment
        .dentist_id
        .map(|id| id.to_string() == user.id)
        .unwrap_or(false);
    if !is_owner && !is_assigned_dentist && !user.is_staff_class() {
        return Err(AppError::NotFound("Appointment not found".to_string()));
    }

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn search_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(mut query): Query<AppointmentSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    // Non-staff callers only ever see their own appointments.
    if !user.is_staff_class() && !user.is_dentist() {
        query.patient_id = Some(caller_uuid(&user)?);
    }

    let service = BookingService::new(Arc::new(SupabaseClient::new(&state)));
    let appointments = service
        .search_appointments(query, token)
        .await
        .map_err(map_scheduling_error)?;

    let count = appointments.len();
    Ok(Json(json!({
        "success": true,
        "appointments": appointments,
        "count": count
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = BookingService::new(Arc::new(SupabaseClient::new(&state)));

    let appointment = service
        .reschedule_appointment(appointment_id, &user, request, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment rescheduled"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = BookingService::new(Arc::new(SupabaseClient::new(&state)));

    let appointment = service
        .cancel_appointment(appointment_id, &user, request, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled"
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = BookingService::new(Arc::new(SupabaseClient::new(&state)));

    let appointment = service
        .complete_appointment(appointment_id, &user, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment completed"
    })))
}

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = BookingService::new(Arc::new(SupabaseClient::new(&state)));

    let appointment = service
        .confirm_appointment(appointment_id, &user, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment confirmed"
    })))
}

// ==============================================================================
// WAITLIST HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_waitlist_entry(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateWaitlistRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let patient_id = caller_uuid(&user)?;

    let service = WaitlistService::new(Arc::new(SupabaseClient::new(&state)));
    let entry = service
        .create_entry(patient_id, request, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "waitlist_entry": entry,
        "message": "Added to waitlist"
    })))
}

#[axum::debug_handler]
pub async fn list_waitlist_entries(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let patient_id = caller_uuid(&user)?;

    let service = WaitlistService::new(Arc::new(SupabaseClient::new(&state)));
    let entries = service
        .list_entries(patient_id, token)
        .await
        .map_err(map_scheduling_error)?;

    let count = entries.len();
    Ok(Json(json!({
        "success": true,
        "waitlist_entries": entries,
        "count": count
    })))
}

#[axum::debug_handler]
pub async fn cancel_waitlist_entry(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let patient_id = caller_uuid(&user)?;

    let service = WaitlistService::new(Arc::new(SupabaseClient::new(&state)));
    let entry = service
        .cancel_entry(entry_id, patient_id, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "waitlist_entry": entry,
        "message": "Waitlist entry cancelled"
    })))
}

// ==============================================================================
// URGENT REQUEST HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_urgent_request(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateUrgentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let patient_id = caller_uuid(&user)?;

    let service = UrgentRequestService::new(Arc::new(SupabaseClient::new(&state)));
    let urgent = service
        .create_request(patient_id, request, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "urgent_request": urgent,
        "message": "Urgent request submitted"
    })))
}

/// The ranked urgent queue. Staff only.
#[axum::debug_handler]
pub async fn list_urgent_requests(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    require_staff_class(&user)?;

    let service = UrgentRequestService::new(Arc::new(SupabaseClient::new(&state)));
    let requests = service
        .list_requests(token)
        .await
        .map_err(map_scheduling_error)?;

    let count = requests.len();
    Ok(Json(json!({
        "success": true,
        "urgent_requests": requests,
        "count": count
    })))
}

// ==============================================================================
// RECURRING APPOINTMENT HANDLERS (staff-class only)
// ==============================================================================

#[axum::debug_handler]
pub async fn create_recurrence_rule(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateRecurrenceRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    require_staff_class(&user)?;

    let service = RecurrenceService::new(Arc::new(SupabaseClient::new(&state)));
    let rule = service
        .create_rule(request, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "recurrence_rule": rule,
        "message": "Recurring appointment created"
    })))
}

/// Read a single rule. Staff see everything; patients see their own, and a
/// rule belonging to someone else reports as missing.
#[axum::debug_handler]
pub async fn get_recurrence_rule(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(rule_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let service = RecurrenceService::new(Arc::new(SupabaseClient::new(&state)));
    let rule = service
        .get_rule(rule_id, token)
        .await
        .map_err(map_scheduling_error)?;

    if !user.is_staff_class() && rule.patient_id.to_string() != user.id {
        return Err(AppError::NotFound("Recurring appointment not found".to_string()));
    }

    Ok(Json(json!({
        "success": true,
        "recurrence_rule": rule
    })))
}

#[axum::debug_handler]
pub async fn list_patient_recurrence_rules(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    // Non-staff callers may only list their own rules.
    if !user.is_staff_class() && patient_id.to_string() != user.id {
        return Err(AppError::NotFound("Recurring appointment not found".to_string()));
    }

    let service = RecurrenceService::new(Arc::new(SupabaseClient::new(&state)));
    let rules = service
        .list_rules_for_patient(patient_id, token)
        .await
        .map_err(map_scheduling_error)?;

    let count = rules.len();
    Ok(Json(json!({
        "success": true,
        "recurrence_rules": rules,
        "count": count
    })))
}

#[axum::debug_handler]
pub async fn update_recurrence_rule(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(rule_id): Path<Uuid>,
    Json(request): Json<UpdateRecurrenceRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    require_staff_class(&user)?;

    let service = RecurrenceService::new(Arc::new(SupabaseClient::new(&state)));
    let rule = service
        .update_rule(rule_id, request, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "recurrence_rule": rule,
        "message": "Recurring appointment updated"
    })))
}

#[axum::debug_handler]
pub async fn delete_recurrence_rule(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(rule_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    require_staff_class(&user)?;

    let service = RecurrenceService::new(Arc::new(SupabaseClient::new(&state)));
    service
        .delete_rule(rule_id, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Recurring appointment deleted"
    })))
}
