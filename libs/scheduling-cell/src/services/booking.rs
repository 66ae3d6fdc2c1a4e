// libs/scheduling-cell/src/services/booking.rs
use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::supabase::{StoreError, SupabaseClient};
use shared_models::auth::User;

use crate::models::{
    parse_date, parse_time, Appointment, AppointmentSearchQuery, AppointmentStatus,
    CancelAppointmentRequest, CreateAppointmentRequest, RescheduleAppointmentRequest,
    SchedulingDefaults, SchedulingError,
};
use crate::services::availability::AvailabilityService;
use crate::services::lifecycle::AppointmentLifecycleService;

pub struct BookingService {
    supabase: Arc<SupabaseClient>,
    availability: AvailabilityService,
    lifecycle: AppointmentLifecycleService,
    defaults: SchedulingDefaults,
}

impl BookingService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        let availability = AvailabilityService::new(Arc::clone(&supabase));
        Self {
            supabase,
            availability,
            lifecycle: AppointmentLifecycleService::new(),
            defaults: SchedulingDefaults::default(),
        }
    }

    /// Book a new appointment for the calling patient.
    ///
    /// Guard order: duplicate-service first, then the slot guard. The insert
    /// itself is backed by the store's uniqueness constraint, so a racing
    /// create that slips past the read check still fails and is translated
    /// into the same slot-conflict error.
    pub async fn create_appointment(
        &self,
        patient_id: Uuid,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let date = parse_date(&request.date, "date")?;
        let time = parse_time(&request.time, "time")?;

        info!("Booking appointment for patient {} on {} at {}", patient_id, date, time);

        if self
            .duplicate_service_booking(patient_id, date, request.service_id, auth_token)
            .await?
        {
            warn!("Duplicate service booking rejected for patient {} on {}", patient_id, date);
            return Err(SchedulingError::DuplicateService);
        }

        if self
            .availability
            .slot_taken(date, time, request.dentist_id, None, auth_token)
            .await?
        {
            warn!("Slot conflict for {} {} (dentist {:?})", date, time, request.dentist_id);
            return Err(SchedulingError::SlotConflict);
        }

        let duration = self
            .availability
            .resolve_duration(request.service_id, auth_token)
            .await?;

        let now = Utc::now();
        let appointment_data = json!({
            "patient_id": patient_id,
            "dentist_id": request.dentist_id,
            "service_id": request.service_id,
            "date": date,
            "time": time.format("%H:%M:%S").to_string(),
            "duration_minutes": duration,
            "status": AppointmentStatus::Scheduled.to_string(),
            "notes": request.notes,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let appointment = self
            .insert_appointment(appointment_data, auth_token)
            .await?;

        self.queue_booking_notification(&appointment);

        info!("Appointment {} booked", appointment.id);
        Ok(appointment)
    }

    /// Move an appointment to a new date/time. Owner only; cancelled
    /// appointments cannot move; the slot guard re-runs against the new
    /// target excluding the appointment being moved.
    pub async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        user: &User,
        request: RescheduleAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let new_date = parse_date(&request.date, "date")?;
        let new_time = parse_time(&request.time, "time")?;

        let current = self.get_owned_appointment(appointment_id, user, auth_token).await?;

        self.lifecycle
            .validate_status_transition(current.status, AppointmentStatus::Rescheduled)?;

        if self
            .availability
            .slot_taken(new_date, new_time, current.dentist_id, Some(appointment_id), auth_token)
            .await?
        {
            return Err(SchedulingError::SlotConflict);
        }

        let update_data = json!({
            "date": new_date,
            "time": new_time.format("%H:%M:%S").to_string(),
            "status": AppointmentStatus::Rescheduled.to_string(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let updated = self
            .patch_appointment(appointment_id, update_data, auth_token)
            .await?;

        self.queue_reschedule_notification(&updated);

        info!("Appointment {} rescheduled to {} {}", appointment_id, new_date, new_time);
        Ok(updated)
    }

    /// Soft-cancel: the record is retained with status `cancelled` and the
    /// reason appended to its notes.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        user: &User,
        request: CancelAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let current = if user.is_staff_class() {
            self.get_appointment(appointment_id, auth_token).await?
        } else {
            self.get_owned_appointment(appointment_id, user, auth_token).await?
        };

        self.lifecycle
            .validate_status_transition(current.status, AppointmentStatus::Cancelled)?;

        let reason_line = format!(
            "Cancelled: {}",
            request.reason.as_deref().unwrap_or("no reason given")
        );
        let notes = match current.notes.as_deref() {
            Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, reason_line),
            _ => reason_line,
        };

        let update_data = json!({
            "status": AppointmentStatus::Cancelled.to_string(),
            "notes": notes,
            "updated_at": Utc::now().to_rfc3339()
        });

        let cancelled = self
            .patch_appointment(appointment_id, update_data, auth_token)
            .await?;

        self.queue_cancellation_notification(&cancelled);

        info!("Appointment {} cancelled", appointment_id);
        Ok(cancelled)
    }

    /// Mark an appointment completed. Staff-class or the assigned dentist
    /// only. Completing a completed appointment is a no-op success;
    /// completing a cancelled one is rejected.
    pub async fn complete_appointment(
        &self,
        appointment_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let current = self.get_appointment(appointment_id, auth_token).await?;

        let is_assigned_dentist = user.is_dentist()
            && current
                .dentist_id
                .map(|id| id.to_string() == user.id)
                .unwrap_or(false);
        if !user.is_staff_class() && !is_assigned_dentist {
            return Err(SchedulingError::Forbidden(
                "Only staff or the assigned dentist can complete an appointment".to_string(),
            ));
        }

        match current.status {
            AppointmentStatus::Completed => {
                debug!("Appointment {} already completed, no-op", appointment_id);
                return Ok(current);
            }
            AppointmentStatus::Cancelled => {
                return Err(SchedulingError::InvalidStatusTransition(current.status));
            }
            _ => {}
        }

        let update_data = json!({
            "status": AppointmentStatus::Completed.to_string(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let completed = self
            .patch_appointment(appointment_id, update_data, auth_token)
            .await?;

        info!("Appointment {} completed", appointment_id);
        Ok(completed)
    }

    /// Confirm a scheduled/rescheduled appointment (staff-class).
    pub async fn confirm_appointment(
        &self,
        appointment_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        if !user.is_staff_class() && !user.is_dentist() {
            return Err(SchedulingError::Forbidden(
                "Only staff can confirm an appointment".to_string(),
            ));
        }

        let current = self.get_appointment(appointment_id, auth_token).await?;
        self.lifecycle
            .validate_status_transition(current.status, AppointmentStatus::Confirmed)?;

        let update_data = json!({
            "status": AppointmentStatus::Confirmed.to_string(),
            "updated_at": Utc::now().to_rfc3339()
        });

        self.patch_appointment(appointment_id, update_data, auth_token)
            .await
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        debug!("Fetching appointment: {}", appointment_id);

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(SchedulingError::NotFound)?;
        serde_json::from_value(row)
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    pub async fn search_appointments(
        &self,
        query: AppointmentSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let mut query_parts = Vec::new();

        if let Some(patient_id) = query.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(dentist_id) = query.dentist_id {
            query_parts.push(format!("dentist_id=eq.{}", dentist_id));
        }
        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(from_date) = query.from_date {
            query_parts.push(format!("date=gte.{}", urlencoding::encode(&from_date.to_string())));
        }
        if let Some(to_date) = query.to_date {
            query_parts.push(format!("date=lte.{}", urlencoding::encode(&to_date.to_string())));
        }

        let mut path = format!(
            "/rest/v1/appointments?{}&order=date.asc,time.asc",
            query_parts.join("&")
        );
        path.push_str(&format!(
            "&limit={}",
            query.limit.unwrap_or(self.defaults.search_result_limit)
        ));
        if let Some(offset) = query.offset {
            path.push_str(&format!("&offset={}", offset));
        }

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse appointments: {}", e)))
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    /// Fetch an appointment and verify ownership. A record owned by another
    /// patient reports identically to a missing one.
    async fn get_owned_appointment(
        &self,
        appointment_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        if appointment.patient_id.to_string() != user.id {
            return Err(SchedulingError::NotFound);
        }
        Ok(appointment)
    }

    /// Duplicate-service guard: a patient may hold at most one non-cancelled
    /// appointment per (service-or-none, date). Service-less bookings form
    /// their own duplicate class: a second same-day appointment with no
    /// service is rejected just like a repeated service would be.
    async fn duplicate_service_booking(
        &self,
        patient_id: Uuid,
        date: NaiveDate,
        service_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<bool, SchedulingError> {
        let service_filter = match service_id {
            Some(id) => format!("service_id=eq.{}", id),
            None => "service_id=is.null".to_string(),
        };
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&date=eq.{}&{}&status=neq.cancelled",
            patient_id, date, service_filter
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        Ok(!result.is_empty())
    }

    async fn insert_appointment(
        &self,
        appointment_data: Value,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(appointment_data),
                Some(headers),
            )
            .await
            .map_err(|e| match e {
                // Uniqueness backstop: a racing create lost to another insert.
                StoreError::Conflict(_) => SchedulingError::SlotConflict,
                other => SchedulingError::DatabaseError(other.to_string()),
            })?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::DatabaseError("Failed to create appointment".to_string()))?;

        serde_json::from_value(row).map_err(|e| {
            SchedulingError::DatabaseError(format!("Failed to parse created appointment: {}", e))
        })
    }

    async fn patch_appointment(
        &self,
        appointment_id: Uuid,
        update_data: Value,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
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
                Some(update_data),
                Some(headers),
            )
            .await
            .map_err(SchedulingError::from_store)?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::DatabaseError("Failed to update appointment".to_string()))?;

        serde_json::from_value(row).map_err(|e| {
            SchedulingError::DatabaseError(format!("Failed to parse updated appointment: {}", e))
        })
    }

    // Notification hooks are fire-and-forget: transport lives in an external
    // collaborator and a failure there must never fail the booking itself.

    fn queue_booking_notification(&self, appointment: &Appointment) {
        debug!("Queueing booking confirmation for appointment {}", appointment.id);
    }

    fn queue_reschedule_notification(&self, appointment: &Appointment) {
        debug!("Queueing reschedule notice for appointment {}", appointment.id);
    }

    fn queue_cancellation_notification(&self, appointment: &Appointment) {
        debug!("Queueing cancellation notice for appointment {}", appointment.id);
    }
}
