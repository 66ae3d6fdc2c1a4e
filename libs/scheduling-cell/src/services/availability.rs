// libs/scheduling-cell/src/services/availability.rs
use chrono::{NaiveDate, NaiveTime, Timelike};
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{
    day_of_week, parse_date, weekday_name, Appointment, ClinicHours, DaySlotsQuery,
    DaySlotsResponse, DentistAvailabilityResponse, SchedulingDefaults, SchedulingError, Service,
};

/// Open hours for one day, already resolved from the dentist override or the
/// clinic-wide default.
#[derive(Debug, Clone, Copy)]
pub struct OpenHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// An existing booking, reduced to what slot exclusion needs.
#[derive(Debug, Clone, Copy)]
pub struct BookedInterval {
    pub start: NaiveTime,
    pub duration_minutes: i32,
}

fn minutes_of(t: NaiveTime) -> i32 {
    (t.hour() * 60 + t.minute()) as i32
}

fn time_from_minutes(m: i32) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt((m / 60) as u32, (m % 60) as u32, 0)
}

/// Generate every free slot start for one day.
///
/// Candidates run from `hours.start` up to (exclusive) `hours.end` at the
/// given granularity. A candidate's start + duration is allowed to spill past
/// closing time; only the start is bounded. Each booking blocks
/// `ceil(duration / granularity)` consecutive steps from its own start.
pub fn compute_day_slots(
    hours: &OpenHours,
    booked: &[BookedInterval],
    granularity_minutes: i32,
) -> Vec<NaiveTime> {
    let open = minutes_of(hours.start);
    let close = minutes_of(hours.end);

    let blocked: Vec<(i32, i32)> = booked
        .iter()
        .map(|b| {
            let start = minutes_of(b.start);
            let steps = (b.duration_minutes + granularity_minutes - 1) / granularity_minutes;
            (start, start + steps.max(1) * granularity_minutes)
        })
        .collect();

    let mut slots = Vec::new();
    let mut candidate = open;
    while candidate < close {
        let taken = blocked
            .iter()
            .any(|(start, end)| candidate >= *start && candidate < *end);
        if !taken {
            if let Some(t) = time_from_minutes(candidate) {
                slots.push(t);
            }
        }
        candidate += granularity_minutes;
    }

    slots
}

pub struct AvailabilityService {
    supabase: Arc<SupabaseClient>,
    defaults: SchedulingDefaults,
}

impl AvailabilityService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            supabase,
            defaults: SchedulingDefaults::default(),
        }
    }

    /// Compute free slots for one calendar date.
    pub async fn get_day_slots(
        &self,
        query: DaySlotsQuery,
        auth_token: &str,
    ) -> Result<DaySlotsResponse, SchedulingError> {
        let date = parse_date(&query.date, "date")?;
        debug!("Calculating slots for {} (dentist {:?})", date, query.dentist_id);

        if let Some(dentist_id) = query.dentist_id {
            self.verify_dentist_exists(dentist_id, auth_token).await?;
        }

        let duration = self
            .resolve_duration(query.service_id, auth_token)
            .await?;

        let hours = match self.open_hours_for(date, query.dentist_id, auth_token).await? {
            Some(h) => h,
            None => {
                return Ok(DaySlotsResponse {
                    date,
                    weekday: weekday_name(date).to_string(),
                    closed: true,
                    closed_reason: Some(format!("Clinic is closed on {}", weekday_name(date))),
                    slot_duration_minutes: duration,
                    slots: vec![],
                });
            }
        };

        let booked = self
            .booked_intervals_for(date, query.dentist_id, auth_token)
            .await?;

        let slots = compute_day_slots(&hours, &booked, self.defaults.slot_granularity_minutes);

        debug!("Found {} free slots on {}", slots.len(), date);
        Ok(DaySlotsResponse {
            date,
            weekday: weekday_name(date).to_string(),
            closed: false,
            closed_reason: None,
            slot_duration_minutes: duration,
            slots,
        })
    }

    /// Schedule plus booked and free slots for one dentist on one date.
    pub async fn get_dentist_availability(
        &self,
        dentist_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<DentistAvailabilityResponse, SchedulingError> {
        self.verify_dentist_exists(dentist_id, auth_token).await?;

        let schedule = self.schedule_rows(Some(dentist_id), auth_token).await?;
        let schedule = if schedule.is_empty() {
            self.schedule_rows(None, auth_token).await?
        } else {
            schedule
        };

        let booked = self
            .booked_intervals_for(date, Some(dentist_id), auth_token)
            .await?;
        let booked_slots: Vec<NaiveTime> = booked.iter().map(|b| b.start).collect();

        let free_slots = match self
            .open_hours_for(date, Some(dentist_id), auth_token)
            .await?
        {
            Some(hours) => {
                compute_day_slots(&hours, &booked, self.defaults.slot_granularity_minutes)
            }
            None => vec![],
        };

        Ok(DentistAvailabilityResponse {
            dentist_id,
            date,
            schedule,
            booked_slots,
            free_slots,
        })
    }

    /// Slot-guard membership test used by the booking path: does this exact
    /// (date, time[, dentist]) already carry a non-cancelled appointment?
    pub async fn slot_taken(
        &self,
        date: NaiveDate,
        time: NaiveTime,
        dentist_id: Option<Uuid>,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<bool, SchedulingError> {
        let mut query_parts = vec![
            format!("date=eq.{}", date),
            format!("time=eq.{}", time.format("%H:%M:%S")),
            "status=neq.cancelled".to_string(),
        ];
        if let Some(dentist_id) = dentist_id {
            query_parts.push(format!("dentist_id=eq.{}", dentist_id));
        }
        if let Some(exclude_id) = exclude_appointment_id {
            query_parts.push(format!("id=neq.{}", exclude_id));
        }

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        Ok(!result.is_empty())
    }

    /// Default appointment duration for a service; unknown or absent service
    /// falls back to 30 minutes.
    pub async fn resolve_duration(
        &self,
        service_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<i32, SchedulingError> {
        let Some(service_id) = service_id else {
            return Ok(self.defaults.fallback_duration_minutes);
        };

        let path = format!("/rest/v1/services?id=eq.{}", service_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        match result.into_iter().next() {
            Some(row) => {
                let service: Service = serde_json::from_value(row)
                    .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse service: {}", e)))?;
                Ok(service.duration_minutes)
            }
            None => Ok(self.defaults.fallback_duration_minutes),
        }
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn verify_dentist_exists(
        &self,
        dentist_id: Uuid,
        auth_token: &str,
    ) -> Result<(), SchedulingError> {
        let path = format!("/rest/v1/dentists?id=eq.{}", dentist_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(SchedulingError::DentistNotFound);
        }
        Ok(())
    }

    async fn schedule_rows(
        &self,
        dentist_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<ClinicHours>, SchedulingError> {
        let filter = match dentist_id {
            Some(id) => format!("dentist_id=eq.{}", id),
            None => "dentist_id=is.null".to_string(),
        };
        let path = format!("/rest/v1/clinic_hours?{}&order=day_of_week.asc", filter);

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<ClinicHours>, _>>()
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse clinic hours: {}", e)))
    }

    /// Dentist override hours for the date's weekday. The clinic default
    /// applies only when the dentist has no override schedule at all: an
    /// override that omits a weekday means the dentist is closed that day.
    async fn open_hours_for(
        &self,
        date: NaiveDate,
        dentist_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Option<OpenHours>, SchedulingError> {
        let dow = day_of_week(date);

        if let Some(dentist_id) = dentist_id {
            let rows = self.schedule_rows(Some(dentist_id), auth_token).await?;
            if !rows.is_empty() {
                return Ok(rows.into_iter().find(|r| r.day_of_week == dow).map(|row| {
                    OpenHours {
                        start: row.open_time,
                        end: row.close_time,
                    }
                }));
            }
            // No override schedule for this dentist: fall back to the default.
        }

        let rows = self.schedule_rows(None, auth_token).await?;
        Ok(rows.into_iter().find(|r| r.day_of_week == dow).map(|row| OpenHours {
            start: row.open_time,
            end: row.close_time,
        }))
    }

    async fn booked_intervals_for(
        &self,
        date: NaiveDate,
        dentist_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<BookedInterval>, SchedulingError> {
        let mut query_parts = vec![
            format!("date=eq.{}", date),
            "status=neq.cancelled".to_string(),
        ];
        if let Some(dentist_id) = dentist_id {
            query_parts.push(format!("dentist_id=eq.{}", dentist_id));
        }

        let path = format!(
            "/rest/v1/appointments?{}&order=time.asc",
            query_parts.join("&")
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let appointments: Vec<Appointment> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse appointments: {}", e)))?;

        Ok(appointments
            .into_iter()
            .map(|apt| BookedInterval {
                start: apt.time,
                duration_minutes: apt.duration_minutes,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn business_hours() -> OpenHours {
        OpenHours {
            start: t(9, 0),
            end: t(17, 0),
        }
    }

    #[test]
    fn empty_day_yields_every_half_hour() {
        let slots = compute_day_slots(&business_hours(), &[], 30);
        assert_eq!(slots.len(), 16);
        assert_eq!(slots[0], t(9, 0));
        assert_eq!(slots[15], t(16, 30));
    }

    #[test]
    fn booked_slot_is_excluded_and_neighbor_kept() {
        let booked = [BookedInterval {
            start: t(9, 0),
            duration_minutes: 30,
        }];
        let slots = compute_day_slots(&business_hours(), &booked, 30);
        assert!(!slots.contains(&t(9, 0)));
        assert!(slots.contains(&t(9, 30)));
    }

    #[test]
    fn long_appointment_blocks_multiple_steps() {
        // 60 minutes = two granularity steps.
        let booked = [BookedInterval {
            start: t(10, 0),
            duration_minutes: 60,
        }];
        let slots = compute_day_slots(&business_hours(), &booked, 30);
        assert!(!slots.contains(&t(10, 0)));
        assert!(!slots.contains(&t(10, 30)));
        assert!(slots.contains(&t(11, 0)));
    }

    #[test]
    fn odd_duration_rounds_up_to_full_steps() {
        // 45 minutes rounds up to two 30-minute steps.
        let booked = [BookedInterval {
            start: t(14, 0),
            duration_minutes: 45,
        }];
        let slots = compute_day_slots(&business_hours(), &booked, 30);
        assert!(!slots.contains(&t(14, 0)));
        assert!(!slots.contains(&t(14, 30)));
        assert!(slots.contains(&t(15, 0)));
    }

    #[test]
    fn last_candidate_may_spill_past_closing() {
        // Observed behavior: 16:30 is offered even though 16:30 + 30min
        // lands exactly on close; only the start is bounded.
        let slots = compute_day_slots(&business_hours(), &[], 30);
        assert_eq!(*slots.last().unwrap(), t(16, 30));
    }

    #[test]
    fn short_friday_hours_cut_off_earlier() {
        let friday = OpenHours {
            start: t(9, 0),
            end: t(15, 0),
        };
        let slots = compute_day_slots(&friday, &[], 30);
        assert_eq!(slots.len(), 12);
        assert_eq!(*slots.last().unwrap(), t(14, 30));
    }
}
