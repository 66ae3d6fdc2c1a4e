// libs/scheduling-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn scheduling_routes(state: Arc<AppConfig>) -> Router {
    // All scheduling operations require authentication
    let protected_routes = Router::new()
        // Availability
        .route("/slots", get(handlers::get_day_slots))
        .route("/dentists/{dentist_id}/availability", get(handlers::get_dentist_availability))
        // Appointment lifecycle
        .route("/appointments", post(handlers::create_appointment).get(handlers::search_appointments))
        .route("/appointments/{appointment_id}", get(handlers::get_appointment))
        .route("/appointments/{appointment_id}/reschedule", patch(handlers::reschedule_appointment))
        .route("/appointments/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/appointments/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/appointments/{appointment_id}/confirm", post(handlers::confirm_appointment))
        // Waitlist
        .route("/waitlist", post(handlers::create_waitlist_entry).get(handlers::list_waitlist_entries))
        .route("/waitlist/{entry_id}/cancel", post(handlers::cancel_waitlist_entry))
        // Urgent queue
        .route("/urgent", post(handlers::create_urgent_request).get(handlers::list_urgent_requests))
        // Recurring appointments (staff only)
        .route("/recurring", post(handlers::create_recurrence_rule))
        .route(
            "/recurring/{rule_id}",
            get(handlers::get_recurrence_rule)
                .patch(handlers::update_recurrence_rule)
                .delete(handlers::delete_recurrence_rule),
        )
        .route("/recurring/patients/{patient_id}", get(handlers::list_patient_recurrence_rules))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
