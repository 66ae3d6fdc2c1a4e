// libs/scheduling-cell/src/services/mod.rs
pub mod availability;
pub mod booking;
pub mod lifecycle;
pub mod recurrence;
pub mod urgent;
pub mod waitlist;

pub use availability::AvailabilityService;
pub use booking::BookingService;
pub use lifecycle::AppointmentLifecycleService;
pub use recurrence::RecurrenceService;
pub use urgent::UrgentRequestService;
pub use waitlist::WaitlistService;
