//! Background jobs.
//!
//! The only recurring job is the alert sweep: overdue/due-soon reminders for
//! borrowers plus the low-stock check for staff. It runs on a tokio interval
//! inside the server process; the admin CLI runs the same service calls once.

pub mod sweep;

pub use sweep::{SweepJob, SweepJobConfig, SweepJobHandle, SweepStats};
