//! Appointment status lifecycle.
//!
//! ```text
//!   Draft ──► Confirmed ──► Completed
//!     │           │
//!     ├───────────┴──► Cancelled
//!     └───────────┴──► NoShow
//!
//!   any state ──► Draft   (reopen)
//! ```

use tracing::warn;

use super::{WorkflowError, WorkflowResult};
use crate::logging::APPOINTMENTS;
use crate::models::AppointmentStatus;

/// Statuses reachable from `current`.
pub fn allowed_transitions(current: AppointmentStatus) -> &'static [AppointmentStatus] {
    use AppointmentStatus::*;

    match current {
        Draft => &[Draft, Confirmed, Cancelled, NoShow],
        Confirmed => &[Draft, Completed, Cancelled, NoShow],
        Completed | Cancelled | NoShow => &[Draft],
    }
}

/// Reject a status change the lifecycle does not allow.
pub fn validate_transition(current: AppointmentStatus, next: AppointmentStatus) -> WorkflowResult<()> {
    if allowed_transitions(current).contains(&next) {
        return Ok(());
    }

    warn!(
        target: APPOINTMENTS,
        from = current.as_str(),
        to = next.as_str(),
        "rejected status transition"
    );
    Err(WorkflowError::Validation(format!(
        "An appointment in status '{}' cannot move to '{}'",
        current.as_str(),
        next.as_str()
    )))
}
