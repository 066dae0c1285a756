//! Calendar event mirrored from an appointment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarEvent {
    pub event_id: String,
    /// Owning appointment (one-to-one)
    pub appointment_id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
    pub description: String,
    /// Staff member owning the event
    pub owner_id: String,
    /// Attendee ids (the patient)
    pub attendee_ids: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl CalendarEvent {
    /// Event title for a patient.
    pub fn title_for(patient_name: &str) -> String {
        format!("Appointment: {}", patient_name)
    }
}
