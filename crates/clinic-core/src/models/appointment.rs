//! Appointment models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Appointment status.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    /// Created, not yet confirmed
    #[default]
    Draft,
    Confirmed,
    Completed,
    Cancelled,
    /// Patient did not attend
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Draft => "draft",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(AppointmentStatus::Draft),
            "confirmed" => Some(AppointmentStatus::Confirmed),
            "completed" => Some(AppointmentStatus::Completed),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            "no_show" => Some(AppointmentStatus::NoShow),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }
}

/// A scheduled visit.
///
/// The slot end is stored only as `duration_hours`; the end hour is derived.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub appointment_id: String,
    pub patient_id: String,
    pub date: NaiveDate,
    /// Fractional hour, e.g. 9.25 = 09:15
    pub start_hour: f64,
    pub duration_hours: f64,
    /// Assigned staff member (optometrist)
    pub staff_id: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    /// Calendar mirror, set on first save
    pub calendar_event_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Appointment {
    /// Create a draft appointment.
    pub fn new(patient_id: String, date: NaiveDate, start_hour: f64, duration_hours: f64) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            appointment_id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            date,
            start_hour,
            duration_hours: duration_hours.max(0.0),
            staff_id: None,
            reason: None,
            notes: None,
            status: AppointmentStatus::Draft,
            calendar_event_id: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Derived end fractional hour.
    pub fn end_hour(&self) -> f64 {
        self.start_hour + self.duration_hours.max(0.0)
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

/// Partial update of an appointment.
///
/// `None` leaves the field unchanged. `end_hour` and `duration_hours` are
/// alternatives; when both are given the end hour wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentChanges {
    pub patient_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub start_hour: Option<f64>,
    pub duration_hours: Option<f64>,
    pub end_hour: Option<f64>,
    pub staff_id: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

impl AppointmentChanges {
    /// True when any field mirrored on the calendar event changes.
    pub fn touches_calendar(&self) -> bool {
        self.patient_id.is_some()
            || self.date.is_some()
            || self.start_hour.is_some()
            || self.duration_hours.is_some()
            || self.end_hour.is_some()
            || self.reason.is_some()
            || self.notes.is_some()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_appointment_is_draft() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let appointment = Appointment::new("patient-1".into(), date, 9.25, 0.5);
        assert_eq!(appointment.status, AppointmentStatus::Draft);
        assert_eq!(appointment.end_hour(), 9.75);
        assert!(appointment.calendar_event_id.is_none());
    }

    #[test]
    fn test_negative_duration_clamps() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let appointment = Appointment::new("patient-1".into(), date, 10.0, -1.0);
        assert_eq!(appointment.duration_hours, 0.0);
        assert_eq!(appointment.end_hour(), 10.0);
    }

    #[test]
    fn test_status_round_trip_strings() {
        for status in [
            AppointmentStatus::Draft,
            AppointmentStatus::Confirmed,
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::NoShow,
        ] {
            assert_eq!(AppointmentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AppointmentStatus::parse("pending"), None);
    }

    #[test]
    fn test_staff_change_does_not_touch_calendar() {
        let changes = AppointmentChanges {
            staff_id: Some("user-2".into()),
            ..Default::default()
        };
        assert!(!changes.touches_calendar());
        assert!(!changes.is_empty());

        let changes = AppointmentChanges {
            reason: Some("Check-up".into()),
            ..Default::default()
        };
        assert!(changes.touches_calendar());
    }
}
