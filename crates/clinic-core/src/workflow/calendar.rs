//! Calendar mirror synchronisation.
//!
//! Every appointment owns exactly one calendar event. The mirror is created
//! with the appointment, rewritten in place when a mirrored field changes,
//! and deleted before the appointment itself.

use chrono_tz::Tz;
use tracing::{debug, info};

use super::{ActingUser, WorkflowError, WorkflowResult};
use crate::db::Database;
use crate::logging::CALENDAR;
use crate::models::{Appointment, CalendarEvent, Patient};
use crate::schedule::{compute_slot, resolve_timezone, SlotEnd};

/// Keeps calendar events in step with appointments.
pub struct CalendarSync<'a> {
    db: &'a Database,
    fallback_tz: &'a str,
}

impl<'a> CalendarSync<'a> {
    pub fn new(db: &'a Database, fallback_tz: &'a str) -> Self {
        Self { db, fallback_tz }
    }

    fn zone_for(&self, user: &ActingUser) -> WorkflowResult<Tz> {
        Ok(resolve_timezone(user.timezone.as_deref(), self.fallback_tz)?)
    }

    /// Recompute title, times, description and attendees into `event`.
    fn fill(
        &self,
        event: &mut CalendarEvent,
        appointment: &Appointment,
        patient: &Patient,
        tz: Tz,
    ) -> WorkflowResult<()> {
        let slot = compute_slot(
            appointment.date,
            appointment.start_hour,
            SlotEnd::Duration(appointment.duration_hours),
            tz,
        )?;

        event.title = CalendarEvent::title_for(&patient.name);
        event.start = slot.start_utc;
        event.stop = slot.end_utc;
        event.description = appointment.reason.clone().unwrap_or_default();
        event.attendee_ids = vec![patient.local_id.clone()];
        Ok(())
    }

    fn patient_of(&self, appointment: &Appointment) -> WorkflowResult<Patient> {
        self.db
            .get_patient(&appointment.patient_id)?
            .ok_or_else(|| WorkflowError::NotFound(format!("patient {}", appointment.patient_id)))
    }

    /// Current mirror, looked up by link first and by owner appointment second.
    pub fn mirror_of(&self, appointment: &Appointment) -> WorkflowResult<Option<CalendarEvent>> {
        if let Some(event_id) = &appointment.calendar_event_id {
            if let Some(event) = self.db.get_calendar_event(event_id)? {
                return Ok(Some(event));
            }
        }
        Ok(self
            .db
            .get_calendar_event_for_appointment(&appointment.appointment_id)?)
    }

    /// Create the mirror unless one already exists. Links it on `appointment`.
    pub fn ensure_mirror(
        &self,
        user: &ActingUser,
        appointment: &mut Appointment,
    ) -> WorkflowResult<CalendarEvent> {
        if let Some(existing) = self.mirror_of(appointment)? {
            self.link(appointment, &existing)?;
            return Ok(existing);
        }

        let patient = self.patient_of(appointment)?;
        let tz = self.zone_for(user)?;
        let now = chrono::Utc::now().to_rfc3339();
        let mut event = CalendarEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            appointment_id: appointment.appointment_id.clone(),
            title: String::new(),
            start: chrono::Utc::now(),
            stop: chrono::Utc::now(),
            description: String::new(),
            owner_id: appointment
                .staff_id
                .clone()
                .unwrap_or_else(|| user.user_id.clone()),
            attendee_ids: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        };
        self.fill(&mut event, appointment, &patient, tz)?;
        self.db.insert_calendar_event(&event)?;
        self.link(appointment, &event)?;

        info!(
            target: CALENDAR,
            appointment_id = %appointment.appointment_id,
            event_id = %event.event_id,
            "calendar mirror created"
        );
        Ok(event)
    }

    /// Rewrite the mirror from the appointment, creating it when missing.
    pub fn sync_mirror(
        &self,
        user: &ActingUser,
        appointment: &mut Appointment,
    ) -> WorkflowResult<CalendarEvent> {
        let Some(mut event) = self.mirror_of(appointment)? else {
            return self.ensure_mirror(user, appointment);
        };

        let patient = self.patient_of(appointment)?;
        let tz = self.zone_for(user)?;
        self.fill(&mut event, appointment, &patient, tz)?;
        self.db.update_calendar_event(&event)?;
        self.link(appointment, &event)?;

        debug!(
            target: CALENDAR,
            appointment_id = %appointment.appointment_id,
            event_id = %event.event_id,
            "calendar mirror updated"
        );
        Ok(event)
    }

    /// Delete the mirror, if any. Returns whether one was removed.
    pub fn remove_mirror(&self, appointment: &Appointment) -> WorkflowResult<bool> {
        let Some(event) = self.mirror_of(appointment)? else {
            return Ok(false);
        };
        self.db.delete_calendar_event(&event.event_id)?;

        info!(
            target: CALENDAR,
            appointment_id = %appointment.appointment_id,
            event_id = %event.event_id,
            "calendar mirror deleted"
        );
        Ok(true)
    }

    fn link(&self, appointment: &mut Appointment, event: &CalendarEvent) -> WorkflowResult<()> {
        if appointment.calendar_event_id.as_deref() != Some(event.event_id.as_str()) {
            self.db
                .link_calendar_event(&appointment.appointment_id, &event.event_id)?;
            appointment.calendar_event_id = Some(event.event_id.clone());
        }
        Ok(())
    }
}
