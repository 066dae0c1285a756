//! Appointment workflows: batch creation, edits, deletion and status actions.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde_json::json;
use tracing::{info, warn};

use super::{validate_transition, ActingUser, CalendarSync, WorkflowError, WorkflowResult};
use crate::audit::{ActivityLog, RecordType};
use crate::config::ClinicConfig;
use crate::db::Database;
use crate::logging::APPOINTMENTS;
use crate::models::{
    ActionDirective, Appointment, AppointmentChanges, AppointmentStatus, CalendarEvent, Entity,
    Patient, ViewMode,
};
use crate::schedule::{compute_slot, duration_of, resolve_timezone, SlotEnd, SlotPolicy, TimeSlot};

/// Appointment book bound to a database and clinic settings.
pub struct AppointmentBook<'a> {
    db: &'a Database,
    config: &'a ClinicConfig,
}

impl<'a> AppointmentBook<'a> {
    pub fn new(db: &'a Database, config: &'a ClinicConfig) -> Self {
        Self { db, config }
    }

    fn policy(&self) -> SlotPolicy {
        SlotPolicy::from_config(&self.config.scheduling)
    }

    fn calendar(&self) -> CalendarSync<'a> {
        CalendarSync::new(self.db, &self.config.scheduling.fallback_timezone)
    }

    fn require(&self, appointment_id: &str) -> WorkflowResult<Appointment> {
        self.db
            .get_appointment(appointment_id)?
            .ok_or_else(|| WorkflowError::NotFound(format!("appointment {}", appointment_id)))
    }

    fn require_patient(&self, patient_id: &str) -> WorkflowResult<Patient> {
        self.db
            .get_patient(patient_id)?
            .ok_or_else(|| WorkflowError::NotFound(format!("patient {}", patient_id)))
    }

    /// Blank draft for a patient using the configured default slot.
    pub fn draft(&self, patient_id: &str, date: NaiveDate) -> Appointment {
        Appointment::new(
            patient_id.to_string(),
            date,
            self.config.scheduling.default_start_hour,
            self.config.scheduling.default_duration,
        )
    }

    /// Create a batch of appointments in one unit of work.
    ///
    /// Every patient in the batch is checked before anything is written; one
    /// blacklisted patient rejects the whole batch. Each appointment starts
    /// in draft and gets its calendar mirror.
    pub fn create_batch(
        &self,
        user: &ActingUser,
        appointments: Vec<Appointment>,
    ) -> WorkflowResult<Vec<Appointment>> {
        let policy = self.policy();
        let mut patients: HashMap<String, Patient> = HashMap::new();

        for appointment in &appointments {
            if !patients.contains_key(&appointment.patient_id) {
                let patient = self.require_patient(&appointment.patient_id)?;
                patients.insert(patient.local_id.clone(), patient);
            }
            if let Some(patient) = patients.get(&appointment.patient_id) {
                if patient.is_blacklisted() {
                    warn!(
                        target: APPOINTMENTS,
                        patient_id = %patient.local_id,
                        "appointment refused for blacklisted patient"
                    );
                    return Err(WorkflowError::Validation(format!(
                        "Cannot schedule appointments for blacklisted patient {}",
                        patient.name
                    )));
                }
            }
            policy.validate_start(appointment.start_hour)?;
            policy.validate_duration(appointment.start_hour, appointment.duration_hours)?;
        }

        let tx = self.db.begin()?;
        let calendar = self.calendar();
        let log = ActivityLog::new(self.db);
        let mut created = Vec::with_capacity(appointments.len());

        for mut appointment in appointments {
            appointment.status = AppointmentStatus::Draft;
            appointment.duration_hours = appointment.duration_hours.max(0.0);
            if appointment.staff_id.is_none() {
                appointment.staff_id = Some(user.user_id.clone());
            }
            appointment.calendar_event_id = None;

            self.db.insert_appointment(&appointment)?;
            calendar.ensure_mirror(user, &mut appointment)?;
            log.record(
                RecordType::Appointment,
                &appointment.appointment_id,
                "created",
                &user.user_id,
                json!({
                    "patient_id": appointment.patient_id,
                    "date": appointment.date,
                    "staff_id": appointment.staff_id,
                    "status": appointment.status.as_str(),
                }),
            )?;
            created.push(appointment);
        }

        tx.commit()?;

        info!(target: APPOINTMENTS, count = created.len(), "appointments created");
        Ok(created)
    }

    /// Create a single appointment.
    pub fn create(&self, user: &ActingUser, appointment: Appointment) -> WorkflowResult<Appointment> {
        self.create_batch(user, vec![appointment])?
            .pop()
            .ok_or_else(|| WorkflowError::Validation("No appointment was created".into()))
    }

    /// Apply a partial update, then resynchronise the mirror if a mirrored
    /// field changed.
    pub fn update(
        &self,
        user: &ActingUser,
        appointment_id: &str,
        changes: AppointmentChanges,
    ) -> WorkflowResult<Appointment> {
        let tx = self.db.begin()?;
        let mut appointment = self.require(appointment_id)?;
        if changes.is_empty() {
            return Ok(appointment);
        }

        let mut tracked = serde_json::Map::new();

        if let Some(patient_id) = &changes.patient_id {
            if *patient_id != appointment.patient_id {
                self.require_patient(patient_id)?;
                tracked.insert("patient_id".into(), json!(patient_id));
                appointment.patient_id = patient_id.clone();
            }
        }
        if let Some(date) = changes.date {
            if date != appointment.date {
                tracked.insert("date".into(), json!(date));
                appointment.date = date;
            }
        }
        let policy = self.policy();
        if let Some(start_hour) = changes.start_hour {
            policy.validate_start(start_hour)?;
            appointment.start_hour = start_hour;
        }
        if let Some(end_hour) = changes.end_hour {
            policy.validate_end(appointment.start_hour, end_hour)?;
            appointment.duration_hours = duration_of(appointment.start_hour, end_hour);
        } else if let Some(duration_hours) = changes.duration_hours {
            policy.validate_duration(appointment.start_hour, duration_hours)?;
            appointment.duration_hours = duration_hours.max(0.0);
        } else {
            policy.validate_duration(appointment.start_hour, appointment.duration_hours)?;
        }
        if let Some(staff_id) = &changes.staff_id {
            if appointment.staff_id.as_ref() != Some(staff_id) {
                tracked.insert("staff_id".into(), json!(staff_id));
                appointment.staff_id = Some(staff_id.clone());
            }
        }
        if let Some(reason) = &changes.reason {
            appointment.reason = non_blank(reason);
        }
        if let Some(notes) = &changes.notes {
            appointment.notes = non_blank(notes);
        }

        appointment.touch();
        self.db.update_appointment(&appointment)?;

        if changes.touches_calendar() {
            self.calendar().sync_mirror(user, &mut appointment)?;
        }

        if !tracked.is_empty() {
            ActivityLog::new(self.db).record(
                RecordType::Appointment,
                &appointment.appointment_id,
                "updated",
                &user.user_id,
                serde_json::Value::Object(tracked),
            )?;
        }

        tx.commit()?;

        info!(
            target: APPOINTMENTS,
            appointment_id = %appointment.appointment_id,
            "appointment updated"
        );
        Ok(appointment)
    }

    /// Delete the calendar mirror, then the appointment.
    pub fn delete(&self, user: &ActingUser, appointment_id: &str) -> WorkflowResult<()> {
        let tx = self.db.begin()?;
        let appointment = self.require(appointment_id)?;

        self.calendar().remove_mirror(&appointment)?;
        self.db.delete_appointment(appointment_id)?;
        ActivityLog::new(self.db).record(
            RecordType::Appointment,
            appointment_id,
            "deleted",
            &user.user_id,
            json!({ "patient_id": appointment.patient_id }),
        )?;

        tx.commit()?;

        info!(target: APPOINTMENTS, appointment_id, "appointment deleted");
        Ok(())
    }

    /// Move an appointment to `next` through the lifecycle rules.
    ///
    /// Confirmation additionally requires the patient not to be blacklisted.
    /// Status is not mirrored, so the calendar event is left untouched.
    pub fn transition(
        &self,
        user: &ActingUser,
        appointment_id: &str,
        next: AppointmentStatus,
    ) -> WorkflowResult<Appointment> {
        let tx = self.db.begin()?;
        let mut appointment = self.require(appointment_id)?;
        let previous = appointment.status;
        validate_transition(previous, next)?;

        if next == AppointmentStatus::Confirmed {
            let patient = self.require_patient(&appointment.patient_id)?;
            if patient.is_blacklisted() {
                warn!(
                    target: APPOINTMENTS,
                    appointment_id,
                    patient_id = %patient.local_id,
                    "confirmation refused for blacklisted patient"
                );
                return Err(WorkflowError::Validation(format!(
                    "Cannot confirm appointments for blacklisted patient {}",
                    patient.name
                )));
            }
        }

        self.db.set_appointment_status(appointment_id, next)?;
        appointment.status = next;
        appointment.touch();

        ActivityLog::new(self.db).record(
            RecordType::Appointment,
            appointment_id,
            "status_changed",
            &user.user_id,
            json!({ "from": previous.as_str(), "to": next.as_str() }),
        )?;

        tx.commit()?;

        info!(
            target: APPOINTMENTS,
            appointment_id,
            from = previous.as_str(),
            to = next.as_str(),
            "appointment status changed"
        );
        Ok(appointment)
    }

    pub fn confirm(&self, user: &ActingUser, appointment_id: &str) -> WorkflowResult<Appointment> {
        self.transition(user, appointment_id, AppointmentStatus::Confirmed)
    }

    pub fn complete(&self, user: &ActingUser, appointment_id: &str) -> WorkflowResult<Appointment> {
        self.transition(user, appointment_id, AppointmentStatus::Completed)
    }

    pub fn cancel(&self, user: &ActingUser, appointment_id: &str) -> WorkflowResult<Appointment> {
        self.transition(user, appointment_id, AppointmentStatus::Cancelled)
    }

    pub fn mark_no_show(&self, user: &ActingUser, appointment_id: &str) -> WorkflowResult<Appointment> {
        self.transition(user, appointment_id, AppointmentStatus::NoShow)
    }

    /// Return to draft from any state.
    pub fn reopen(&self, user: &ActingUser, appointment_id: &str) -> WorkflowResult<Appointment> {
        self.transition(user, appointment_id, AppointmentStatus::Draft)
    }

    /// Directive opening a consultation form for the appointment's patient.
    pub fn create_consultation(&self, appointment_id: &str) -> WorkflowResult<ActionDirective> {
        let appointment = self.require(appointment_id)?;
        Ok(ActionDirective::new_record(
            "New consultation",
            Entity::Consultation,
            ViewMode::Form,
            [("patient_id", appointment.patient_id)],
        ))
    }

    /// End hour to show after the start changes: one step after the new
    /// start when that is a legal slot value, otherwise `current_end`.
    pub fn propose_end_hour(&self, start_hour: f64, current_end: f64) -> f64 {
        self.policy().propose_end(start_hour).unwrap_or(current_end)
    }

    /// Resolve an appointment's slot in the user's zone.
    pub fn slot(&self, user: &ActingUser, appointment: &Appointment) -> WorkflowResult<TimeSlot> {
        let tz = resolve_timezone(
            user.timezone.as_deref(),
            &self.config.scheduling.fallback_timezone,
        )?;
        Ok(compute_slot(
            appointment.date,
            appointment.start_hour,
            SlotEnd::Duration(appointment.duration_hours),
            tz,
        )?)
    }

    pub fn get(&self, appointment_id: &str) -> WorkflowResult<Appointment> {
        self.require(appointment_id)
    }

    pub fn list_for_patient(&self, patient_id: &str) -> WorkflowResult<Vec<Appointment>> {
        Ok(self.db.list_appointments_for_patient(patient_id)?)
    }

    pub fn list_on(&self, date: NaiveDate) -> WorkflowResult<Vec<Appointment>> {
        Ok(self.db.list_appointments_on(date)?)
    }

    /// The appointment's calendar event.
    pub fn mirror(&self, appointment_id: &str) -> WorkflowResult<Option<CalendarEvent>> {
        let appointment = self.require(appointment_id)?;
        self.calendar().mirror_of(&appointment)
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::SlotError;

    struct Fixture {
        db: Database,
        config: ClinicConfig,
        patient: Patient,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let patient = Patient::new("Ana López".into());
        db.insert_patient(&patient).unwrap();
        Fixture {
            db,
            config: ClinicConfig::default(),
            patient,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 12).unwrap()
    }

    fn user() -> ActingUser {
        ActingUser::new("opt-1")
    }

    #[test]
    fn test_create_starts_in_draft_with_mirror() {
        let f = fixture();
        let book = AppointmentBook::new(&f.db, &f.config);

        let mut appointment = book.draft(&f.patient.local_id, date());
        appointment.status = AppointmentStatus::Confirmed;
        let created = book.create(&user(), appointment).unwrap();

        assert_eq!(created.status, AppointmentStatus::Draft);
        assert_eq!(created.staff_id.as_deref(), Some("opt-1"));
        assert!(created.calendar_event_id.is_some());
        assert!(book.mirror(&created.appointment_id).unwrap().is_some());
    }

    #[test]
    fn test_create_rejects_off_grid_start() {
        let f = fixture();
        let book = AppointmentBook::new(&f.db, &f.config);

        let appointment = Appointment::new(f.patient.local_id.clone(), date(), 9.1, 0.5);
        let err = book.create(&user(), appointment).unwrap_err();

        assert!(matches!(err, WorkflowError::Slot(SlotError::OffGrid { .. })));
        assert!(book.list_for_patient(&f.patient.local_id).unwrap().is_empty());
    }

    #[test]
    fn test_batch_rejected_when_any_patient_blacklisted() {
        let f = fixture();
        let mut blocked = Patient::new("Luis Pérez".into());
        blocked.blacklisted = true;
        blocked.blacklist_reason = Some("Repeated no-shows".into());
        f.db.insert_patient(&blocked).unwrap();
        let book = AppointmentBook::new(&f.db, &f.config);

        let batch = vec![
            book.draft(&f.patient.local_id, date()),
            book.draft(&blocked.local_id, date()),
        ];
        let err = book.create_batch(&user(), batch).unwrap_err();

        assert!(matches!(err, WorkflowError::Validation(_)));
        assert!(book.list_on(date()).unwrap().is_empty());
    }

    #[test]
    fn test_update_end_hour_sets_duration() {
        let f = fixture();
        let book = AppointmentBook::new(&f.db, &f.config);
        let created = book
            .create(&user(), book.draft(&f.patient.local_id, date()))
            .unwrap();

        let updated = book
            .update(
                &user(),
                &created.appointment_id,
                AppointmentChanges {
                    start_hour: Some(10.0),
                    end_hour: Some(11.5),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.start_hour, 10.0);
        assert_eq!(updated.duration_hours, 1.5);
        assert_eq!(updated.end_hour(), 11.5);
    }

    #[test]
    fn test_update_end_before_start_clamps() {
        let f = fixture();
        let book = AppointmentBook::new(&f.db, &f.config);
        let created = book
            .create(&user(), book.draft(&f.patient.local_id, date()))
            .unwrap();

        let updated = book
            .update(
                &user(),
                &created.appointment_id,
                AppointmentChanges {
                    end_hour: Some(8.0),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.duration_hours, 0.0);
        let slot = book.slot(&user(), &updated).unwrap();
        assert_eq!(slot.start_utc, slot.end_utc);
        assert_eq!(slot.duration_display, "0:00");
    }

    #[test]
    fn test_blank_reason_is_cleared() {
        let f = fixture();
        let book = AppointmentBook::new(&f.db, &f.config);
        let mut draft = book.draft(&f.patient.local_id, date());
        draft.reason = Some("Checkup".into());
        let created = book.create(&user(), draft).unwrap();

        let updated = book
            .update(
                &user(),
                &created.appointment_id,
                AppointmentChanges {
                    reason: Some("   ".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.reason, None);
        let event = book.mirror(&created.appointment_id).unwrap().unwrap();
        assert_eq!(event.description, "");
    }

    #[test]
    fn test_confirm_then_complete() {
        let f = fixture();
        let book = AppointmentBook::new(&f.db, &f.config);
        let created = book
            .create(&user(), book.draft(&f.patient.local_id, date()))
            .unwrap();

        book.confirm(&user(), &created.appointment_id).unwrap();
        let done = book.complete(&user(), &created.appointment_id).unwrap();

        assert_eq!(done.status, AppointmentStatus::Completed);
        assert_eq!(
            book.get(&created.appointment_id).unwrap().status,
            AppointmentStatus::Completed
        );
    }

    #[test]
    fn test_cancel_completed_is_rejected() {
        let f = fixture();
        let book = AppointmentBook::new(&f.db, &f.config);
        let created = book
            .create(&user(), book.draft(&f.patient.local_id, date()))
            .unwrap();
        book.confirm(&user(), &created.appointment_id).unwrap();
        book.complete(&user(), &created.appointment_id).unwrap();

        let err = book.cancel(&user(), &created.appointment_id).unwrap_err();

        assert!(matches!(err, WorkflowError::Validation(_)));
        assert_eq!(
            book.get(&created.appointment_id).unwrap().status,
            AppointmentStatus::Completed
        );
    }

    #[test]
    fn test_reopen_cancelled() {
        let f = fixture();
        let book = AppointmentBook::new(&f.db, &f.config);
        let created = book
            .create(&user(), book.draft(&f.patient.local_id, date()))
            .unwrap();
        book.cancel(&user(), &created.appointment_id).unwrap();

        let reopened = book.reopen(&user(), &created.appointment_id).unwrap();

        assert_eq!(reopened.status, AppointmentStatus::Draft);
    }

    #[test]
    fn test_status_change_leaves_mirror_alone() {
        let f = fixture();
        let book = AppointmentBook::new(&f.db, &f.config);
        let created = book
            .create(&user(), book.draft(&f.patient.local_id, date()))
            .unwrap();
        let before = book.mirror(&created.appointment_id).unwrap().unwrap();

        book.mark_no_show(&user(), &created.appointment_id).unwrap();

        let after = book.mirror(&created.appointment_id).unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_create_consultation_directive() {
        let f = fixture();
        let book = AppointmentBook::new(&f.db, &f.config);
        let created = book
            .create(&user(), book.draft(&f.patient.local_id, date()))
            .unwrap();

        let directive = book.create_consultation(&created.appointment_id).unwrap();

        assert_eq!(
            directive.default_value("patient_id"),
            Some(f.patient.local_id.as_str())
        );
    }

    #[test]
    fn test_propose_end_hour() {
        let f = fixture();
        let book = AppointmentBook::new(&f.db, &f.config);

        assert_eq!(book.propose_end_hour(9.0, 10.0), 9.25);
        assert_eq!(book.propose_end_hour(20.0, 20.0), 20.0);
    }

    #[test]
    fn test_create_rejects_unbounded_duration() {
        let f = fixture();
        let book = AppointmentBook::new(&f.db, &f.config);

        for hours in [f64::INFINITY, 1e300, 15.5] {
            let appointment = Appointment::new(f.patient.local_id.clone(), date(), 9.0, hours);
            let err = book.create(&user(), appointment).unwrap_err();
            assert!(
                matches!(err, WorkflowError::Slot(SlotError::InvalidDuration { .. })),
                "{} hours gave {:?}",
                hours,
                err
            );
        }
        assert!(book.list_for_patient(&f.patient.local_id).unwrap().is_empty());
    }

    #[test]
    fn test_update_rejects_unbounded_end_or_duration() {
        let f = fixture();
        let book = AppointmentBook::new(&f.db, &f.config);
        let created = book
            .create(&user(), book.draft(&f.patient.local_id, date()))
            .unwrap();
        let before = book.mirror(&created.appointment_id).unwrap();

        let changes = [
            AppointmentChanges {
                end_hour: Some(1e15),
                ..Default::default()
            },
            AppointmentChanges {
                end_hour: Some(f64::INFINITY),
                ..Default::default()
            },
            AppointmentChanges {
                duration_hours: Some(f64::INFINITY),
                ..Default::default()
            },
            AppointmentChanges {
                duration_hours: Some(1e300),
                ..Default::default()
            },
        ];
        for change in changes {
            let err = book
                .update(&user(), &created.appointment_id, change)
                .unwrap_err();
            assert!(matches!(err, WorkflowError::Slot(_)), "{:?}", err);
        }

        let stored = book.get(&created.appointment_id).unwrap();
        assert_eq!(stored.duration_hours, created.duration_hours);
        assert_eq!(book.mirror(&created.appointment_id).unwrap(), before);

        // The book stays usable afterwards.
        let updated = book
            .update(
                &user(),
                &created.appointment_id,
                AppointmentChanges {
                    end_hour: Some(20.0),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(updated.duration_hours > 0.0);
    }

    #[test]
    fn test_missing_appointment() {
        let f = fixture();
        let book = AppointmentBook::new(&f.db, &f.config);

        assert!(matches!(
            book.confirm(&user(), "nope"),
            Err(WorkflowError::NotFound(_))
        ));
    }
}
