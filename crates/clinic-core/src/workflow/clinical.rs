//! Consultation desk: visual exams and their clinical drawings.

use chrono::NaiveDate;
use serde_json::json;
use tracing::info;

use super::{ActingUser, WorkflowError, WorkflowResult};
use crate::audit::{ActivityLog, RecordType};
use crate::db::Database;
use crate::logging::CONSULTATIONS;
use crate::models::{ActionDirective, ClinicalDrawing, Consultation, Entity, ViewMode};

pub struct ConsultationDesk<'a> {
    db: &'a Database,
}

impl<'a> ConsultationDesk<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn require(&self, consultation_id: &str) -> WorkflowResult<Consultation> {
        self.db
            .get_consultation(consultation_id)?
            .ok_or_else(|| WorkflowError::NotFound(format!("consultation {}", consultation_id)))
    }

    /// Record a new consultation. Age at visit defaults to the patient's
    /// age on the consultation date; the optometrist defaults to `user`.
    pub fn open_consultation(
        &self,
        user: &ActingUser,
        mut consultation: Consultation,
    ) -> WorkflowResult<Consultation> {
        let tx = self.db.begin()?;
        let patient = self.db.get_patient(&consultation.patient_id)?.ok_or_else(|| {
            WorkflowError::Validation("A consultation requires an existing patient".into())
        })?;

        if consultation.age_at_visit.is_none() {
            consultation.age_at_visit = Some(patient.age_on(consultation.date));
        }
        if consultation.optometrist_id.is_none() {
            consultation.optometrist_id = Some(user.user_id.clone());
        }

        self.db.insert_consultation(&consultation)?;
        ActivityLog::new(self.db).record(
            RecordType::Consultation,
            &consultation.consultation_id,
            "opened",
            &user.user_id,
            json!({
                "patient_id": consultation.patient_id,
                "date": consultation.date,
                "optometrist_id": consultation.optometrist_id,
            }),
        )?;
        tx.commit()?;

        info!(
            target: CONSULTATIONS,
            consultation_id = %consultation.consultation_id,
            patient_id = %consultation.patient_id,
            "consultation opened"
        );
        Ok(consultation)
    }

    /// Save exam edits. The owning patient never changes.
    pub fn update(&self, user: &ActingUser, mut consultation: Consultation) -> WorkflowResult<Consultation> {
        let tx = self.db.begin()?;
        let existing = self.require(&consultation.consultation_id)?;
        consultation.patient_id = existing.patient_id.clone();
        consultation.touch();
        self.db.update_consultation(&consultation)?;

        let mut tracked = serde_json::Map::new();
        if consultation.date != existing.date {
            tracked.insert("date".into(), json!(consultation.date));
        }
        if consultation.optometrist_id != existing.optometrist_id {
            tracked.insert("optometrist_id".into(), json!(consultation.optometrist_id));
        }
        if !tracked.is_empty() {
            ActivityLog::new(self.db).record(
                RecordType::Consultation,
                &consultation.consultation_id,
                "updated",
                &user.user_id,
                serde_json::Value::Object(tracked),
            )?;
        }
        tx.commit()?;

        Ok(consultation)
    }

    pub fn get(&self, consultation_id: &str) -> WorkflowResult<Consultation> {
        self.require(consultation_id)
    }

    /// Newest first.
    pub fn list_for_patient(&self, patient_id: &str) -> WorkflowResult<Vec<Consultation>> {
        Ok(self.db.list_consultations_for_patient(patient_id)?)
    }

    /// Open an appointment form for a follow-up visit, dated on the
    /// suggested next visit or `today`.
    pub fn follow_up_appointment(
        &self,
        consultation_id: &str,
        today: NaiveDate,
    ) -> WorkflowResult<ActionDirective> {
        let consultation = self.require(consultation_id)?;
        let date = consultation.suggested_next_visit.unwrap_or(today);

        Ok(ActionDirective::new_record(
            "Create follow-up appointment",
            Entity::Appointment,
            ViewMode::Dialog,
            [
                ("patient_id", consultation.patient_id.clone()),
                (
                    "reason",
                    format!(
                        "Follow-up of consultation on {}",
                        consultation.date.format("%Y-%m-%d")
                    ),
                ),
                ("date", date.format("%Y-%m-%d").to_string()),
            ],
        ))
    }

    pub fn add_drawing_form(&self, consultation_id: &str) -> WorkflowResult<ActionDirective> {
        let consultation = self.require(consultation_id)?;
        Ok(ActionDirective::new_record(
            "Add clinical drawing",
            Entity::Drawing,
            ViewMode::Dialog,
            [("consultation_id", consultation.consultation_id)],
        ))
    }

    pub fn add_drawing(&self, user: &ActingUser, drawing: ClinicalDrawing) -> WorkflowResult<ClinicalDrawing> {
        if drawing.name.trim().is_empty() {
            return Err(WorkflowError::Validation("A drawing needs a name".into()));
        }

        let tx = self.db.begin()?;
        self.require(&drawing.consultation_id)?;
        self.db.insert_drawing(&drawing)?;
        ActivityLog::new(self.db).record(
            RecordType::Drawing,
            &drawing.drawing_id,
            "added",
            &user.user_id,
            json!({
                "consultation_id": drawing.consultation_id,
                "category": drawing.category.as_str(),
            }),
        )?;
        tx.commit()?;

        info!(
            target: CONSULTATIONS,
            drawing_id = %drawing.drawing_id,
            consultation_id = %drawing.consultation_id,
            "drawing added"
        );
        Ok(drawing)
    }

    pub fn list_drawings(&self, consultation_id: &str) -> WorkflowResult<Vec<ClinicalDrawing>> {
        Ok(self.db.list_drawings(consultation_id)?)
    }

    pub fn remove_drawing(&self, user: &ActingUser, drawing_id: &str) -> WorkflowResult<()> {
        let tx = self.db.begin()?;
        if !self.db.delete_drawing(drawing_id)? {
            return Err(WorkflowError::NotFound(format!("drawing {}", drawing_id)));
        }
        ActivityLog::new(self.db).record(
            RecordType::Drawing,
            drawing_id,
            "removed",
            &user.user_id,
            json!({}),
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Delete a consultation together with its drawings.
    pub fn delete_consultation(&self, user: &ActingUser, consultation_id: &str) -> WorkflowResult<()> {
        let tx = self.db.begin()?;
        let consultation = self.require(consultation_id)?;
        self.db.delete_consultation(consultation_id)?;
        ActivityLog::new(self.db).record(
            RecordType::Consultation,
            consultation_id,
            "deleted",
            &user.user_id,
            json!({ "patient_id": consultation.patient_id }),
        )?;
        tx.commit()?;

        info!(target: CONSULTATIONS, consultation_id, "consultation deleted");
        Ok(())
    }
}
