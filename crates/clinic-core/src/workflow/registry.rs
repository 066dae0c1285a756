//! Patient registry: registration, blacklist handling and navigation actions.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde_json::json;
use tracing::{info, warn};

use super::{ActingUser, WorkflowError, WorkflowResult};
use crate::audit::{ActivityLog, RecordType};
use crate::config::ClinicConfig;
use crate::db::{Database, PATIENT_FILE_SEQUENCE};
use crate::logging::PATIENTS;
use crate::models::{ActionDirective, Consultation, Entity, Patient, ViewMode};

/// Patient registry bound to a database and clinic settings.
pub struct PatientRegistry<'a> {
    db: &'a Database,
    config: &'a ClinicConfig,
}

impl<'a> PatientRegistry<'a> {
    pub fn new(db: &'a Database, config: &'a ClinicConfig) -> Self {
        Self { db, config }
    }

    fn require(&self, local_id: &str) -> WorkflowResult<Patient> {
        self.db
            .get_patient(local_id)?
            .ok_or_else(|| WorkflowError::NotFound(format!("patient {}", local_id)))
    }

    fn log(&self) -> ActivityLog<'a> {
        ActivityLog::new(self.db)
    }

    /// A flagged patient needs a reason; the flag date defaults to today.
    fn check_blacklist_flag(&self, user: &ActingUser, patient: &mut Patient) -> WorkflowResult<()> {
        if !patient.blacklisted {
            return Ok(());
        }
        patient.blacklist_reason = patient
            .blacklist_reason
            .as_deref()
            .map(str::trim)
            .filter(|reason| !reason.is_empty())
            .map(str::to_string);
        if patient.blacklist_reason.is_none() {
            warn!(target: PATIENTS, patient_id = %patient.local_id, "blacklist without a reason");
            return Err(WorkflowError::Validation(
                "A reason is required to add a patient to the blacklist".into(),
            ));
        }
        patient.flag_blacklisted(user.today(&self.config.scheduling.fallback_timezone)?);
        Ok(())
    }

    /// Register a new patient, numbering the file from the sequence when
    /// none was given.
    pub fn register(&self, user: &ActingUser, mut patient: Patient) -> WorkflowResult<Patient> {
        patient.name = patient.name.trim().to_string();
        if patient.name.is_empty() {
            return Err(WorkflowError::Validation("Patient name is required".into()));
        }
        self.check_blacklist_flag(user, &mut patient)?;

        let tx = self.db.begin()?;
        if patient.file_number.is_none() {
            let value = self.db.next_sequence_value(PATIENT_FILE_SEQUENCE)?;
            patient.file_number = Some(self.config.patients.format_file_number(value));
        }
        self.db.insert_patient(&patient)?;
        self.log().record(
            RecordType::Patient,
            &patient.local_id,
            "registered",
            &user.user_id,
            json!({ "name": patient.name, "file_number": patient.file_number }),
        )?;
        tx.commit()?;

        info!(
            target: PATIENTS,
            patient_id = %patient.local_id,
            file_number = patient.file_number.as_deref().unwrap_or_default(),
            "patient registered"
        );
        Ok(patient)
    }

    /// Save edits to a patient. The file number is kept as stored.
    pub fn update(&self, user: &ActingUser, mut patient: Patient) -> WorkflowResult<Patient> {
        patient.name = patient.name.trim().to_string();
        if patient.name.is_empty() {
            return Err(WorkflowError::Validation("Patient name is required".into()));
        }

        let tx = self.db.begin()?;
        let existing = self.require(&patient.local_id)?;
        patient.file_number = existing.file_number.clone();
        if patient.blacklisted && existing.blacklisted && patient.blacklisted_on.is_none() {
            patient.blacklisted_on = existing.blacklisted_on;
        }
        self.check_blacklist_flag(user, &mut patient)?;
        patient.touch();
        self.db.update_patient(&patient)?;

        let mut tracked = serde_json::Map::new();
        if patient.name != existing.name {
            tracked.insert("name".into(), json!(patient.name));
        }
        if patient.blacklisted != existing.blacklisted {
            tracked.insert("blacklisted".into(), json!(patient.blacklisted));
        }
        if !tracked.is_empty() {
            self.log().record(
                RecordType::Patient,
                &patient.local_id,
                "updated",
                &user.user_id,
                serde_json::Value::Object(tracked),
            )?;
        }
        tx.commit()?;

        info!(target: PATIENTS, patient_id = %patient.local_id, "patient updated");
        Ok(patient)
    }

    pub fn get(&self, local_id: &str) -> WorkflowResult<Patient> {
        self.require(local_id)
    }

    /// Active patients whose name starts with `query`.
    pub fn search(&self, query: &str, limit: usize) -> WorkflowResult<Vec<Patient>> {
        Ok(self.db.search_patients(query.trim(), limit)?)
    }

    pub fn list(&self, include_archived: bool) -> WorkflowResult<Vec<Patient>> {
        Ok(self.db.list_patients(include_archived)?)
    }

    pub fn consultation_count(&self, local_id: &str) -> WorkflowResult<u32> {
        Ok(self.db.count_consultations_for_patient(local_id)?)
    }

    pub fn appointment_count(&self, local_id: &str) -> WorkflowResult<u32> {
        Ok(self.db.count_appointments_for_patient(local_id)?)
    }

    /// Most recent consultation by date.
    pub fn last_consultation(&self, local_id: &str) -> WorkflowResult<Option<Consultation>> {
        Ok(self
            .db
            .list_consultations_for_patient(local_id)?
            .into_iter()
            .next())
    }

    /// Open the blacklist form for a patient.
    pub fn request_blacklist(&self, local_id: &str) -> WorkflowResult<ActionDirective> {
        let patient = self.require(local_id)?;
        Ok(ActionDirective::Open {
            title: "Add to blacklist".into(),
            target: Entity::BlacklistForm,
            view: ViewMode::Dialog,
            record_id: Some(patient.local_id),
            filter_patient_id: None,
            defaults: BTreeMap::from([("blacklisted".to_string(), "true".to_string())]),
        })
    }

    /// Blacklist a patient. A non-blank reason is required; an existing
    /// blacklist date is kept, otherwise `today` is recorded.
    pub fn confirm_blacklist(
        &self,
        user: &ActingUser,
        local_id: &str,
        reason: &str,
        today: NaiveDate,
    ) -> WorkflowResult<ActionDirective> {
        let reason = reason.trim();
        if reason.is_empty() {
            warn!(target: PATIENTS, patient_id = local_id, "blacklist without a reason");
            return Err(WorkflowError::Validation(
                "A reason is required to add a patient to the blacklist".into(),
            ));
        }

        let tx = self.db.begin()?;
        let mut patient = self.require(local_id)?;
        patient.blacklist_reason = Some(reason.to_string());
        patient.flag_blacklisted(today);
        patient.touch();
        self.db.update_patient(&patient)?;
        self.log().record(
            RecordType::Patient,
            local_id,
            "blacklisted",
            &user.user_id,
            json!({ "blacklisted": true, "reason": reason, "since": patient.blacklisted_on }),
        )?;
        tx.commit()?;

        info!(target: PATIENTS, patient_id = local_id, "patient blacklisted");
        Ok(ActionDirective::Close)
    }

    /// Clear the blacklist flag, reason and date.
    pub fn remove_from_blacklist(&self, user: &ActingUser, local_id: &str) -> WorkflowResult<Patient> {
        let tx = self.db.begin()?;
        let mut patient = self.require(local_id)?;
        patient.clear_blacklist();
        patient.touch();
        self.db.update_patient(&patient)?;
        self.log().record(
            RecordType::Patient,
            local_id,
            "unblacklisted",
            &user.user_id,
            json!({ "blacklisted": false }),
        )?;
        tx.commit()?;

        info!(target: PATIENTS, patient_id = local_id, "patient removed from blacklist");
        Ok(patient)
    }

    pub fn view_consultations(&self, local_id: &str) -> WorkflowResult<ActionDirective> {
        let patient = self.require(local_id)?;
        Ok(ActionDirective::patient_list(
            format!("Consultations of {}", patient.name),
            Entity::Consultation,
            ViewMode::List,
            &patient.local_id,
        ))
    }

    pub fn view_appointments(&self, local_id: &str) -> WorkflowResult<ActionDirective> {
        let patient = self.require(local_id)?;
        Ok(ActionDirective::patient_list(
            format!("Appointments of {}", patient.name),
            Entity::Appointment,
            ViewMode::Calendar,
            &patient.local_id,
        ))
    }

    /// Open a new appointment form. Refused for blacklisted patients.
    pub fn new_appointment(&self, local_id: &str) -> WorkflowResult<ActionDirective> {
        let patient = self.require(local_id)?;
        if patient.is_blacklisted() {
            return Err(WorkflowError::Validation(
                "Appointments cannot be scheduled for blacklisted patients".into(),
            ));
        }
        Ok(ActionDirective::new_record(
            "New appointment",
            Entity::Appointment,
            ViewMode::Dialog,
            [("patient_id", patient.local_id)],
        ))
    }

    pub fn new_consultation(&self, local_id: &str) -> WorkflowResult<ActionDirective> {
        let patient = self.require(local_id)?;
        Ok(ActionDirective::new_record(
            "New consultation",
            Entity::Consultation,
            ViewMode::Form,
            [("patient_id", patient.local_id)],
        ))
    }

    /// Soft delete.
    pub fn archive(&self, user: &ActingUser, local_id: &str) -> WorkflowResult<()> {
        let tx = self.db.begin()?;
        if !self.db.set_patient_active(local_id, false)? {
            return Err(WorkflowError::NotFound(format!("patient {}", local_id)));
        }
        self.log().record(
            RecordType::Patient,
            local_id,
            "archived",
            &user.user_id,
            json!({ "active": false }),
        )?;
        tx.commit()?;

        info!(target: PATIENTS, patient_id = local_id, "patient archived");
        Ok(())
    }

    /// Hard delete, refused while consultations or appointments exist.
    pub fn delete(&self, user: &ActingUser, local_id: &str) -> WorkflowResult<()> {
        let tx = self.db.begin()?;
        let patient = self.require(local_id)?;

        let consultations = self.db.count_consultations_for_patient(local_id)?;
        let appointments = self.db.count_appointments_for_patient(local_id)?;
        if consultations > 0 || appointments > 0 {
            return Err(WorkflowError::Validation(format!(
                "{} has {} consultation(s) and {} appointment(s); archive the patient instead",
                patient.name, consultations, appointments
            )));
        }

        self.db.delete_patient(local_id)?;
        self.log().record(
            RecordType::Patient,
            local_id,
            "deleted",
            &user.user_id,
            json!({ "file_number": patient.file_number }),
        )?;
        tx.commit()?;

        info!(target: PATIENTS, patient_id = local_id, "patient deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::AppointmentBook;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn user() -> ActingUser {
        ActingUser::new("front-desk")
    }

    #[test]
    fn test_register_assigns_file_numbers() {
        let db = Database::open_in_memory().unwrap();
        let config = ClinicConfig::default();
        let registry = PatientRegistry::new(&db, &config);

        let first = registry.register(&user(), Patient::new("Ana López".into())).unwrap();
        let second = registry.register(&user(), Patient::new("Luis Pérez".into())).unwrap();

        assert_eq!(first.file_number.as_deref(), Some("FICHA-00001"));
        assert_eq!(second.file_number.as_deref(), Some("FICHA-00002"));
    }

    #[test]
    fn test_register_keeps_given_file_number() {
        let db = Database::open_in_memory().unwrap();
        let config = ClinicConfig::default();
        let registry = PatientRegistry::new(&db, &config);

        let mut patient = Patient::new("Ana López".into());
        patient.file_number = Some("LEGACY-17".into());
        let saved = registry.register(&user(), patient).unwrap();

        assert_eq!(saved.file_number.as_deref(), Some("LEGACY-17"));
    }

    #[test]
    fn test_register_requires_name() {
        let db = Database::open_in_memory().unwrap();
        let config = ClinicConfig::default();
        let registry = PatientRegistry::new(&db, &config);

        let err = registry.register(&user(), Patient::new("  ".into())).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[test]
    fn test_update_keeps_file_number() {
        let db = Database::open_in_memory().unwrap();
        let config = ClinicConfig::default();
        let registry = PatientRegistry::new(&db, &config);
        let mut patient = registry.register(&user(), Patient::new("Ana López".into())).unwrap();

        patient.file_number = Some("OTHER".into());
        patient.phone = Some("555-0101".into());
        let saved = registry.update(&user(), patient).unwrap();

        assert_eq!(saved.file_number.as_deref(), Some("FICHA-00001"));
        assert_eq!(
            registry.get(&saved.local_id).unwrap().phone.as_deref(),
            Some("555-0101")
        );
    }

    #[test]
    fn test_register_flagged_requires_reason() {
        let db = Database::open_in_memory().unwrap();
        let config = ClinicConfig::default();
        let registry = PatientRegistry::new(&db, &config);

        let mut patient = Patient::new("Ana López".into());
        patient.blacklisted = true;
        patient.blacklist_reason = Some("  ".into());
        let err = registry.register(&user(), patient.clone()).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert!(registry.list(true).unwrap().is_empty());

        patient.blacklist_reason = Some("Unpaid balance".into());
        let saved = registry.register(&user(), patient).unwrap();
        assert!(saved.blacklisted);
        assert!(saved.blacklisted_on.is_some());
    }

    #[test]
    fn test_update_flagged_requires_reason() {
        let db = Database::open_in_memory().unwrap();
        let config = ClinicConfig::default();
        let registry = PatientRegistry::new(&db, &config);
        let mut patient = registry.register(&user(), Patient::new("Ana López".into())).unwrap();

        patient.blacklisted = true;
        let err = registry.update(&user(), patient.clone()).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        let stored = registry.get(&patient.local_id).unwrap();
        assert!(!stored.blacklisted);
        assert_eq!(stored.blacklisted_on, None);

        patient.blacklist_reason = Some("Abusive".into());
        let saved = registry.update(&user(), patient).unwrap();
        assert_eq!(saved.blacklist_reason.as_deref(), Some("Abusive"));
        assert!(saved.blacklisted_on.is_some());
    }

    #[test]
    fn test_update_keeps_blacklist_date() {
        let db = Database::open_in_memory().unwrap();
        let config = ClinicConfig::default();
        let registry = PatientRegistry::new(&db, &config);
        let patient = registry.register(&user(), Patient::new("Ana López".into())).unwrap();
        registry
            .confirm_blacklist(&user(), &patient.local_id, "Unpaid balance", date(2024, 3, 1))
            .unwrap();

        let mut edited = registry.get(&patient.local_id).unwrap();
        edited.blacklisted_on = None;
        edited.phone = Some("555-0101".into());
        let saved = registry.update(&user(), edited).unwrap();

        assert_eq!(saved.blacklisted_on, Some(date(2024, 3, 1)));
    }

    #[test]
    fn test_request_blacklist_directive() {
        let db = Database::open_in_memory().unwrap();
        let config = ClinicConfig::default();
        let registry = PatientRegistry::new(&db, &config);
        let patient = registry.register(&user(), Patient::new("Ana López".into())).unwrap();

        let directive = registry.request_blacklist(&patient.local_id).unwrap();

        assert_eq!(directive.default_value("blacklisted"), Some("true"));
        match directive {
            ActionDirective::Open { target, record_id, .. } => {
                assert_eq!(target, Entity::BlacklistForm);
                assert_eq!(record_id.as_deref(), Some(patient.local_id.as_str()));
            }
            ActionDirective::Close => panic!("expected an Open directive"),
        }
    }

    #[test]
    fn test_confirm_blacklist_requires_reason() {
        let db = Database::open_in_memory().unwrap();
        let config = ClinicConfig::default();
        let registry = PatientRegistry::new(&db, &config);
        let patient = registry.register(&user(), Patient::new("Ana López".into())).unwrap();

        let err = registry
            .confirm_blacklist(&user(), &patient.local_id, "   ", date(2024, 3, 1))
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Validation(_)));
        assert!(!registry.get(&patient.local_id).unwrap().blacklisted);
    }

    #[test]
    fn test_confirm_blacklist_sets_flag_and_date() {
        let db = Database::open_in_memory().unwrap();
        let config = ClinicConfig::default();
        let registry = PatientRegistry::new(&db, &config);
        let patient = registry.register(&user(), Patient::new("Ana López".into())).unwrap();

        let directive = registry
            .confirm_blacklist(&user(), &patient.local_id, "Unpaid balance", date(2024, 3, 1))
            .unwrap();

        assert_eq!(directive, ActionDirective::Close);
        let stored = registry.get(&patient.local_id).unwrap();
        assert!(stored.blacklisted);
        assert_eq!(stored.blacklist_reason.as_deref(), Some("Unpaid balance"));
        assert_eq!(stored.blacklisted_on, Some(date(2024, 3, 1)));
    }

    #[test]
    fn test_confirm_blacklist_keeps_existing_date() {
        let db = Database::open_in_memory().unwrap();
        let config = ClinicConfig::default();
        let registry = PatientRegistry::new(&db, &config);
        let mut patient = Patient::new("Ana López".into());
        patient.blacklisted_on = Some(date(2023, 12, 24));
        let patient = registry.register(&user(), patient).unwrap();

        registry
            .confirm_blacklist(&user(), &patient.local_id, "Abusive", date(2024, 3, 1))
            .unwrap();

        assert_eq!(
            registry.get(&patient.local_id).unwrap().blacklisted_on,
            Some(date(2023, 12, 24))
        );
    }

    #[test]
    fn test_remove_from_blacklist_clears_everything() {
        let db = Database::open_in_memory().unwrap();
        let config = ClinicConfig::default();
        let registry = PatientRegistry::new(&db, &config);
        let patient = registry.register(&user(), Patient::new("Ana López".into())).unwrap();
        registry
            .confirm_blacklist(&user(), &patient.local_id, "Unpaid balance", date(2024, 3, 1))
            .unwrap();

        let cleared = registry.remove_from_blacklist(&user(), &patient.local_id).unwrap();

        assert!(!cleared.blacklisted);
        assert!(cleared.blacklist_reason.is_none());
        assert!(cleared.blacklisted_on.is_none());
        assert!(!registry.get(&patient.local_id).unwrap().blacklisted);
    }

    #[test]
    fn test_new_appointment_refused_when_blacklisted() {
        let db = Database::open_in_memory().unwrap();
        let config = ClinicConfig::default();
        let registry = PatientRegistry::new(&db, &config);
        let patient = registry.register(&user(), Patient::new("Ana López".into())).unwrap();

        let directive = registry.new_appointment(&patient.local_id).unwrap();
        assert_eq!(
            directive.default_value("patient_id"),
            Some(patient.local_id.as_str())
        );

        registry
            .confirm_blacklist(&user(), &patient.local_id, "Unpaid balance", date(2024, 3, 1))
            .unwrap();
        assert!(matches!(
            registry.new_appointment(&patient.local_id),
            Err(WorkflowError::Validation(_))
        ));
    }

    #[test]
    fn test_list_directives_filter_by_patient() {
        let db = Database::open_in_memory().unwrap();
        let config = ClinicConfig::default();
        let registry = PatientRegistry::new(&db, &config);
        let patient = registry.register(&user(), Patient::new("Ana López".into())).unwrap();

        match registry.view_appointments(&patient.local_id).unwrap() {
            ActionDirective::Open {
                title,
                filter_patient_id,
                ..
            } => {
                assert_eq!(title, "Appointments of Ana López");
                assert_eq!(filter_patient_id.as_deref(), Some(patient.local_id.as_str()));
            }
            ActionDirective::Close => panic!("expected an Open directive"),
        }
        assert_eq!(
            registry
                .view_consultations(&patient.local_id)
                .unwrap()
                .default_value("patient_id"),
            Some(patient.local_id.as_str())
        );
    }

    #[test]
    fn test_archive_hides_from_search() {
        let db = Database::open_in_memory().unwrap();
        let config = ClinicConfig::default();
        let registry = PatientRegistry::new(&db, &config);
        let patient = registry.register(&user(), Patient::new("Ana López".into())).unwrap();

        registry.archive(&user(), &patient.local_id).unwrap();

        assert!(registry.search("Ana", 10).unwrap().is_empty());
        assert_eq!(registry.list(true).unwrap().len(), 1);
        assert!(registry.list(false).unwrap().is_empty());
    }

    #[test]
    fn test_delete_refused_while_referenced() {
        let db = Database::open_in_memory().unwrap();
        let config = ClinicConfig::default();
        let registry = PatientRegistry::new(&db, &config);
        let patient = registry.register(&user(), Patient::new("Ana López".into())).unwrap();
        let book = AppointmentBook::new(&db, &config);
        book.create(&user(), book.draft(&patient.local_id, date(2024, 3, 12)))
            .unwrap();

        let err = registry.delete(&user(), &patient.local_id).unwrap_err();

        assert!(matches!(err, WorkflowError::Validation(_)));
        assert_eq!(registry.appointment_count(&patient.local_id).unwrap(), 1);
    }

    #[test]
    fn test_delete_unreferenced_patient() {
        let db = Database::open_in_memory().unwrap();
        let config = ClinicConfig::default();
        let registry = PatientRegistry::new(&db, &config);
        let patient = registry.register(&user(), Patient::new("Ana López".into())).unwrap();

        registry.delete(&user(), &patient.local_id).unwrap();

        assert!(matches!(
            registry.get(&patient.local_id),
            Err(WorkflowError::NotFound(_))
        ));
    }

    #[test]
    fn test_registry_actions_are_audited() {
        let db = Database::open_in_memory().unwrap();
        let config = ClinicConfig::default();
        let registry = PatientRegistry::new(&db, &config);
        let patient = registry.register(&user(), Patient::new("Ana López".into())).unwrap();
        registry
            .confirm_blacklist(&user(), &patient.local_id, "Unpaid balance", date(2024, 3, 1))
            .unwrap();

        let log = ActivityLog::new(&db);
        let history = log.history(RecordType::Patient, &patient.local_id).unwrap();
        let actions: Vec<_> = history.iter().map(|e| e.action.as_str()).collect();

        assert_eq!(actions, vec!["registered", "blacklisted"]);
        assert!(log.verify().unwrap().is_intact());
    }
}
