//! Clinic Core Library
//!
//! Local-first records and scheduling for an eye-care clinic: patients,
//! visual exams, clinical drawings and appointments mirrored onto a calendar.
//!
//! # Architecture
//!
//! ```text
//!   Host UI (FFI)
//!        │
//!        ▼
//!   ClinicCore ──► workflow ──────────────┬──────────────┐
//!                  (named actions)        │              │
//!                     │                   ▼              ▼
//!                     │              schedule        audit chain
//!                     │           (slots, zones)   (hash-linked log)
//!                     ▼
//!                 db (SQLite) ◄──── calendar mirror (1:1 with appointment)
//! ```
//!
//! # Core Principle
//!
//! **Every appointment owns exactly one calendar event.** The mirror is
//! created, rewritten and removed only through the appointment workflows.
//!
//! # Modules
//!
//! - [`config`]: Clinic settings from TOML and `CLINIC_*` environment
//! - [`logging`]: `tracing` subscriber setup
//! - [`db`]: SQLite persistence
//! - [`models`]: Domain types (Patient, Consultation, Appointment, etc.)
//! - [`schedule`]: Fractional-hour slots and time zone conversion
//! - [`workflow`]: Named clinic actions
//! - [`audit`]: Hash-chained activity log

pub mod audit;
pub mod config;
pub mod db;
pub mod logging;
pub mod models;
pub mod schedule;
pub mod workflow;

// Re-export commonly used types
pub use audit::{ActivityLog, ChainVerification, RecordType};
pub use config::ClinicConfig;
pub use db::Database;
pub use models::{
    ActionDirective, Appointment, AppointmentChanges, AppointmentStatus, CalendarEvent,
    ClinicalDrawing, Consultation, DrawingCategory, Patient,
};
pub use schedule::{compute_slot, SlotEnd, SlotError, SlotPolicy, TimeSlot};
pub use workflow::{
    ActingUser, AppointmentBook, CalendarSync, ConsultationDesk, PatientRegistry, WorkflowError,
};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ClinicError {
    #[error("{0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl From<db::DbError> for ClinicError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(what) => ClinicError::NotFound(what),
            other => ClinicError::DatabaseError(other.to_string()),
        }
    }
}

impl From<WorkflowError> for ClinicError {
    fn from(e: WorkflowError) -> Self {
        match e {
            WorkflowError::Validation(msg) => ClinicError::Validation(msg),
            WorkflowError::NotFound(what) => ClinicError::NotFound(what),
            WorkflowError::Database(e) => e.into(),
            WorkflowError::Slot(e) => ClinicError::InvalidInput(e.to_string()),
            WorkflowError::Audit(e) => ClinicError::DatabaseError(e.to_string()),
        }
    }
}

impl From<audit::AuditError> for ClinicError {
    fn from(e: audit::AuditError) -> Self {
        ClinicError::DatabaseError(e.to_string())
    }
}

impl From<config::ConfigError> for ClinicError {
    fn from(e: config::ConfigError) -> Self {
        ClinicError::ConfigurationError(e.to_string())
    }
}

impl From<serde_json::Error> for ClinicError {
    fn from(e: serde_json::Error) -> Self {
        ClinicError::InvalidInput(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for ClinicError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ClinicError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, ClinicError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| ClinicError::InvalidInput(format!("date '{}': {}", value, e)))
}

fn parse_optional_date(value: Option<String>) -> Result<Option<NaiveDate>, ClinicError> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| parse_date(&v))
        .transpose()
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a clinic database at the given path.
///
/// Settings come from `config_path` when given (a missing file means
/// defaults) and from `CLINIC_*` environment variables.
#[uniffi::export]
pub fn open_clinic(path: String, config_path: Option<String>) -> Result<Arc<ClinicCore>, ClinicError> {
    let config = ClinicConfig::load(config_path.as_deref().map(Path::new))?;
    logging::init(&config.log);

    let db = Database::open(&path)?;
    tracing::info!(target: logging::PATIENTS, path = %path, "clinic database opened");
    Ok(Arc::new(ClinicCore {
        db: Arc::new(Mutex::new(db)),
        config,
    }))
}

/// Create an in-memory clinic with default settings (for testing).
#[uniffi::export]
pub fn open_clinic_in_memory() -> Result<Arc<ClinicCore>, ClinicError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(ClinicCore {
        db: Arc::new(Mutex::new(db)),
        config: ClinicConfig::default(),
    }))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe clinic handle for FFI.
#[derive(uniffi::Object)]
pub struct ClinicCore {
    db: Arc<Mutex<Database>>,
    config: ClinicConfig,
}

impl ClinicCore {
    fn today_for(&self, user: &ActingUser) -> Result<NaiveDate, ClinicError> {
        Ok(user.today(&self.config.scheduling.fallback_timezone)?)
    }
}

#[uniffi::export]
impl ClinicCore {
    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// Register a patient; a file number is assigned when none is given.
    pub fn register_patient(
        &self,
        user: FfiActingUser,
        patient: FfiPatient,
    ) -> Result<FfiPatient, ClinicError> {
        let db = self.db.lock()?;
        let registry = PatientRegistry::new(&db, &self.config);
        let saved = registry.register(&user.into(), patient.try_into()?)?;
        Ok(saved.into())
    }

    pub fn update_patient(
        &self,
        user: FfiActingUser,
        patient: FfiPatient,
    ) -> Result<FfiPatient, ClinicError> {
        let db = self.db.lock()?;
        let registry = PatientRegistry::new(&db, &self.config);
        let saved = registry.update(&user.into(), patient.try_into()?)?;
        Ok(saved.into())
    }

    /// Get a patient by local ID.
    pub fn get_patient(&self, local_id: String) -> Result<Option<FfiPatient>, ClinicError> {
        let db = self.db.lock()?;
        let patient = db.get_patient(&local_id)?;
        Ok(patient.map(|p| p.into()))
    }

    /// Search active patients by name prefix.
    pub fn search_patients(&self, query: String, limit: u32) -> Result<Vec<FfiPatient>, ClinicError> {
        let db = self.db.lock()?;
        let registry = PatientRegistry::new(&db, &self.config);
        let patients = registry.search(&query, limit as usize)?;
        Ok(patients.into_iter().map(|p| p.into()).collect())
    }

    pub fn list_patients(&self, include_archived: bool) -> Result<Vec<FfiPatient>, ClinicError> {
        let db = self.db.lock()?;
        let registry = PatientRegistry::new(&db, &self.config);
        let patients = registry.list(include_archived)?;
        Ok(patients.into_iter().map(|p| p.into()).collect())
    }

    pub fn patient_consultation_count(&self, local_id: String) -> Result<u32, ClinicError> {
        let db = self.db.lock()?;
        Ok(PatientRegistry::new(&db, &self.config).consultation_count(&local_id)?)
    }

    pub fn patient_appointment_count(&self, local_id: String) -> Result<u32, ClinicError> {
        let db = self.db.lock()?;
        Ok(PatientRegistry::new(&db, &self.config).appointment_count(&local_id)?)
    }

    pub fn last_consultation(&self, local_id: String) -> Result<Option<FfiConsultation>, ClinicError> {
        let db = self.db.lock()?;
        let registry = PatientRegistry::new(&db, &self.config);
        registry
            .last_consultation(&local_id)?
            .map(FfiConsultation::try_from)
            .transpose()
    }

    pub fn request_blacklist(&self, local_id: String) -> Result<FfiActionDirective, ClinicError> {
        let db = self.db.lock()?;
        let registry = PatientRegistry::new(&db, &self.config);
        Ok(registry.request_blacklist(&local_id)?.into())
    }

    /// Blacklist a patient with a mandatory reason.
    pub fn confirm_blacklist(
        &self,
        user: FfiActingUser,
        local_id: String,
        reason: String,
    ) -> Result<FfiActionDirective, ClinicError> {
        let user: ActingUser = user.into();
        let today = self.today_for(&user)?;
        let db = self.db.lock()?;
        let registry = PatientRegistry::new(&db, &self.config);
        Ok(registry
            .confirm_blacklist(&user, &local_id, &reason, today)?
            .into())
    }

    pub fn remove_from_blacklist(
        &self,
        user: FfiActingUser,
        local_id: String,
    ) -> Result<FfiPatient, ClinicError> {
        let db = self.db.lock()?;
        let registry = PatientRegistry::new(&db, &self.config);
        Ok(registry.remove_from_blacklist(&user.into(), &local_id)?.into())
    }

    pub fn view_patient_consultations(&self, local_id: String) -> Result<FfiActionDirective, ClinicError> {
        let db = self.db.lock()?;
        let registry = PatientRegistry::new(&db, &self.config);
        Ok(registry.view_consultations(&local_id)?.into())
    }

    pub fn view_patient_appointments(&self, local_id: String) -> Result<FfiActionDirective, ClinicError> {
        let db = self.db.lock()?;
        let registry = PatientRegistry::new(&db, &self.config);
        Ok(registry.view_appointments(&local_id)?.into())
    }

    pub fn new_patient_appointment(&self, local_id: String) -> Result<FfiActionDirective, ClinicError> {
        let db = self.db.lock()?;
        let registry = PatientRegistry::new(&db, &self.config);
        Ok(registry.new_appointment(&local_id)?.into())
    }

    pub fn new_patient_consultation(&self, local_id: String) -> Result<FfiActionDirective, ClinicError> {
        let db = self.db.lock()?;
        let registry = PatientRegistry::new(&db, &self.config);
        Ok(registry.new_consultation(&local_id)?.into())
    }

    pub fn archive_patient(&self, user: FfiActingUser, local_id: String) -> Result<(), ClinicError> {
        let db = self.db.lock()?;
        let registry = PatientRegistry::new(&db, &self.config);
        Ok(registry.archive(&user.into(), &local_id)?)
    }

    pub fn delete_patient(&self, user: FfiActingUser, local_id: String) -> Result<(), ClinicError> {
        let db = self.db.lock()?;
        let registry = PatientRegistry::new(&db, &self.config);
        Ok(registry.delete(&user.into(), &local_id)?)
    }

    // =========================================================================
    // Consultation Operations
    // =========================================================================

    /// Record a consultation from its JSON form.
    pub fn open_consultation(
        &self,
        user: FfiActingUser,
        consultation_json: String,
    ) -> Result<FfiConsultation, ClinicError> {
        let consultation: Consultation = serde_json::from_str(&consultation_json)?;
        let db = self.db.lock()?;
        let desk = ConsultationDesk::new(&db);
        desk.open_consultation(&user.into(), consultation)?.try_into()
    }

    pub fn update_consultation(
        &self,
        user: FfiActingUser,
        consultation_json: String,
    ) -> Result<FfiConsultation, ClinicError> {
        let consultation: Consultation = serde_json::from_str(&consultation_json)?;
        let db = self.db.lock()?;
        let desk = ConsultationDesk::new(&db);
        desk.update(&user.into(), consultation)?.try_into()
    }

    pub fn get_consultation(&self, consultation_id: String) -> Result<Option<FfiConsultation>, ClinicError> {
        let db = self.db.lock()?;
        db.get_consultation(&consultation_id)?
            .map(FfiConsultation::try_from)
            .transpose()
    }

    /// Consultations of a patient, newest first.
    pub fn list_consultations(&self, patient_id: String) -> Result<Vec<FfiConsultation>, ClinicError> {
        let db = self.db.lock()?;
        let desk = ConsultationDesk::new(&db);
        desk.list_for_patient(&patient_id)?
            .into_iter()
            .map(FfiConsultation::try_from)
            .collect()
    }

    pub fn create_follow_up_appointment(
        &self,
        user: FfiActingUser,
        consultation_id: String,
    ) -> Result<FfiActionDirective, ClinicError> {
        let today = self.today_for(&user.into())?;
        let db = self.db.lock()?;
        let desk = ConsultationDesk::new(&db);
        Ok(desk.follow_up_appointment(&consultation_id, today)?.into())
    }

    pub fn add_drawing_form(&self, consultation_id: String) -> Result<FfiActionDirective, ClinicError> {
        let db = self.db.lock()?;
        let desk = ConsultationDesk::new(&db);
        Ok(desk.add_drawing_form(&consultation_id)?.into())
    }

    pub fn add_drawing(&self, user: FfiActingUser, drawing: FfiDrawing) -> Result<FfiDrawing, ClinicError> {
        let db = self.db.lock()?;
        let desk = ConsultationDesk::new(&db);
        Ok(desk.add_drawing(&user.into(), drawing.try_into()?)?.into())
    }

    pub fn list_drawings(&self, consultation_id: String) -> Result<Vec<FfiDrawing>, ClinicError> {
        let db = self.db.lock()?;
        let desk = ConsultationDesk::new(&db);
        let drawings = desk.list_drawings(&consultation_id)?;
        Ok(drawings.into_iter().map(|d| d.into()).collect())
    }

    pub fn remove_drawing(&self, user: FfiActingUser, drawing_id: String) -> Result<(), ClinicError> {
        let db = self.db.lock()?;
        let desk = ConsultationDesk::new(&db);
        Ok(desk.remove_drawing(&user.into(), &drawing_id)?)
    }

    pub fn delete_consultation(&self, user: FfiActingUser, consultation_id: String) -> Result<(), ClinicError> {
        let db = self.db.lock()?;
        let desk = ConsultationDesk::new(&db);
        Ok(desk.delete_consultation(&user.into(), &consultation_id)?)
    }

    // =========================================================================
    // Appointment Operations
    // =========================================================================

    /// Create appointments as one batch; any blacklisted patient rejects all.
    pub fn create_appointments(
        &self,
        user: FfiActingUser,
        appointments: Vec<FfiNewAppointment>,
    ) -> Result<Vec<FfiAppointment>, ClinicError> {
        let db = self.db.lock()?;
        let book = AppointmentBook::new(&db, &self.config);

        let drafts = appointments
            .into_iter()
            .map(|new| new.into_appointment(&book))
            .collect::<Result<Vec<_>, _>>()?;
        let created = book.create_batch(&user.into(), drafts)?;
        Ok(created.into_iter().map(|a| a.into()).collect())
    }

    pub fn update_appointment(
        &self,
        user: FfiActingUser,
        appointment_id: String,
        changes: FfiAppointmentChanges,
    ) -> Result<FfiAppointment, ClinicError> {
        let db = self.db.lock()?;
        let book = AppointmentBook::new(&db, &self.config);
        Ok(book
            .update(&user.into(), &appointment_id, changes.try_into()?)?
            .into())
    }

    /// Delete an appointment and its calendar event.
    pub fn delete_appointment(&self, user: FfiActingUser, appointment_id: String) -> Result<(), ClinicError> {
        let db = self.db.lock()?;
        let book = AppointmentBook::new(&db, &self.config);
        Ok(book.delete(&user.into(), &appointment_id)?)
    }

    pub fn confirm_appointment(
        &self,
        user: FfiActingUser,
        appointment_id: String,
    ) -> Result<FfiAppointment, ClinicError> {
        let db = self.db.lock()?;
        let book = AppointmentBook::new(&db, &self.config);
        Ok(book.confirm(&user.into(), &appointment_id)?.into())
    }

    pub fn complete_appointment(
        &self,
        user: FfiActingUser,
        appointment_id: String,
    ) -> Result<FfiAppointment, ClinicError> {
        let db = self.db.lock()?;
        let book = AppointmentBook::new(&db, &self.config);
        Ok(book.complete(&user.into(), &appointment_id)?.into())
    }

    pub fn cancel_appointment(
        &self,
        user: FfiActingUser,
        appointment_id: String,
    ) -> Result<FfiAppointment, ClinicError> {
        let db = self.db.lock()?;
        let book = AppointmentBook::new(&db, &self.config);
        Ok(book.cancel(&user.into(), &appointment_id)?.into())
    }

    pub fn mark_no_show(
        &self,
        user: FfiActingUser,
        appointment_id: String,
    ) -> Result<FfiAppointment, ClinicError> {
        let db = self.db.lock()?;
        let book = AppointmentBook::new(&db, &self.config);
        Ok(book.mark_no_show(&user.into(), &appointment_id)?.into())
    }

    pub fn reopen_appointment(
        &self,
        user: FfiActingUser,
        appointment_id: String,
    ) -> Result<FfiAppointment, ClinicError> {
        let db = self.db.lock()?;
        let book = AppointmentBook::new(&db, &self.config);
        Ok(book.reopen(&user.into(), &appointment_id)?.into())
    }

    /// Directive opening a consultation for the appointment's patient.
    pub fn appointment_create_consultation(
        &self,
        appointment_id: String,
    ) -> Result<FfiActionDirective, ClinicError> {
        let db = self.db.lock()?;
        let book = AppointmentBook::new(&db, &self.config);
        Ok(book.create_consultation(&appointment_id)?.into())
    }

    /// End hour to show after the start hour changes.
    pub fn propose_end_hour(&self, start_hour: f64, current_end_hour: f64) -> Result<f64, ClinicError> {
        let db = self.db.lock()?;
        let book = AppointmentBook::new(&db, &self.config);
        Ok(book.propose_end_hour(start_hour, current_end_hour))
    }

    pub fn get_appointment(&self, appointment_id: String) -> Result<Option<FfiAppointment>, ClinicError> {
        let db = self.db.lock()?;
        let appointment = db.get_appointment(&appointment_id)?;
        Ok(appointment.map(|a| a.into()))
    }

    pub fn list_patient_appointments(&self, patient_id: String) -> Result<Vec<FfiAppointment>, ClinicError> {
        let db = self.db.lock()?;
        let book = AppointmentBook::new(&db, &self.config);
        let appointments = book.list_for_patient(&patient_id)?;
        Ok(appointments.into_iter().map(|a| a.into()).collect())
    }

    /// Appointments on a `YYYY-MM-DD` date.
    pub fn list_appointments_on(&self, date: String) -> Result<Vec<FfiAppointment>, ClinicError> {
        let date = parse_date(&date)?;
        let db = self.db.lock()?;
        let book = AppointmentBook::new(&db, &self.config);
        let appointments = book.list_on(date)?;
        Ok(appointments.into_iter().map(|a| a.into()).collect())
    }

    /// Calendar event mirroring an appointment.
    pub fn get_calendar_event(&self, appointment_id: String) -> Result<Option<FfiCalendarEvent>, ClinicError> {
        let db = self.db.lock()?;
        let book = AppointmentBook::new(&db, &self.config);
        Ok(book.mirror(&appointment_id)?.map(|e| e.into()))
    }

    // =========================================================================
    // Audit Operations
    // =========================================================================

    /// Recompute the activity log hash chain.
    pub fn verify_activity_log(&self) -> Result<FfiChainVerification, ClinicError> {
        let db = self.db.lock()?;
        let log = ActivityLog::new(&db);
        Ok(log.verify()?.into())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe acting user.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiActingUser {
    pub user_id: String,
    pub timezone: Option<String>,
}

impl From<FfiActingUser> for ActingUser {
    fn from(user: FfiActingUser) -> Self {
        ActingUser {
            user_id: user.user_id,
            timezone: user.timezone.filter(|tz| !tz.trim().is_empty()),
        }
    }
}

/// FFI-safe patient. Intake and symptom blocks travel as JSON.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub local_id: String,
    pub file_number: Option<String>,
    pub name: String,
    /// `YYYY-MM-DD`
    pub date_of_birth: Option<String>,
    pub occupation: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub referral_source: Option<String>,
    pub intake_json: String,
    pub symptoms_json: String,
    pub symptom_count: u32,
    pub allergies: Option<String>,
    pub medical_notes: Option<String>,
    pub blacklisted: bool,
    pub blacklist_reason: Option<String>,
    pub blacklisted_on: Option<String>,
    pub active: bool,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            intake_json: serde_json::to_string(&patient.intake).unwrap_or_else(|_| "{}".into()),
            symptoms_json: serde_json::to_string(&patient.symptoms).unwrap_or_else(|_| "{}".into()),
            symptom_count: patient.symptoms.count() as u32,
            local_id: patient.local_id,
            file_number: patient.file_number,
            name: patient.name,
            date_of_birth: patient.date_of_birth.map(format_date),
            occupation: patient.occupation,
            phone: patient.phone,
            email: patient.email,
            address: patient.address,
            referral_source: patient.referral_source,
            allergies: patient.allergies,
            medical_notes: patient.medical_notes,
            blacklisted: patient.blacklisted,
            blacklist_reason: patient.blacklist_reason,
            blacklisted_on: patient.blacklisted_on.map(format_date),
            active: patient.active,
        }
    }
}

impl TryFrom<FfiPatient> for Patient {
    type Error = ClinicError;

    fn try_from(p: FfiPatient) -> Result<Self, Self::Error> {
        let mut patient = Patient::new(p.name);
        if !p.local_id.trim().is_empty() {
            patient.local_id = p.local_id;
        }
        patient.file_number = p.file_number.filter(|f| !f.trim().is_empty());
        patient.date_of_birth = parse_optional_date(p.date_of_birth)?;
        patient.occupation = p.occupation;
        patient.phone = p.phone;
        patient.email = p.email;
        patient.address = p.address;
        patient.referral_source = p.referral_source;
        if !p.intake_json.trim().is_empty() {
            patient.intake = serde_json::from_str(&p.intake_json)?;
        }
        if !p.symptoms_json.trim().is_empty() {
            patient.symptoms = serde_json::from_str(&p.symptoms_json)?;
        }
        patient.allergies = p.allergies;
        patient.medical_notes = p.medical_notes;
        patient.blacklisted = p.blacklisted;
        patient.blacklist_reason = p.blacklist_reason;
        patient.blacklisted_on = parse_optional_date(p.blacklisted_on)?;
        patient.active = p.active;
        Ok(patient)
    }
}

/// FFI-safe consultation: list columns plus the full record as JSON.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiConsultation {
    pub consultation_id: String,
    pub patient_id: String,
    pub date: String,
    /// `DD/MM/YYYY`
    pub display_date: String,
    pub age_at_visit: Option<u32>,
    pub optometrist_id: Option<String>,
    pub reason: Option<String>,
    pub diagnosis: Option<String>,
    pub suggested_next_visit: Option<String>,
    pub record_json: String,
}

impl TryFrom<Consultation> for FfiConsultation {
    type Error = ClinicError;

    fn try_from(c: Consultation) -> Result<Self, Self::Error> {
        Ok(Self {
            record_json: serde_json::to_string(&c)?,
            display_date: c.formatted_date(),
            consultation_id: c.consultation_id,
            patient_id: c.patient_id,
            date: format_date(c.date),
            age_at_visit: c.age_at_visit,
            optometrist_id: c.optometrist_id,
            reason: c.reason,
            diagnosis: c.findings.diagnosis,
            suggested_next_visit: c.suggested_next_visit.map(format_date),
        })
    }
}

/// FFI-safe clinical drawing.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDrawing {
    pub drawing_id: String,
    pub consultation_id: String,
    pub name: String,
    /// `right_eye`, `left_eye`, `both_eyes` or `other`
    pub category: String,
    pub image: Option<Vec<u8>>,
    pub description: Option<String>,
}

impl From<ClinicalDrawing> for FfiDrawing {
    fn from(d: ClinicalDrawing) -> Self {
        Self {
            drawing_id: d.drawing_id,
            consultation_id: d.consultation_id,
            name: d.name,
            category: d.category.as_str().to_string(),
            image: d.image,
            description: d.description,
        }
    }
}

impl TryFrom<FfiDrawing> for ClinicalDrawing {
    type Error = ClinicError;

    fn try_from(d: FfiDrawing) -> Result<Self, Self::Error> {
        let category = DrawingCategory::parse(&d.category)
            .ok_or_else(|| ClinicError::InvalidInput(format!("drawing category '{}'", d.category)))?;
        let mut drawing = ClinicalDrawing::new(d.consultation_id, d.name);
        if !d.drawing_id.trim().is_empty() {
            drawing.drawing_id = d.drawing_id;
        }
        drawing.category = category;
        drawing.image = d.image;
        drawing.description = d.description;
        Ok(drawing)
    }
}

/// FFI-safe appointment with its derived end and duration label.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAppointment {
    pub appointment_id: String,
    pub patient_id: String,
    pub date: String,
    pub start_hour: f64,
    pub duration_hours: f64,
    pub end_hour: f64,
    /// `H:MM`
    pub duration_display: String,
    pub staff_id: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub status: String,
    pub calendar_event_id: Option<String>,
}

impl From<Appointment> for FfiAppointment {
    fn from(a: Appointment) -> Self {
        Self {
            end_hour: a.end_hour(),
            duration_display: schedule::format_duration(a.duration_hours),
            appointment_id: a.appointment_id,
            patient_id: a.patient_id,
            date: format_date(a.date),
            start_hour: a.start_hour,
            duration_hours: a.duration_hours,
            staff_id: a.staff_id,
            reason: a.reason,
            notes: a.notes,
            status: a.status.as_str().to_string(),
            calendar_event_id: a.calendar_event_id,
        }
    }
}

/// FFI-safe appointment request. Unset start and duration use the clinic
/// defaults; an end hour, when given, wins over the duration.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewAppointment {
    pub patient_id: String,
    pub date: String,
    pub start_hour: Option<f64>,
    pub duration_hours: Option<f64>,
    pub end_hour: Option<f64>,
    pub staff_id: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

impl FfiNewAppointment {
    fn into_appointment(self, book: &AppointmentBook<'_>) -> Result<Appointment, ClinicError> {
        let mut appointment = book.draft(&self.patient_id, parse_date(&self.date)?);
        if let Some(start_hour) = self.start_hour {
            appointment.start_hour = start_hour;
        }
        let end = match (self.end_hour, self.duration_hours) {
            (Some(end_hour), _) => Some(SlotEnd::EndHour(end_hour)),
            (None, Some(hours)) => Some(SlotEnd::Duration(hours)),
            (None, None) => None,
        };
        if let Some(end) = end {
            let (SlotEnd::Duration(raw) | SlotEnd::EndHour(raw)) = end;
            if !raw.is_finite() {
                return Err(WorkflowError::from(SlotError::InvalidHour(raw)).into());
            }
            appointment.duration_hours = end.duration_from(appointment.start_hour);
        }
        appointment.staff_id = self.staff_id;
        appointment.reason = self.reason;
        appointment.notes = self.notes;
        Ok(appointment)
    }
}

/// FFI-safe partial appointment update.
#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiAppointmentChanges {
    pub patient_id: Option<String>,
    pub date: Option<String>,
    pub start_hour: Option<f64>,
    pub duration_hours: Option<f64>,
    pub end_hour: Option<f64>,
    pub staff_id: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

impl TryFrom<FfiAppointmentChanges> for AppointmentChanges {
    type Error = ClinicError;

    fn try_from(c: FfiAppointmentChanges) -> Result<Self, Self::Error> {
        Ok(AppointmentChanges {
            patient_id: c.patient_id,
            date: parse_optional_date(c.date)?,
            start_hour: c.start_hour,
            duration_hours: c.duration_hours,
            end_hour: c.end_hour,
            staff_id: c.staff_id,
            reason: c.reason,
            notes: c.notes,
        })
    }
}

/// FFI-safe calendar event. Instants are RFC 3339 in UTC.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCalendarEvent {
    pub event_id: String,
    pub appointment_id: String,
    pub title: String,
    pub start: String,
    pub stop: String,
    pub description: String,
    pub owner_id: String,
    pub attendee_ids: Vec<String>,
}

impl From<CalendarEvent> for FfiCalendarEvent {
    fn from(e: CalendarEvent) -> Self {
        Self {
            event_id: e.event_id,
            appointment_id: e.appointment_id,
            title: e.title,
            start: e.start.to_rfc3339(),
            stop: e.stop.to_rfc3339(),
            description: e.description,
            owner_id: e.owner_id,
            attendee_ids: e.attendee_ids,
        }
    }
}

/// FFI-safe navigation directive. `kind` is `close` or `open`; the other
/// fields are only set for `open`.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiActionDirective {
    pub kind: String,
    pub title: Option<String>,
    pub target: Option<String>,
    pub view: Option<String>,
    pub record_id: Option<String>,
    pub filter_patient_id: Option<String>,
    pub defaults: HashMap<String, String>,
}

impl From<ActionDirective> for FfiActionDirective {
    fn from(directive: ActionDirective) -> Self {
        match directive {
            ActionDirective::Close => Self {
                kind: "close".into(),
                title: None,
                target: None,
                view: None,
                record_id: None,
                filter_patient_id: None,
                defaults: HashMap::new(),
            },
            ActionDirective::Open {
                title,
                target,
                view,
                record_id,
                filter_patient_id,
                defaults,
            } => Self {
                kind: "open".into(),
                title: Some(title),
                target: Some(target.as_str().to_string()),
                view: Some(view.as_str().to_string()),
                record_id,
                filter_patient_id,
                defaults: defaults.into_iter().collect(),
            },
        }
    }
}

/// FFI-safe activity log verification.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiChainVerification {
    pub entries: u32,
    pub first_broken: Option<i64>,
    pub intact: bool,
}

impl From<ChainVerification> for FfiChainVerification {
    fn from(v: ChainVerification) -> Self {
        Self {
            intact: v.is_intact(),
            entries: v.entries as u32,
            first_broken: v.first_broken,
        }
    }
}
