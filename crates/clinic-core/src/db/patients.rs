//! Patient database operations.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::Patient;

const PATIENT_COLUMNS: &str = r#"
    local_id, file_number, name, date_of_birth, occupation, phone, email,
    address, referral_source, intake, symptoms, allergies, medical_notes,
    blacklisted, blacklist_reason, blacklisted_on, active, created_at, updated_at
"#;

impl Database {
    /// Insert a new patient.
    pub fn insert_patient(&self, patient: &Patient) -> DbResult<()> {
        let intake_json = serde_json::to_string(&patient.intake)?;
        let symptoms_json = serde_json::to_string(&patient.symptoms)?;

        self.conn.execute(
            &format!(
                "INSERT INTO patients ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
                PATIENT_COLUMNS
            ),
            params![
                patient.local_id,
                patient.file_number,
                patient.name,
                patient.date_of_birth,
                patient.occupation,
                patient.phone,
                patient.email,
                patient.address,
                patient.referral_source,
                intake_json,
                symptoms_json,
                patient.allergies,
                patient.medical_notes,
                patient.blacklisted,
                patient.blacklist_reason,
                patient.blacklisted_on,
                patient.active,
                patient.created_at,
                patient.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update an existing patient. The file number is never rewritten.
    pub fn update_patient(&self, patient: &Patient) -> DbResult<bool> {
        let intake_json = serde_json::to_string(&patient.intake)?;
        let symptoms_json = serde_json::to_string(&patient.symptoms)?;

        let rows_affected = self.conn.execute(
            r#"
            UPDATE patients SET
                name = ?2,
                date_of_birth = ?3,
                occupation = ?4,
                phone = ?5,
                email = ?6,
                address = ?7,
                referral_source = ?8,
                intake = ?9,
                symptoms = ?10,
                allergies = ?11,
                medical_notes = ?12,
                blacklisted = ?13,
                blacklist_reason = ?14,
                blacklisted_on = ?15,
                active = ?16,
                updated_at = datetime('now')
            WHERE local_id = ?1
            "#,
            params![
                patient.local_id,
                patient.name,
                patient.date_of_birth,
                patient.occupation,
                patient.phone,
                patient.email,
                patient.address,
                patient.referral_source,
                intake_json,
                symptoms_json,
                patient.allergies,
                patient.medical_notes,
                patient.blacklisted,
                patient.blacklist_reason,
                patient.blacklisted_on,
                patient.active,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a patient by local ID.
    pub fn get_patient(&self, local_id: &str) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM patients WHERE local_id = ?", PATIENT_COLUMNS),
                [local_id],
                PatientRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Get a patient by clinic file number.
    pub fn get_patient_by_file_number(&self, file_number: &str) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM patients WHERE file_number = ?", PATIENT_COLUMNS),
                [file_number],
                PatientRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Search active patients by name (prefix match).
    pub fn search_patients(&self, query: &str, limit: usize) -> DbResult<Vec<Patient>> {
        let pattern = format!("{}%", query);
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM patients
            WHERE name LIKE ? AND active = 1
            ORDER BY name
            LIMIT ?
            "#,
            PATIENT_COLUMNS
        ))?;

        let rows = stmt.query_map(params![pattern, limit as i64], PatientRow::from_row)?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok(patients)
    }

    /// List patients, archived ones included when `include_archived`.
    pub fn list_patients(&self, include_archived: bool) -> DbResult<Vec<Patient>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM patients
            WHERE active = 1 OR ?1
            ORDER BY name
            "#,
            PATIENT_COLUMNS
        ))?;

        let rows = stmt.query_map([include_archived], PatientRow::from_row)?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok(patients)
    }

    /// Soft-delete a patient.
    pub fn set_patient_active(&self, local_id: &str, active: bool) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE patients SET active = ?2, updated_at = datetime('now') WHERE local_id = ?1",
            params![local_id, active],
        )?;
        Ok(rows_affected > 0)
    }

    /// Hard-delete a patient. Consultations cascade.
    pub fn delete_patient(&self, local_id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM patients WHERE local_id = ?", [local_id])?;
        Ok(rows_affected > 0)
    }

    /// Set the file number on a patient that has none.
    pub fn assign_file_number(&self, local_id: &str, file_number: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE patients SET file_number = ?2, updated_at = datetime('now')
             WHERE local_id = ?1 AND file_number IS NULL",
            [local_id, file_number],
        )?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct PatientRow {
    local_id: String,
    file_number: Option<String>,
    name: String,
    date_of_birth: Option<NaiveDate>,
    occupation: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    address: Option<String>,
    referral_source: Option<String>,
    intake: String,
    symptoms: String,
    allergies: Option<String>,
    medical_notes: Option<String>,
    blacklisted: bool,
    blacklist_reason: Option<String>,
    blacklisted_on: Option<NaiveDate>,
    active: bool,
    created_at: String,
    updated_at: String,
}

impl PatientRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(PatientRow {
            local_id: row.get(0)?,
            file_number: row.get(1)?,
            name: row.get(2)?,
            date_of_birth: row.get(3)?,
            occupation: row.get(4)?,
            phone: row.get(5)?,
            email: row.get(6)?,
            address: row.get(7)?,
            referral_source: row.get(8)?,
            intake: row.get(9)?,
            symptoms: row.get(10)?,
            allergies: row.get(11)?,
            medical_notes: row.get(12)?,
            blacklisted: row.get(13)?,
            blacklist_reason: row.get(14)?,
            blacklisted_on: row.get(15)?,
            active: row.get(16)?,
            created_at: row.get(17)?,
            updated_at: row.get(18)?,
        })
    }
}

impl TryFrom<PatientRow> for Patient {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        Ok(Patient {
            local_id: row.local_id,
            file_number: row.file_number,
            name: row.name,
            date_of_birth: row.date_of_birth,
            occupation: row.occupation,
            phone: row.phone,
            email: row.email,
            address: row.address,
            referral_source: row.referral_source,
            intake: serde_json::from_str(&row.intake)?,
            symptoms: serde_json::from_str(&row.symptoms)?,
            allergies: row.allergies,
            medical_notes: row.medical_notes,
            blacklisted: row.blacklisted,
            blacklist_reason: row.blacklist_reason,
            blacklisted_on: row.blacklisted_on,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LensHistory, YesNo};

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();

        let mut patient = Patient::new("Ana López".into());
        patient.date_of_birth = NaiveDate::from_ymd_opt(1990, 2, 14);
        patient.phone = Some("555-0101".into());
        patient.intake.uses_computer = YesNo::Yes;
        patient.intake.lens_history = LensHistory::Previously;
        patient.symptoms.blurred_vision = true;

        db.insert_patient(&patient).unwrap();

        let retrieved = db.get_patient(&patient.local_id).unwrap().unwrap();
        assert_eq!(retrieved.name, "Ana López");
        assert_eq!(retrieved.date_of_birth, patient.date_of_birth);
        assert_eq!(retrieved.intake, patient.intake);
        assert!(retrieved.symptoms.blurred_vision);
        assert!(retrieved.active);
    }

    #[test]
    fn test_update_patient_keeps_file_number() {
        let db = setup_db();

        let mut patient = Patient::new("Ana".into());
        patient.file_number = Some("FICHA-00001".into());
        db.insert_patient(&patient).unwrap();

        patient.file_number = Some("FICHA-99999".into());
        patient.allergies = Some("Penicillin".into());
        patient.blacklisted = true;
        patient.blacklist_reason = Some("Repeated no-shows".into());
        db.update_patient(&patient).unwrap();

        let retrieved = db.get_patient(&patient.local_id).unwrap().unwrap();
        assert_eq!(retrieved.file_number.as_deref(), Some("FICHA-00001"));
        assert_eq!(retrieved.allergies.as_deref(), Some("Penicillin"));
        assert!(retrieved.blacklisted);
    }

    #[test]
    fn test_search_skips_archived() {
        let db = setup_db();

        let ana = Patient::new("Ana".into());
        let anabel = Patient::new("Anabel".into());
        let luis = Patient::new("Luis".into());

        db.insert_patient(&ana).unwrap();
        db.insert_patient(&anabel).unwrap();
        db.insert_patient(&luis).unwrap();

        let results = db.search_patients("Ana", 10).unwrap();
        assert_eq!(results.len(), 2);

        db.set_patient_active(&anabel.local_id, false).unwrap();
        let results = db.search_patients("Ana", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Ana");

        assert_eq!(db.list_patients(false).unwrap().len(), 2);
        assert_eq!(db.list_patients(true).unwrap().len(), 3);
    }

    #[test]
    fn test_file_number_lookup() {
        let db = setup_db();

        let patient = Patient::new("Ana".into());
        db.insert_patient(&patient).unwrap();

        assert!(db.assign_file_number(&patient.local_id, "FICHA-00007").unwrap());
        // Already assigned, not overwritten
        assert!(!db.assign_file_number(&patient.local_id, "FICHA-00008").unwrap());

        let found = db.get_patient_by_file_number("FICHA-00007").unwrap().unwrap();
        assert_eq!(found.local_id, patient.local_id);
    }
}
