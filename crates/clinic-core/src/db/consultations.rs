//! Consultation database operations.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::Consultation;

const CONSULTATION_COLUMNS: &str = r#"
    consultation_id, patient_id, age_at_visit, date, optometrist_id, reason,
    acuity, lensometry, retinoscopy, prescription, prescription_remarks,
    measurements, findings, lens_order, suggested_next_visit, grading_notes,
    created_at, updated_at
"#;

impl Database {
    /// Insert a new consultation.
    pub fn insert_consultation(&self, consultation: &Consultation) -> DbResult<()> {
        let blocks = ClinicalBlocks::encode(consultation)?;

        self.conn.execute(
            &format!(
                "INSERT INTO consultations ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
                CONSULTATION_COLUMNS
            ),
            params![
                consultation.consultation_id,
                consultation.patient_id,
                consultation.age_at_visit,
                consultation.date,
                consultation.optometrist_id,
                consultation.reason,
                blocks.acuity,
                blocks.lensometry,
                blocks.retinoscopy,
                blocks.prescription,
                consultation.prescription_remarks,
                blocks.measurements,
                blocks.findings,
                blocks.lens_order,
                consultation.suggested_next_visit,
                consultation.grading_notes,
                consultation.created_at,
                consultation.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update an existing consultation. The patient reference is fixed.
    pub fn update_consultation(&self, consultation: &Consultation) -> DbResult<bool> {
        let blocks = ClinicalBlocks::encode(consultation)?;

        let rows_affected = self.conn.execute(
            r#"
            UPDATE consultations SET
                age_at_visit = ?2,
                date = ?3,
                optometrist_id = ?4,
                reason = ?5,
                acuity = ?6,
                lensometry = ?7,
                retinoscopy = ?8,
                prescription = ?9,
                prescription_remarks = ?10,
                measurements = ?11,
                findings = ?12,
                lens_order = ?13,
                suggested_next_visit = ?14,
                grading_notes = ?15,
                updated_at = datetime('now')
            WHERE consultation_id = ?1
            "#,
            params![
                consultation.consultation_id,
                consultation.age_at_visit,
                consultation.date,
                consultation.optometrist_id,
                consultation.reason,
                blocks.acuity,
                blocks.lensometry,
                blocks.retinoscopy,
                blocks.prescription,
                consultation.prescription_remarks,
                blocks.measurements,
                blocks.findings,
                blocks.lens_order,
                consultation.suggested_next_visit,
                consultation.grading_notes,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a consultation by ID.
    pub fn get_consultation(&self, consultation_id: &str) -> DbResult<Option<Consultation>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM consultations WHERE consultation_id = ?",
                    CONSULTATION_COLUMNS
                ),
                [consultation_id],
                ConsultationRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List a patient's consultations, most recent first.
    pub fn list_consultations_for_patient(&self, patient_id: &str) -> DbResult<Vec<Consultation>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM consultations
            WHERE patient_id = ?
            ORDER BY date DESC, created_at DESC
            "#,
            CONSULTATION_COLUMNS
        ))?;

        let rows = stmt.query_map([patient_id], ConsultationRow::from_row)?;

        let mut consultations = Vec::new();
        for row in rows {
            consultations.push(row?.try_into()?);
        }
        Ok(consultations)
    }

    pub fn count_consultations_for_patient(&self, patient_id: &str) -> DbResult<u32> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM consultations WHERE patient_id = ?",
            [patient_id],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }

    /// Delete a consultation. Drawings cascade.
    pub fn delete_consultation(&self, consultation_id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "DELETE FROM consultations WHERE consultation_id = ?",
            [consultation_id],
        )?;
        Ok(rows_affected > 0)
    }
}

/// JSON-encoded clinical blocks.
struct ClinicalBlocks {
    acuity: String,
    lensometry: String,
    retinoscopy: String,
    prescription: String,
    measurements: String,
    findings: String,
    lens_order: String,
}

impl ClinicalBlocks {
    fn encode(consultation: &Consultation) -> DbResult<Self> {
        Ok(Self {
            acuity: serde_json::to_string(&consultation.acuity)?,
            lensometry: serde_json::to_string(&consultation.lensometry)?,
            retinoscopy: serde_json::to_string(&consultation.retinoscopy)?,
            prescription: serde_json::to_string(&consultation.prescription)?,
            measurements: serde_json::to_string(&consultation.measurements)?,
            findings: serde_json::to_string(&consultation.findings)?,
            lens_order: serde_json::to_string(&consultation.lens_order)?,
        })
    }
}

/// Intermediate row struct for database mapping.
struct ConsultationRow {
    consultation_id: String,
    patient_id: String,
    age_at_visit: Option<u32>,
    date: NaiveDate,
    optometrist_id: Option<String>,
    reason: Option<String>,
    blocks: ClinicalBlocks,
    prescription_remarks: Option<String>,
    suggested_next_visit: Option<NaiveDate>,
    grading_notes: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ConsultationRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ConsultationRow {
            consultation_id: row.get(0)?,
            patient_id: row.get(1)?,
            age_at_visit: row.get(2)?,
            date: row.get(3)?,
            optometrist_id: row.get(4)?,
            reason: row.get(5)?,
            blocks: ClinicalBlocks {
                acuity: row.get(6)?,
                lensometry: row.get(7)?,
                retinoscopy: row.get(8)?,
                prescription: row.get(9)?,
                measurements: row.get(11)?,
                findings: row.get(12)?,
                lens_order: row.get(13)?,
            },
            prescription_remarks: row.get(10)?,
            suggested_next_visit: row.get(14)?,
            grading_notes: row.get(15)?,
            created_at: row.get(16)?,
            updated_at: row.get(17)?,
        })
    }
}

impl TryFrom<ConsultationRow> for Consultation {
    type Error = DbError;

    fn try_from(row: ConsultationRow) -> Result<Self, Self::Error> {
        let blocks = row.blocks;
        Ok(Consultation {
            consultation_id: row.consultation_id,
            patient_id: row.patient_id,
            age_at_visit: row.age_at_visit,
            date: row.date,
            optometrist_id: row.optometrist_id,
            reason: row.reason,
            acuity: serde_json::from_str(&blocks.acuity)?,
            lensometry: serde_json::from_str(&blocks.lensometry)?,
            retinoscopy: serde_json::from_str(&blocks.retinoscopy)?,
            prescription: serde_json::from_str(&blocks.prescription)?,
            prescription_remarks: row.prescription_remarks,
            measurements: serde_json::from_str(&blocks.measurements)?,
            findings: serde_json::from_str(&blocks.findings)?,
            lens_order: serde_json::from_str(&blocks.lens_order)?,
            suggested_next_visit: row.suggested_next_visit,
            grading_notes: row.grading_notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
