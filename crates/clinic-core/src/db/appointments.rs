//! Appointment database operations.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{Appointment, AppointmentStatus};

const APPOINTMENT_COLUMNS: &str = r#"
    appointment_id, patient_id, date, start_hour, duration_hours, staff_id,
    reason, notes, status, calendar_event_id, created_at, updated_at
"#;

impl Database {
    /// Insert a new appointment.
    pub fn insert_appointment(&self, appointment: &Appointment) -> DbResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO appointments ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                APPOINTMENT_COLUMNS
            ),
            params![
                appointment.appointment_id,
                appointment.patient_id,
                appointment.date,
                appointment.start_hour,
                appointment.duration_hours,
                appointment.staff_id,
                appointment.reason,
                appointment.notes,
                appointment.status.as_str(),
                appointment.calendar_event_id,
                appointment.created_at,
                appointment.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update scheduling fields and the calendar link. Status is written
    /// separately through [`Database::set_appointment_status`].
    pub fn update_appointment(&self, appointment: &Appointment) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE appointments SET
                patient_id = ?2,
                date = ?3,
                start_hour = ?4,
                duration_hours = ?5,
                staff_id = ?6,
                reason = ?7,
                notes = ?8,
                calendar_event_id = ?9,
                updated_at = datetime('now')
            WHERE appointment_id = ?1
            "#,
            params![
                appointment.appointment_id,
                appointment.patient_id,
                appointment.date,
                appointment.start_hour,
                appointment.duration_hours,
                appointment.staff_id,
                appointment.reason,
                appointment.notes,
                appointment.calendar_event_id,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    pub fn set_appointment_status(
        &self,
        appointment_id: &str,
        status: AppointmentStatus,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE appointments SET status = ?2, updated_at = datetime('now') WHERE appointment_id = ?1",
            params![appointment_id, status.as_str()],
        )?;
        Ok(rows_affected > 0)
    }

    pub fn link_calendar_event(&self, appointment_id: &str, event_id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE appointments SET calendar_event_id = ?2 WHERE appointment_id = ?1",
            [appointment_id, event_id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get an appointment by ID.
    pub fn get_appointment(&self, appointment_id: &str) -> DbResult<Option<Appointment>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM appointments WHERE appointment_id = ?",
                    APPOINTMENT_COLUMNS
                ),
                [appointment_id],
                AppointmentRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List a patient's appointments, latest date first then by start hour.
    pub fn list_appointments_for_patient(&self, patient_id: &str) -> DbResult<Vec<Appointment>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM appointments
            WHERE patient_id = ?
            ORDER BY date DESC, start_hour
            "#,
            APPOINTMENT_COLUMNS
        ))?;

        let rows = stmt.query_map([patient_id], AppointmentRow::from_row)?;

        let mut appointments = Vec::new();
        for row in rows {
            appointments.push(row?.try_into()?);
        }
        Ok(appointments)
    }

    /// List appointments on a date, ordered by start hour.
    pub fn list_appointments_on(&self, date: NaiveDate) -> DbResult<Vec<Appointment>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM appointments
            WHERE date = ?
            ORDER BY start_hour
            "#,
            APPOINTMENT_COLUMNS
        ))?;

        let rows = stmt.query_map([date], AppointmentRow::from_row)?;

        let mut appointments = Vec::new();
        for row in rows {
            appointments.push(row?.try_into()?);
        }
        Ok(appointments)
    }

    pub fn count_appointments_for_patient(&self, patient_id: &str) -> DbResult<u32> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM appointments WHERE patient_id = ?",
            [patient_id],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }

    /// Delete an appointment. Its calendar event must be deleted first.
    pub fn delete_appointment(&self, appointment_id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "DELETE FROM appointments WHERE appointment_id = ?",
            [appointment_id],
        )?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct AppointmentRow {
    appointment_id: String,
    patient_id: String,
    date: NaiveDate,
    start_hour: f64,
    duration_hours: f64,
    staff_id: Option<String>,
    reason: Option<String>,
    notes: Option<String>,
    status: String,
    calendar_event_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl AppointmentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(AppointmentRow {
            appointment_id: row.get(0)?,
            patient_id: row.get(1)?,
            date: row.get(2)?,
            start_hour: row.get(3)?,
            duration_hours: row.get(4)?,
            staff_id: row.get(5)?,
            reason: row.get(6)?,
            notes: row.get(7)?,
            status: row.get(8)?,
            calendar_event_id: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = DbError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        let status = AppointmentStatus::parse(&row.status).ok_or_else(|| {
            DbError::Constraint(format!("Unknown appointment status: {}", row.status))
        })?;

        Ok(Appointment {
            appointment_id: row.appointment_id,
            patient_id: row.patient_id,
            date: row.date,
            start_hour: row.start_hour,
            duration_hours: row.duration_hours,
            staff_id: row.staff_id,
            reason: row.reason,
            notes: row.notes,
            status,
            calendar_event_id: row.calendar_event_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
