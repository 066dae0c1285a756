//! Calendar event database operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::CalendarEvent;

const EVENT_COLUMNS: &str = r#"
    event_id, appointment_id, title, start, stop, description, owner_id,
    attendee_ids, created_at, updated_at
"#;

impl Database {
    /// Insert a calendar event.
    pub fn insert_calendar_event(&self, event: &CalendarEvent) -> DbResult<()> {
        let attendees_json = serde_json::to_string(&event.attendee_ids)?;

        self.conn.execute(
            &format!(
                "INSERT INTO calendar_events ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                EVENT_COLUMNS
            ),
            params![
                event.event_id,
                event.appointment_id,
                event.title,
                event.start,
                event.stop,
                event.description,
                event.owner_id,
                attendees_json,
                event.created_at,
                event.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Rewrite title, times, description and attendees in place.
    pub fn update_calendar_event(&self, event: &CalendarEvent) -> DbResult<bool> {
        let attendees_json = serde_json::to_string(&event.attendee_ids)?;

        let rows_affected = self.conn.execute(
            r#"
            UPDATE calendar_events SET
                title = ?2,
                start = ?3,
                stop = ?4,
                description = ?5,
                attendee_ids = ?6,
                updated_at = datetime('now')
            WHERE event_id = ?1
            "#,
            params![
                event.event_id,
                event.title,
                event.start,
                event.stop,
                event.description,
                attendees_json,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    pub fn get_calendar_event(&self, event_id: &str) -> DbResult<Option<CalendarEvent>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM calendar_events WHERE event_id = ?", EVENT_COLUMNS),
                [event_id],
                EventRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    pub fn get_calendar_event_for_appointment(
        &self,
        appointment_id: &str,
    ) -> DbResult<Option<CalendarEvent>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM calendar_events WHERE appointment_id = ?",
                    EVENT_COLUMNS
                ),
                [appointment_id],
                EventRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Events starting in `[from, to)`.
    pub fn list_calendar_events(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<CalendarEvent>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM calendar_events
            WHERE start >= ?1 AND start < ?2
            ORDER BY start
            "#,
            EVENT_COLUMNS
        ))?;

        let rows = stmt.query_map(params![from, to], EventRow::from_row)?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?.try_into()?);
        }
        Ok(events)
    }

    pub fn count_calendar_events_for_appointment(&self, appointment_id: &str) -> DbResult<u32> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM calendar_events WHERE appointment_id = ?",
            [appointment_id],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }

    pub fn delete_calendar_event(&self, event_id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM calendar_events WHERE event_id = ?", [event_id])?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct EventRow {
    event_id: String,
    appointment_id: String,
    title: String,
    start: DateTime<Utc>,
    stop: DateTime<Utc>,
    description: String,
    owner_id: String,
    attendee_ids: String,
    created_at: String,
    updated_at: String,
}

impl EventRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(EventRow {
            event_id: row.get(0)?,
            appointment_id: row.get(1)?,
            title: row.get(2)?,
            start: row.get(3)?,
            stop: row.get(4)?,
            description: row.get(5)?,
            owner_id: row.get(6)?,
            attendee_ids: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

impl TryFrom<EventRow> for CalendarEvent {
    type Error = DbError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(CalendarEvent {
            event_id: row.event_id,
            appointment_id: row.appointment_id,
            title: row.title,
            start: row.start,
            stop: row.stop,
            description: row.description,
            owner_id: row.owner_id,
            attendee_ids: serde_json::from_str(&row.attendee_ids)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
