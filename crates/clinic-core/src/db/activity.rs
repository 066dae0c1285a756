//! Activity log database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbResult};

/// A stored activity log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecord {
    pub seq: i64,
    pub record_type: String,
    pub record_id: String,
    pub action: String,
    pub actor: String,
    /// JSON object
    pub detail: String,
    pub prev_hash: Option<String>,
    pub entry_hash: String,
    pub created_at: String,
}

impl ActivityRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ActivityRecord {
            seq: row.get(0)?,
            record_type: row.get(1)?,
            record_id: row.get(2)?,
            action: row.get(3)?,
            actor: row.get(4)?,
            detail: row.get(5)?,
            prev_hash: row.get(6)?,
            entry_hash: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

const ACTIVITY_COLUMNS: &str =
    "seq, record_type, record_id, action, actor, detail, prev_hash, entry_hash, created_at";

impl Database {
    /// Append an entry. Returns its sequence number.
    pub fn append_activity(&self, record: &ActivityRecord) -> DbResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO activity_log (
                record_type, record_id, action, actor, detail, prev_hash, entry_hash, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                record.record_type,
                record.record_id,
                record.action,
                record.actor,
                record.detail,
                record.prev_hash,
                record.entry_hash,
                record.created_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Hash of the most recent entry.
    pub fn latest_activity_hash(&self) -> DbResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT entry_hash FROM activity_log ORDER BY seq DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// All entries in append order.
    pub fn list_activity(&self) -> DbResult<Vec<ActivityRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM activity_log ORDER BY seq",
            ACTIVITY_COLUMNS
        ))?;
        let rows = stmt.query_map([], ActivityRecord::from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Entries about one record in append order.
    pub fn list_activity_for(&self, record_type: &str, record_id: &str) -> DbResult<Vec<ActivityRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM activity_log WHERE record_type = ?1 AND record_id = ?2 ORDER BY seq",
            ACTIVITY_COLUMNS
        ))?;
        let rows = stmt.query_map([record_type, record_id], ActivityRecord::from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
