//! Named counters.

use rusqlite::params;

use super::{Database, DbResult};

/// Sequence backing patient file numbers.
pub const PATIENT_FILE_SEQUENCE: &str = "patient.file_number";

impl Database {
    /// Take the next value of a sequence, creating it at 1 when unknown.
    pub fn next_sequence_value(&self, code: &str) -> DbResult<i64> {
        self.conn.execute(
            "INSERT OR IGNORE INTO sequences (code, next_value) VALUES (?1, 1)",
            [code],
        )?;
        let value: i64 = self.conn.query_row(
            "UPDATE sequences SET next_value = next_value + 1 WHERE code = ?1 RETURNING next_value - 1",
            params![code],
            |row| row.get(0),
        )?;
        Ok(value)
    }
}
