//! SQLite schema definition.

/// Complete database schema for the clinic.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    local_id TEXT PRIMARY KEY,
    file_number TEXT UNIQUE,                     -- assigned from sequence on registration
    name TEXT NOT NULL,
    date_of_birth TEXT,                          -- YYYY-MM-DD
    occupation TEXT,
    phone TEXT,
    email TEXT,
    address TEXT,
    referral_source TEXT,
    intake TEXT NOT NULL DEFAULT '{}',           -- JSON IntakeQuestionnaire
    symptoms TEXT NOT NULL DEFAULT '{}',         -- JSON Symptoms
    allergies TEXT,
    medical_notes TEXT,
    blacklisted INTEGER NOT NULL DEFAULT 0,
    blacklist_reason TEXT,
    blacklisted_on TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(name);
CREATE INDEX IF NOT EXISTS idx_patients_active ON patients(active);

-- ============================================================================
-- Consultations (visual exams)
-- ============================================================================

CREATE TABLE IF NOT EXISTS consultations (
    consultation_id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(local_id) ON DELETE CASCADE,
    age_at_visit INTEGER,
    date TEXT NOT NULL,
    optometrist_id TEXT,
    reason TEXT,
    acuity TEXT NOT NULL DEFAULT '{}',           -- JSON VisualAcuity
    lensometry TEXT NOT NULL DEFAULT '{}',       -- JSON RefractionPair
    retinoscopy TEXT NOT NULL DEFAULT '{}',      -- JSON RefractionPair
    prescription TEXT NOT NULL DEFAULT '{}',     -- JSON RefractionPair
    prescription_remarks TEXT,
    measurements TEXT NOT NULL DEFAULT '{}',     -- JSON Measurements
    findings TEXT NOT NULL DEFAULT '{}',         -- JSON ClinicalFindings
    lens_order TEXT NOT NULL DEFAULT '{}',       -- JSON LensOrder
    suggested_next_visit TEXT,
    grading_notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_consultations_patient ON consultations(patient_id);
CREATE INDEX IF NOT EXISTS idx_consultations_date ON consultations(date);

CREATE TABLE IF NOT EXISTS clinical_drawings (
    drawing_id TEXT PRIMARY KEY,
    consultation_id TEXT NOT NULL REFERENCES consultations(consultation_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    category TEXT NOT NULL DEFAULT 'other'
        CHECK (category IN ('right_eye', 'left_eye', 'both_eyes', 'other')),
    image BLOB,
    description TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_drawings_consultation ON clinical_drawings(consultation_id);

-- ============================================================================
-- Appointments and their calendar mirrors
-- ============================================================================

CREATE TABLE IF NOT EXISTS appointments (
    appointment_id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(local_id),
    date TEXT NOT NULL,
    start_hour REAL NOT NULL,
    duration_hours REAL NOT NULL DEFAULT 0.5 CHECK (duration_hours >= 0),
    staff_id TEXT,
    reason TEXT,
    notes TEXT,
    status TEXT NOT NULL DEFAULT 'draft'
        CHECK (status IN ('draft', 'confirmed', 'completed', 'cancelled', 'no_show')),
    calendar_event_id TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_appointments_patient ON appointments(patient_id);
CREATE INDEX IF NOT EXISTS idx_appointments_date ON appointments(date, start_hour);
CREATE INDEX IF NOT EXISTS idx_appointments_status ON appointments(status);

-- One mirror per appointment. The mirror is always deleted before its appointment.
CREATE TABLE IF NOT EXISTS calendar_events (
    event_id TEXT PRIMARY KEY,
    appointment_id TEXT NOT NULL UNIQUE REFERENCES appointments(appointment_id),
    title TEXT NOT NULL,
    start TEXT NOT NULL,                         -- UTC timestamp
    stop TEXT NOT NULL,                          -- UTC timestamp
    description TEXT NOT NULL DEFAULT '',
    owner_id TEXT NOT NULL,
    attendee_ids TEXT NOT NULL DEFAULT '[]',     -- JSON array of patient ids
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_calendar_start ON calendar_events(start);

-- ============================================================================
-- Sequences
-- ============================================================================

CREATE TABLE IF NOT EXISTS sequences (
    code TEXT PRIMARY KEY,
    next_value INTEGER NOT NULL DEFAULT 1
);

INSERT OR IGNORE INTO sequences (code, next_value) VALUES ('patient.file_number', 1);

-- ============================================================================
-- Activity Log (Append-Only, hash chained)
-- ============================================================================

CREATE TABLE IF NOT EXISTS activity_log (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    record_type TEXT NOT NULL,
    record_id TEXT NOT NULL,
    action TEXT NOT NULL,
    actor TEXT NOT NULL,
    detail TEXT NOT NULL DEFAULT '{}',           -- JSON object
    prev_hash TEXT,                              -- NULL for the first entry
    entry_hash TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_activity_record ON activity_log(record_type, record_id);

CREATE TRIGGER IF NOT EXISTS activity_log_no_update BEFORE UPDATE ON activity_log
BEGIN
    SELECT RAISE(ABORT, 'Activity log entries are immutable');
END;

CREATE TRIGGER IF NOT EXISTS activity_log_no_delete BEFORE DELETE ON activity_log
BEGIN
    SELECT RAISE(ABORT, 'Activity log entries are immutable');
END;
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn
    }

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = setup();
        assert!(conn.execute_batch(SCHEMA).is_ok());

        let next: i64 = conn
            .query_row(
                "SELECT next_value FROM sequences WHERE code = 'patient.file_number'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(next, 1);
    }

    #[test]
    fn test_status_constraint() {
        let conn = setup();
        conn.execute("INSERT INTO patients (local_id, name) VALUES ('p1', 'Ana')", [])
            .unwrap();

        let result = conn.execute(
            "INSERT INTO appointments (appointment_id, patient_id, date, start_hour, status)
             VALUES ('a1', 'p1', '2024-06-03', 9.0, 'pending')",
            [],
        );
        assert!(result.is_err());

        let result = conn.execute(
            "INSERT INTO appointments (appointment_id, patient_id, date, start_hour, status)
             VALUES ('a1', 'p1', '2024-06-03', 9.0, 'draft')",
            [],
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_one_mirror_per_appointment() {
        let conn = setup();
        conn.execute("INSERT INTO patients (local_id, name) VALUES ('p1', 'Ana')", [])
            .unwrap();
        conn.execute(
            "INSERT INTO appointments (appointment_id, patient_id, date, start_hour)
             VALUES ('a1', 'p1', '2024-06-03', 9.0)",
            [],
        )
        .unwrap();

        let insert = "INSERT INTO calendar_events (event_id, appointment_id, title, start, stop, owner_id)
                      VALUES (?1, 'a1', 'Appointment: Ana', '2024-06-03T15:00:00Z', '2024-06-03T15:30:00Z', 'u1')";
        assert!(conn.execute(insert, ["e1"]).is_ok());
        assert!(conn.execute(insert, ["e2"]).is_err());
    }

    #[test]
    fn test_drawings_cascade_with_consultation() {
        let conn = setup();
        conn.execute("INSERT INTO patients (local_id, name) VALUES ('p1', 'Ana')", [])
            .unwrap();
        conn.execute(
            "INSERT INTO consultations (consultation_id, patient_id, date) VALUES ('c1', 'p1', '2024-06-03')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO clinical_drawings (drawing_id, consultation_id, name) VALUES ('d1', 'c1', 'Fundus OD')",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM consultations WHERE consultation_id = 'c1'", [])
            .unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM clinical_drawings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_activity_log_is_append_only() {
        let conn = setup();
        conn.execute(
            "INSERT INTO activity_log (record_type, record_id, action, actor, entry_hash, created_at)
             VALUES ('patient', 'p1', 'registered', 'u1', 'abc', '2024-06-03T00:00:00Z')",
            [],
        )
        .unwrap();

        assert!(conn
            .execute("UPDATE activity_log SET action = 'edited'", [])
            .is_err());
        assert!(conn.execute("DELETE FROM activity_log", []).is_err());
    }
}
