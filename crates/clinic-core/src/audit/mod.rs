//! Tamper-evident activity trail.
//!
//! Each entry stores the hash of its predecessor, so editing or removing a
//! row breaks every later link:
//!
//! ```text
//! entry_hash[n] = SHA-256(canonical_json(prev_hash[n], fields[n]))
//! prev_hash[n]  = entry_hash[n-1]
//! ```

mod chain;

pub use chain::*;

use thiserror::Error;

/// Audit errors.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Database(#[from] crate::db::DbError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type AuditResult<T> = Result<T, AuditError>;

/// Kind of record an entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    Patient,
    Consultation,
    Drawing,
    Appointment,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Patient => "patient",
            RecordType::Consultation => "consultation",
            RecordType::Drawing => "drawing",
            RecordType::Appointment => "appointment",
        }
    }
}
